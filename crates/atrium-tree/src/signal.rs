//! Fan-out signals with per-callback fault containment (§4.2, §4.4).
//!
//! Signals fire synchronously on the calling thread, in the order callbacks
//! were connected. A callback that returns `Err` faults; after three
//! consecutive faults it is disconnected automatically and the fire call
//! reports it so the host can log it (§4.2 "the offending callback is
//! disconnected if it faults repeatedly (three consecutive faults)").

use serde::{Deserialize, Serialize};

use crate::cframe::Vec3;
use crate::node_id::NodeId;

/// Maximum consecutive faults a callback may have before it is disconnected.
pub const MAX_CONSECUTIVE_FAULTS: u8 = 3;

/// A single argument passed to a signal callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalArg {
    Node(NodeId),
    Number(f64),
    Text(String),
    Position(Vec3),
}

/// A handle returned by [`Signal::connect`]; pass to [`Signal::disconnect`]
/// to remove the callback early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection(u64);

/// What happened when a signal fired, reported back to the caller for
/// logging (§4.2: "logged").
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    /// The callback ran without error.
    Ok(Connection),
    /// The callback returned an error; not yet at the fault limit.
    Faulted(Connection, String),
    /// The callback hit three consecutive faults and was disconnected.
    Disabled(Connection, String),
}

struct Slot {
    id: Connection,
    consecutive_faults: u8,
    callback: Box<dyn FnMut(&[SignalArg]) -> Result<(), String> + Send>,
}

/// A fan-out signal. Each named signal on a [`crate::node::Node`]
/// (`Touched`, `TouchEnded`, `Died`, user-defined) is one of these.
pub struct Signal {
    slots: Vec<Slot>,
    next_id: u64,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
        }
    }

    /// Connect a callback. Fires in the order callbacks were connected.
    pub fn connect(
        &mut self,
        callback: impl FnMut(&[SignalArg]) -> Result<(), String> + Send + 'static,
    ) -> Connection {
        let id = Connection(self.next_id);
        self.next_id += 1;
        self.slots.push(Slot {
            id,
            consecutive_faults: 0,
            callback: Box::new(callback),
        });
        id
    }

    /// Disconnect a callback early. No-op if already disconnected.
    pub fn disconnect(&mut self, conn: Connection) {
        self.slots.retain(|s| s.id != conn);
    }

    /// Fire the signal with `args`, invoking every connected callback in
    /// connection order. Returns the outcome of each invocation so the
    /// caller can log faults and disables.
    pub fn fire(&mut self, args: &[SignalArg]) -> Vec<FireOutcome> {
        let mut outcomes = Vec::with_capacity(self.slots.len());
        let mut disabled = Vec::new();
        for slot in self.slots.iter_mut() {
            match (slot.callback)(args) {
                Ok(()) => {
                    slot.consecutive_faults = 0;
                    outcomes.push(FireOutcome::Ok(slot.id));
                }
                Err(msg) => {
                    slot.consecutive_faults += 1;
                    if slot.consecutive_faults >= MAX_CONSECUTIVE_FAULTS {
                        outcomes.push(FireOutcome::Disabled(slot.id, msg));
                        disabled.push(slot.id);
                    } else {
                        outcomes.push(FireOutcome::Faulted(slot.id, msg));
                    }
                }
            }
        }
        if !disabled.is_empty() {
            self.slots.retain(|s| !disabled.contains(&s.id));
        }
        outcomes
    }

    /// Number of currently connected callbacks.
    pub fn connection_count(&self) -> usize {
        self.slots.len()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn callbacks_fire_in_connection_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut signal = Signal::new();
        for i in 0..3 {
            let order = order.clone();
            signal.connect(move |_| {
                order.lock().unwrap().push(i);
                Ok(())
            });
        }
        signal.fire(&[]);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn faulting_callback_disabled_after_three_consecutive_faults() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut signal = Signal::new();
        let calls_clone = calls.clone();
        signal.connect(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Err("boom".to_owned())
        });

        let o1 = signal.fire(&[]);
        assert!(matches!(o1[0], FireOutcome::Faulted(_, _)));
        let o2 = signal.fire(&[]);
        assert!(matches!(o2[0], FireOutcome::Faulted(_, _)));
        let o3 = signal.fire(&[]);
        assert!(matches!(o3[0], FireOutcome::Disabled(_, _)));

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Disabled -- a fourth fire should invoke nobody.
        let o4 = signal.fire(&[]);
        assert!(o4.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn success_resets_fault_counter() {
        let should_fail = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let mut signal = Signal::new();
        let flag = should_fail.clone();
        signal.connect(move |_| {
            if flag.load(Ordering::SeqCst) {
                Err("transient".to_owned())
            } else {
                Ok(())
            }
        });

        signal.fire(&[]);
        signal.fire(&[]);
        should_fail.store(false, Ordering::SeqCst);
        signal.fire(&[]); // resets fault count
        should_fail.store(true, Ordering::SeqCst);
        signal.fire(&[]);
        let outcome = signal.fire(&[]);
        // Only 2 consecutive faults since the reset -- still connected.
        assert!(matches!(outcome[0], FireOutcome::Faulted(_, _)));
    }

    #[test]
    fn disconnect_removes_callback() {
        let mut signal = Signal::new();
        let conn = signal.connect(|_| Ok(()));
        assert_eq!(signal.connection_count(), 1);
        signal.disconnect(conn);
        assert_eq!(signal.connection_count(), 0);
        assert!(signal.fire(&[]).is_empty());
    }
}
