//! Queued agent actions (§4.4 step 1, §6 `POST /games/{blueprint_id}/action`).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One action submitted by an agent, enqueued by the HTTP layer and consumed
/// at the start of the next tick. `data` is an opaque JSON payload -- its
/// shape is defined by the blueprint script, not the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    pub agent_id: String,
    pub action_type: String,
    pub data: serde_json::Value,
}

/// FIFO queue of actions awaiting the tick pipeline's "apply queued actions"
/// step. Kept behind its own mutex, separate from the instance's RW lock, so
/// the admission/action HTTP handlers never have to wait on a tick in flight.
#[derive(Debug, Default)]
pub struct ActionQueue {
    queue: parking_lot::Mutex<VecDeque<AgentAction>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, action: AgentAction) {
        self.queue.lock().push_back(action);
    }

    /// Drain every queued action in submission order. Called once per tick
    /// from step 1; actions submitted mid-drain land in the next tick.
    pub fn drain(&self) -> Vec<AgentAction> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_submission_order() {
        let queue = ActionQueue::new();
        queue.push(AgentAction {
            agent_id: "a".to_owned(),
            action_type: "move".to_owned(),
            data: serde_json::json!({"x": 1.0}),
        });
        queue.push(AgentAction {
            agent_id: "a".to_owned(),
            action_type: "jump".to_owned(),
            data: serde_json::Value::Null,
        });
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].action_type, "move");
        assert_eq!(drained[1].action_type, "jump");
        assert!(queue.is_empty());
    }
}
