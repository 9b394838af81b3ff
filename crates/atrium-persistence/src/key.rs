//! Datastore key identity (§4.7: "coalesces writes per `(blueprint, store,
//! key)`").

use serde::{Deserialize, Serialize};

/// Identifies one value in one named datastore, scoped to a blueprint so
/// every instance of that blueprint shares the same persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
    pub blueprint_id: String,
    pub store: String,
    pub key: String,
}

impl StoreKey {
    pub fn new(blueprint_id: impl Into<String>, store: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            blueprint_id: blueprint_id.into(),
            store: store.into(),
            key: key.into(),
        }
    }
}
