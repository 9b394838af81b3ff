//! Errors produced by the persistence bridge (§4.7, §7).

/// Errors produced by datastore reads, writes, and flushes.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// A value exceeded the per-value size cap.
    #[error("value for {store}/{key} is {actual_bytes} bytes, over the {limit_bytes} byte cap")]
    ValueTooLarge {
        store: String,
        key: String,
        actual_bytes: usize,
        limit_bytes: usize,
    },

    /// A value could not be serialized to the JSON-style document format.
    #[error("failed to serialize value for {store}/{key}: {source}")]
    Serialization {
        store: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backend failed to load or flush data.
    #[error("persistence backend error: {0}")]
    Backend(String),
}
