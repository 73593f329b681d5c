use thiserror::Error;

/// Errors that can arise while loading configuration, talking to the save store
/// or bringing a multiworld session up.
///
/// Per-tick operations never return these; they resolve odd data to defaults and log.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Static game configuration or slot data could not be used.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wrapper around serde_json errors (game config, world files, snapshots).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (reading config, creating data directories).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// The initial save snapshot did not arrive before the deadline.
    #[error("timed out after {waited_ms}ms waiting for {what}")]
    Timeout { what: &'static str, waited_ms: u64 },

    /// Game id 0 (or a config without one) disables the multiworld layer.
    #[error("multiworld disabled: {0}")]
    Disabled(String),
}
