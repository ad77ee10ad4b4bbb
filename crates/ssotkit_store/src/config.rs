//! Store configuration.

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the snapshot if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the snapshot already exists.
    pub error_if_exists: bool,

    /// Whether snapshots are written as indented JSON.
    pub pretty_snapshots: bool,

    /// Snapshot format version written by this build.
    pub format_version: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            pretty_snapshots: true,
            format_version: 1,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the snapshot if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the snapshot exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether snapshots are pretty-printed.
    #[must_use]
    pub const fn pretty_snapshots(mut self, value: bool) -> Self {
        self.pretty_snapshots = value;
        self
    }
}
