//! Fatal error types. Everything recoverable is a finding, not an error:
//! only conditions that make the whole run meaningless land here.

use std::path::PathBuf;

/// All fatal errors carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the path, pattern, or reason.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The documentation tree root does not exist or is not a directory.
    #[error("docs root not found: {}", path.display())]
    DocsRootNotFound {
        /// The missing documentation root.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// A configured region delimiter pattern cannot be used.
    #[error("invalid region pattern `{pattern}`: {reason}")]
    RegionPattern {
        /// The offending pattern as configured.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// The samples source tree root does not exist or is not a directory.
    #[error("samples root not found: {}", path.display())]
    SamplesRootNotFound {
        /// The missing samples root.
        path: PathBuf,
    },

    /// TOML deserialization of the config file failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// The filesystem watcher could not be created or attached.
    #[error("watcher setup failed: {reason}")]
    WatchSetup {
        /// Description of the setup failure.
        reason: String,
    },
}
