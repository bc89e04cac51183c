//! Error types for meta-composer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading configuration or serving a resource.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Home directory could not be determined.
    #[error("could not determine home directory")]
    NoHomeDir,

    /// I/O error during a filesystem operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a specific file.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// YAML parsing or rendering error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Embedded command metadata is missing an entry.
    #[error("command metadata: {0}")]
    Metadata(String),

    /// HTTP request failed.
    #[error("failed to fetch {uri}: {message}")]
    Http {
        /// Requested URI.
        uri: String,
        /// Transport or status error.
        message: String,
    },

    /// A document has an unexpected structure.
    #[error("invalid document {source_name}: {reason}")]
    InvalidDocument {
        /// URI or path of the document.
        source_name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An endpoint id is not a number in range.
    #[error("invalid ID '{id}': valid IDs are 1-{count}")]
    InvalidEndpointId {
        /// The id as given on the command line.
        id: String,
        /// Number of endpoints in the document.
        count: usize,
    },

    /// An endpoint was requested from a document without any.
    #[error("invalid ID '{0}': the document has no endpoints")]
    NoEndpoints(String),

    /// No Neovim server address was given or discovered.
    #[error("no running Neovim instance found; set $NVIM or pass a server address{hint}")]
    NvimNotRunning {
        /// Extra context, such as where the `nvim` executable lives.
        hint: String,
    },

    /// Neovim returned something other than what was asked for.
    #[error("unexpected response from Neovim: {0}")]
    UnexpectedResponse(String),

    /// msgpack-RPC failure.
    #[error("Neovim RPC error: {0}")]
    Rpc(#[from] nvim_rpc::Error),

    /// Resource registration failed.
    #[error(transparent)]
    Registry(#[from] resource_registry::Error),
}

/// Result type alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
