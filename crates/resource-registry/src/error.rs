//! Error types for the registry and the command layer.

use thiserror::Error;

/// Boxed error returned by command handlers.
///
/// Resource modules keep their own error enums; anything implementing
/// [`std::error::Error`] converts into this with `?`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while registering resources, parsing arguments or running
/// a handler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A resource with this name is already registered.
    #[error("resource \"{0}\" is already registered")]
    DuplicateName(String),

    /// Resource names must be non-empty.
    #[error("resource name must not be empty")]
    InvalidName,

    /// An argument placeholder is neither `<name>` nor `[name]`.
    #[error("invalid argument placeholder \"{0}\": expected <name> or [name]")]
    InvalidPlaceholder(String),

    /// A required argument follows an optional one.
    #[error("required argument {argument} of \"{command}\" follows an optional argument")]
    ArgumentOrder {
        /// Leaf command declaring the arguments.
        command: String,
        /// The offending required placeholder.
        argument: String,
    },

    /// The first command-line word does not name a registered resource.
    #[error("unknown resource '{name}'. Available resources: {}", .available.join(", "))]
    UnknownResource {
        /// The unrecognized resource name.
        name: String,
        /// Names of all registered resources, in registration order.
        available: Vec<String>,
    },

    /// Any other command-line parse failure, already rendered for display.
    #[error("{0}")]
    Usage(String),

    /// A handler asked for an argument that was not supplied.
    #[error("missing argument <{0}>")]
    MissingArgument(String),

    /// A resource handler failed.
    #[error("{resource} {operation} failed: {source}")]
    Handler {
        /// Resource namespace of the failing command.
        resource: String,
        /// Leaf command name.
        operation: String,
        /// Error returned by the handler.
        #[source]
        source: HandlerError,
    },
}

/// Result type alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
