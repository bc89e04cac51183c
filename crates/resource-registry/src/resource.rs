//! The capability contract every resource module implements.

use crate::program::Program;

/// A self-contained source of information exposed on the command line.
///
/// The dispatcher only ever talks to resources through this trait: it asks
/// for the name, optionally the usage instructions, and lets the resource
/// attach its own commands to the [`Program`].
pub trait Resource {
    /// Stable identifier, used as the registry key and as the top-level
    /// command-line verb.
    fn name(&self) -> &str;

    /// Free-form guidance shown in the resource's help output.
    fn instructions(&self) -> Option<&str> {
        None
    }

    /// Attaches this resource's namespace and leaf commands to `program`.
    ///
    /// Implementations are expected to call [`Program::namespace`] with
    /// their own [`name`](Resource::name).
    fn register_commands(&self, program: &mut Program);
}

impl std::fmt::Debug for dyn Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
