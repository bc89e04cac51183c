#![doc = include_str!("../README.md")]
//!
//! ## Modules
//!
//! - [`resources`] - The `openapi`, `project` and `nvim` resource modules
//! - [`config`] - User configuration and environment overrides
//! - [`metadata`] - Embedded help text for resources and commands
//! - [`platform`] - Home directory and path helpers
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod metadata;
pub mod platform;
pub mod resources;

pub use config::Config;
pub use error::{Error, Result};
pub use resources::{NvimResource, OpenApiResource, ProjectResource};

use resource_registry::{Program, ResourceRegistry, assemble};

/// Executable name shown in usage and help.
pub const PROGRAM_NAME: &str = "meta-composer";

/// One-line description shown in the top-level help.
pub const ABOUT: &str =
    "Query developer resources (API specs, project dependencies, editor state) from one CLI";

/// Builds the registry of every resource module, in help order.
///
/// # Errors
///
/// Returns [`Error::Metadata`] if a module's help text is missing and
/// [`Error::Registry`] if two modules claim the same name.
pub fn build_registry(config: &Config) -> Result<ResourceRegistry> {
    let mut registry = ResourceRegistry::new();
    registry.register(OpenApiResource::new(config.http_timeout())?)?;
    registry.register(ProjectResource::new()?)?;
    registry.register(NvimResource::new(
        config.rpc_timeout(),
        config.nvim_server.clone(),
    )?)?;
    Ok(registry)
}

/// Builds the command tree with every registered resource attached.
#[must_use]
pub fn program(registry: &ResourceRegistry) -> Program {
    assemble(
        registry,
        Program::new(PROGRAM_NAME, env!("CARGO_PKG_VERSION"), ABOUT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_every_resource_in_order() {
        let registry = build_registry(&Config::default()).unwrap();
        assert_eq!(registry.list(), vec!["openapi", "project", "nvim"]);
    }

    #[test]
    fn program_exposes_every_namespace() {
        let registry = build_registry(&Config::default()).unwrap();
        let program = program(&registry);

        assert_eq!(program.namespace_names(), vec!["openapi", "project", "nvim"]);
        let openapi = program.get_namespace("openapi").unwrap();
        let commands: Vec<_> = openapi.commands().map(|info| info.name.as_str()).collect();
        assert_eq!(commands, vec!["list", "show"]);
        assert!(openapi.get_instructions().is_some());
        assert!(program.command().is_ok());
    }
}
