//! Resource modules served by the CLI.
//!
//! - [`openapi`] - Endpoint listing and detail for OpenAPI documents
//! - [`project`] - Dependency summary of the current project
//! - [`nvim`] - Editor state of a running Neovim

pub mod nvim;
pub mod openapi;
pub mod project;

pub use nvim::NvimResource;
pub use openapi::OpenApiResource;
pub use project::ProjectResource;
