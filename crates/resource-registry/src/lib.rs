//! Name-keyed registry of resource modules and the command tree they plug
//! into.
//!
//! ## Modules
//!
//! - [`registry`] - Unique, insertion-ordered resource registry
//! - [`resource`] - The [`Resource`] capability contract
//! - [`program`] - Command tree, argument parsing and handler invocation
//! - [`command`] - Presentational command descriptors
//! - [`dispatch`] - One-shot parse/run/report cycle
//! - [`error`] - Error types

pub mod command;
pub mod dispatch;
pub mod error;
pub mod program;
pub mod registry;
pub mod resource;

pub use command::{CommandInfo, Placeholder};
pub use dispatch::{EXIT_FAILURE, EXIT_SUCCESS, assemble, dispatch, report};
pub use error::{Error, HandlerError, Result};
pub use program::{
    GlobalFlags, HandlerResult, Invocation, Namespace, Parsed, ParsedCommand, Program,
};
pub use registry::ResourceRegistry;
pub use resource::Resource;
