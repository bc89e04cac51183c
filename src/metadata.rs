//! Help text for each resource, compiled in from `meta.yaml`.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::{Error, Result};

const META_YAML: &str = include_str!("meta.yaml");

static METADATA: OnceLock<HashMap<String, CommandMetadata>> = OnceLock::new();

/// Descriptions for one resource and its leaf commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct CommandMetadata {
    /// One-line description of the resource.
    pub description: String,
    /// Usage guidance shown with the resource's help.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Leaf command name to description.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
}

impl CommandMetadata {
    /// Description of one leaf command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if `command` has no entry.
    pub fn command(&self, command: &str) -> Result<&str> {
        self.commands
            .get(command)
            .map(String::as_str)
            .ok_or_else(|| Error::Metadata(format!("no description for command '{command}'")))
    }
}

fn all() -> Result<&'static HashMap<String, CommandMetadata>> {
    if let Some(metadata) = METADATA.get() {
        return Ok(metadata);
    }
    let parsed: HashMap<String, CommandMetadata> = serde_yaml::from_str(META_YAML)?;
    Ok(METADATA.get_or_init(|| parsed))
}

/// Metadata for `resource`.
///
/// # Errors
///
/// Returns [`Error::Metadata`] if there is no entry for `resource`, or
/// [`Error::Yaml`] if the embedded file is malformed.
pub fn command_metadata(resource: &str) -> Result<&'static CommandMetadata> {
    all()?
        .get(resource)
        .ok_or_else(|| Error::Metadata(format!("no metadata for resource '{resource}'")))
}

/// Description of `command` under `resource`.
///
/// # Errors
///
/// Returns [`Error::Metadata`] if either key is absent.
pub fn subcommand_description(resource: &str, command: &str) -> Result<&'static str> {
    command_metadata(resource)?.command(command)
}
