//! Project manifest summary.
//!
//! Reads `package.json` (or `Cargo.toml` when there is none) from the
//! current directory and points at documentation for every dependency.

use std::path::Path;

use resource_registry::{CommandInfo, Program, Resource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metadata::{CommandMetadata, command_metadata};

/// Resource name.
pub const NAME: &str = "project";

/// Printed when the directory has no recognised manifest.
pub const NO_INFO: &str = "No dependency information found";

const UNNAMED: &str = "unnamed";

/// Documentation ids for packages whose repository owner differs from the
/// package name.
const KNOWN_CONTEXT7_IDS: &[(&str, &str)] = &[
    ("commander", "/tj/commander.js"),
    ("prompts", "/terkelg/prompts"),
];


/// The `project` resource.
#[derive(Debug)]
pub struct ProjectResource {
    meta: &'static CommandMetadata,
}

impl ProjectResource {
    /// Creates the resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if the embedded help text is incomplete.
    pub fn new() -> Result<Self> {
        let meta = command_metadata(NAME)?;
        meta.command("get-info")?;
        Ok(Self { meta })
    }

    fn get_info_command(&self) -> CommandInfo {
        CommandInfo::new("get-info", self.meta.command("get-info").unwrap_or_default())
    }
}

impl Resource for ProjectResource {
    fn name(&self) -> &str {
        NAME
    }

    fn instructions(&self) -> Option<&str> {
        self.meta.instructions.as_deref()
    }

    fn register_commands(&self, program: &mut Program) {
        program
            .namespace(NAME, &self.meta.description)
            .command(self.get_info_command(), |_| {
                let dir = std::env::current_dir()?;
                Ok(get_info(&dir)?.unwrap_or_else(|| NO_INFO.to_string()))
            });
    }
}

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    name: Option<String>,
    description: Option<String>,
    homepage: Option<String>,
    repository: Option<Repository>,
    #[serde(default)]
    scripts: Map<String, Value>,
    #[serde(default)]
    dependencies: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Repository {
    Url(String),
    Detailed { url: Option<String> },
}

impl Repository {
    fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Detailed { url } => url.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CargoManifest {
    package: Option<CargoPackage>,
    #[serde(default)]
    dependencies: toml::Table,
}

#[derive(Debug, Deserialize)]
struct CargoPackage {
    name: String,
}

#[derive(Debug, Serialize)]
struct ProjectInfo {
    project: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    scripts: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    dependencies: Map<String, Value>,
}

/// Summarises the project rooted at `dir` as YAML.
///
/// Returns `Ok(None)` when `dir` has neither `package.json` nor
/// `Cargo.toml`.
///
/// # Errors
///
/// Returns an error if the manifest exists but cannot be read or parsed.
pub fn get_info(dir: &Path) -> Result<Option<String>> {
    let info = if dir.join("package.json").is_file() {
        node_project(dir)?
    } else if dir.join("Cargo.toml").is_file() {
        cargo_project(dir)?
    } else {
        debug!(dir = %dir.display(), "no manifest found");
        return Ok(None);
    };
    Ok(Some(serde_yaml::to_string(&info)?.trim_end().to_string()))
}

fn node_project(dir: &Path) -> Result<ProjectInfo> {
    let manifest: PackageJson = read_json(&dir.join("package.json"))?;
    debug!(
        dependencies = manifest.dependencies.len(),
        "read package.json"
    );
    let dependencies = manifest
        .dependencies
        .keys()
        .map(|name| (name.clone(), Value::String(node_dependency(dir, name))))
        .collect();
    Ok(ProjectInfo {
        project: manifest.name.unwrap_or_else(|| UNNAMED.to_string()),
        scripts: manifest.scripts,
        dependencies,
    })
}

fn node_dependency(dir: &Path, name: &str) -> String {
    let manifest_path = dir.join("node_modules").join(name).join("package.json");
    if !manifest_path.is_file() {
        return "# Package information not available".to_string();
    }
    let package: PackageJson = match read_json(&manifest_path) {
        Ok(package) => package,
        Err(err) => {
            warn!(package = name, error = %err, "unreadable dependency manifest");
            return "# Error reading package information".to_string();
        }
    };

    let mut lines = vec![
        format!(
            "# {}",
            package
                .description
                .as_deref()
                .filter(|description| !description.trim().is_empty())
                .unwrap_or("No description")
        ),
        format!(
            "- Use context7 tool for documentation with id {}",
            context7_id(name)
        ),
    ];
    let repository = package.repository.as_ref().and_then(Repository::url);
    if let Some(url) = repository {
        lines.push(format!(
            "- Use kit tool to explore the repo at {}",
            normalize_repo_url(url)
        ));
    }
    if let Some(homepage) = package.homepage.as_deref()
        && Some(homepage) != repository
    {
        lines.push(format!("- Visit the project homepage at {homepage}"));
    }
    lines.join("\n")
}

fn cargo_project(dir: &Path) -> Result<ProjectInfo> {
    let path = dir.join("Cargo.toml");
    let content = read_text(&path)?;
    let manifest: CargoManifest = toml::from_str(&content)?;
    debug!(dependencies = manifest.dependencies.len(), "read Cargo.toml");
    let dependencies = manifest
        .dependencies
        .iter()
        .map(|(name, requirement)| (name.clone(), Value::String(cargo_dependency(name, requirement))))
        .collect();
    Ok(ProjectInfo {
        project: manifest
            .package
            .map_or_else(|| UNNAMED.to_string(), |package| package.name),
        scripts: Map::new(),
        dependencies,
    })
}

fn cargo_dependency(name: &str, requirement: &toml::Value) -> String {
    let field = |key| str_field(requirement, key);
    // `package = "..."` renames the crate
    let crate_name = field("package").unwrap_or(name);

    let header = match (requirement.as_str(), field("version"), field("path"), field("git")) {
        (Some(version), ..) | (None, Some(version), ..) => format!("# Version {version}"),
        (None, None, Some(path), _) => format!("# Path dependency at {path}"),
        (None, None, None, Some(git)) => format!("# Git dependency from {git}"),
        _ => "# Version unspecified".to_string(),
    };
    let mut lines = vec![
        header,
        format!("- Read the API documentation at https://docs.rs/{crate_name}"),
    ];
    if let Some(git) = field("git") {
        lines.push(format!("- Use kit tool to explore the repo at {}", normalize_repo_url(git)));
    }
    lines.join("\n")
}

fn str_field<'a>(value: &'a toml::Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(toml::Value::as_str)
}

/// Documentation id for an npm package: `@scope/pkg` becomes `/scope/pkg`,
/// a few well-known packages map to their repositories, and everything else
/// is `/<name>/<name>`.
#[must_use]
pub fn context7_id(name: &str) -> String {
    if let Some(scoped) = name.strip_prefix('@') {
        return format!("/{scoped}");
    }
    KNOWN_CONTEXT7_IDS
        .iter()
        .find(|(package, _)| *package == name)
        .map_or_else(|| format!("/{name}/{name}"), |(_, id)| (*id).to_string())
}

/// Turns a package manager repository reference into a browsable URL.
#[must_use]
pub fn normalize_repo_url(url: &str) -> String {
    let url = url.strip_prefix("git+").unwrap_or(url);
    let url = match url.strip_prefix("git:") {
        Some(rest) => format!("https:{rest}"),
        None => url.to_string(),
    };
    let url = match ssh_remote(&url) {
        Some((host, path)) => format!("https://{host}/{path}"),
        None => url,
    };
    if let Some(stripped) = url.strip_suffix(".git") {
        return stripped.to_string();
    }
    url
}

/// Splits `git@host:path` into host and path.
fn ssh_remote(url: &str) -> Option<(&str, &str)> {
    let (host, path) = url.strip_prefix("git@")?.split_once(':')?;
    (!host.is_empty() && !host.contains('/')).then_some((host, path))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    Ok(serde_json::from_str(&read_text(path)?)?)
}
