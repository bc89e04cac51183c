//! OpenAPI document explorer.
//!
//! `list` numbers every endpoint of a document; `show` renders one of them
//! as Markdown. Documents are fetched over HTTP(S) or read from disk and may
//! be JSON or YAML.

use std::fmt::Write as _;
use std::time::Duration;

use resource_registry::{CommandInfo, Program, Resource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::metadata::{CommandMetadata, command_metadata};
use crate::platform;

/// Resource name.
pub const NAME: &str = "openapi";

/// Path-item keys that are operations, in listing order.
const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

const NO_DESCRIPTION: &str = "No description available";

/// The `openapi` resource.
#[derive(Debug)]
pub struct OpenApiResource {
    meta: &'static CommandMetadata,
    loader: DocumentLoader,
}

impl OpenApiResource {
    /// Creates the resource with the given HTTP timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if the embedded help text is incomplete.
    pub fn new(http_timeout: Duration) -> Result<Self> {
        let meta = command_metadata(NAME)?;
        meta.command("list")?;
        meta.command("show")?;
        Ok(Self {
            meta,
            loader: DocumentLoader::new(http_timeout),
        })
    }

    fn list_info(&self) -> CommandInfo {
        CommandInfo::new("list", self.meta.command("list").unwrap_or_default()).arg("<uri>")
    }

    fn show_info(&self) -> CommandInfo {
        CommandInfo::new("show", self.meta.command("show").unwrap_or_default())
            .arg("<uri>")
            .arg("<id>")
    }
}

impl Resource for OpenApiResource {
    fn name(&self) -> &str {
        NAME
    }

    fn instructions(&self) -> Option<&str> {
        self.meta.instructions.as_deref()
    }

    fn register_commands(&self, program: &mut Program) {
        let list_loader = self.loader.clone();
        let show_loader = self.loader.clone();
        program
            .namespace(NAME, &self.meta.description)
            .command(self.list_info(), move |invocation| {
                let document = list_loader.load(invocation.required("uri")?)?;
                Ok(render_list(&document.endpoints())?)
            })
            .command(self.show_info(), move |invocation| {
                let document = show_loader.load(invocation.required("uri")?)?;
                let endpoint = document.endpoint(invocation.required("id")?)?;
                Ok(render_endpoint(&document, &endpoint))
            });
    }
}

/// Fetches and parses documents.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    agent: ureq::Agent,
}

impl DocumentLoader {
    /// Creates a loader whose HTTP requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("meta-composer/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }

    /// Loads the document at `uri`: an `http(s)` or `file` URL, or a path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] for failed requests, [`Error::ReadFile`] for
    /// unreadable files, and [`Error::InvalidDocument`] for content that is
    /// neither JSON nor YAML describing an object.
    pub fn load(&self, uri: &str) -> Result<OpenApiDocument> {
        let text = self.read(uri)?;
        let document = OpenApiDocument::parse(&text, uri)?;
        let title = document.info.title.as_ref().map(scalar).unwrap_or_default();
        info!(uri, %title, paths = document.paths.len(), "loaded OpenAPI document");
        Ok(document)
    }

    fn read(&self, uri: &str) -> Result<String> {
        match Url::parse(uri) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => self.fetch(uri),
            Ok(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|()| Error::InvalidDocument {
                    source_name: uri.to_string(),
                    reason: "not a local file URL".to_string(),
                })?;
                read_file(&path)
            }
            _ => read_file(&platform::expand_tilde(uri)?),
        }
    }

    fn fetch(&self, uri: &str) -> Result<String> {
        debug!(uri, "fetching document");
        let response = self.agent.get(uri).call().map_err(|err| Error::Http {
            uri: uri.to_string(),
            message: match err {
                ureq::Error::Status(code, response) => {
                    format!("HTTP {code} {}", response.status_text())
                }
                ureq::Error::Transport(transport) => transport.to_string(),
            },
        })?;
        response.into_string().map_err(|err| Error::Http {
            uri: uri.to_string(),
            message: err.to_string(),
        })
    }
}

fn read_file(path: &std::path::Path) -> Result<String> {
    debug!(path = %path.display(), "reading document");
    std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// The parts of an OpenAPI document the explorer reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct OpenApiDocument {
    /// Title and version.
    #[serde(default, deserialize_with = "or_default")]
    pub info: DocumentInfo,
    /// Server list.
    #[serde(default, deserialize_with = "or_default")]
    pub servers: Vec<Server>,
    /// Path items keyed by path template, in document order.
    #[serde(default, deserialize_with = "or_default")]
    pub paths: Map<String, Value>,
}

/// `info` object. Either field may be any scalar (`version: 1.0` in YAML).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentInfo {
    /// API title.
    pub title: Option<Value>,
    /// API version.
    pub version: Option<Value>,
}

/// Entry of the `servers` list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Server {
    /// Base URL.
    #[serde(default)]
    pub url: String,
    /// What the server is for.
    pub description: Option<String>,
}

/// An operation under a path, numbered by its position in the document.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// 1-based position among all endpoints.
    pub id: usize,
    /// Upper-case HTTP method.
    pub method: String,
    /// Path template.
    pub path: String,
    /// The operation object.
    pub operation: Operation,
}

/// Operation object.
///
/// Built field by field, so one malformed parameter or body does not cost
/// the summary or the other parameters.
#[derive(Debug, Clone, Default)]
pub struct Operation {
    /// Short summary.
    pub summary: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Unique operation id.
    pub operation_id: Option<String>,
    /// Grouping tags.
    pub tags: Vec<String>,
    /// Parameters.
    pub parameters: Vec<Parameter>,
    /// Request body.
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code.
    pub responses: Map<String, Value>,
}

impl Operation {
    /// Reads an operation object, skipping parts that are malformed.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let tags = value
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let parameters = value
            .get("parameters")
            .and_then(Value::as_array)
            .map(|parameters| {
                parameters
                    .iter()
                    .enumerate()
                    .map(|(index, parameter)| lenient(parameter, || format!("parameter {index}")))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            summary: text("summary"),
            description: text("description"),
            operation_id: text("operationId"),
            tags,
            parameters,
            request_body: value
                .get("requestBody")
                .map(|body| lenient(body, || "request body".to_string())),
            responses: value
                .get("responses")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// Parameter object, or a reference to one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: Option<String>,
    /// `path`, `query`, `header` or `cookie`.
    #[serde(rename = "in")]
    pub location: Option<String>,
    /// What the parameter does.
    pub description: Option<String>,
    /// Whether the parameter must be present.
    #[serde(default)]
    pub required: bool,
    /// Value schema.
    pub schema: Option<Schema>,
    /// `$ref` target when the parameter is a reference.
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
}

/// The schema fields shown for a parameter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Schema {
    /// JSON type: a name, or a list of names in OpenAPI 3.1.
    #[serde(rename = "type")]
    pub kind: Option<Value>,
    /// Allowed values.
    #[serde(rename = "enum", default)]
    pub values: Vec<Value>,
}

/// Request body object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestBody {
    /// What the body contains.
    pub description: Option<String>,
    /// Whether the body must be present.
    #[serde(default)]
    pub required: bool,
    /// Media types keyed by content type.
    #[serde(default)]
    pub content: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Response {
    description: Option<String>,
    #[serde(default)]
    content: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct MediaType {
    schema: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    id: usize,
    verb: &'a str,
    path: &'a str,
    description: &'a str,
}

impl OpenApiDocument {
    /// Parses document text as JSON, falling back to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDocument`] if the text is neither, or does not
    /// describe an object.
    pub fn parse(text: &str, source_name: &str) -> Result<Self> {
        let value = match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(json_err) => {
                debug!(error = %json_err, "not JSON, trying YAML");
                let yaml = serde_yaml::from_str::<serde_yaml::Value>(text).map_err(|err| {
                    Error::InvalidDocument {
                        source_name: source_name.to_string(),
                        reason: format!("neither JSON nor YAML: {err}"),
                    }
                })?;
                yaml_to_json(yaml)
            }
        };
        if !value.is_object() {
            return Err(Error::InvalidDocument {
                source_name: source_name.to_string(),
                reason: "top level is not an object".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|err| Error::InvalidDocument {
            source_name: source_name.to_string(),
            reason: err.to_string(),
        })
    }

    /// All endpoints, numbered from 1 in path then method order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = Vec::new();
        for (path, item) in &self.paths {
            let Some(item) = item.as_object() else {
                continue;
            };
            for method in HTTP_METHODS {
                let Some(operation) = item.get(method) else {
                    continue;
                };
                endpoints.push(Endpoint {
                    id: endpoints.len() + 1,
                    method: method.to_uppercase(),
                    path: path.clone(),
                    operation: Operation::from_value(operation),
                });
            }
        }
        endpoints
    }

    /// Looks up an endpoint by the id shown in the listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpointId`] if `id` is not a number between 1
    /// and the number of endpoints, or [`Error::NoEndpoints`] if there are
    /// none.
    pub fn endpoint(&self, id: &str) -> Result<Endpoint> {
        let mut endpoints = self.endpoints();
        let count = endpoints.len();
        if count == 0 {
            return Err(Error::NoEndpoints(id.to_string()));
        }
        match id.trim().parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => Ok(endpoints.swap_remove(n - 1)),
            _ => Err(Error::InvalidEndpointId {
                id: id.to_string(),
                count,
            }),
        }
    }
}

/// Deserializes part of a document, falling back to the default when it
/// does not have the expected shape.
fn lenient<T: DeserializeOwned + Default>(value: &Value, what: impl FnOnce() -> String) -> T {
    serde_json::from_value(value.clone()).unwrap_or_else(|err| {
        warn!(error = %err, "ignoring malformed {}", what());
        T::default()
    })
}

fn or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(lenient(&value, || "top-level field".to_string()))
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(key, value)| (yaml_key(key), yaml_to_json(value)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

// Status codes like `200:` are integer keys in YAML.
fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s,
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn non_empty(text: Option<&String>) -> Option<&str> {
    text.map(String::as_str).filter(|s| !s.is_empty())
}

/// Renders the endpoint listing as a YAML sequence.
///
/// # Errors
///
/// Returns [`Error::Yaml`] if serialization fails.
pub fn render_list(endpoints: &[Endpoint]) -> Result<String> {
    let entries: Vec<ListEntry<'_>> = endpoints
        .iter()
        .map(|endpoint| ListEntry {
            id: endpoint.id,
            verb: &endpoint.method,
            path: &endpoint.path,
            description: non_empty(endpoint.operation.summary.as_ref())
                .or_else(|| non_empty(endpoint.operation.description.as_ref()))
                .unwrap_or(NO_DESCRIPTION),
        })
        .collect();
    Ok(serde_yaml::to_string(&entries)?.trim_end().to_string())
}

/// Renders one endpoint as Markdown.
#[must_use]
pub fn render_endpoint(document: &OpenApiDocument, endpoint: &Endpoint) -> String {
    let operation = &endpoint.operation;
    let mut out = String::new();

    let _ = writeln!(out, "# {} {}\n", endpoint.method, endpoint.path);
    if let Some(summary) = non_empty(operation.summary.as_ref()) {
        let _ = writeln!(out, "**{summary}**\n");
    }
    if let Some(description) = non_empty(operation.description.as_ref()) {
        let _ = writeln!(out, "{description}\n");
    }
    if let Some(operation_id) = non_empty(operation.operation_id.as_ref()) {
        let _ = writeln!(out, "**Operation ID:** `{operation_id}`\n");
    }
    if !operation.tags.is_empty() {
        let _ = writeln!(out, "**Tags:** {}\n", operation.tags.join(", "));
    }

    if !operation.parameters.is_empty() {
        out.push_str("## Parameters\n\n");
        for parameter in &operation.parameters {
            render_parameter(&mut out, parameter);
        }
        out.push('\n');
    }

    if let Some(body) = &operation.request_body {
        out.push_str("## Request Body\n\n");
        if let Some(description) = non_empty(body.description.as_ref()) {
            let _ = writeln!(out, "{description}\n");
        }
        if body.required {
            out.push_str("*Required*\n\n");
        }
        render_content(&mut out, &body.content);
    }

    if !operation.responses.is_empty() {
        out.push_str("## Responses\n\n");
        for (status, response) in &operation.responses {
            let response: Response = lenient(response, || format!("response {status}"));
            let _ = writeln!(out, "### {status}\n");
            if let Some(description) = non_empty(response.description.as_ref()) {
                let _ = writeln!(out, "{description}\n");
            }
            render_content(&mut out, &response.content);
        }
    }

    if !document.servers.is_empty() {
        out.push_str("## Servers\n\n");
        for server in &document.servers {
            match non_empty(server.description.as_ref()) {
                Some(description) => {
                    let _ = writeln!(out, "- {} - {description}", server.url);
                }
                None => {
                    let _ = writeln!(out, "- {}", server.url);
                }
            }
        }
    }

    out.trim_end().to_string()
}

fn render_parameter(out: &mut String, parameter: &Parameter) {
    let name = parameter
        .name
        .as_deref()
        .or(parameter.reference.as_deref())
        .unwrap_or("(unnamed)");
    let required = if parameter.required { " *(required)*" } else { "" };
    let location = parameter.location.as_deref().unwrap_or("unknown");
    let description = non_empty(parameter.description.as_ref()).unwrap_or("No description");
    let _ = writeln!(out, "- **{name}**{required} ({location}): {description}");

    if let Some(schema) = &parameter.schema {
        let kind = schema.kind.as_ref().map_or_else(|| "any".to_string(), type_name);
        let _ = writeln!(out, "  - Type: `{kind}`");
        if !schema.values.is_empty() {
            let values: Vec<String> = schema
                .values
                .iter()
                .map(|value| format!("`{}`", scalar(value)))
                .collect();
            let _ = writeln!(out, "  - Enum: {}", values.join(", "));
        }
    }
}

// `["string", "null"]` reads as `string | null`.
fn type_name(kind: &Value) -> String {
    match kind {
        Value::Array(kinds) => kinds.iter().map(scalar).collect::<Vec<_>>().join(" | "),
        other => scalar(other),
    }
}

fn render_content(out: &mut String, content: &Map<String, Value>) {
    for (content_type, media) in content {
        let media: MediaType = lenient(media, || format!("media type {content_type}"));
        let _ = writeln!(out, "**Content-Type:** `{content_type}`\n");
        if let Some(schema) = media.schema {
            let pretty = serde_json::to_string_pretty(&schema).unwrap_or_default();
            let _ = writeln!(out, "```json\n{pretty}\n```\n");
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
