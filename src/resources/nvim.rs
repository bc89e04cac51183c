//! Running Neovim inspection over msgpack-RPC.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use nvim_rpc::Address;
use resource_registry::{CommandInfo, Program, Resource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::metadata::{CommandMetadata, command_metadata};
use crate::platform;

/// Resource name.
pub const NAME: &str = "nvim";

/// Environment variable Neovim sets in its terminals.
pub const NVIM_ENV: &str = "NVIM";

/// Collects editor state and returns it JSON-encoded, so no msgpack
/// extension types cross the wire.
const EDITOR_STATE_LUA: &str = r"
local function listed_buffers()
  local out = {}
  for _, buf in ipairs(vim.api.nvim_list_bufs()) do
    if vim.bo[buf].buflisted then
      table.insert(out, {
        number = buf,
        name = vim.api.nvim_buf_get_name(buf),
        filetype = vim.bo[buf].filetype,
        modified = vim.bo[buf].modified,
        lines = vim.api.nvim_buf_line_count(buf),
      })
    end
  end
  return out
end

local function lsp_clients()
  local get = vim.lsp.get_clients or vim.lsp.get_active_clients
  local names = {}
  for _, client in ipairs(get()) do
    table.insert(names, client.name)
  end
  return names
end

return vim.json.encode({
  cwd = vim.fn.getcwd(),
  config_dir = vim.fn.stdpath('config'),
  colorscheme = vim.g.colors_name or vim.NIL,
  current_buffer = vim.api.nvim_buf_get_name(0),
  buffers = listed_buffers(),
  windows = #vim.api.nvim_list_wins(),
  tabpages = #vim.api.nvim_list_tabpages(),
  lsp_clients = lsp_clients(),
})
";

/// The `nvim` resource.
#[derive(Debug)]
pub struct NvimResource {
    meta: &'static CommandMetadata,
    timeout: Duration,
    configured_server: Option<String>,
}

impl NvimResource {
    /// Creates the resource with the RPC timeout and the configured default
    /// server address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if the embedded help text is incomplete.
    pub fn new(timeout: Duration, configured_server: Option<String>) -> Result<Self> {
        let meta = command_metadata(NAME)?;
        meta.command("get-info")?;
        Ok(Self {
            meta,
            timeout,
            configured_server,
        })
    }

    fn get_info_command(&self) -> CommandInfo {
        CommandInfo::new("get-info", self.meta.command("get-info").unwrap_or_default())
            .arg("[server]")
    }
}

impl Resource for NvimResource {
    fn name(&self) -> &str {
        NAME
    }

    fn instructions(&self) -> Option<&str> {
        self.meta.instructions.as_deref()
    }

    fn register_commands(&self, program: &mut Program) {
        let timeout = self.timeout;
        let configured = self.configured_server.clone();
        program
            .namespace(NAME, &self.meta.description)
            .command(self.get_info_command(), move |invocation| {
                let candidates = candidates(
                    invocation.arg("server"),
                    std::env::var(NVIM_ENV).ok().as_deref(),
                    configured.as_deref(),
                    &search_dirs(),
                );
                Ok(query_first(&candidates, timeout)?)
            });
    }
}

/// Where a candidate address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Named explicitly: argument, `$NVIM` or config.
    Explicit,
    /// Found by scanning socket directories.
    Discovered,
}

/// Addresses to try, in order: the `server` argument, `$NVIM`, the
/// configured server, then sockets found under `search_dirs`. An explicit
/// address shadows everything after it.
#[must_use]
pub fn candidates(
    server: Option<&str>,
    env: Option<&str>,
    configured: Option<&str>,
    search_dirs: &[PathBuf],
) -> Vec<(Address, Origin)> {
    let explicit = [server, env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|raw| !raw.is_empty());
    if let Some(raw) = explicit {
        return vec![(Address::parse(raw), Origin::Explicit)];
    }
    discover_sockets(search_dirs)
        .into_iter()
        .map(|path| (Address::Unix(path), Origin::Discovered))
        .collect()
}

/// Directories Neovim creates its default sockets in.
#[must_use]
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(runtime) = std::env::var_os("XDG_RUNTIME_DIR").filter(|dir| !dir.is_empty()) {
        dirs.push(PathBuf::from(runtime));
    }
    dirs.push(std::env::temp_dir());
    dirs
}

/// Finds `nvim.*` sockets directly in each directory and in
/// `nvim.<user>/*/` below it, newest first.
#[must_use]
pub fn discover_sockets(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let user_dir = platform::user_name().map(|user| format!("nvim.{user}"));
    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();

    for dir in dirs {
        collect_sockets(dir, &mut found);
        let Some(user_dir) = &user_dir else {
            continue;
        };
        let Ok(entries) = std::fs::read_dir(dir.join(user_dir)) else {
            continue;
        };
        for entry in entries.flatten() {
            if entry.file_type().is_ok_and(|kind| kind.is_dir()) {
                collect_sockets(&entry.path(), &mut found);
            }
        }
    }

    found.sort_by(|a, b| b.0.cmp(&a.0));
    found.dedup_by(|a, b| a.1 == b.1);
    debug!(count = found.len(), "discovered nvim sockets");
    found.into_iter().map(|(_, path)| path).collect()
}

fn collect_sockets(dir: &Path, found: &mut Vec<(SystemTime, PathBuf)>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let is_nvim = entry.file_name().to_string_lossy().starts_with("nvim.");
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if is_nvim && is_socket(&metadata) {
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, entry.path()));
        }
    }
}

#[cfg(unix)]
fn is_socket(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    metadata.file_type().is_socket()
}

#[cfg(not(unix))]
fn is_socket(_metadata: &std::fs::Metadata) -> bool {
    false
}

/// Queries the first candidate that accepts a connection.
///
/// A discovered socket that refuses the connection is skipped, since stale
/// sockets outlive crashed editors. Explicit addresses are not retried.
///
/// # Errors
///
/// Returns [`Error::NvimNotRunning`] when there is nothing to try, otherwise
/// the error of the last attempt.
pub fn query_first(candidates: &[(Address, Origin)], timeout: Duration) -> Result<String> {
    let mut last_error = None;
    for (address, origin) in candidates {
        match get_info(address, timeout) {
            Ok(info) => return Ok(info),
            Err(Error::Rpc(nvim_rpc::Error::Io(err))) if *origin == Origin::Discovered => {
                debug!(%address, error = %err, "skipping stale socket");
                last_error = Some(Error::Rpc(nvim_rpc::Error::Io(err)));
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_error.unwrap_or_else(not_running))
}

fn not_running() -> Error {
    let hint = which::which("nvim")
        .map(|path| format!(" (nvim executable found at {})", path.display()))
        .unwrap_or_default();
    Error::NvimNotRunning { hint }
}

#[derive(Debug, Serialize, Deserialize)]
struct BufferInfo {
    number: u64,
    name: String,
    filetype: String,
    modified: bool,
    lines: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct EditorState {
    cwd: String,
    config_dir: Option<String>,
    colorscheme: Option<String>,
    current_buffer: String,
    #[serde(deserialize_with = "lua_list")]
    buffers: Vec<BufferInfo>,
    windows: u64,
    tabpages: u64,
    #[serde(deserialize_with = "lua_list")]
    lsp_clients: Vec<String>,
}

#[derive(Debug, Serialize)]
struct NvimInfo<'a> {
    server: String,
    version: String,
    #[serde(flatten)]
    state: &'a EditorState,
}

/// `vim.json.encode` writes an empty Lua table as `{}`.
fn lua_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LuaList<T> {
        List(Vec<T>),
        Empty(serde_json::Map<String, Value>),
    }

    Ok(match LuaList::<T>::deserialize(deserializer)? {
        LuaList::List(items) => items,
        LuaList::Empty(_) => Vec::new(),
    })
}

/// Connects to `address` and reports editor state as YAML.
///
/// # Errors
///
/// Returns [`Error::Rpc`] for connection or protocol failures and
/// [`Error::UnexpectedResponse`] if the state query returns anything but a
/// JSON string.
pub fn get_info(address: &Address, timeout: Duration) -> Result<String> {
    let mut client = nvim_rpc::connect(address, timeout)?;
    let api = client.api_info()?;
    info!(%address, version = %api.version, channel = api.channel_id, "connected to nvim");

    let raw = client.exec_lua(EDITOR_STATE_LUA, Vec::new())?;
    let Value::String(json) = raw else {
        return Err(Error::UnexpectedResponse(format!(
            "expected a JSON string, got {raw}"
        )));
    };
    let state: EditorState = serde_json::from_str(&json)?;

    let report = NvimInfo {
        server: address.to_string(),
        version: api.version.to_string(),
        state: &state,
    };
    Ok(serde_yaml::to_string(&report)?.trim_end().to_string())
}
