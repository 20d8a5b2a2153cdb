// Settings loader: reads `appsettings.json` plus an optional
// `appsettings.{environment}.json` overlay and extracts the four Graph
// values this tool needs. Everything here runs before any network I/O.

use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const BASE_FILE: &str = "appsettings.json";
pub const ENVIRONMENT_VAR: &str = "GRAPH_UPLOAD_ENVIRONMENT";
pub const DEFAULT_ENVIRONMENT: &str = "Development";

pub const TENANT_ID: &str = "Graph:TenantId";
pub const CLIENT_ID: &str = "Graph:ClientId";
pub const CLIENT_SECRET: &str = "Graph:ClientSecret";
pub const SITE_RESOURCE_ID: &str = "Graph:SiteResourceId";

/// Application credentials and the target site, resolved once per run.
#[derive(Clone)]
pub struct Settings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub site_resource_id: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("site_resource_id", &self.site_resource_id)
            .finish()
    }
}

impl Settings {
    /// Load settings from the process environment: base directory from
    /// [`base_directory`], overlay name from `GRAPH_UPLOAD_ENVIRONMENT`.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.into());
        Self::load_from(&base_directory(), &environment)
    }

    /// Load settings from `dir`, layering `appsettings.{environment}.json`
    /// over `appsettings.json`.
    pub fn load_from(dir: &Path, environment: &str) -> Result<Self, ConfigError> {
        let source = LayeredSource::read(dir, environment)?;
        Ok(Settings {
            tenant_id: source.require_setting(TENANT_ID)?,
            client_id: source.require_setting(CLIENT_ID)?,
            client_secret: source.require_setting(CLIENT_SECRET)?,
            site_resource_id: source.require_setting(SITE_RESOURCE_ID)?,
        })
    }
}

/// The current directory when it holds `appsettings.json`, otherwise the
/// directory containing the executable.
pub fn base_directory() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if cwd.join(BASE_FILE).is_file() {
        return cwd;
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or(cwd)
}

/// Merged view over the settings files.
#[derive(Debug, Default)]
pub struct LayeredSource {
    root: Value,
}

impl LayeredSource {
    pub fn read(dir: &Path, environment: &str) -> Result<Self, ConfigError> {
        let base_path = dir.join(BASE_FILE);
        if !base_path.is_file() {
            return Err(ConfigError::MissingFile(base_path));
        }
        let mut source = LayeredSource::default();
        source.add_layer(read_json(&base_path)?);

        let overlay = dir.join(format!("appsettings.{environment}.json"));
        if overlay.is_file() {
            debug!(path = %overlay.display(), "applying settings overlay");
            source.add_layer(read_json(&overlay)?);
        }
        Ok(source)
    }

    pub fn from_value(root: Value) -> Self {
        LayeredSource {
            root: expand_keys(root),
        }
    }

    /// Merge `layer` on top of what is already loaded. Flat `a:b` keys are
    /// folded into nested objects first, so both spellings name one key.
    pub fn add_layer(&mut self, layer: Value) {
        merge(&mut self.root, expand_keys(layer));
    }

    /// Look up a colon-separated key, e.g. `Graph:TenantId`. Numbers and
    /// booleans come back in their JSON text form.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut current = &self.root;
        for part in key.split(':') {
            current = get_ci(current.as_object()?, part)?;
        }
        match current {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Like [`get`](Self::get) but blank or absent values are an error.
    pub fn require_setting(&self, key: &str) -> Result<String, ConfigError> {
        match self.get(key) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::MissingSetting(key.to_string())),
        }
    }
}

fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn get_ci<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

// `{"a:b": v}` becomes `{"a": {"b": v}}`, recursively. When one file
// spells the same key both ways, a blank value never hides a real one.
fn expand_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Value::Object(Map::new());
            for (key, value) in map {
                let mut nested = expand_keys(value);
                for part in key.rsplit(':') {
                    let mut wrapper = Map::new();
                    wrapper.insert(part.to_string(), nested);
                    nested = Value::Object(wrapper);
                }
                combine(&mut out, nested, Precedence::KeepNonBlank);
            }
            out
        }
        other => other,
    }
}

#[derive(Clone, Copy)]
enum Precedence {
    /// A later layer replaces scalars.
    Layer,
    /// Within one file: only replace blank scalars.
    KeepNonBlank,
}

fn merge(target: &mut Value, layer: Value) {
    combine(target, layer, Precedence::Layer);
}

// Objects merge key by key (case-insensitive); scalars follow `precedence`.
fn combine(target: &mut Value, layer: Value, precedence: Precedence) {
    match (target, layer) {
        (Value::Object(base), Value::Object(over)) => {
            for (key, value) in over {
                let existing = base
                    .keys()
                    .find(|k| k.eq_ignore_ascii_case(&key))
                    .cloned();
                match existing {
                    Some(k) => {
                        if let Some(slot) = base.get_mut(&k) {
                            combine(slot, value, precedence);
                        }
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (target, layer) => {
            if matches!(precedence, Precedence::Layer) || is_blank(target) {
                *target = layer;
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
