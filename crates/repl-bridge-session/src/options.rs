//! Persisted key/value options.
//!
//! A single JSON document shared with the companion CLI. It is never cached:
//! another process may rewrite it at any time, so every read goes to disk and
//! every `set` rewrites the whole file.

use std::{
    env,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};

/// File name inside the config directory.
pub const OPTIONS_FILE: &str = ".replitcli.json";

/// Key holding the account API key.
pub const API_KEY: &str = "apiKey";

/// Errors reading or writing the options file.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("Options file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Options serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle to the options file.
#[derive(Debug, Clone)]
pub struct Options {
    path: PathBuf,
}

impl Options {
    /// Options stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Options stored in the standard config directory.
    #[must_use]
    pub fn locate() -> Self {
        Self::new(config_dir().join(OPTIONS_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document.
    ///
    /// A missing or unparsable file is reset to `{}` and read as empty.
    ///
    /// # Errors
    /// Returns an error if the reset write fails.
    pub async fn read(&self) -> Result<Map<String, Value>, OptionsError> {
        tracing::debug!(path = %self.path.display(), "Reading options");
        let parsed = match tokio::fs::read(&self.path).await {
            Ok(data) => serde_json::from_slice::<Value>(&data).map_err(OptionsError::from),
            Err(e) => Err(e.into()),
        };

        match parsed {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => {
                tracing::warn!(path = %self.path.display(), kind = json_kind(&other), "Options file is not an object, resetting");
                self.write(&Map::new()).await?;
                Ok(Map::new())
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read options, resetting");
                self.write(&Map::new()).await?;
                Ok(Map::new())
            }
        }
    }

    /// Value stored under `key`.
    ///
    /// # Errors
    /// See [`Options::read`].
    pub async fn get(&self, key: &str) -> Result<Option<Value>, OptionsError> {
        Ok(self.read().await?.remove(key))
    }

    /// String stored under `key`; other JSON types count as absent.
    ///
    /// # Errors
    /// See [`Options::read`].
    pub async fn get_str(&self, key: &str) -> Result<Option<String>, OptionsError> {
        Ok(match self.get(key).await? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        })
    }

    /// Merge `values` into the document and rewrite it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn set(&self, values: Map<String, Value>) -> Result<(), OptionsError> {
        let mut data = self.read().await?;
        data.extend(values);
        self.write(&data).await
    }

    /// Store a single key.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn set_value(&self, key: &str, value: impl Into<Value>) -> Result<(), OptionsError> {
        let mut values = Map::new();
        values.insert(key.to_string(), value.into());
        self.set(values).await
    }

    async fn write(&self, data: &Map<String, Value>) -> Result<(), OptionsError> {
        tracing::debug!(path = %self.path.display(), "Writing options");
        let json = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// First existing directory among `$REPLIT_CONFIG_DIR`, `$VSCODE_PORTABLE`,
/// `$XDG_CONFIG_HOME`, `~/.config` and `~`.
#[must_use]
pub fn config_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let env_dirs = ["REPLIT_CONFIG_DIR", "VSCODE_PORTABLE", "XDG_CONFIG_HOME"]
        .into_iter()
        .filter_map(env::var_os)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from);

    env_dirs
        .chain([home.join(".config"), home.clone()])
        .find(|dir| dir.is_dir())
        .unwrap_or(home)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
