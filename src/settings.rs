use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Mutable portal settings, persisted as a TOML file. Everything here is
/// written only by the admin save and list-refresh paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// API key for the remote list service. Empty means unconfigured.
    #[serde(default)]
    pub api_key: String,
    /// List IDs exposed to users, in the order the admin saved them.
    #[serde(default)]
    pub enabled_lists: Vec<String>,
    /// Admin-authored descriptions, keyed by list ID.
    #[serde(default)]
    pub descriptions: BTreeMap<String, String>,
    /// Last fetched id -> name mapping. Fully replaced on each refresh.
    #[serde(default)]
    pub cached_lists: Option<ListCache>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListCache {
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
    pub names: BTreeMap<String, String>,
}

impl Settings {
    /// Cached names, when a non-empty cache exists. Entries may be stale
    /// relative to `enabled_lists`.
    pub fn cached_names(&self) -> Option<&BTreeMap<String, String>> {
        self.cached_lists
            .as_ref()
            .map(|cache| &cache.names)
            .filter(|names| !names.is_empty())
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Encode(toml::ser::Error),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "settings io error: {err}"),
            SettingsError::Parse(err) => write!(f, "failed to parse settings: {err}"),
            SettingsError::Encode(err) => write!(f, "failed to encode settings: {err}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is not an error: first load yields the defaults.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
            Err(err) => return Err(SettingsError::Io(err)),
        };
        toml::from_str(&contents).map_err(SettingsError::Parse)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let contents = toml::to_string_pretty(settings).map_err(SettingsError::Encode)?;
        atomic_write(&self.path, &contents).map_err(SettingsError::Io)
    }
}

fn atomic_write(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("settings.toml");
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    for attempt in 0..10u32 {
        let temp_name = format!(".{file_name}.tmp-{pid}-{nanos}-{attempt}");
        let temp_path = parent.join(temp_name);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        };
        if let Err(err) = file.write_all(contents.as_bytes()) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err);
        }
        drop(file);
        return match std::fs::rename(&temp_path, path) {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(err)
            }
        };
    }

    Err(std::io::Error::other("failed to create temporary file"))
}
