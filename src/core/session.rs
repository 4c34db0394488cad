//! # Session Persistence
//!
//! Credential, display name, active conversation id and transcript snapshot,
//! kept in one JSON file (`~/.galley/session.json` by default).
//!
//! All writes use atomic rename (write `.tmp`, then `rename()`) for crash safety.
//! Every mutation reaches disk before the in-memory copy changes, so `get()`
//! never reports state that would be lost on restart.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::core::config::galley_dir;

/// What the rest of the client may read about the session.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub credential: Option<String>,
    #[serde(default)]
    pub display_name: String,
    pub active_conversation_id: Option<String>,
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.credential.is_some()
    }
}

/// On-disk document: the session plus the serialized transcript.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
struct StoredState {
    #[serde(flatten)]
    session: Session,
    #[serde(default)]
    transcript: Option<String>,
}

pub struct SessionStore {
    path: PathBuf,
    state: StoredState,
}

impl SessionStore {
    /// Returns `~/.galley/session.json`, or `./session.json` without a home directory.
    pub fn default_path() -> PathBuf {
        galley_dir()
            .map(|d| d.join("session.json"))
            .unwrap_or_else(|| PathBuf::from("session.json"))
    }

    /// Opens the store at `path`. A missing file is an empty session; an
    /// unreadable or corrupt one is logged and also treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<StoredState>(&json) {
                Ok(state) => {
                    debug!("Session loaded from {}", path.display());
                    state
                }
                Err(e) => {
                    warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                    StoredState::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoredState::default(),
            Err(e) => {
                warn!("Failed to read session file {}: {}", path.display(), e);
                StoredState::default()
            }
        };
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Session {
        self.state.session.clone()
    }

    pub fn set_credential(&mut self, token: &str, display_name: &str) -> io::Result<()> {
        info!("Storing credential for {}", display_name);
        self.update(|s| {
            s.session.credential = Some(token.to_string());
            s.session.display_name = display_name.to_string();
        })
    }

    pub fn set_active_conversation(&mut self, id: Option<&str>) -> io::Result<()> {
        self.update(|s| s.session.active_conversation_id = id.map(str::to_string))
    }

    pub fn snapshot_transcript(&mut self, blob: &str) -> io::Result<()> {
        self.update(|s| s.transcript = Some(blob.to_string()))
    }

    pub fn clear_transcript(&mut self) -> io::Result<()> {
        self.update(|s| s.transcript = None)
    }

    pub fn load_transcript(&self) -> Option<String> {
        self.state.transcript.clone()
    }

    /// Drops everything. Memory is reset even when the disk write fails.
    pub fn clear(&mut self) -> io::Result<()> {
        info!("Clearing session");
        let result = atomic_write_json(&self.path, &StoredState::default());
        self.state = StoredState::default();
        result
    }

    fn update(&mut self, change: impl FnOnce(&mut StoredState)) -> io::Result<()> {
        let mut next = self.state.clone();
        change(&mut next);
        atomic_write_json(&self.path, &next)?;
        self.state = next;
        Ok(())
    }
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&tmp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
