// ── Render pointer ──
//
// The only durable state serverboard keeps: the id of the last summary
// message it posted, so a restart edits that message instead of posting
// a duplicate. Stored as a single decimal line.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::MessageId;

/// Single-value file store for the last rendered message id.
#[derive(Debug, Clone)]
pub struct PointerStore {
    path: PathBuf,
}

impl PointerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored id.
    ///
    /// A missing file is `Ok(None)`. Unparseable content is logged and
    /// also treated as absent.
    pub fn load(&self) -> Result<Option<MessageId>, CoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no render pointer yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match raw.trim().parse::<MessageId>() {
            Ok(id) if id.0 != 0 => Ok(Some(id)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt render pointer");
                Ok(None)
            }
        }
    }

    /// Persist `id`, replacing any previous value.
    ///
    /// Written to a sibling temp file and renamed into place.
    pub fn store(&self, id: MessageId) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, format!("{id}\n"))?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), %id, "render pointer saved");
        Ok(())
    }
}
