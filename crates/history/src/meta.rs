// Chunk: docs/chunks/page_store - 64 KiB page store with atomic rewrites

//! Session sidecar metadata (`meta.json`).

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::now_nanos;

/// Per-session metadata stored next to the `pages/` directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub encrypted: bool,
    /// Unix nanoseconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl SessionMeta {
    /// Fresh metadata for `terminal_id`. An empty id gets a generated UUID.
    pub fn new(terminal_id: &str) -> Self {
        let session_id = if terminal_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            terminal_id.to_string()
        };
        let now = now_nanos();
        SessionMeta {
            session_id,
            encrypted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_nanos();
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let tmp = path.with_extension("json.tmp");
        let result = fs::write(&tmp, &json).and_then(|_| fs::rename(&tmp, path));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}
