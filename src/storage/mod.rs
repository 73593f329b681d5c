//! Sled-backed key-value store for offline play.
//!
//! Holds the same JSON blobs a multiworld service would keep in its data
//! store (the private save key, checked locations) so a local session can be
//! resumed after a restart. Values are stored as JSON bytes; every write also
//! stamps the key's last modification time in a side tree.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde_json::Value;

use crate::errors::CoreError;

const TREE_DATA: &str = "mwsync_data";
const TREE_META: &str = "mwsync_meta";

pub struct SaveStore {
    _db: sled::Db,
    data: sled::Tree,
    meta: sled::Tree,
    path: PathBuf,
}

impl SaveStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let data = db.open_tree(TREE_DATA)?;
        let meta = db.open_tree(TREE_META)?;
        debug!("opened save store at {}", path_ref.display());
        Ok(Self {
            _db: db,
            data,
            meta,
            path: path_ref.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, CoreError> {
        match self.data.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Full replace of `key`.
    pub fn put(&self, key: &str, value: &Value) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.data.insert(key.as_bytes(), bytes)?;
        let stamp = Utc::now().timestamp_millis().to_be_bytes();
        self.meta.insert(key.as_bytes(), &stamp[..])?;
        self.data.flush()?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool, CoreError> {
        let existed = self.data.remove(key.as_bytes())?.is_some();
        self.meta.remove(key.as_bytes())?;
        self.data.flush()?;
        Ok(existed)
    }

    /// All keys in byte order. Keys that are not UTF-8 are skipped.
    pub fn keys(&self) -> Result<Vec<String>, CoreError> {
        let mut out = Vec::new();
        for entry in self.data.iter() {
            let (key, _) = entry?;
            match String::from_utf8(key.to_vec()) {
                Ok(k) => out.push(k),
                Err(_) => warn!("save store: skipping non-utf8 key"),
            }
        }
        Ok(out)
    }

    pub fn modified_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, CoreError> {
        let Some(raw) = self.meta.get(key.as_bytes())? else {
            return Ok(None);
        };
        let Ok(bytes) = <[u8; 8]>::try_from(&raw[..]) else {
            return Ok(None);
        };
        Ok(DateTime::from_timestamp_millis(i64::from_be_bytes(bytes)))
    }
}
