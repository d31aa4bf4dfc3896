use std::fs;
use std::path::{Path, PathBuf};
use crate::core::error::Result;

pub const DOCUMENT_EXTENSION: &str = "json";
pub const TEMP_EXTENSION: &str = "json.tmp";
pub const LOCK_FILE: &str = ".lock";

/// Directory structure for the persisted tree:
/// `<base>/<database>/<collection>/<document>.json`
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Self {
        StorageLayout { base_dir }
    }

    pub fn create_base(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn database_dir(&self, db: &str) -> PathBuf {
        self.base_dir.join(db)
    }

    pub fn collection_dir(&self, db: &str, collection: &str) -> PathBuf {
        self.database_dir(db).join(collection)
    }

    pub fn document_path(&self, db: &str, collection: &str, document: &str) -> PathBuf {
        self.collection_dir(db, collection)
            .join(format!("{}.{}", document, DOCUMENT_EXTENSION))
    }

    pub fn temp_path(&self, db: &str, collection: &str, document: &str) -> PathBuf {
        self.collection_dir(db, collection)
            .join(format!("{}.{}", document, TEMP_EXTENSION))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(LOCK_FILE)
    }
}
