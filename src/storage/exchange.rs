use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::TreeStats;
use crate::model::{Collection, Database, Document};

pub const BUNDLE_VERSION: u32 = 1;

/// Self-describing export file carrying one subtree of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Database(Database),
    Collection(Collection),
    Document(Document),
}

impl Payload {
    pub fn name(&self) -> &str {
        match self {
            Payload::Database(db) => db.name(),
            Payload::Collection(collection) => collection.name(),
            Payload::Document(document) => document.name(),
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        match self {
            Payload::Database(db) => stats.add_database(db),
            Payload::Collection(collection) => stats.add_collection(collection),
            Payload::Document(document) => stats.add_document(document),
        }
        stats
    }
}

impl Bundle {
    pub fn new(payload: Payload) -> Self {
        Bundle {
            version: BUNDLE_VERSION,
            exported_at: Utc::now(),
            payload,
        }
    }
}

/// Write `bundle` to `path`, replacing any existing file atomically.
pub fn export_to(path: &Path, bundle: &Bundle) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");

    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    serde_json::to_writer_pretty(&mut writer, bundle)?;
    writer.flush()?;
    drop(writer);
    fs::rename(&tmp_path, path)?;

    let stats = bundle.payload.stats();
    info!(path = %path.display(), name = bundle.payload.name(), objects = stats.objects, "Exported bundle");
    Ok(())
}

pub fn import_from(path: &Path) -> Result<Bundle> {
    let data = fs::read(path)?;
    let bundle: Bundle = serde_json::from_slice(&data)
        .map_err(|e| Error::new(ErrorKind::Parse, format!("{}: {}", path.display(), e)))?;
    if bundle.version != BUNDLE_VERSION {
        return Err(Error::new(
            ErrorKind::Parse,
            format!("unsupported bundle version {} in {}", bundle.version, path.display()),
        ));
    }
    info!(path = %path.display(), name = bundle.payload.name(), "Read bundle");
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{fields, Value};

    #[test]
    fn bundle_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/clientes.json");

        let mut collection = Collection::new("clientes");
        let doc = collection.create_document("registro").unwrap();
        doc.insert_object(fields([("name", Value::from("Pedro")), ("age", Value::Null)]));
        let bundle = Bundle::new(Payload::Collection(collection));

        export_to(&path, &bundle).unwrap();
        let back = import_from(&path).unwrap();
        assert_eq!(back, bundle);
        assert_eq!(back.payload.stats(), TreeStats { databases: 0, collections: 1, documents: 1, objects: 1 });
    }

    #[test]
    fn unknown_versions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let mut bundle = Bundle::new(Payload::Document(Document::new("registro")));
        bundle.version = 99;
        export_to(&path, &bundle).unwrap();
        assert_eq!(import_from(&path).unwrap_err().kind, ErrorKind::Parse);
    }
}
