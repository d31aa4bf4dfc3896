use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind as IoErrorKind, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::inverted::Scope;
use crate::model::{Collection, Database, Document};
use crate::storage::layout::{StorageLayout, DOCUMENT_EXTENSION};

/// Outcome of a full-tree flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    pub documents_written: usize,
    pub entries_pruned: usize,
}

/// Remove the on-disk entries of deleted entities, then write every
/// document of the tree.
///
/// Only the scopes in `deleted` are pruned; anything else already under the
/// base path is left alone. Each document file is replaced atomically; the
/// tree as a whole is not. An I/O failure stops the walk and leaves already
/// written files in place.
pub fn write_tree(
    layout: &StorageLayout,
    databases: &BTreeMap<String, Database>,
    deleted: &[Scope],
    pretty: bool,
) -> Result<FlushReport> {
    let mut report = FlushReport::default();
    layout.create_base()?;

    for scope in deleted {
        if prune(layout, scope)? {
            report.entries_pruned += 1;
        }
    }

    for db in databases.values() {
        fs::create_dir_all(layout.database_dir(db.name()))?;

        for collection in db.collections() {
            fs::create_dir_all(layout.collection_dir(db.name(), collection.name()))?;
            for document in collection.documents() {
                write_document(layout, db.name(), collection.name(), document, pretty)?;
                report.documents_written += 1;
            }
        }
    }

    info!(
        path = %layout.base_dir().display(),
        documents = report.documents_written,
        pruned = report.entries_pruned,
        "Flushed catalog to disk"
    );
    Ok(report)
}

/// Serialize to `<document>.json.tmp` and rename over `<document>.json`.
pub fn write_document(
    layout: &StorageLayout,
    db: &str,
    collection: &str,
    document: &Document,
    pretty: bool,
) -> Result<()> {
    let tmp_path = layout.temp_path(db, collection, document.name());
    let out_path = layout.document_path(db, collection, document.name());

    let file = File::create(&tmp_path)?;
    let mut writer = BufWriter::new(file);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, document)?;
    } else {
        serde_json::to_writer(&mut writer, document)?;
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    fs::rename(&tmp_path, &out_path)?;
    debug!(path = %out_path.display(), objects = document.len(), "Wrote document");
    Ok(())
}

/// Rebuild the whole tree from disk. Nothing is returned unless every
/// directory and file decodes.
pub fn read_tree(layout: &StorageLayout) -> Result<BTreeMap<String, Database>> {
    let mut databases = BTreeMap::new();
    if !layout.base_dir().exists() {
        info!(path = %layout.base_dir().display(), "No stored catalog, starting empty");
        return Ok(databases);
    }

    for db_name in child_dirs(layout.base_dir())? {
        let mut db = Database::new(&db_name);
        for collection_name in child_dirs(&layout.database_dir(&db_name))? {
            let collection = db.create_collection(&collection_name)?;
            read_collection(layout, &db_name, collection)?;
        }
        databases.insert(db_name, db);
    }

    info!(
        path = %layout.base_dir().display(),
        databases = databases.len(),
        "Loaded catalog from disk"
    );
    Ok(databases)
}

fn read_collection(layout: &StorageLayout, db: &str, collection: &mut Collection) -> Result<()> {
    let dir = layout.collection_dir(db, collection.name());
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(path = %path.display(), "Skipping document with non UTF-8 name");
            continue;
        };

        let data = fs::read(&path)?;
        let mut document: Document = serde_json::from_slice(&data).map_err(|e| {
            Error::new(ErrorKind::Parse, format!("{}: {}", path.display(), e))
        })?;
        document.rename(stem);
        document.restore_counter()?;
        collection.attach_document(document)?;
    }
    Ok(())
}

/// Names of visible subdirectories.
fn child_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) if !name.starts_with('.') => names.push(name.to_string()),
            Some(_) => {}
            None => warn!(path = %entry.path().display(), "Skipping directory with non UTF-8 name"),
        }
    }
    names.sort();
    Ok(names)
}

/// Delete the directory or file backing `scope`; false if it was not there.
fn prune(layout: &StorageLayout, scope: &Scope) -> Result<bool> {
    let path = match scope {
        Scope::Database { db } => layout.database_dir(db),
        Scope::Collection { db, collection } => layout.collection_dir(db, collection),
        Scope::Document { db, collection, document } => layout.document_path(db, collection, document),
    };
    let removed = match scope {
        Scope::Document { .. } => fs::remove_file(&path),
        _ => fs::remove_dir_all(&path),
    };
    match removed {
        Ok(()) => {
            debug!(path = %path.display(), "Pruned deleted entry");
            Ok(true)
        }
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::fields;

    fn tree() -> BTreeMap<String, Database> {
        let mut db = Database::new("ventas");
        let collection = db.create_collection("clientes").unwrap();
        let doc = collection.create_document("registro").unwrap();
        doc.insert_object(fields([("name", "Pedro")]));
        doc.insert_object(fields([("name", "Luis")]));
        db.create_collection("vacia").unwrap();
        BTreeMap::from([("ventas".to_string(), db)])
    }

    #[test]
    fn document_file_shape() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf());
        write_tree(&layout, &tree(), &[], false).unwrap();

        let raw = fs::read_to_string(layout.document_path("ventas", "clientes", "registro")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["Name"], "registro");
        assert_eq!(json["Objects"][1]["id"], 1);
        assert_eq!(json["Objects"][1]["fields"]["name"], "Luis");
        assert_eq!(json["NextId"], 2);
        assert!(!layout.temp_path("ventas", "clientes", "registro").exists());
    }

    #[test]
    fn round_trip_keeps_empty_containers() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf());
        let original = tree();
        write_tree(&layout, &original, &[], true).unwrap();
        assert_eq!(read_tree(&layout).unwrap(), original);
    }

    #[test]
    fn flush_prunes_deleted_entities() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf());
        let mut databases = tree();
        write_tree(&layout, &databases, &[], true).unwrap();

        let db = databases.get_mut("ventas").unwrap();
        db.get_collection_mut("clientes").unwrap().delete_document("registro").unwrap();
        db.delete_collection("vacia").unwrap();
        let deleted = [
            Scope::Document { db: "ventas".into(), collection: "clientes".into(), document: "registro".into() },
            Scope::Collection { db: "ventas".into(), collection: "vacia".into() },
            Scope::Database { db: "never_flushed".into() },
        ];
        let report = write_tree(&layout, &databases, &deleted, true).unwrap();

        assert_eq!(report.entries_pruned, 2);
        assert!(!layout.document_path("ventas", "clientes", "registro").exists());
        assert!(!layout.collection_dir("ventas", "vacia").exists());
        assert_eq!(read_tree(&layout).unwrap(), databases);
    }

    #[test]
    fn entries_unknown_to_the_tree_survive_a_flush() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf());
        write_tree(&layout, &tree(), &[], true).unwrap();

        let other = BTreeMap::from([("otra".to_string(), Database::new("otra"))]);
        let report = write_tree(&layout, &other, &[], true).unwrap();
        assert_eq!(report.entries_pruned, 0);
        assert!(layout.document_path("ventas", "clientes", "registro").exists());
        assert_eq!(read_tree(&layout).unwrap().len(), 2);
    }

    #[test]
    fn deleted_then_recreated_entity_is_written_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf());
        write_tree(&layout, &tree(), &[], true).unwrap();

        let fresh = BTreeMap::from([("ventas".to_string(), Database::new("ventas"))]);
        let deleted = [Scope::Database { db: "ventas".into() }];
        write_tree(&layout, &fresh, &deleted, true).unwrap();
        assert_eq!(read_tree(&layout).unwrap(), fresh);
    }

    #[test]
    fn missing_base_is_an_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("absent"));
        assert!(read_tree(&layout).unwrap().is_empty());
    }

    #[test]
    fn corrupt_document_aborts_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf());
        write_tree(&layout, &tree(), &[], true).unwrap();
        fs::write(layout.document_path("ventas", "clientes", "broken"), b"{not json").unwrap();

        let err = read_tree(&layout).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }

    #[test]
    fn hidden_entries_and_temp_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf());
        write_tree(&layout, &tree(), &[], true).unwrap();
        fs::write(layout.lock_path(), b"").unwrap();
        fs::create_dir_all(dir.path().join(".trash")).unwrap();
        fs::write(layout.temp_path("ventas", "clientes", "half"), b"{").unwrap();

        assert_eq!(read_tree(&layout).unwrap(), tree());
    }
}
