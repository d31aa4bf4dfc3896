use std::collections::BTreeMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{CatalogStats, TreeStats};
use crate::core::types::{Fields, ObjectId};
use crate::index::inverted::{IndexStats, InvertedIndex, ObjectRef, Scope};
use crate::model::{Collection, Database, Document, Filter, Object};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::persist::{self, FlushReport};

/// One object returned by a lookup, with where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub reference: ObjectRef,
    pub object: Object,
}

#[derive(Debug, Default)]
struct CatalogState {
    databases: BTreeMap<String, Database>,
    index: InvertedIndex,
    // Entities deleted since the last flush or load; pruned from disk on flush.
    deleted: Vec<Scope>,
}

/// Owner of every database and of the inverted index over them.
///
/// Both live behind a single read-write lock so no mutation can leave them
/// out of step. Methods never call each other while holding the lock.
pub struct Catalog {
    config: Config,
    layout: StorageLayout,
    state: RwLock<CatalogState>,
    lock: Mutex<Option<FileLock>>,
}

impl Catalog {
    /// Empty in-memory catalog; touches no files until flushed or loaded.
    pub fn new(config: Config) -> Self {
        let layout = StorageLayout::new(config.storage_path.clone());
        Catalog {
            config,
            layout,
            state: RwLock::new(CatalogState::default()),
            lock: Mutex::new(None),
        }
    }

    /// Create the storage directory, take its lock and load what is there.
    pub fn open(config: Config) -> Result<Self> {
        let catalog = Catalog::new(config);
        catalog.layout.create_base()?;
        catalog.load_from_disk()?;
        Ok(catalog)
    }

    /// Take `<base>/.lock` on first disk access when `lock_storage` is set.
    /// Held until the catalog is dropped.
    fn hold_storage_lock(&self) -> Result<()> {
        if !self.config.lock_storage {
            return Ok(());
        }
        let mut lock = self.lock.lock();
        if lock.is_none() {
            self.layout.create_base()?;
            *lock = Some(FileLock::acquire(&self.layout)?);
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    // ----- structure -----

    pub fn create_database(&self, name: &str) -> Result<()> {
        validate_name("database", name)?;
        let mut state = self.state.write();
        if state.databases.contains_key(name) {
            return Err(Error::already_exists("database", name));
        }
        state.databases.insert(name.to_string(), Database::new(name));
        debug!(db = name, "Created database");
        Ok(())
    }

    pub fn create_collection(&self, db: &str, name: &str) -> Result<()> {
        validate_name("collection", name)?;
        let mut state = self.state.write();
        database_mut(&mut state.databases, db)?.create_collection(name)?;
        debug!(db, collection = name, "Created collection");
        Ok(())
    }

    pub fn create_document(&self, db: &str, collection: &str, name: &str) -> Result<()> {
        validate_name("document", name)?;
        let mut state = self.state.write();
        database_mut(&mut state.databases, db)?
            .get_collection_mut(collection)?
            .create_document(name)?;
        debug!(db, collection, document = name, "Created document");
        Ok(())
    }

    /// Remove a database and every index entry under it.
    pub fn delete_database(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.databases.remove(name).is_none() {
            return Err(Error::not_found("database", name));
        }
        let scope = Scope::Database { db: name.to_string() };
        let pruned = state.index.prune(&scope);
        state.deleted.push(scope);
        debug!(db = name, pruned, "Deleted database");
        Ok(())
    }

    pub fn delete_collection(&self, db: &str, name: &str) -> Result<()> {
        let mut state = self.state.write();
        database_mut(&mut state.databases, db)?.delete_collection(name)?;
        let scope = Scope::Collection {
            db: db.to_string(),
            collection: name.to_string(),
        };
        let pruned = state.index.prune(&scope);
        state.deleted.push(scope);
        debug!(db, collection = name, pruned, "Deleted collection");
        Ok(())
    }

    pub fn delete_document(&self, db: &str, collection: &str, name: &str) -> Result<()> {
        let mut state = self.state.write();
        database_mut(&mut state.databases, db)?
            .get_collection_mut(collection)?
            .delete_document(name)?;
        let scope = Scope::Document {
            db: db.to_string(),
            collection: collection.to_string(),
            document: name.to_string(),
        };
        let pruned = state.index.prune(&scope);
        state.deleted.push(scope);
        debug!(db, collection, document = name, pruned, "Deleted document");
        Ok(())
    }

    pub fn list_databases(&self) -> Vec<String> {
        self.state.read().databases.keys().cloned().collect()
    }

    pub fn list_collections(&self, db: &str) -> Result<Vec<String>> {
        let state = self.state.read();
        Ok(database(&state.databases, db)?.collection_names())
    }

    pub fn list_documents(&self, db: &str, collection: &str) -> Result<Vec<String>> {
        let state = self.state.read();
        Ok(database(&state.databases, db)?
            .get_collection(collection)?
            .document_names())
    }

    // ----- objects -----

    /// Insert one object and index each of its fields.
    pub fn insert_object(&self, db: &str, collection: &str, document: &str, fields: Fields) -> Result<ObjectId> {
        let mut guard = self.state.write();
        let CatalogState { databases, index, .. } = &mut *guard;
        let target = document_mut(databases, db, collection, document)?;

        let reference = ObjectRef::new(db, collection, document, target.next_id());
        index.add_object(&reference, &fields);
        let id = target.insert_object(fields);
        debug!(%reference, "Inserted object");
        Ok(id)
    }

    pub fn insert_objects(
        &self,
        db: &str,
        collection: &str,
        document: &str,
        batch: Vec<Fields>,
    ) -> Result<Vec<ObjectId>> {
        let mut guard = self.state.write();
        let CatalogState { databases, index, .. } = &mut *guard;
        let target = document_mut(databases, db, collection, document)?;

        let mut ids = Vec::with_capacity(batch.len());
        for fields in batch {
            let reference = ObjectRef::new(db, collection, document, target.next_id());
            index.add_object(&reference, &fields);
            ids.push(target.insert_object(fields));
        }
        debug!(db, collection, document, count = ids.len(), "Inserted objects");
        Ok(ids)
    }

    /// Merge `patch` into every object `filter` selects, moving index
    /// entries from the old values to the new ones.
    pub fn modify_objects(
        &self,
        db: &str,
        collection: &str,
        document: &str,
        filter: &Filter,
        patch: &Fields,
    ) -> Result<usize> {
        let mut guard = self.state.write();
        let CatalogState { databases, index, .. } = &mut *guard;
        let target = document_mut(databases, db, collection, document)?;

        let ids = target.matching_ids(filter);
        if ids.is_empty() {
            return Err(Error::new(
                ErrorKind::NoMatch,
                format!("no objects in document {} match the filter", document),
            ));
        }
        for id in &ids {
            patch_object(index, target, ObjectRef::new(db, collection, document, *id), patch)?;
        }
        debug!(db, collection, document, modified = ids.len(), "Modified objects");
        Ok(ids.len())
    }

    pub fn modify_object(
        &self,
        db: &str,
        collection: &str,
        document: &str,
        id: ObjectId,
        patch: &Fields,
    ) -> Result<()> {
        let mut guard = self.state.write();
        let CatalogState { databases, index, .. } = &mut *guard;
        let target = document_mut(databases, db, collection, document)?;
        patch_object(index, target, ObjectRef::new(db, collection, document, id), patch)
    }

    /// Remove every object `filter` selects along with its index entries.
    pub fn delete_objects(&self, db: &str, collection: &str, document: &str, filter: &Filter) -> Result<usize> {
        let mut guard = self.state.write();
        let CatalogState { databases, index, .. } = &mut *guard;
        let target = document_mut(databases, db, collection, document)?;

        let removed = target.delete_objects_by_filter(filter)?;
        for object in &removed {
            let reference = ObjectRef::new(db, collection, document, object.id);
            index.remove_object(&reference, &object.fields);
        }
        debug!(db, collection, document, deleted = removed.len(), "Deleted objects");
        Ok(removed.len())
    }

    pub fn get_object(&self, db: &str, collection: &str, document: &str, id: ObjectId) -> Result<Object> {
        let state = self.state.read();
        document_ref(&state.databases, db, collection, document)?
            .get_object_by_id(id)
            .cloned()
            .ok_or_else(|| Error::not_found("object", &id.to_string()))
    }

    pub fn objects(&self, db: &str, collection: &str, document: &str) -> Result<Vec<Object>> {
        let state = self.state.read();
        Ok(document_ref(&state.databases, db, collection, document)?
            .objects()
            .to_vec())
    }

    /// Follow a ref to the live object, if it still exists.
    pub fn resolve(&self, reference: &ObjectRef) -> Option<Object> {
        let state = self.state.read();
        resolve_in(&state.databases, reference).cloned()
    }

    // ----- lookup -----

    /// Exact-match lookup of `field == value` inside `db`, optionally
    /// restricted to `collections`. Stale refs are skipped.
    pub fn find<S: AsRef<str>>(&self, field: &str, value: &str, db: &str, collections: &[S]) -> Result<Vec<Match>> {
        let state = self.state.read();
        let refs = state.index.lookup(field, value)?;

        let results: Vec<Match> = refs
            .iter()
            .filter(|r| r.db == db)
            .filter(|r| collections.is_empty() || collections.iter().any(|c| c.as_ref() == r.collection))
            .filter_map(|r| {
                resolve_in(&state.databases, r).map(|object| Match {
                    reference: r.clone(),
                    object: object.clone(),
                })
            })
            .collect();

        if results.is_empty() {
            return Err(Error::new(
                ErrorKind::NoResults,
                format!("no results for {}:{} in database {}", field, value, db),
            ));
        }
        Ok(results)
    }

    /// `find` driven by a `field:value` string, split at the first colon.
    pub fn find_by_query<S: AsRef<str>>(&self, query: &str, db: &str, collections: &[S]) -> Result<Vec<Match>> {
        let (field, value) = query.split_once(':').ok_or_else(|| {
            Error::new(
                ErrorKind::MalformedQuery,
                format!("query {:?} must have the form field:value", query),
            )
        })?;
        self.find(field, value, db, collections)
    }

    // ----- import / export -----

    pub fn database_snapshot(&self, db: &str) -> Result<Database> {
        let state = self.state.read();
        database(&state.databases, db).cloned()
    }

    pub fn collection_snapshot(&self, db: &str, collection: &str) -> Result<Collection> {
        let state = self.state.read();
        database(&state.databases, db)?.get_collection(collection).cloned()
    }

    pub fn document_snapshot(&self, db: &str, collection: &str, document: &str) -> Result<Document> {
        let state = self.state.read();
        document_ref(&state.databases, db, collection, document).cloned()
    }

    /// Adopt a complete database tree, indexing every object in it.
    pub fn attach_database(&self, mut incoming: Database) -> Result<TreeStats> {
        prepare_database(&mut incoming)?;

        let mut guard = self.state.write();
        let CatalogState { databases, index, .. } = &mut *guard;
        if databases.contains_key(incoming.name()) {
            return Err(Error::already_exists("database", incoming.name()));
        }
        for collection in incoming.collections() {
            for document in collection.documents() {
                index_document(index, incoming.name(), collection.name(), document);
            }
        }
        let stats = TreeStats::of([&incoming]);
        databases.insert(incoming.name().to_string(), incoming);
        Ok(stats)
    }

    pub fn attach_collection(&self, db: &str, mut incoming: Collection) -> Result<TreeStats> {
        prepare_collection(&mut incoming)?;

        let mut guard = self.state.write();
        let CatalogState { databases, index, .. } = &mut *guard;
        let target = database_mut(databases, db)?;
        let mut stats = TreeStats::default();
        stats.add_collection(&incoming);

        let name = incoming.name().to_string();
        target.attach_collection(incoming)?;
        for document in target.get_collection(&name)?.documents() {
            index_document(index, db, &name, document);
        }
        Ok(stats)
    }

    pub fn attach_document(&self, db: &str, collection: &str, mut incoming: Document) -> Result<TreeStats> {
        prepare_document(&mut incoming)?;

        let mut guard = self.state.write();
        let CatalogState { databases, index, .. } = &mut *guard;
        let target = database_mut(databases, db)?.get_collection_mut(collection)?;
        let mut stats = TreeStats::default();
        stats.add_document(&incoming);

        let name = incoming.name().to_string();
        target.attach_document(incoming)?;
        index_document(index, db, collection, target.get_document(&name)?);
        Ok(stats)
    }

    // ----- persistence -----

    /// Write the whole tree under the storage path and remove what this
    /// catalog deleted since the last flush or load. Stored entities it never
    /// knew about are left in place.
    pub fn flush_to_disk(&self) -> Result<FlushReport> {
        self.hold_storage_lock()?;
        let mut state = self.state.write();
        let report = persist::write_tree(&self.layout, &state.databases, &state.deleted, self.config.pretty_json)?;
        state.deleted.clear();
        Ok(report)
    }

    /// Replace the in-memory tree with what is on disk and rebuild the index.
    /// On error the current contents stay as they were.
    pub fn load_from_disk(&self) -> Result<TreeStats> {
        self.hold_storage_lock()?;
        let mut state = self.state.write();
        let databases = persist::read_tree(&self.layout)?;
        let index = InvertedIndex::build(databases.values());
        let stats = TreeStats::of(databases.values());
        state.databases = databases;
        state.index = index;
        state.deleted.clear();
        info!(
            databases = stats.databases,
            documents = stats.documents,
            objects = stats.objects,
            "Rebuilt index from disk"
        );
        Ok(stats)
    }

    // ----- introspection -----

    pub fn index_stats(&self) -> IndexStats {
        self.state.read().index.stats()
    }

    pub fn stats(&self) -> CatalogStats {
        let state = self.state.read();
        CatalogStats {
            tree: TreeStats::of(state.databases.values()),
            index: state.index.stats(),
        }
    }

    /// Compare the live index against one rebuilt from the tree.
    pub fn verify_index(&self) -> Result<()> {
        let state = self.state.read();
        let rebuilt = InvertedIndex::build(state.databases.values());
        if !state.index.equivalent(&rebuilt) {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!(
                    "index diverged from data: live {:?}, rebuilt {:?}",
                    state.index.stats(),
                    rebuilt.stats()
                ),
            ));
        }
        Ok(())
    }
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(Error::new(
            ErrorKind::InvalidName,
            format!("{} name {:?} is not allowed", what, name),
        ));
    }
    Ok(())
}

fn database<'a>(databases: &'a BTreeMap<String, Database>, db: &str) -> Result<&'a Database> {
    databases.get(db).ok_or_else(|| Error::not_found("database", db))
}

fn database_mut<'a>(databases: &'a mut BTreeMap<String, Database>, db: &str) -> Result<&'a mut Database> {
    databases.get_mut(db).ok_or_else(|| Error::not_found("database", db))
}

fn document_ref<'a>(
    databases: &'a BTreeMap<String, Database>,
    db: &str,
    collection: &str,
    document: &str,
) -> Result<&'a Document> {
    database(databases, db)?
        .get_collection(collection)?
        .get_document(document)
}

fn document_mut<'a>(
    databases: &'a mut BTreeMap<String, Database>,
    db: &str,
    collection: &str,
    document: &str,
) -> Result<&'a mut Document> {
    database_mut(databases, db)?
        .get_collection_mut(collection)?
        .get_document_mut(document)
}

fn resolve_in<'a>(databases: &'a BTreeMap<String, Database>, reference: &ObjectRef) -> Option<&'a Object> {
    document_ref(databases, &reference.db, &reference.collection, &reference.document)
        .ok()?
        .get_object_by_id(reference.id)
}

/// Apply `patch` to one object, re-keying the index for changed fields.
fn patch_object(index: &mut InvertedIndex, document: &mut Document, reference: ObjectRef, patch: &Fields) -> Result<()> {
    let current = document
        .get_object_by_id(reference.id)
        .ok_or_else(|| Error::not_found("object", &reference.id.to_string()))?;

    for (field, value) in patch {
        let new_key = value.canonical();
        match current.fields.get(field) {
            Some(old) if old.canonical() == new_key => continue,
            Some(old) => index.remove(field, &old.canonical(), &reference),
            None => {}
        }
        index.add(field, new_key, reference.clone());
    }
    document.modify_object_by_id(reference.id, patch)
}

fn index_document(index: &mut InvertedIndex, db: &str, collection: &str, document: &Document) {
    for object in document.objects() {
        let reference = ObjectRef::new(db, collection, document.name(), object.id);
        index.add_object(&reference, &object.fields);
    }
}

// Imported trees arrive with names and counters straight from JSON.
fn prepare_database(db: &mut Database) -> Result<()> {
    validate_name("database", db.name())?;
    if db.collection_names() != db.collections().map(|c| c.name().to_string()).collect::<Vec<_>>() {
        return Err(Error::new(
            ErrorKind::Parse,
            format!("database {} has collections filed under the wrong name", db.name()),
        ));
    }
    for collection in db.collections_mut() {
        prepare_collection(collection)?;
    }
    Ok(())
}

fn prepare_collection(collection: &mut Collection) -> Result<()> {
    validate_name("collection", collection.name())?;
    if collection.document_names() != collection.documents().map(|d| d.name().to_string()).collect::<Vec<_>>() {
        return Err(Error::new(
            ErrorKind::Parse,
            format!("collection {} has documents filed under the wrong name", collection.name()),
        ));
    }
    for document in collection.documents_mut() {
        prepare_document(document)?;
    }
    Ok(())
}

fn prepare_document(document: &mut Document) -> Result<()> {
    validate_name("document", document.name())?;
    document.restore_counter()
}
