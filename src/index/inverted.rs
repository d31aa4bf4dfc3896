use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Fields, ObjectId};
use crate::model::database::Database;

/// Locator of an object inside the catalog tree.
///
/// A plain value: resolving it needs a live lookup and may find nothing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub db: String,
    pub collection: String,
    pub document: String,
    pub id: ObjectId,
}

impl ObjectRef {
    pub fn new(db: &str, collection: &str, document: &str, id: ObjectId) -> Self {
        ObjectRef {
            db: db.to_string(),
            collection: collection.to_string(),
            document: document.to_string(),
            id,
        }
    }

    pub fn within(&self, scope: &Scope) -> bool {
        match scope {
            Scope::Database { db } => self.db == *db,
            Scope::Collection { db, collection } => self.db == *db && self.collection == *collection,
            Scope::Document { db, collection, document } => {
                self.db == *db && self.collection == *collection && self.document == *document
            }
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}#{}", self.db, self.collection, self.document, self.id)
    }
}

/// Subtree of the catalog an index prune applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Database { db: String },
    Collection { db: String, collection: String },
    Document { db: String, collection: String, document: String },
}

/// field → canonical value → refs, in insertion order
pub type Buckets = BTreeMap<String, BTreeMap<String, Vec<ObjectRef>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub fields: usize,
    pub values: usize,
    pub refs: usize,
}

/// Exact-match inverted index over object fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    buckets: Buckets,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex::default()
    }

    /// Index every object of every database.
    pub fn build<'a>(databases: impl IntoIterator<Item = &'a Database>) -> Self {
        let mut index = InvertedIndex::new();
        for db in databases {
            for collection in db.collections() {
                for document in collection.documents() {
                    for object in document.objects() {
                        let reference = ObjectRef::new(db.name(), collection.name(), document.name(), object.id);
                        index.add_object(&reference, &object.fields);
                    }
                }
            }
        }
        index
    }

    pub fn add(&mut self, field: &str, value_key: String, reference: ObjectRef) {
        self.buckets
            .entry(field.to_string())
            .or_default()
            .entry(value_key)
            .or_default()
            .push(reference);
    }

    pub fn add_object(&mut self, reference: &ObjectRef, fields: &Fields) {
        for (field, value) in fields {
            self.add(field, value.canonical(), reference.clone());
        }
    }

    /// Drop one ref from one bucket, pruning whatever becomes empty.
    pub fn remove(&mut self, field: &str, value_key: &str, reference: &ObjectRef) {
        let Some(values) = self.buckets.get_mut(field) else {
            return;
        };
        if let Some(refs) = values.get_mut(value_key) {
            if let Some(pos) = refs.iter().position(|r| r == reference) {
                refs.remove(pos);
            }
            if refs.is_empty() {
                values.remove(value_key);
            }
        }
        if values.is_empty() {
            self.buckets.remove(field);
        }
    }

    pub fn remove_object(&mut self, reference: &ObjectRef, fields: &Fields) {
        for (field, value) in fields {
            self.remove(field, &value.canonical(), reference);
        }
    }

    /// Remove every ref under `scope` and return how many went.
    pub fn prune(&mut self, scope: &Scope) -> usize {
        let mut removed = 0;
        for values in self.buckets.values_mut() {
            for refs in values.values_mut() {
                let before = refs.len();
                refs.retain(|r| !r.within(scope));
                removed += before - refs.len();
            }
            values.retain(|_, refs| !refs.is_empty());
        }
        self.buckets.retain(|_, values| !values.is_empty());
        removed
    }

    /// Refs stored for `field == value_key`.
    pub fn lookup(&self, field: &str, value_key: &str) -> Result<&[ObjectRef]> {
        let values = self.buckets.get(field).ok_or_else(|| {
            Error::new(ErrorKind::FieldNotIndexed, format!("field {} not indexed", field))
        })?;
        let refs = values.get(value_key).ok_or_else(|| {
            Error::new(
                ErrorKind::ValueNotFound,
                format!("value {} for field {} not found", value_key, field),
            )
        })?;
        Ok(refs)
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            fields: self.buckets.len(),
            ..IndexStats::default()
        };
        for values in self.buckets.values() {
            stats.values += values.len();
            stats.refs += values.values().map(Vec::len).sum::<usize>();
        }
        stats
    }

    /// Same contents ignoring ref order inside buckets.
    pub fn equivalent(&self, other: &InvertedIndex) -> bool {
        normalized(&self.buckets) == normalized(&other.buckets)
    }
}

fn normalized(buckets: &Buckets) -> Buckets {
    let mut sorted = buckets.clone();
    for values in sorted.values_mut() {
        for refs in values.values_mut() {
            refs.sort();
        }
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{fields, Value};

    fn r(db: &str, col: &str, doc: &str, id: ObjectId) -> ObjectRef {
        ObjectRef::new(db, col, doc, id)
    }

    fn sample() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        index.add_object(&r("ventas", "clientes", "registro", 0), &fields([("name", "Pedro"), ("eps", "colfamilia")]));
        index.add_object(&r("ventas", "clientes", "registro", 1), &fields([("name", "Luis"), ("eps", "colsanitas")]));
        index.add_object(&r("ventas", "usuarios", "registro", 0), &fields([("name", "Luis")]));
        index.add_object(&r("compras", "clientes", "registro", 0), &fields([("name", "Luis")]));
        index
    }

    #[test]
    fn lookup_distinguishes_missing_field_and_value() {
        let index = sample();
        assert_eq!(index.lookup("name", "Luis").unwrap().len(), 3);
        assert_eq!(index.lookup("city", "x").unwrap_err().kind, ErrorKind::FieldNotIndexed);
        assert_eq!(index.lookup("name", "Ana").unwrap_err().kind, ErrorKind::ValueNotFound);
    }

    #[test]
    fn lookup_keeps_insertion_order() {
        let index = sample();
        let refs = index.lookup("name", "Luis").unwrap();
        assert_eq!(refs[0], r("ventas", "clientes", "registro", 1));
        assert_eq!(refs[2], r("compras", "clientes", "registro", 0));
    }

    #[test]
    fn collection_prune_leaves_siblings() {
        let mut index = sample();
        let removed = index.prune(&Scope::Collection {
            db: "ventas".into(),
            collection: "clientes".into(),
        });
        assert_eq!(removed, 4);
        assert!(index.buckets().get("eps").is_none());
        let refs = index.lookup("name", "Luis").unwrap();
        assert_eq!(refs, &[r("ventas", "usuarios", "registro", 0), r("compras", "clientes", "registro", 0)]);
        assert_eq!(index.lookup("name", "Pedro").unwrap_err().kind, ErrorKind::ValueNotFound);
    }

    #[test]
    fn database_prune_empties_index() {
        let mut index = sample();
        index.prune(&Scope::Database { db: "ventas".into() });
        index.prune(&Scope::Database { db: "compras".into() });
        assert!(index.is_empty());
        assert_eq!(index.stats(), IndexStats::default());
    }

    #[test]
    fn remove_object_prunes_empty_buckets() {
        let mut index = sample();
        index.remove_object(&r("ventas", "clientes", "registro", 0), &fields([("name", "Pedro"), ("eps", "colfamilia")]));
        assert!(index.buckets()["name"].get("Pedro").is_none());
        assert!(index.buckets()["eps"].get("colfamilia").is_none());
        assert_eq!(index.stats(), IndexStats { fields: 2, values: 2, refs: 4 });
    }

    #[test]
    fn canonical_keys_merge_equal_numbers() {
        let mut index = InvertedIndex::new();
        index.add_object(&r("a", "b", "c", 0), &fields([("n", Value::Integer(1))]));
        index.add_object(&r("a", "b", "c", 1), &fields([("n", Value::Float(1.0))]));
        index.add_object(&r("a", "b", "c", 2), &fields([("n", Value::Text("1".into()))]));
        index.add_object(&r("a", "b", "c", 3), &fields([("n", Value::Float(1.5))]));
        assert_eq!(index.lookup("n", "1").unwrap().len(), 3);
        assert_eq!(index.lookup("n", "1.5").unwrap().len(), 1);
    }

    #[test]
    fn equivalence_ignores_ref_order() {
        let a = sample();
        let mut b = InvertedIndex::new();
        b.add_object(&r("compras", "clientes", "registro", 0), &fields([("name", "Luis")]));
        b.add_object(&r("ventas", "usuarios", "registro", 0), &fields([("name", "Luis")]));
        b.add_object(&r("ventas", "clientes", "registro", 1), &fields([("eps", "colsanitas"), ("name", "Luis")]));
        b.add_object(&r("ventas", "clientes", "registro", 0), &fields([("eps", "colfamilia"), ("name", "Pedro")]));
        assert!(a.equivalent(&b));
        assert_ne!(a, b);
    }
}
