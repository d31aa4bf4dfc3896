use crate::index::inverted::IndexStats;
use crate::model::{Collection, Database, Document};

/// Entity counts for a subtree of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub databases: usize,
    pub collections: usize,
    pub documents: usize,
    pub objects: usize,
}

impl TreeStats {
    pub fn of<'a>(databases: impl IntoIterator<Item = &'a Database>) -> Self {
        let mut stats = TreeStats::default();
        for db in databases {
            stats.add_database(db);
        }
        stats
    }

    pub fn add_database(&mut self, db: &Database) {
        self.databases += 1;
        for collection in db.collections() {
            self.add_collection(collection);
        }
    }

    pub fn add_collection(&mut self, collection: &Collection) {
        self.collections += 1;
        for document in collection.documents() {
            self.add_document(document);
        }
    }

    pub fn add_document(&mut self, document: &Document) {
        self.documents += 1;
        self.objects += document.len();
    }
}

/// Catalog-wide statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogStats {
    pub tree: TreeStats,
    pub index: IndexStats,
}
