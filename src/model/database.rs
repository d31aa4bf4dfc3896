use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::core::error::{Error, Result};
use crate::model::collection::Collection;

/// Top level namespace: a named set of collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    name: String,
    collections: BTreeMap<String, Collection>,
}

impl Database {
    pub(crate) fn new(name: &str) -> Self {
        Database {
            name: name.to_string(),
            collections: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_collection(&mut self, name: &str) -> Result<&mut Collection> {
        if self.collections.contains_key(name) {
            return Err(Error::already_exists("collection", name));
        }
        Ok(self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name)))
    }

    pub fn get_collection(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::not_found("collection", name))
    }

    pub fn get_collection_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| Error::not_found("collection", name))
    }

    pub fn delete_collection(&mut self, name: &str) -> Result<Collection> {
        self.collections
            .remove(name)
            .ok_or_else(|| Error::not_found("collection", name))
    }

    pub(crate) fn attach_collection(&mut self, collection: Collection) -> Result<()> {
        if self.collections.contains_key(collection.name()) {
            return Err(Error::already_exists("collection", collection.name()));
        }
        self.collections.insert(collection.name().to_string(), collection);
        Ok(())
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    pub(crate) fn collections_mut(&mut self) -> impl Iterator<Item = &mut Collection> {
        self.collections.values_mut()
    }
}
