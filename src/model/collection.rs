use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::core::error::{Error, Result};
use crate::model::document::Document;

/// Named set of documents inside a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    name: String,
    documents: BTreeMap<String, Document>,
}

impl Collection {
    pub(crate) fn new(name: &str) -> Self {
        Collection {
            name: name.to_string(),
            documents: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_document(&mut self, name: &str) -> Result<&mut Document> {
        if self.documents.contains_key(name) {
            return Err(Error::already_exists("document", name));
        }
        Ok(self
            .documents
            .entry(name.to_string())
            .or_insert_with(|| Document::new(name)))
    }

    pub fn get_document(&self, name: &str) -> Result<&Document> {
        self.documents
            .get(name)
            .ok_or_else(|| Error::not_found("document", name))
    }

    pub fn get_document_mut(&mut self, name: &str) -> Result<&mut Document> {
        self.documents
            .get_mut(name)
            .ok_or_else(|| Error::not_found("document", name))
    }

    pub fn delete_document(&mut self, name: &str) -> Result<Document> {
        self.documents
            .remove(name)
            .ok_or_else(|| Error::not_found("document", name))
    }

    /// Adopt an already populated document under its own name.
    pub(crate) fn attach_document(&mut self, document: Document) -> Result<()> {
        if self.documents.contains_key(document.name()) {
            return Err(Error::already_exists("document", document.name()));
        }
        self.documents.insert(document.name().to_string(), document);
        Ok(())
    }

    pub fn document_names(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub(crate) fn documents_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.values_mut()
    }
}
