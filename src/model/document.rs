use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Fields, ObjectId};
use crate::model::filter::Filter;
use crate::model::object::Object;

/// Ordered sequence of objects sharing an id counter.
///
/// On disk: `{"Name": .., "Objects": [{"id": .., "fields": {..}}], "NextId": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Objects")]
    objects: Vec<Object>,
    #[serde(rename = "NextId", default)]
    next_id: ObjectId,
}

impl Document {
    pub(crate) fn new(name: &str) -> Self {
        Document {
            name: name.to_string(),
            objects: Vec::new(),
            next_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Id the next insert will receive.
    pub fn next_id(&self) -> ObjectId {
        self.next_id
    }

    pub fn insert_object(&mut self, fields: Fields) -> ObjectId {
        let id = self.next_id;
        self.objects.push(Object::new(id, fields));
        self.next_id += 1;
        id
    }

    pub fn insert_objects(&mut self, batch: Vec<Fields>) -> Vec<ObjectId> {
        batch.into_iter().map(|fields| self.insert_object(fields)).collect()
    }

    // Ids stop lining up with positions after the first delete, hence the scan.
    pub fn get_object_by_id(&self, id: ObjectId) -> Option<&Object> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn modify_object_by_id(&mut self, id: ObjectId, patch: &Fields) -> Result<()> {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(object) => {
                object.apply(patch);
                Ok(())
            }
            None => Err(Error::not_found("object", &id.to_string())),
        }
    }

    /// Ids of the objects `filter` selects, in document order.
    pub fn matching_ids(&self, filter: &Filter) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|o| filter.matches(o))
            .map(|o| o.id)
            .collect()
    }

    /// Apply `patch` to every matching object and return how many changed.
    pub fn modify_objects_by_filter(&mut self, filter: &Filter, patch: &Fields) -> Result<usize> {
        let mut modified = 0;
        for object in self.objects.iter_mut().filter(|o| filter.matches(o)) {
            object.apply(patch);
            modified += 1;
        }
        if modified == 0 {
            return Err(self.no_match());
        }
        Ok(modified)
    }

    /// Remove every matching object, keeping survivors in order.
    pub fn delete_objects_by_filter(&mut self, filter: &Filter) -> Result<Vec<Object>> {
        if !self.objects.iter().any(|o| filter.matches(o)) {
            return Err(self.no_match());
        }
        let (removed, kept): (Vec<Object>, Vec<Object>) = std::mem::take(&mut self.objects)
            .into_iter()
            .partition(|o| filter.matches(o));
        self.objects = kept;
        Ok(removed)
    }

    /// Repair the counter after decoding and reject duplicate ids.
    pub(crate) fn restore_counter(&mut self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.objects.len());
        for object in &self.objects {
            if !seen.insert(object.id) {
                return Err(Error::new(
                    ErrorKind::Parse,
                    format!("document {} has duplicate object id {}", self.name, object.id),
                ));
            }
            let after = object.id.checked_add(1).ok_or_else(|| {
                Error::new(
                    ErrorKind::Parse,
                    format!("document {} has object id {} with no successor", self.name, object.id),
                )
            })?;
            self.next_id = self.next_id.max(after);
        }
        Ok(())
    }

    pub(crate) fn rename(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn no_match(&self) -> Error {
        Error::new(
            ErrorKind::NoMatch,
            format!("no objects in document {} match the filter", self.name),
        )
    }
}
