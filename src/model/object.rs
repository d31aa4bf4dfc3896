use serde::{Deserialize, Serialize};
use crate::core::types::{Fields, ObjectId, Value};

/// Field-value record stored in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    pub fields: Fields,
}

impl Object {
    pub(crate) fn new(id: ObjectId, fields: Fields) -> Self {
        Object { id, fields }
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Merge `patch` into the field map, overwriting on collision.
    pub(crate) fn apply(&mut self, patch: &Fields) {
        for (key, value) in patch {
            self.fields.insert(key.clone(), value.clone());
        }
    }
}
