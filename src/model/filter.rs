use crate::core::types::Fields;
use crate::model::object::Object;

/// Keys that address the object id instead of a field.
pub const ID_KEYS: [&str; 2] = ["id", "_id"];

/// Equality filter over objects.
///
/// Each alternative is a conjunction of `field == value` tests; an object
/// matches when any alternative does. No alternatives, or an empty one,
/// matches every object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    alternatives: Vec<Fields>,
}

impl Filter {
    pub fn all() -> Self {
        Filter::default()
    }

    pub fn any_of(alternatives: Vec<Fields>) -> Self {
        Filter { alternatives }
    }

    pub fn by_id(id: u64) -> Self {
        let mut conjunction = Fields::new();
        conjunction.insert("id".to_string(), (id as i64).into());
        Filter::from(conjunction)
    }

    pub fn alternatives(&self) -> &[Fields] {
        &self.alternatives
    }

    pub fn matches(&self, object: &Object) -> bool {
        if self.alternatives.is_empty() {
            return true;
        }
        self.alternatives
            .iter()
            .any(|conjunction| conjunction_matches(conjunction, object))
    }
}

impl From<Fields> for Filter {
    fn from(conjunction: Fields) -> Self {
        Filter { alternatives: vec![conjunction] }
    }
}

fn conjunction_matches(conjunction: &Fields, object: &Object) -> bool {
    conjunction.iter().all(|(key, expected)| {
        if ID_KEYS.contains(&key.as_str()) {
            return expected.as_object_id() == Some(object.id);
        }
        match object.fields.get(key) {
            Some(actual) => actual.matches(expected),
            None => false,
        }
    })
}
