use std::fmt;
use crate::core::types::{Fields, Value};

/// Level of the hierarchy a structural command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Database,
    Collection,
    Document,
}

impl Target {
    /// Accepts the singular, plural and short spellings.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "db" | "dbs" | "database" | "databases" => Some(Target::Database),
            "collection" | "collections" => Some(Target::Collection),
            "document" | "documents" => Some(Target::Document),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Target::Database => "db",
            Target::Collection => "collection",
            Target::Document => "document",
        }
    }
}

/// Parsed query-language command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List(Target),
    SelectDatabase(String),
    SelectCollection(String),
    /// `select * from <document>`
    SelectAll { document: String },
    Create { target: Target, name: String },
    Delete { target: Target, name: String },
    /// `delete {filter} in document <name>`
    DeleteObjects { filter: Vec<Fields>, document: String },
    /// `insert props [for filter] in document <name>`
    Insert { objects: Vec<Fields>, filter: Option<Vec<Fields>>, document: String },
    Modify { patch: Vec<Fields>, filter: Vec<Fields>, document: String },
    /// Raw `field:value` queries plus the collection allow-set.
    Find { queries: Vec<String>, collections: Vec<String> },
    Import { path: String },
    Export { target: String, path: String },
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::List(_) => "list",
            Command::SelectDatabase(_) | Command::SelectCollection(_) | Command::SelectAll { .. } => "select",
            Command::Create { .. } => "create",
            Command::Delete { .. } | Command::DeleteObjects { .. } => "delete",
            Command::Insert { .. } => "insert",
            Command::Modify { .. } => "modify",
            Command::Find { .. } => "find",
            Command::Import { .. } => "import",
            Command::Export { .. } => "export",
        }
    }
}

/// Renders query text that parses back to the same command.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Command::List(target) => write!(f, "list {}", target.keyword()),
            Command::SelectDatabase(name) => write!(f, "select db {}", name),
            Command::SelectCollection(name) => write!(f, "select collection {}", name),
            Command::SelectAll { document } => write!(f, "select * from {}", document),
            Command::Create { target, name } => write!(f, "create {} {}", target.keyword(), name),
            Command::Delete { target, name } => write!(f, "delete {} {}", target.keyword(), name),
            Command::DeleteObjects { filter, document } => {
                write!(f, "delete {} in document {}", Props(filter), document)
            }
            Command::Insert { objects, filter, document } => {
                write!(f, "insert {}", Props(objects))?;
                if let Some(filter) = filter {
                    write!(f, " for {}", Props(filter))?;
                }
                write!(f, " in document {}", document)
            }
            Command::Modify { patch, filter, document } => {
                write!(f, "modify {} for {} in document {}", Props(patch), Props(filter), document)
            }
            Command::Find { queries, collections } => {
                f.write_str("find")?;
                for query in queries {
                    write!(f, " \"{}\"", query)?;
                }
                if let Some((first, rest)) = collections.split_first() {
                    write!(f, " in {}", first)?;
                    for name in rest {
                        write!(f, " {}", name)?;
                    }
                }
                Ok(())
            }
            Command::Import { path } => write!(f, "import \"{}\"", path),
            Command::Export { target, path } => write!(f, "export {} \"{}\"", target, path),
        }
    }
}

struct Props<'a>(&'a [Fields]);

impl fmt::Display for Props<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let list = self.0.len() != 1;
        if list {
            f.write_str("[")?;
        }
        for (i, object) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str("{")?;
            for (j, (key, value)) in object.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "\"{}\": {}", key, Literal(value))?;
            }
            f.write_str("}")?;
        }
        if list {
            f.write_str("]")?;
        }
        Ok(())
    }
}

struct Literal<'a>(&'a Value);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            // Plain decimal with a point, so the literal re-lexes as a float.
            Value::Float(x) => {
                let digits = x.to_string();
                if digits.contains('.') {
                    f.write_str(&digits)
                } else {
                    write!(f, "{}.0", digits)
                }
            }
            Value::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}
