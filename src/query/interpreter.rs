use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use crate::core::catalog::{Catalog, Match};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::TreeStats;
use crate::core::types::{Fields, ObjectId};
use crate::model::{Filter, Object};
use crate::query::ast::{Command, Target};
use crate::query::parser::Parser;
use crate::storage::exchange::{self, Bundle, Payload};
use crate::storage::persist::FlushReport;

/// Per-connection selection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    database: Option<String>,
    collection: Option<String>,
}

impl Session {
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    fn require_database(&self) -> Result<&str> {
        self.database().ok_or_else(|| Error::no_selection("database"))
    }

    fn require_collection(&self) -> Result<(&str, &str)> {
        let db = self.require_database()?;
        let collection = self.collection().ok_or_else(|| Error::no_selection("collection"))?;
        Ok((db, collection))
    }

    fn select_database(&mut self, name: &str) {
        self.database = Some(name.to_string());
        self.collection = None;
    }

    fn clear(&mut self) {
        self.database = None;
        self.collection = None;
    }
}

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Names(Vec<String>),
    Selected { target: Target, name: String },
    Created { target: Target, name: String },
    Deleted { target: Target, name: String },
    Inserted(Vec<ObjectId>),
    Modified(usize),
    Removed(usize),
    Objects(Vec<Object>),
    Matches(Vec<Match>),
    Imported(TreeStats),
    Exported(PathBuf),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Names(names) if names.is_empty() => f.write_str("(none)"),
            Outcome::Names(names) => f.write_str(&names.join("\n")),
            Outcome::Selected { target, name } => write!(f, "using {} {}", target.keyword(), name),
            Outcome::Created { target, name } => write!(f, "created {} {}", target.keyword(), name),
            Outcome::Deleted { target, name } => write!(f, "deleted {} {}", target.keyword(), name),
            Outcome::Inserted(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "inserted id {}", ids.join(", "))
            }
            Outcome::Modified(count) => write!(f, "modified {} object(s)", count),
            Outcome::Removed(count) => write!(f, "deleted {} object(s)", count),
            Outcome::Objects(objects) if objects.is_empty() => f.write_str("(empty)"),
            Outcome::Objects(objects) => {
                for (i, object) in objects.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write_object(f, object)?;
                }
                Ok(())
            }
            Outcome::Matches(matches) => {
                for (i, found) in matches.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{} ", found.reference)?;
                    write_fields(f, &found.object.fields)?;
                }
                Ok(())
            }
            Outcome::Imported(stats) => write!(
                f,
                "imported {} collection(s), {} document(s), {} object(s)",
                stats.collections, stats.documents, stats.objects
            ),
            Outcome::Exported(path) => write!(f, "exported to {}", path.display()),
        }
    }
}

fn write_object(f: &mut fmt::Formatter, object: &Object) -> fmt::Result {
    write!(f, "#{} ", object.id)?;
    write_fields(f, &object.fields)
}

fn write_fields(f: &mut fmt::Formatter, fields: &Fields) -> fmt::Result {
    let json = serde_json::to_string(fields).map_err(|_| fmt::Error)?;
    f.write_str(&json)
}

// Field names in query text fold to lowercase like identifiers; the value
// part stays verbatim.
fn fold_field(query: &str) -> String {
    match query.split_once(':') {
        Some((field, value)) => format!("{}:{}", field.to_lowercase(), value),
        None => query.to_string(),
    }
}

/// Executes commands against a shared catalog on behalf of one session.
pub struct Interpreter {
    catalog: Arc<Catalog>,
    session: Session,
}

impl Interpreter {
    /// Open (or create) the store at `config.storage_path`.
    pub fn open(config: Config) -> Result<Self> {
        Ok(Interpreter::with_catalog(Arc::new(Catalog::open(config)?)))
    }

    /// A fresh session over an existing catalog.
    pub fn with_catalog(catalog: Arc<Catalog>) -> Self {
        Interpreter {
            catalog,
            session: Session::default(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Lex, parse and execute one line.
    pub fn run(&mut self, line: &str) -> Result<Outcome> {
        let command = Parser::parse(line)?;
        self.execute(&command)
    }

    /// Flush the whole catalog; called by the shell on exit.
    pub fn save(&self) -> Result<FlushReport> {
        self.catalog.flush_to_disk()
    }

    pub fn execute(&mut self, command: &Command) -> Result<Outcome> {
        debug!(
            verb = command.verb(),
            db = self.session.database(),
            collection = self.session.collection(),
            "Executing command"
        );

        match command {
            Command::List(target) => self.list(*target),
            Command::SelectDatabase(name) => {
                if !self.catalog.list_databases().contains(name) {
                    return Err(Error::not_found("database", name));
                }
                self.session.select_database(name);
                Ok(Outcome::Selected { target: Target::Database, name: name.clone() })
            }
            Command::SelectCollection(name) => {
                let db = self.session.require_database()?;
                if !self.catalog.list_collections(db)?.contains(name) {
                    return Err(Error::not_found("collection", name));
                }
                self.session.collection = Some(name.clone());
                Ok(Outcome::Selected { target: Target::Collection, name: name.clone() })
            }
            Command::SelectAll { document } => {
                let (db, collection) = self.session.require_collection()?;
                Ok(Outcome::Objects(self.catalog.objects(db, collection, document)?))
            }
            Command::Create { target, name } => {
                self.create(*target, name)?;
                Ok(Outcome::Created { target: *target, name: name.clone() })
            }
            Command::Delete { target, name } => {
                self.delete(*target, name)?;
                Ok(Outcome::Deleted { target: *target, name: name.clone() })
            }
            Command::DeleteObjects { filter, document } => {
                let (db, collection) = self.session.require_collection()?;
                let filter = Filter::any_of(filter.clone());
                Ok(Outcome::Removed(self.catalog.delete_objects(db, collection, document, &filter)?))
            }
            Command::Insert { objects, filter: None, document } => {
                let (db, collection) = self.session.require_collection()?;
                let ids = self.catalog.insert_objects(db, collection, document, objects.clone())?;
                Ok(Outcome::Inserted(ids))
            }
            Command::Insert { objects, filter: Some(filter), document } => self.modify(objects, filter, document),
            Command::Modify { patch, filter, document } => self.modify(patch, filter, document),
            Command::Find { queries, collections } => self.find(queries, collections),
            Command::Import { path } => Ok(Outcome::Imported(self.import_from(Path::new(path))?)),
            Command::Export { target, path } => {
                let path = PathBuf::from(path);
                self.export_to(target, &path)?;
                Ok(Outcome::Exported(path))
            }
        }
    }

    fn list(&self, target: Target) -> Result<Outcome> {
        let names = match target {
            Target::Database => self.catalog.list_databases(),
            Target::Collection => self.catalog.list_collections(self.session.require_database()?)?,
            Target::Document => {
                let (db, collection) = self.session.require_collection()?;
                self.catalog.list_documents(db, collection)?
            }
        };
        Ok(Outcome::Names(names))
    }

    fn create(&self, target: Target, name: &str) -> Result<()> {
        match target {
            Target::Database => self.catalog.create_database(name),
            Target::Collection => self.catalog.create_collection(self.session.require_database()?, name),
            Target::Document => {
                let (db, collection) = self.session.require_collection()?;
                self.catalog.create_document(db, collection, name)
            }
        }
    }

    // Deleting the selected database or collection drops it from the session.
    fn delete(&mut self, target: Target, name: &str) -> Result<()> {
        match target {
            Target::Database => {
                self.catalog.delete_database(name)?;
                if self.session.database() == Some(name) {
                    self.session.clear();
                }
            }
            Target::Collection => {
                self.catalog.delete_collection(self.session.require_database()?, name)?;
                if self.session.collection() == Some(name) {
                    self.session.collection = None;
                }
            }
            Target::Document => {
                let (db, collection) = self.session.require_collection()?;
                self.catalog.delete_document(db, collection, name)?;
            }
        }
        Ok(())
    }

    /// Merge every patch object (later keys win) into the objects any
    /// filter alternative selects.
    fn modify(&self, patch: &[Fields], filter: &[Fields], document: &str) -> Result<Outcome> {
        let (db, collection) = self.session.require_collection()?;
        let merged: Fields = patch.iter().flat_map(|p| p.clone()).collect();
        let filter = Filter::any_of(filter.to_vec());
        let count = self.catalog.modify_objects(db, collection, document, &filter, &merged)?;
        Ok(Outcome::Modified(count))
    }

    /// Every query must hold; results are the objects common to all of them.
    fn find(&self, queries: &[String], collections: &[String]) -> Result<Outcome> {
        let db = self.session.require_database()?;
        let Some((first, rest)) = queries.split_first() else {
            return Err(Error::new(
                ErrorKind::MalformedQuery,
                "find needs at least one field:value query".to_string(),
            ));
        };

        let mut matches = self.catalog.find_by_query(&fold_field(first), db, collections)?;
        for query in rest {
            let next = self.catalog.find_by_query(&fold_field(query), db, collections)?;
            matches.retain(|m| next.iter().any(|n| n.reference == m.reference));
        }
        if matches.is_empty() {
            return Err(Error::new(
                ErrorKind::NoResults,
                format!("no object satisfies all of {:?} in database {}", queries, db),
            ));
        }
        Ok(Outcome::Matches(matches))
    }

    /// Read a bundle and attach its entity at the level its kind implies.
    pub fn import_from(&self, path: &Path) -> Result<TreeStats> {
        let bundle = exchange::import_from(path)?;
        let stats = match bundle.payload {
            Payload::Database(db) => self.catalog.attach_database(db)?,
            Payload::Collection(collection) => {
                self.catalog.attach_collection(self.session.require_database()?, collection)?
            }
            Payload::Document(document) => {
                let (db, collection) = self.session.require_collection()?;
                self.catalog.attach_document(db, collection, document)?
            }
        };
        info!(path = %path.display(), objects = stats.objects, "Imported bundle");
        Ok(stats)
    }

    /// `target` is `db`, `collection` or the name of a document in the
    /// selected collection.
    pub fn export_to(&self, target: &str, path: &Path) -> Result<()> {
        let payload = match Target::from_keyword(target) {
            Some(Target::Database) => {
                Payload::Database(self.catalog.database_snapshot(self.session.require_database()?)?)
            }
            Some(Target::Collection) => {
                let (db, collection) = self.session.require_collection()?;
                Payload::Collection(self.catalog.collection_snapshot(db, collection)?)
            }
            Some(Target::Document) | None => {
                let (db, collection) = self.session.require_collection()?;
                Payload::Document(self.catalog.document_snapshot(db, collection, target)?)
            }
        };
        exchange::export_to(path, &Bundle::new(payload))
    }
}
