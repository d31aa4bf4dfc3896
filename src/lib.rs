pub mod core;
pub mod model;
pub mod index;
pub mod query;
pub mod storage;

pub use crate::core::catalog::{Catalog, Match};
pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{fields, Fields, ObjectId, Value};
pub use crate::model::{Collection, Database, Document, Filter, Object};
pub use crate::query::interpreter::{Interpreter, Outcome, Session};

/*
┌──────────────────────────────────── MACHDB LAYOUT ─────────────────────────────────────┐
│                                                                                         │
│  query line ──► Lexer ──► Parser ──► Command ──► Interpreter (Session: db, collection)  │
│                                                        │                                │
│                                                        ▼                                │
│  ┌──────────────────────────── struct Catalog ─────────────────────────────────────┐   │
│  │ RwLock<CatalogState>                                                            │   │
│  │   databases: BTreeMap<String, Database>                                        │   │
│  │       Database ─► Collection ─► Document { Name, Objects, NextId } ─► Object   │   │
│  │   index: InvertedIndex                                                          │   │
│  │       field ─► canonical value ─► [ObjectRef { db, collection, document, id }] │   │
│  └─────────────────────────────────────────────────────────────────────────────────┘   │
│                              │                          │                               │
│                              ▼                          ▼                               │
│   storage::persist   <base>/<db>/<collection>/<document>.json  (tmp + rename)          │
│   storage::exchange  export/import bundles { version, exported_at, payload }           │
│   storage::file_lock <base>/.lock held while the catalog is open                       │
└─────────────────────────────────────────────────────────────────────────────────────────┘
*/
