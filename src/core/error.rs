use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyExists,
    InvalidName,
    NotFound,
    FieldNotIndexed,
    ValueNotFound,
    NoResults,
    NoMatch,
    NoSelection,
    MalformedQuery,
    Syntax,
    Io,
    Parse,
    InvalidState,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn already_exists(what: &str, name: &str) -> Self {
        Error::new(ErrorKind::AlreadyExists, format!("{} {} already exists", what, name))
    }

    pub fn not_found(what: &str, name: &str) -> Self {
        Error::new(ErrorKind::NotFound, format!("{} {} not found", what, name))
    }

    pub fn no_selection(what: &str) -> Self {
        Error::new(ErrorKind::NoSelection, format!("no {} selected", what))
    }

    /// Parser failure: what the grammar wanted versus what the lexer produced.
    pub fn syntax(expected: &str, found: &str, offset: usize) -> Self {
        Error::new(
            ErrorKind::Syntax,
            format!("expected {}, found {} at offset {}", expected, found, offset),
        )
    }

    /// True for every flavour of "nothing there", including the find failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::NotFound
                | ErrorKind::FieldNotIndexed
                | ErrorKind::ValueNotFound
                | ErrorKind::NoResults
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: format!("JSON error: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
