pub mod object;
pub mod filter;
pub mod document;
pub mod collection;
pub mod database;

pub use collection::Collection;
pub use database::Database;
pub use document::Document;
pub use filter::Filter;
pub use object::Object;
