pub mod memory;
pub mod rest;
pub mod traits;

pub use memory::MemoryStore;
pub use rest::RestDocumentStore;
pub use traits::{doctype, field_string, DocumentStore, FieldMap};
