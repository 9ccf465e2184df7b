pub mod document_type;
pub mod error;

pub use document_type::{DocumentType, UnknownDocumentType};
pub use error::DomainError;
