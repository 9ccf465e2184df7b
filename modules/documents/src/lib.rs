//! Users and their uploaded documents (resumes, job descriptions).
//!
//! Storage model, schema bootstrap and repository functions. Callers open a
//! [`db::Session`] per unit of work and pass `session.conn()` to the
//! functions in [`repo`].

pub mod domain;
pub mod infra;
pub mod schema;

pub use domain::{DocumentType, DomainError, UnknownDocumentType};
pub use infra::storage::entity::{document, user};
pub use infra::storage::repo;
pub use schema::init_schema;
