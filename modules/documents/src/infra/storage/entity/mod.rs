//! SeaORM entities: `users` and `documents`.

pub mod document;
pub mod user;
