pub use sea_orm_migration::prelude::*;

pub mod m0001_create_users;
pub mod m0002_create_documents;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m0001_create_users::Migration),
            Box::new(m0002_create_documents::Migration),
        ]
    }
}
