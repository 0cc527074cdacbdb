pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_and_roles;
mod m20240101_000002_create_content_tables;
mod m20240101_000003_create_activity_log;
mod m20240215_000001_add_users_email_live_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_and_roles::Migration),
            Box::new(m20240101_000002_create_content_tables::Migration),
            Box::new(m20240101_000003_create_activity_log::Migration),
            Box::new(m20240215_000001_add_users_email_live_index::Migration),
        ]
    }
}
