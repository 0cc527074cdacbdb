//! Persistence model of the CMS: SeaORM entities for users, their roles and
//! the content they own, plus the behaviour that belongs to a user record
//! (locale/timezone resolution, avatar URLs, role predicates, change tracking).

pub mod activity;
pub mod entities;
pub mod password;
pub mod settings;

// Re-export tracing for use in this crate
pub use tracing;
