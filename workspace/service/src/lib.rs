//! User lifecycle services layered on the `model` entities.
//!
//! Role lookups and activity logging are reached through the [`RoleService`]
//! and [`ActivityLogService`] traits so callers hold explicit handles to them;
//! [`UserService`] composes both with the database connection.

pub mod activity;
pub mod auth;
pub mod error;
pub mod roles;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

pub use activity::{ActivityLogService, DbActivityLog, PendingActivity};
pub use auth::AuthService;
pub use error::{Result, ServiceError};
pub use roles::{DbRoleService, RoleService};
pub use users::{OwnedContent, TrashedFilter, UserFilter, UserService};
