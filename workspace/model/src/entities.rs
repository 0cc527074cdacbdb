//! Root of all SeaORM entity modules: users and their roles, the content
//! they own, and the activity log recording changes to them.

pub mod activity_log;
pub mod media;
pub mod page;
pub mod post;
pub mod role;
pub mod user;
pub mod user_role;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::activity_log::Entity as ActivityLog;
    pub use super::media::Entity as Media;
    pub use super::page::Entity as Page;
    pub use super::post::Entity as Post;
    pub use super::role::Entity as Role;
    pub use super::user::Entity as User;
    pub use super::user_role::Entity as UserRole;
}
