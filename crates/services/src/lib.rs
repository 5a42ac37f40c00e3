pub mod activity;
pub mod auth;
pub mod cache;
pub mod dao;
pub mod icebreaker;
pub mod notify;
pub mod validation;

pub use auth::AuthService;
pub use cache::UserCache;
pub use dao::*;
pub use icebreaker::IcebreakerService;
pub use notify::NotificationService;
