pub mod beta;
pub mod event;
pub mod geo;
pub mod group_date;
pub mod matches;
pub mod message;
pub mod notification;
pub mod shared_profile;
pub mod swipe;
pub mod user;

pub use beta::*;
pub use event::*;
pub use geo::*;
pub use group_date::*;
pub use matches::*;
pub use message::*;
pub use notification::*;
pub use shared_profile::*;
pub use swipe::*;
pub use user::*;
