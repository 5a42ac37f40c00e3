pub mod base;
pub mod beta;
pub mod event;
pub mod group_date;
pub mod matching;
pub mod message;
pub mod notification;
pub mod shared_profile;
pub mod user;

pub use base::BaseDao;
