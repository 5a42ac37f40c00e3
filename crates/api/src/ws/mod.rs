pub mod chat;
pub mod dispatcher;
pub mod handler;
pub mod rooms;
pub mod sink;
pub mod storage;
