pub mod chat;
pub mod credential;
pub mod plan;
pub mod session;
