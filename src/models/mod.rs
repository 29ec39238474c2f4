pub mod auth;
pub mod job;
pub mod message;
pub mod profile;
pub mod social;
