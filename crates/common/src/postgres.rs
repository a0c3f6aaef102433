mod client;
mod config;
mod identity_store;
mod last_user_repository;
mod schema;

pub use client::*;
pub use config::*;
pub use identity_store::*;
pub use last_user_repository::*;
pub use schema::*;
