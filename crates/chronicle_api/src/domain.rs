mod error;
mod last_user_service;
mod stats;
mod submission_service;

pub use error::*;
pub use last_user_service::*;
pub use stats::*;
pub use submission_service::*;
