mod error;
mod handlers;
mod logging;
mod server;

pub use error::*;
pub use handlers::*;
pub use logging::*;
pub use server::*;
