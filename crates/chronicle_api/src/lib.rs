pub mod chronicle_api;
pub mod domain;
pub mod http;

pub use chronicle_api::*;
pub use domain::*;
pub use http::*;
