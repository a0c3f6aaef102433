pub mod domain;
pub mod garde;
pub mod postgres;
pub mod telemetry;

pub use domain::*;
pub use postgres::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockLastUserRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockObservationSink;
