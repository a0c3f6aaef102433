mod digest;
mod identity;
#[cfg(any(test, feature = "testing"))]
mod in_memory_identity_store;
mod identity_store;
mod last_user;
mod observation;
mod observation_sink;
mod pending_insert;
mod result;

pub use digest::*;
pub use identity::*;
#[cfg(any(test, feature = "testing"))]
pub use in_memory_identity_store::*;
pub use identity_store::*;
pub use last_user::*;
pub use observation::*;
pub use observation_sink::*;
pub use pending_insert::*;
pub use result::*;
