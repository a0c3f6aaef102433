mod batch_writer;
mod identity_cache;
mod transformer;

pub use batch_writer::*;
pub use identity_cache::*;
pub use transformer::*;
