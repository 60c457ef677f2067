pub mod blob;
pub mod naming;

pub use blob::*;
pub use naming::*;
