pub mod diagnostics;
pub mod summary;

pub use diagnostics::*;
pub use summary::*;
