pub mod columns;
pub mod frame;
pub mod records;

pub use records::*;
