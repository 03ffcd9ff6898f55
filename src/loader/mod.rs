pub mod sheet_reader;
pub mod source_loader;
pub mod store_merger;

pub use sheet_reader::SheetReader;
pub use source_loader::*;
pub use store_merger::merge_frames;
