pub mod memory_sink;
pub mod output_writer;
pub mod postgres_sink;
pub mod sink;

pub use memory_sink::MemorySink;
pub use output_writer::OutputWriter;
pub use postgres_sink::PostgresSink;
pub use sink::*;
