//! I/O utilities for streaming archives into sinks.

pub mod sink_writer;

pub use sink_writer::SinkTally;
pub use sink_writer::SinkWriter;
