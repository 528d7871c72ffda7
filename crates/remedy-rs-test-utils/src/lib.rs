//! Test helpers shared across Remedy crates.

pub mod fixtures;
pub mod generator;
pub mod reader;
pub mod sink;

pub use fixtures::{prescription, prescription_image};
pub use generator::{FailingGenerator, FixedGenerator, RecordingGenerator};
pub use reader::{FailingReader, FixedReader};
pub use sink::{FailingSink, RecordingSink, SchemaSink};
