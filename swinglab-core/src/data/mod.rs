//! Bar table ingest and schema validation.

pub mod ingest;
pub mod schema;

pub use ingest::{bars_to_frame, frame_to_bars, read_bars, read_frame, IngestError};
pub use schema::{BarSchema, SchemaError};
