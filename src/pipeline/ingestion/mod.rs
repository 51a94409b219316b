// Pipeline ingestion: reading the raw claim-line extract into a text table

pub mod loader;

pub use loader::{load_raw_table, InputFingerprint, RawTable};
