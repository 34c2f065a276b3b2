//! Place data sources

pub mod csv_source;
pub mod memory;

pub use csv_source::{load_places, read_places};
pub use memory::{MemoryBackend, MemoryBackendConfig};
