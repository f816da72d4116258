//! Serialization of combined pixels.
pub mod parquet_writer;
