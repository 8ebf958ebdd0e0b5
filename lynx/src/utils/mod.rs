//! Utility functions and supporting infrastructure.
//!
//! Provides little-endian word reading and writing, the XOR checksum used
//! by digitizer packets, error types, and memory-mapped access to
//! extracted streams.

pub mod byteorder;
pub mod crc;
pub mod errors;
pub mod extracted;
pub mod word_reader;
