//! Common utilities for mapzip.
//!
//! This crate provides the building blocks shared by the archive engine:
//!
//! - [`BinaryReader`] - Zero-copy little-endian reading from byte slices
//! - [`hash`] - xxHash3 (64-bit) hashing of paths and streamed content
//! - [`maps`] - Fixed-capacity open-addressing maps built once from key/value arrays

mod error;
mod reader;

pub mod hash;
pub mod maps;

pub use error::{Error, Result};
pub use maps::{IntIntMap, LongLongMap, OpenAddressingMap};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
