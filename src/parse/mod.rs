//! Plain-text readers and writers for tracer catalogs and filament spines.

pub mod ascii;

pub use ascii::{ParseError, ParseResult};
