//! Foundation types for the stratum resolution engine.
//!
//! This module provides the primitives every other layer shares:
//! - [`FileId`] - Handle of a file in the module graph
//! - [`Name`], [`Interner`] - Interned declaration and package names
//! - [`TextRange`], [`TextSize`] - Source locations carried by declarations
//!
//! This module has NO dependencies on other stratum modules.

mod file_id;
mod intern;

pub use file_id::FileId;
pub use intern::{Interner, Name};

// Re-export text-size types for convenience
pub use text_size::{TextRange, TextSize};
