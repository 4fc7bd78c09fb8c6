//! IDE-facing queries over a resolution session.
//!
//! Pure functions over the declaration tree and the towers recorded while
//! resolving. They use the engine's own types; conversion to editor
//! protocol types happens at the caller's boundary.

mod containing;

pub use containing::{
    containing_class, containing_declaration, containing_file, declaration_at, visible_names,
};
