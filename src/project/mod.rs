//! Compiling files once resolution is done.
//!
//! [`CompilerFacility`] resolves a file together with the files it depends
//! on and hands the result to code generation only when no blocking
//! diagnostic was reported.

mod compiler;

pub use compiler::{CompilationResult, CompilerFacility, GenerationInput};
