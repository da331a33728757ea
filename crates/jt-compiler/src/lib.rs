//! Turns JSON templates into [`CompiledNode`] trees.
//!
//! The [`Compiler`] walks a template once. Call-shaped objects are handed to
//! the matching [`MethodDefinition`], which receives the compiler back as a
//! [`MethodCompiler`] to compile its own arguments. Unknown call names become
//! calls to functions found in scope at run time.

mod compiler;
mod hooks;
pub mod methods;

pub use compiler::{Compiler, CompilerConfig, DEFAULT_ARGS_PREFIX, DEFAULT_ARGV_PREFIX};
pub use jt_runtime::{CompiledIterator, CompiledNode, Validator};
pub use methods::{MethodCompiler, MethodDefinition, MethodRegistry};

#[cfg(test)]
mod tests;
