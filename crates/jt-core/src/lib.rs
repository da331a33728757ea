pub mod context;
pub mod error;
pub mod path;
pub mod value;

pub use context::{CompilationContext, Location};
pub use error::{ErrorLog, ErrorMode, TemplateError};
pub use path::{stringify_path, Path, PathFragment};
pub use value::*;
