mod interpolation;

pub use interpolation::{has_interpolation, parse, Literal, ParseError, ParseHooks};
