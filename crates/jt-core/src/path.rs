use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFragment {
    Key(String),
    Index(usize),
}

pub type Path = Vec<PathFragment>;

impl fmt::Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, ".{}", key),
            Self::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Renders a path the way error messages show it: `$`, `$.foo`, `$.foo[2].bar`.
pub fn stringify_path(path: &[PathFragment]) -> String {
    let mut out = String::from("$");
    for fragment in path {
        out.push_str(&fragment.to_string());
    }
    out
}
