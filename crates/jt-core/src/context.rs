use std::rc::Rc;

use serde_json::Value;

use crate::path::{stringify_path, Path, PathFragment};

static MISSING: Value = Value::Null;

/// Where a template fragment sits inside its parent.
#[derive(Debug, Clone)]
pub enum Location {
    Root,
    ObjectKey {
        key: String,
        parent: Rc<CompilationContext>,
    },
    ArrayIndex {
        index: usize,
        parent: Rc<CompilationContext>,
    },
}

#[derive(Debug)]
enum Source {
    Owned(Rc<Value>),
    Inherited,
}

/// A template fragment plus the parent chain used to rebuild its path.
///
/// Child contexts do not copy their fragment: they look it up through the
/// parent chain, so building a context per node costs one small allocation.
#[derive(Debug)]
pub struct CompilationContext {
    source: Source,
    location: Location,
    literal_strings: bool,
}

impl CompilationContext {
    pub fn root(template: Value) -> Rc<Self> {
        Self::from_shared(Rc::new(template))
    }

    pub fn from_shared(template: Rc<Value>) -> Rc<Self> {
        Rc::new(Self {
            source: Source::Owned(template),
            location: Location::Root,
            literal_strings: false,
        })
    }

    /// Context for a fragment produced by parsing the string at `origin`.
    ///
    /// It reports `origin`'s path, and strings inside it are literals that
    /// are never parsed again.
    pub fn interpolated(origin: &Rc<Self>, template: Value) -> Rc<Self> {
        Rc::new(Self {
            source: Source::Owned(Rc::new(template)),
            location: origin.location.clone(),
            literal_strings: true,
        })
    }

    pub fn key(self: &Rc<Self>, key: &str) -> Option<Rc<Self>> {
        self.template().as_object()?.get(key)?;
        Some(Rc::new(Self {
            source: Source::Inherited,
            location: Location::ObjectKey {
                key: key.to_string(),
                parent: Rc::clone(self),
            },
            literal_strings: self.literal_strings,
        }))
    }

    pub fn index(self: &Rc<Self>, index: usize) -> Option<Rc<Self>> {
        self.template().as_array()?.get(index)?;
        Some(Rc::new(Self {
            source: Source::Inherited,
            location: Location::ArrayIndex {
                index,
                parent: Rc::clone(self),
            },
            literal_strings: self.literal_strings,
        }))
    }

    pub fn template(&self) -> &Value {
        let found = match (&self.source, &self.location) {
            (Source::Owned(template), _) => Some(template.as_ref()),
            (Source::Inherited, Location::ObjectKey { key, parent }) => {
                parent.template().as_object().and_then(|object| object.get(key))
            }
            (Source::Inherited, Location::ArrayIndex { index, parent }) => {
                parent.template().as_array().and_then(|items| items.get(*index))
            }
            (Source::Inherited, Location::Root) => None,
        };
        found.unwrap_or(&MISSING)
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn parent(&self) -> Option<&Rc<Self>> {
        match &self.location {
            Location::Root => None,
            Location::ObjectKey { parent, .. } | Location::ArrayIndex { parent, .. } => {
                Some(parent)
            }
        }
    }

    /// The object key this fragment was read from, if any.
    pub fn key_name(&self) -> Option<&str> {
        match &self.location {
            Location::ObjectKey { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn is_literal_strings(&self) -> bool {
        self.literal_strings
    }

    pub fn path(&self) -> Path {
        let mut path = Vec::new();
        let mut location = &self.location;
        loop {
            match location {
                Location::Root => break,
                Location::ObjectKey { key, parent } => {
                    path.push(PathFragment::Key(key.clone()));
                    location = &parent.location;
                }
                Location::ArrayIndex { index, parent } => {
                    path.push(PathFragment::Index(*index));
                    location = &parent.location;
                }
            }
        }
        path.reverse();
        path
    }

    pub fn path_string(&self) -> String {
        stringify_path(&self.path())
    }
}
