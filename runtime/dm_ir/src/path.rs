//! Type paths.
//!
//! A [`TypePath`] is a sequence of name elements with an absolute/relative
//! flag: `/mob/living` is absolute, `living` is relative. Paths identify
//! types in the object tree and proc references (`/mob/proc/attack`).

use std::fmt;

/// Error when parsing a textual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path had no elements at all (empty string).
    Empty,
    /// An element between separators was empty (`/mob//living`).
    EmptyElement { position: usize },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "empty type path"),
            PathError::EmptyElement { position } => {
                write!(f, "empty element at position {position} in type path")
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A typed sequence of name elements with an absolute/relative flag.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypePath {
    absolute: bool,
    elements: Vec<String>,
}

impl TypePath {
    /// The tree root, `/`.
    pub fn root() -> Self {
        TypePath {
            absolute: true,
            elements: Vec::new(),
        }
    }

    /// Build an absolute path from elements.
    pub fn absolute(elements: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TypePath {
            absolute: true,
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a relative path from elements.
    pub fn relative(elements: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TypePath {
            absolute: false,
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a textual path. A leading `/` marks the path absolute.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        let (absolute, rest) = match text.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if rest.is_empty() {
            return if absolute {
                Ok(TypePath::root())
            } else {
                Err(PathError::Empty)
            };
        }
        let mut elements = Vec::new();
        for (position, element) in rest.split('/').enumerate() {
            if element.is_empty() {
                return Err(PathError::EmptyElement { position });
            }
            elements.push(element.to_string());
        }
        Ok(TypePath { absolute, elements })
    }

    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    #[inline]
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Final element, if any.
    pub fn last(&self) -> Option<&str> {
        self.elements.last().map(String::as_str)
    }

    /// Path with `name` appended.
    pub fn child(&self, name: impl Into<String>) -> TypePath {
        let mut elements = self.elements.clone();
        elements.push(name.into());
        TypePath {
            absolute: self.absolute,
            elements,
        }
    }

    /// Path with the final element removed. The root has no parent.
    pub fn parent(&self) -> Option<TypePath> {
        if self.elements.is_empty() {
            return None;
        }
        Some(TypePath {
            absolute: self.absolute,
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// Whether `self` is `ancestor` or lies beneath it in the tree.
    pub fn is_within(&self, ancestor: &TypePath) -> bool {
        self.elements.len() >= ancestor.elements.len()
            && self.elements[..ancestor.elements.len()] == ancestor.elements[..]
    }

    /// The relative sub-path after the first element equal to `marker`.
    ///
    /// Used to split proc references: `/mob/proc/attack` yields `attack`
    /// for marker `"proc"`. Returns `None` when the marker is absent.
    pub fn sub_path_after(&self, marker: &str) -> Option<TypePath> {
        let at = self.elements.iter().position(|e| e == marker)?;
        Some(TypePath {
            absolute: false,
            elements: self.elements[at + 1..].to_vec(),
        })
    }

    /// The prefix before the first element equal to `marker`.
    ///
    /// The counterpart of [`sub_path_after`](Self::sub_path_after):
    /// `/mob/proc/attack` yields `/mob` for marker `"proc"`.
    pub fn prefix_before(&self, marker: &str) -> Option<TypePath> {
        let at = self.elements.iter().position(|e| e == marker)?;
        Some(TypePath {
            absolute: self.absolute,
            elements: self.elements[..at].to_vec(),
        })
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "/")?;
        }
        let mut first = true;
        for element in &self.elements {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{element}")?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypePath({self})")
    }
}
