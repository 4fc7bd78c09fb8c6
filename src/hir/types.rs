//! Type references as written by the parser and types as resolved.

use std::fmt;

use crate::base::Name;
use super::ids::DeclId;

/// A resolved type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Unit,
    Int,
    Bool,
    String,
    /// Instance of a class declaration.
    Class(DeclId),
    /// A type that could not be computed; the reason was already reported.
    Error,
}

impl Type {
    /// Look up a builtin type by its source name.
    pub fn builtin(name: &str) -> Option<Type> {
        match name {
            "Unit" => Some(Type::Unit),
            "Int" => Some(Type::Int),
            "Bool" => Some(Type::Bool),
            "String" => Some(Type::String),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// Whether a value of `other` may be used where `self` is expected.
    ///
    /// Error types are compatible with everything so one mistake is
    /// reported once.
    pub fn accepts(&self, other: &Type) -> bool {
        self.is_error() || other.is_error() || self == other
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unit => f.write_str("Unit"),
            Type::Int => f.write_str("Int"),
            Type::Bool => f.write_str("Bool"),
            Type::String => f.write_str("String"),
            Type::Class(id) => write!(f, "class {id}"),
            Type::Error => f.write_str("<error>"),
        }
    }
}

/// A type position in a declaration.
///
/// Starts as [`TypeRef::Implicit`] (nothing written, inferred at body
/// phase) or [`TypeRef::Unresolved`] (a dotted name written in source,
/// resolved at signature phase), and ends as [`TypeRef::Resolved`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRef {
    Implicit,
    Unresolved(Vec<Name>),
    Resolved(Type),
}

impl TypeRef {
    pub fn is_resolved(&self) -> bool {
        matches!(self, TypeRef::Resolved(_))
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, TypeRef::Implicit)
    }

    pub fn resolved(&self) -> Option<&Type> {
        match self {
            TypeRef::Resolved(ty) => Some(ty),
            _ => None,
        }
    }

    /// The written path, when the reference is still unresolved.
    pub fn path(&self) -> Option<&[Name]> {
        match self {
            TypeRef::Unresolved(path) => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(Type::builtin("Int"), Some(Type::Int));
        assert_eq!(Type::builtin("Shape"), None);
    }

    #[test]
    fn test_error_type_accepts_anything() {
        assert!(Type::Int.accepts(&Type::Int));
        assert!(!Type::Int.accepts(&Type::Bool));
        assert!(Type::Error.accepts(&Type::Bool));
        assert!(Type::String.accepts(&Type::Error));
    }

    #[test]
    fn test_type_ref_states() {
        assert!(TypeRef::Implicit.is_implicit());
        assert!(!TypeRef::Implicit.is_resolved());
        assert_eq!(TypeRef::Resolved(Type::Unit).resolved(), Some(&Type::Unit));
        assert!(TypeRef::Unresolved(Vec::new()).path().is_some());
    }
}
