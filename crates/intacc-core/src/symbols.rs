//! Kinds of user-defined types the front-end recognizes.

use std::fmt;

use num_enum::TryFromPrimitive;

/// The kind of a user-defined type declaration.
///
/// Discriminants are part of the binary module format; the metadata reader
/// decodes them with `TryFromPrimitive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum TypeKind {
    Class = 0,
    Struct = 1,
    Interface = 2,
    Enum = 3,
    Delegate = 4,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Delegate => "delegate",
        };
        write!(f, "{text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_from_tag_byte() {
        assert_eq!(TypeKind::try_from(2u8), Ok(TypeKind::Interface));
        assert!(TypeKind::try_from(7u8).is_err());
    }
}
