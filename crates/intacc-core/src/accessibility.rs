//! Declared accessibility of symbols.
//!
//! The whole point of this tool is to reason about accessibility, so the
//! enum carries the helpers the rewriter and analyzer need: narrower-than-
//! public classification and the effective accessibility of a nested
//! declaration.

use std::fmt;

use num_enum::TryFromPrimitive;

/// Declared accessibility of a type or member.
///
/// The discriminants are part of the binary module format and must not be
/// reordered; the metadata reader decodes them with `TryFromPrimitive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum Accessibility {
    Public = 0,
    Internal = 1,
    Protected = 2,
    /// `protected internal` (protected OR internal).
    ProtectedInternal = 3,
    /// `private protected` (protected AND internal, C# 7.2+).
    PrivateProtected = 4,
    Private = 5,
}

impl Accessibility {
    /// Whether this accessibility is narrower than `public`.
    ///
    /// These are the declarations an access grant can make reachable from
    /// another module.
    #[inline]
    pub fn is_narrower_than_public(self) -> bool {
        !matches!(self, Accessibility::Public)
    }

    /// Whether a declaration with this accessibility is visible outside its
    /// own module without a grant.
    #[inline]
    pub fn is_externally_visible(self) -> bool {
        matches!(
            self,
            Accessibility::Public | Accessibility::Protected | Accessibility::ProtectedInternal
        )
    }

    /// The effective accessibility of a member declared inside an enclosing
    /// declaration: the more restrictive of the two.
    pub fn constrained_by(self, enclosing: Accessibility) -> Accessibility {
        if self.restrictiveness() >= enclosing.restrictiveness() {
            self
        } else {
            enclosing
        }
    }

    /// Ordering key; larger means more restrictive.
    fn restrictiveness(self) -> u8 {
        match self {
            Accessibility::Public => 0,
            Accessibility::ProtectedInternal => 1,
            Accessibility::Internal => 2,
            Accessibility::Protected => 2,
            Accessibility::PrivateProtected => 3,
            Accessibility::Private => 4,
        }
    }
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Accessibility::Public => "public",
            Accessibility::Internal => "internal",
            Accessibility::Protected => "protected",
            Accessibility::ProtectedInternal => "protected internal",
            Accessibility::PrivateProtected => "private protected",
            Accessibility::Private => "private",
        };
        write!(f, "{text}")
    }
}
