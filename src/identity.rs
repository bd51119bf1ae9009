//! The tagged identity sum type and the injectable name-lookup callback.
//!
//! The reference implementation tags each entry's identity with a C union of
//! a small integer and a `const char *`, discriminated by flag bits. Here the
//! union becomes a real sum type, so every identity predicate collapses into
//! one `match` instead of flag-bit inspection scattered across call sites.

use nix::unistd::{Gid, Uid};

use crate::error::{no_such_identity, Result};

/// One of the three special identities a richacl entry can name instead of a
/// numeric uid/gid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SpecialWho {
    Owner = 0,
    Group = 1,
    Everyone = 2,
}

impl SpecialWho {
    /// Parse one of the canonical special-who spellings, case-insensitively.
    pub fn parse(s: &str) -> Option<SpecialWho> {
        match s.to_ascii_uppercase().as_str() {
            "OWNER@" => Some(SpecialWho::Owner),
            "GROUP@" => Some(SpecialWho::Group),
            "EVERYONE@" => Some(SpecialWho::Everyone),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SpecialWho::Owner => "OWNER@",
            SpecialWho::Group => "GROUP@",
            SpecialWho::Everyone => "EVERYONE@",
        }
    }
}

/// The principal an entry's grant or denial applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// `OWNER@`, `GROUP@`, or `EVERYONE@`.
    Special(SpecialWho),
    /// A numeric user id.
    Uid(Uid),
    /// A numeric group id.
    Gid(Gid),
    /// A name that could not be mapped to a numeric id at the time the
    /// entry was created; the `bool` records whether it names a group.
    /// Owns its string; cloning an entry deep-copies it.
    Unmapped(String, bool),
}

impl Identity {
    pub fn is_owner(&self) -> bool {
        matches!(self, Identity::Special(SpecialWho::Owner))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Identity::Special(SpecialWho::Group))
    }

    pub fn is_everyone(&self) -> bool {
        matches!(self, Identity::Special(SpecialWho::Everyone))
    }

    pub fn is_unix_user(&self) -> bool {
        matches!(self, Identity::Uid(_))
    }

    pub fn is_unix_group(&self) -> bool {
        matches!(self, Identity::Gid(_))
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self, Identity::Unmapped(..))
    }
}

/// Caller-injected user/group name resolution, kept separate from the core
/// so tests (and callers in general) can stub it deterministically rather
/// than the core performing `getpwnam`/`getgrnam`-style lookups itself.
pub trait IdentityResolver {
    /// Resolve a user name (or decimal uid literal) to a [`Uid`].
    fn resolve_user(&mut self, name: &str) -> Result<Uid>;

    /// Resolve a group name (or decimal gid literal) to a [`Gid`].
    fn resolve_group(&mut self, name: &str) -> Result<Gid>;

    /// Best-effort reverse lookup for text emission; `None` falls back to
    /// the numeric spelling.
    fn user_name(&mut self, _uid: Uid) -> Option<String> {
        None
    }

    /// Best-effort reverse lookup for text emission; `None` falls back to
    /// the numeric spelling.
    fn group_name(&mut self, _gid: Gid) -> Option<String> {
        None
    }
}

/// A resolver that only understands decimal uid/gid literals. Useful as a
/// default when the caller has no name service to inject.
#[derive(Default)]
pub struct NumericResolver;

impl IdentityResolver for NumericResolver {
    fn resolve_user(&mut self, name: &str) -> Result<Uid> {
        name.parse::<u32>()
            .map(Uid::from_raw)
            .map_err(|_| no_such_identity(name))
    }

    fn resolve_group(&mut self, name: &str) -> Result<Gid> {
        name.parse::<u32>()
            .map(Gid::from_raw)
            .map_err(|_| no_such_identity(name))
    }
}

#[cfg(test)]
mod identity_tests {
    use super::*;

    #[test]
    fn test_special_who_parse_case_insensitive() {
        assert_eq!(SpecialWho::parse("owner@"), Some(SpecialWho::Owner));
        assert_eq!(SpecialWho::parse("Group@"), Some(SpecialWho::Group));
        assert_eq!(SpecialWho::parse("EVERYONE@"), Some(SpecialWho::Everyone));
        assert_eq!(SpecialWho::parse("bob"), None);
    }

    #[test]
    fn test_numeric_resolver() {
        let mut r = NumericResolver;
        assert_eq!(r.resolve_user("1000").unwrap(), Uid::from_raw(1000));
        assert!(r.resolve_user("bob").is_err());
    }

    #[test]
    fn test_same_identifier_semantics() {
        let a = Identity::Unmapped("guest@FOREIGN".into(), false);
        let b = Identity::Unmapped("guest@FOREIGN".into(), false);
        let c = Identity::Unmapped("guest@FOREIGN".into(), true);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
