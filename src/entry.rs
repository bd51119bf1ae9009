//! The richace entry model: type, flags, mask, and identity, plus the
//! identity predicates the evaluator and isolator dispatch on.

use nix::unistd::{Gid, Uid};

use crate::flag::EntryFlags;
use crate::identity::{Identity, SpecialWho};
use crate::perm::Perm;

/// Whether an entry grants or denies its mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Allow,
    Deny,
}

/// One access control entry (ACE).
///
/// `flags` here carries only the inheritance-related bits
/// (`FILE_INHERIT`, `DIRECTORY_INHERIT`, `NO_PROPAGATE_INHERIT`,
/// `INHERIT_ONLY`, `INHERITED`); the identity-tagging bits
/// (`SPECIAL_WHO`, `IDENTIFIER_GROUP`, `UNMAPPED_WHO`) are implicit in
/// which [`Identity`] variant `identity` holds, rather than duplicated as
/// separate state that could disagree with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub entry_type: EntryType,
    pub flags: EntryFlags,
    pub mask: Perm,
    pub identity: Identity,
}

impl Entry {
    pub fn new(entry_type: EntryType, flags: EntryFlags, mask: Perm, identity: Identity) -> Entry {
        Entry {
            entry_type,
            flags: flags & (EntryFlags::INHERITANCE_FLAGS | EntryFlags::INHERITED),
            mask,
            identity,
        }
    }

    pub fn allow(flags: EntryFlags, mask: Perm, identity: Identity) -> Entry {
        Entry::new(EntryType::Allow, flags, mask, identity)
    }

    pub fn deny(flags: EntryFlags, mask: Perm, identity: Identity) -> Entry {
        Entry::new(EntryType::Deny, flags, mask, identity)
    }

    pub fn owner(entry_type: EntryType, mask: Perm) -> Entry {
        Entry::new(entry_type, EntryFlags::empty(), mask, Identity::Special(SpecialWho::Owner))
    }

    pub fn group(entry_type: EntryType, mask: Perm) -> Entry {
        Entry::new(entry_type, EntryFlags::empty(), mask, Identity::Special(SpecialWho::Group))
    }

    pub fn everyone(entry_type: EntryType, mask: Perm) -> Entry {
        Entry::new(entry_type, EntryFlags::empty(), mask, Identity::Special(SpecialWho::Everyone))
    }

    pub fn is_allow(&self) -> bool {
        self.entry_type == EntryType::Allow
    }

    pub fn is_deny(&self) -> bool {
        self.entry_type == EntryType::Deny
    }

    pub fn is_owner(&self) -> bool {
        self.identity.is_owner()
    }

    pub fn is_group(&self) -> bool {
        self.identity.is_group()
    }

    pub fn is_everyone(&self) -> bool {
        self.identity.is_everyone()
    }

    pub fn is_unix_user(&self) -> bool {
        self.identity.is_unix_user()
    }

    pub fn is_unix_group(&self) -> bool {
        self.identity.is_unix_group()
    }

    /// True if this entry's uid matches `uid` (only meaningful for
    /// `Identity::Uid` entries).
    pub fn is_unix_user_id(&self, uid: Uid) -> bool {
        matches!(&self.identity, Identity::Uid(id) if *id == uid)
    }

    /// True if this entry's gid matches `gid` (only meaningful for
    /// `Identity::Gid` entries).
    pub fn is_unix_group_id(&self, gid: Gid) -> bool {
        matches!(&self.identity, Identity::Gid(id) if *id == gid)
    }

    /// The entry's uid, if it names one.
    pub fn as_uid(&self) -> Option<Uid> {
        match self.identity {
            Identity::Uid(uid) => Some(uid),
            _ => None,
        }
    }

    /// The entry's gid, if it names one.
    pub fn as_gid(&self) -> Option<Gid> {
        match self.identity {
            Identity::Gid(gid) => Some(gid),
            _ => None,
        }
    }

    /// An entry has some inheritance effect if it carries `FILE_INHERIT`
    /// or `DIRECTORY_INHERIT`.
    pub fn is_inheritable(&self) -> bool {
        self.flags
            .intersects(EntryFlags::FILE_INHERIT | EntryFlags::DIRECTORY_INHERIT)
    }

    pub fn is_inherit_only(&self) -> bool {
        self.flags.contains(EntryFlags::INHERIT_ONLY)
    }

    pub fn is_inherited(&self) -> bool {
        self.flags.contains(EntryFlags::INHERITED)
    }

    /// `richace_is_same_identifier`: true iff `a` and `b` name exactly the
    /// same principal (same identity-tag, same payload).
    pub fn is_same_identifier(a: &Entry, b: &Entry) -> bool {
        a.identity == b.identity
    }
}
