//! ACL evaluation: checking a requested access and computing the maximal
//! allowed access, both as a single forward pass over the entries.

use nix::unistd::{Gid, Uid};

use crate::acl::Acl;
use crate::entry::Entry;
use crate::perm::Perm;

fn in_groups(gid: Gid, groups: &[Gid]) -> bool {
    groups.contains(&gid)
}

/// How a matching entry affects the narrowing and class bookkeeping the
/// caller does next.
///
/// Mirrors the `richace_is_owner`/`is_group`/`is_unix_user`/`is_unix_group`/
/// `is_everyone` cascade and its two `goto` targets in the original:
/// `owner@` and a unix-user entry equal to the caller jump straight to
/// `entry_matches_owner`, skipping the group-mask narrowing and
/// unconditionally proving owner-or-group-class membership (`Owner`);
/// `group@` and a unix-group entry fall through *into* the narrowing line
/// before reaching that same label (`GroupClass`); `everyone@` jumps to
/// `entry_matches_everyone`, skipping both the narrowing and the class
/// assignment (`Everyone`).
enum EntryMatch {
    Owner,
    GroupClass,
    Everyone,
}

/// Whether `ace` applies to this process, and if so, how. Returns `None` if
/// the entry doesn't apply at all (skip it).
fn entry_applies(ace: &Entry, owner: Uid, user: Uid, in_owning_group: bool, groups: &[Gid]) -> Option<EntryMatch> {
    if ace.is_inherit_only() {
        return None;
    }
    if ace.is_owner() {
        if user != owner {
            return None;
        }
        return Some(EntryMatch::Owner);
    }
    if ace.is_group() {
        if !in_owning_group {
            return None;
        }
        return Some(EntryMatch::GroupClass);
    }
    if let Some(uid) = ace.as_uid() {
        if user != uid {
            return None;
        }
        return Some(EntryMatch::Owner);
    }
    if let Some(gid) = ace.as_gid() {
        if !in_groups(gid, groups) {
            return None;
        }
        return Some(EntryMatch::GroupClass);
    }
    if ace.is_everyone() {
        return Some(EntryMatch::Everyone);
    }
    None
}

/// `richacl_permission`: does the ACL grant `requested` to this process?
pub fn permission(
    acl: &Acl,
    owner: Uid,
    owning_group: Gid,
    user: Uid,
    groups: &[Gid],
    requested: Perm,
) -> bool {
    let masked = acl.is_masked();
    let in_owning_group = in_groups(owning_group, groups);
    let mut in_owner_or_group_class = in_owning_group;

    if masked {
        if acl.is_write_through() && user == owner {
            return (requested - acl.owner_mask).is_empty();
        }
    } else {
        in_owner_or_group_class = true;
    }

    let mut mask = requested;
    for ace in &acl.entries {
        let Some(m) = entry_applies(ace, owner, user, in_owning_group, groups) else {
            continue;
        };

        let mut ace_mask = ace.mask;
        if matches!(m, EntryMatch::GroupClass) && masked && ace.is_allow() {
            ace_mask &= acl.group_mask;
        }
        if !matches!(m, EntryMatch::Everyone) {
            in_owner_or_group_class = true;
        }

        if ace.is_deny() && !(ace_mask & mask).is_empty() {
            return false;
        }
        mask &= !ace_mask;

        if mask.is_empty() && in_owner_or_group_class {
            break;
        }
    }

    if masked {
        if user == owner {
            if !(requested - acl.owner_mask).is_empty() {
                return false;
            }
        } else if in_owner_or_group_class {
            if !(requested - acl.group_mask).is_empty() {
                return false;
            }
        } else if acl.is_write_through() {
            return (requested - acl.other_mask).is_empty();
        } else if !(requested - acl.other_mask).is_empty() {
            return false;
        }
    }

    mask.is_empty()
}

/// `richacl_access`: the maximal set of permissions the ACL grants this
/// process, irrespective of what was actually requested. `is_dir` governs
/// whether `DELETE_CHILD` (meaningless for non-directories) is stripped
/// from the result.
pub fn access(acl: &Acl, owner: Uid, owning_group: Gid, user: Uid, groups: &[Gid], is_dir: bool) -> Perm {
    let masked = acl.is_masked();
    let in_owning_group = in_groups(owning_group, groups);
    let mut in_owner_or_group_class = in_owning_group;

    if masked {
        if acl.is_write_through() && user == owner {
            let mut allowed = acl.owner_mask;
            if !is_dir {
                allowed.remove(Perm::DELETE_CHILD);
            }
            return allowed;
        }
    } else {
        in_owner_or_group_class = true;
    }

    let mut mask = Perm::VALID_MASK;
    let mut allowed = Perm::empty();
    for ace in &acl.entries {
        let Some(m) = entry_applies(ace, owner, user, in_owning_group, groups) else {
            continue;
        };

        let mut ace_mask = ace.mask;
        if matches!(m, EntryMatch::GroupClass) && masked && ace.is_allow() {
            ace_mask &= acl.group_mask;
        }
        if !matches!(m, EntryMatch::Everyone) {
            in_owner_or_group_class = true;
        }

        if ace.is_allow() {
            allowed |= ace_mask & mask;
        }
        mask &= !ace_mask;

        if mask.is_empty() && in_owner_or_group_class {
            break;
        }
    }

    if masked {
        if user == owner {
            allowed &= acl.owner_mask;
        } else if in_owner_or_group_class {
            allowed &= acl.group_mask;
        } else if acl.is_write_through() {
            allowed = acl.other_mask;
        } else {
            allowed &= acl.other_mask;
        }
    }

    if !is_dir {
        allowed.remove(Perm::DELETE_CHILD);
    }
    allowed
}

#[cfg(test)]
mod eval_tests {
    use super::*;
    use crate::entry::EntryType;
    use crate::flag::{AclFlags, EntryFlags};
    use crate::identity::Identity;
    use crate::mask::from_mode;

    fn uid(n: u32) -> Uid {
        Uid::from_raw(n)
    }

    fn gid(n: u32) -> Gid {
        Gid::from_raw(n)
    }

    #[test]
    fn test_unmasked_acl_owner_allow_is_granted() {
        let mut acl = Acl::alloc(1);
        acl.entries.push(Entry::owner(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA));
        assert!(permission(&acl, uid(100), gid(100), uid(100), &[], Perm::READ_DATA));
        assert!(!permission(&acl, uid(100), gid(100), uid(200), &[], Perm::READ_DATA));
    }

    #[test]
    fn test_deny_entry_blocks_requested_bit() {
        let mut acl = Acl::alloc(2);
        acl.entries.push(Entry::deny(EntryFlags::empty(), Perm::WRITE_DATA, Identity::Uid(uid(200))));
        acl.entries.push(Entry::everyone(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA));
        assert!(!permission(&acl, uid(100), gid(100), uid(200), &[], Perm::WRITE_DATA));
        assert!(permission(&acl, uid(100), gid(100), uid(200), &[], Perm::READ_DATA));
    }

    #[test]
    fn test_access_from_mode_0640() {
        let acl = from_mode(0o640, false);
        let owner = uid(1);
        let group_member = uid(2);
        let other = uid(3);
        let group = gid(10);

        let owner_allowed = access(&acl, owner, group, owner, &[group], false);
        assert_eq!(owner_allowed, Perm::READ_DATA | Perm::WRITE_DATA | Perm::APPEND_DATA);

        let group_allowed = access(&acl, owner, group, group_member, &[group], false);
        assert_eq!(group_allowed, Perm::READ_DATA);

        let other_allowed = access(&acl, owner, group, other, &[], false);
        assert_eq!(other_allowed, Perm::empty());
    }

    #[test]
    fn test_write_through_other_class_is_exact() {
        let mut acl = Acl::alloc(1);
        acl.flags = AclFlags::MASKED | AclFlags::WRITE_THROUGH;
        acl.owner_mask = Perm::READ_DATA;
        acl.group_mask = Perm::READ_DATA;
        acl.other_mask = Perm::READ_DATA;
        acl.entries.push(Entry::everyone(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA));
        let allowed = access(&acl, uid(1), gid(1), uid(99), &[], true);
        assert_eq!(allowed, Perm::READ_DATA);
    }

    #[test]
    fn test_delete_child_stripped_for_non_directory() {
        let mut acl = Acl::alloc(1);
        acl.entries.push(Entry::owner(EntryType::Allow, Perm::DELETE_CHILD | Perm::READ_DATA));
        let allowed = access(&acl, uid(1), gid(1), uid(1), &[], false);
        assert!(!allowed.contains(Perm::DELETE_CHILD));
        assert!(allowed.contains(Perm::READ_DATA));
    }

    #[test]
    fn test_owner_entry_is_exempt_from_group_mask_narrowing() {
        // owner@ allow rw, masked, but group_mask is narrower than rw: the
        // owner@ entry itself must not be narrowed by the group mask, only
        // the final per-class check (against owner_mask) applies to it.
        let mut acl = Acl::alloc(1);
        acl.flags = AclFlags::MASKED;
        acl.owner_mask = Perm::READ_DATA | Perm::WRITE_DATA;
        acl.group_mask = Perm::READ_DATA;
        acl.entries.push(Entry::owner(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA));

        assert!(permission(&acl, uid(1), gid(1), uid(1), &[gid(1)], Perm::WRITE_DATA));
    }

    #[test]
    fn test_group_mask_projection_prevents_user_entry_leak() {
        // owner:rw::mask, group@:rw::allow, but group mask only covers read.
        let mut acl = Acl::alloc(2);
        acl.flags = AclFlags::MASKED;
        acl.owner_mask = Perm::READ_DATA | Perm::WRITE_DATA;
        acl.group_mask = Perm::READ_DATA;
        acl.other_mask = Perm::empty();
        acl.entries.push(Entry::owner(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA));
        acl.entries.push(Entry::group(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA));

        // A user who is both the owner and in the owning group gets rw.
        let allowed_owner = access(&acl, uid(1), gid(1), uid(1), &[gid(1)], true);
        assert_eq!(allowed_owner, Perm::READ_DATA | Perm::WRITE_DATA);

        // A non-owner member of the owning group only gets r, since the
        // group@ entry's mask is projected through the group file mask.
        let allowed_group_member = access(&acl, uid(1), gid(1), uid(2), &[gid(1)], true);
        assert_eq!(allowed_group_member, Perm::READ_DATA);
    }
}
