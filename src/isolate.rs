//! `apply_masks`: collapses a masked ACL down to one that grants exactly
//! what its three class masks allow, for a kernel that has no per-entry
//! masking concept of its own (the classic POSIX draft ACL model). Masking
//! can only take permissions away, never add them back, so every step here
//! pushes `everyone@`'s grant down into more specific entries, intersects
//! each entry's mask with the class it falls into, and then reinstates
//! exactly what the class mask still promises via dedicated owner/other
//! entries, plus deny entries that isolate the owner and group classes from
//! whatever turned out to be too generous.
//!
//! Ported from `richacl_apply_masks` and its seven helpers; each helper
//! below keeps that function's name and order.

use nix::unistd::Uid;

use crate::acl::{Acl, Cursor};
use crate::entry::{Entry, EntryType};
use crate::flag::{AclFlags, EntryFlags};
use crate::identity::{Identity, SpecialWho};
use crate::perm::Perm;

/// `richacl_move_everyone_aces_down`: absorb every `everyone@` entry into
/// the entries above it (so their effect no longer depends on position
/// relative to `everyone@`), then collapse all of them into nothing but a
/// single trailing `everyone@` allow, if any bits survive.
fn move_everyone_aces_down(acl: &mut Acl) {
    let mut allowed = Perm::empty();
    let mut denied = Perm::empty();

    let mut cursor = Cursor::new(&mut acl.entries);
    while !cursor.done() {
        if cursor.get().is_inherit_only() {
            cursor.advance();
            continue;
        }
        if cursor.get().is_everyone() {
            if cursor.get().is_allow() {
                allowed |= cursor.get().mask - denied;
            } else {
                denied |= cursor.get().mask - allowed;
            }
            cursor.change_mask(Perm::empty());
        } else if cursor.get().is_allow() {
            let mask = allowed | (cursor.get().mask - denied);
            cursor.change_mask(mask);
        } else {
            let mask = denied | (cursor.get().mask - allowed);
            cursor.change_mask(mask);
        }
        cursor.advance();
    }

    if (allowed - Perm::POSIX_ALWAYS_ALLOWED).is_empty() {
        return;
    }
    let revives_last = acl
        .entries
        .last()
        .is_some_and(|e| e.is_everyone() && e.is_allow() && e.is_inherit_only() && e.mask == allowed);
    if revives_last {
        acl.entries.last_mut().unwrap().flags.remove(EntryFlags::INHERIT_ONLY);
    } else {
        acl.entries.push(Entry::everyone(EntryType::Allow, allowed));
    }
}

/// `__richacl_propagate_everyone`: grant `who` whatever of `allow` it
/// doesn't already have, either by widening an existing reachable allow
/// entry for `who`, or by inserting a new one right before the trailing
/// `everyone@` entry.
///
/// Assumes entries don't carry duplicate allow/deny pairs for the same
/// identity within a class; a pathological ACL with that shape may see an
/// insertion land at a slightly different offset than the reference
/// implementation would produce, without changing what access it grants.
fn propagate_everyone_for(acl: &mut Acl, who: &Identity, who_is_owner: bool, mut allow: Perm) {
    let mut allow_last = None;

    for (i, ace) in acl.entries.iter().enumerate() {
        if ace.is_inherit_only() {
            continue;
        }
        if ace.is_allow() {
            if &ace.identity == who {
                allow -= ace.mask;
                allow_last = Some(i);
            }
        } else if &ace.identity == who {
            allow -= ace.mask;
        } else if !(allow & ace.mask).is_empty() {
            allow_last = None;
        }
    }

    let Some(last_idx) = acl.entries.len().checked_sub(1) else {
        return;
    };

    if !who_is_owner {
        let last = &acl.entries[last_idx];
        if last.is_everyone() && (allow - (last.mask & acl.other_mask)).is_empty() {
            allow = Perm::empty();
        }
    }

    if allow.is_empty() {
        return;
    }

    if let Some(idx) = allow_last {
        let mask = acl.entries[idx].mask | allow;
        Cursor::at(&mut acl.entries, idx).change_mask(mask);
    } else {
        let mut copy = Entry::allow(EntryFlags::empty(), allow, who.clone());
        copy.flags.remove(EntryFlags::INHERITANCE_FLAGS);
        acl.entries.insert(last_idx, copy);
    }
}

/// `richacl_propagate_everyone`: if the trailing `everyone@` entry grants
/// something the owner or group class masks allow but `other_mask`
/// doesn't, push that extra grant up into `owner@`/`group@`, and into every
/// individual user/group entry that would otherwise fall back on the
/// (about to be narrowed) `everyone@` grant.
fn propagate_everyone(acl: &mut Acl) {
    let Some(last) = acl.entries.last() else {
        return;
    };
    if last.is_inherit_only() || !last.is_everyone() {
        return;
    }
    let last_mask = last.mask;

    let owner_allow = last_mask & acl.owner_mask;
    let group_allow = last_mask & acl.group_mask;

    if !(owner_allow - (acl.group_mask & acl.other_mask)).is_empty() {
        propagate_everyone_for(acl, &Identity::Special(SpecialWho::Owner), true, owner_allow);
    }

    if !(group_allow - acl.other_mask).is_empty() {
        propagate_everyone_for(acl, &Identity::Special(SpecialWho::Group), false, group_allow);

        if acl.entries.len() >= 2 {
            let mut n = acl.entries.len() - 2;
            loop {
                let ace = &acl.entries[n];
                if !(ace.is_inherit_only() || ace.is_owner() || ace.is_group()) {
                    let who = ace.identity.clone();
                    propagate_everyone_for(acl, &who, false, group_allow);
                }
                if n == 0 {
                    break;
                }
                n -= 1;
            }
        }
    }
}

/// `__richacl_apply_masks`: intersect every non-deny, non-inherit-only
/// entry's mask with the class mask it belongs to (owner for `owner@` and
/// unix-user entries matching the file owner, other for `everyone@`, group
/// otherwise).
fn apply_masks_inner(acl: &mut Acl, owner: Uid) {
    let mut i = 0;
    while i < acl.entries.len() {
        let ace = &acl.entries[i];
        if ace.is_inherit_only() || !ace.is_allow() {
            i += 1;
            continue;
        }
        let class_mask = if ace.is_owner() || ace.as_uid() == Some(owner) {
            acl.owner_mask
        } else if ace.is_everyone() {
            acl.other_mask
        } else {
            acl.group_mask
        };
        let mask = ace.mask & class_mask;
        Cursor::at(&mut acl.entries, i).change_mask(mask);
        i += 1;
    }
}

/// `richacl_max_allowed`: the most any entry in this ACL ever grants,
/// scanning from the end so a trailing `everyone@` deny can still narrow
/// what came before it.
fn max_allowed(acl: &Acl) -> Perm {
    let mut allowed = Perm::empty();
    for ace in acl.entries.iter().rev() {
        if ace.is_inherit_only() {
            continue;
        }
        if ace.is_allow() {
            allowed |= ace.mask;
        } else if ace.is_everyone() {
            allowed &= !ace.mask;
        }
    }
    allowed
}

/// `richacl_isolate_owner_class`: if some entry could still grant the
/// owner more than `owner_mask` allows, deny the excess explicitly via the
/// first owner@ deny entry reachable before any allow entry, or a fresh one
/// at the very front.
fn isolate_owner_class(acl: &mut Acl) {
    let deny = max_allowed(acl) - acl.owner_mask;
    if deny.is_empty() {
        return;
    }

    for i in 0..acl.entries.len() {
        let ace = &acl.entries[i];
        if ace.is_inherit_only() {
            continue;
        }
        if ace.is_allow() {
            break;
        }
        if ace.is_owner() {
            let mask = ace.mask | deny;
            Cursor::at(&mut acl.entries, i).change_mask(mask);
            return;
        }
    }

    acl.entries.insert(0, Entry::deny(EntryFlags::empty(), deny, Identity::Special(SpecialWho::Owner)));
}

/// `__richacl_isolate_who`: deny `who` whatever of `deny` it isn't already
/// denied, widening a reachable deny entry for `who` or inserting a fresh
/// one right before the trailing `everyone@` entry.
fn isolate_who(acl: &mut Acl, who: &Identity, mut deny: Perm) {
    for ace in acl.entries.iter() {
        if ace.is_inherit_only() {
            continue;
        }
        if ace.is_deny() && &ace.identity == who {
            deny -= ace.mask;
        }
    }
    if deny.is_empty() {
        return;
    }

    if acl.entries.len() >= 2 {
        let mut n = acl.entries.len() - 2;
        loop {
            let ace = &acl.entries[n];
            if !ace.is_inherit_only() {
                if ace.is_deny() && &ace.identity == who {
                    let mask = ace.mask | deny;
                    Cursor::at(&mut acl.entries, n).change_mask(mask);
                    return;
                }
                if ace.is_allow() && !(ace.mask & deny).is_empty() {
                    break;
                }
            }
            if n == 0 {
                break;
            }
            n -= 1;
        }
    }

    let Some(last_idx) = acl.entries.len().checked_sub(1) else {
        return;
    };
    let mut copy = Entry::deny(EntryFlags::empty(), deny, who.clone());
    copy.flags.remove(EntryFlags::INHERITANCE_FLAGS);
    acl.entries.insert(last_idx, copy);
}

/// `richacl_isolate_group_class`: if the trailing `everyone@` entry grants
/// more than `group_mask` allows, deny the excess to `group@` and to every
/// individual user/group entry ahead of it.
fn isolate_group_class(acl: &mut Acl) {
    let Some(last) = acl.entries.last() else {
        return;
    };
    if last.is_inherit_only() || !last.is_everyone() {
        return;
    }
    let deny = last.mask - acl.group_mask;
    if deny.is_empty() {
        return;
    }

    isolate_who(acl, &Identity::Special(SpecialWho::Group), deny);

    if acl.entries.len() >= 2 {
        let mut n = acl.entries.len() - 2;
        loop {
            let ace = &acl.entries[n];
            if !(ace.is_inherit_only() || ace.is_owner() || ace.is_group()) {
                let who = acl.entries[n].identity.clone();
                isolate_who(acl, &who, deny);
            }
            if n == 0 {
                break;
            }
            n -= 1;
        }
    }
}

/// `richacl_set_owner_permissions`: for write-through masked ACLs, collapse
/// every `owner@` entry into a single allow carrying exactly `owner_mask`
/// (beyond the bits everyone already gets), inserting one at the front if
/// none survived and some class mask still hides a bit the owner needs.
fn set_owner_permissions(acl: &mut Acl) {
    if !(acl.is_write_through() && acl.is_masked()) {
        return;
    }

    let mut owner_mask = acl.owner_mask - Perm::POSIX_ALWAYS_ALLOWED;
    let mut denied = Perm::empty();

    let mut i = 0;
    while i < acl.entries.len() {
        if acl.entries[i].is_owner() {
            if acl.entries[i].is_allow() && (owner_mask & denied).is_empty() {
                let mask = owner_mask;
                Cursor::at(&mut acl.entries, i).change_mask(mask);
                owner_mask = Perm::empty();
            } else {
                Cursor::at(&mut acl.entries, i).change_mask(Perm::empty());
            }
        } else if acl.entries[i].is_deny() {
            denied |= acl.entries[i].mask;
        }
        i += 1;
    }

    if !(owner_mask & (denied | !acl.other_mask | !acl.group_mask)).is_empty() {
        acl.entries.insert(0, Entry::owner(EntryType::Allow, owner_mask));
    }
}

/// `richacl_set_other_permissions`: for write-through masked ACLs, make
/// sure a trailing `everyone@` allow entry carries exactly `other_mask`
/// (beyond the bits everyone already gets).
fn set_other_permissions(acl: &mut Acl) {
    let other_mask = acl.other_mask - Perm::POSIX_ALWAYS_ALLOWED;
    if other_mask.is_empty() || !(acl.is_write_through() && acl.is_masked()) {
        return;
    }

    let needs_fresh_entry = acl.entries.last().map_or(true, |e| !e.is_everyone() || e.is_inherit_only());
    if needs_fresh_entry {
        acl.entries.push(Entry::everyone(EntryType::Allow, other_mask));
    } else {
        let last_idx = acl.entries.len() - 1;
        Cursor::at(&mut acl.entries, last_idx).change_mask(other_mask);
    }
}

/// `richacl_apply_masks`: rewrite a masked ACL so that it grants exactly
/// what `owner_mask`/`group_mask`/`other_mask` promise, with no leftover
/// dependency on the masks, then clear the flags that mark it as masked.
pub fn apply_masks(acl: &mut Acl, owner: Uid) {
    if !acl.is_masked() {
        return;
    }

    move_everyone_aces_down(acl);
    propagate_everyone(acl);
    apply_masks_inner(acl, owner);
    set_owner_permissions(acl);
    set_other_permissions(acl);
    isolate_owner_class(acl);
    isolate_group_class(acl);

    acl.flags.remove(AclFlags::WRITE_THROUGH | AclFlags::MASKED);
}

#[cfg(test)]
mod isolate_tests {
    use super::*;
    use crate::eval::{access, permission};
    use crate::mask::{chmod, from_mode};
    use nix::unistd::Gid;

    fn uid(n: u32) -> Uid {
        Uid::from_raw(n)
    }

    fn gid(n: u32) -> Gid {
        Gid::from_raw(n)
    }

    #[test]
    fn test_apply_masks_on_plain_mode_acl_is_idempotent_on_access() {
        let mut acl = from_mode(0o754, true);
        let owner = uid(1);
        let group = gid(1);

        let before = access(&acl, owner, group, owner, &[group], true);
        acl.flags.insert(AclFlags::MASKED | AclFlags::WRITE_THROUGH);
        apply_masks(&mut acl, owner);
        let after = access(&acl, owner, group, owner, &[group], true);
        assert_eq!(before, after);
        assert!(!acl.is_masked());
        assert!(!acl.is_write_through());
    }

    #[test]
    fn test_apply_masks_after_chmod_narrows_everyone_grant() {
        // A trailing everyone@ allow grants rwx, but chmod(0640) pins the
        // masks down to r-- owner+w, r-- group, --- other.
        let mut acl = Acl::alloc(1);
        acl.entries.push(Entry::everyone(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA | Perm::EXECUTE));
        chmod(&mut acl, 0o640, true);
        let owner = uid(1);
        let group = gid(1);
        let stranger = uid(99);

        apply_masks(&mut acl, owner);

        assert!(permission(&acl, owner, group, owner, &[group], Perm::READ_DATA | Perm::WRITE_DATA));
        assert!(!permission(&acl, owner, group, stranger, &[], Perm::READ_DATA));
        let other_allowed = access(&acl, owner, group, stranger, &[], true);
        assert!(other_allowed.is_empty());
    }

    #[test]
    fn test_apply_masks_isolates_group_class_from_excess_everyone_grant() {
        // everyone@ grants write, but group_mask only allows read: a
        // group@ deny for write should appear after isolation.
        let mut acl = Acl::alloc(1);
        acl.entries.push(Entry::everyone(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA));
        acl.flags = AclFlags::MASKED;
        acl.owner_mask = Perm::READ_DATA | Perm::WRITE_DATA;
        acl.group_mask = Perm::READ_DATA;
        acl.other_mask = Perm::READ_DATA | Perm::WRITE_DATA;

        apply_masks(&mut acl, uid(1));

        let group_member_allowed = access(&acl, uid(1), gid(1), uid(2), &[gid(1)], true);
        assert!(!group_member_allowed.contains(Perm::WRITE_DATA));
    }

    #[test]
    fn test_move_everyone_aces_down_collapses_multiple_everyone_entries() {
        let mut acl = Acl::alloc(2);
        acl.entries.push(Entry::everyone(EntryType::Allow, Perm::READ_DATA));
        acl.entries.push(Entry::everyone(EntryType::Allow, Perm::WRITE_DATA));
        move_everyone_aces_down(&mut acl);
        assert_eq!(acl.entries.len(), 1);
        assert_eq!(acl.entries[0].mask, Perm::READ_DATA | Perm::WRITE_DATA);
    }
}
