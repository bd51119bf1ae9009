//! Mode to ACL synthesis, ACL to mode projection, and the upper-bound mask
//! computation that backs `chmod` and inheritance.

use crate::acl::Acl;
use crate::entry::{Entry, EntryType};
use crate::flag::{AclFlags, EntryFlags};
use crate::identity::{Identity, SpecialWho};
use crate::perm::{self, Perm};

/// `richacl_from_mode`: synthesize an ACL equivalent to a bare POSIX mode,
/// using at most five entries (owner deny, owner allow, group deny, group
/// allow, everyone allow), each emitted only when it would add or remove
/// something the previous entries don't already cover.
pub fn from_mode(mode: u32, is_dir: bool) -> Acl {
    let mut owner_mask = perm::mode_to_mask(mode >> 6);
    let mut group_mask = perm::mode_to_mask(mode >> 3);
    let mut other_mask = perm::mode_to_mask(mode);

    if !is_dir {
        owner_mask.remove(Perm::DELETE_CHILD);
        group_mask.remove(Perm::DELETE_CHILD);
        other_mask.remove(Perm::DELETE_CHILD);
    }

    let mut entries = Vec::with_capacity(5);

    let owner_denied = group_mask.union(other_mask).difference(owner_mask);
    if !owner_denied.is_empty() {
        entries.push(Entry::deny(EntryFlags::empty(), owner_denied, Identity::Special(SpecialWho::Owner)));
    }
    if !owner_mask.difference(group_mask.intersection(other_mask)).is_empty() {
        entries.push(Entry::owner(EntryType::Allow, owner_mask));
    }

    let group_denied = other_mask.difference(group_mask);
    if !group_denied.is_empty() {
        entries.push(Entry::deny(EntryFlags::empty(), group_denied, Identity::Special(SpecialWho::Group)));
    }
    if !group_mask.difference(other_mask).is_empty() {
        entries.push(Entry::group(EntryType::Allow, group_mask));
    }

    if !other_mask.is_empty() {
        entries.push(Entry::everyone(EntryType::Allow, other_mask));
    }

    Acl::new(AclFlags::empty(), owner_mask, group_mask, other_mask, entries)
}

/// `richacl_masks_to_mode`: pack each class mask's POSIX-representable bits
/// into a three-bit group of a mode value. Bits outside
/// `POSIX_MODE_{READ,WRITE,EXEC}` are lost; they may still be effective as
/// long as the masks were set explicitly rather than regenerated by a mode
/// change.
pub fn masks_to_mode(acl: &Acl) -> u32 {
    perm::mask_to_mode(acl.owner_mask) << 6 | perm::mask_to_mode(acl.group_mask) << 3 | perm::mask_to_mode(acl.other_mask)
}

fn allowed_to(acl: &Acl, who: &Entry) -> Perm {
    let mut allowed = Perm::empty();
    for ace in acl.entries.iter().rev() {
        if ace.is_inherit_only() {
            continue;
        }
        if Entry::is_same_identifier(ace, who) || ace.is_everyone() {
            if ace.is_allow() {
                allowed |= ace.mask;
            } else {
                allowed &= !ace.mask;
            }
        }
    }
    allowed
}

fn group_class_allowed(acl: &Acl) -> Perm {
    let mut everyone_allowed = Perm::empty();
    let mut group_class_allowed = Perm::empty();
    let mut had_group_ace = false;

    for ace in acl.entries.iter().rev() {
        if ace.is_inherit_only() || ace.is_owner() {
            continue;
        }
        if ace.is_everyone() {
            if ace.is_allow() {
                everyone_allowed |= ace.mask;
            } else {
                everyone_allowed &= !ace.mask;
            }
        } else {
            group_class_allowed |= allowed_to(acl, ace);
            if ace.is_group() {
                had_group_ace = true;
            }
        }
    }
    if !had_group_ace {
        group_class_allowed |= everyone_allowed;
    }
    group_class_allowed
}

/// `richacl_compute_max_masks`: compute upper-bound owner/group/other masks
/// such that no permission the ACL can ever grant to a class gets
/// disabled, for any choice of file owner or group membership.
///
/// `gmask` starts as "everything" and tracks which bits the group class can
/// ever be allowed; it only needs narrowing (forcing a restart from
/// scratch) the first time a non-owner, non-everyone deny entry is seen,
/// which is the only situation where an `everyone@` allow could otherwise
/// leak a permission into the group mask that some other entry always
/// denies the group class.
pub fn compute_max_masks(acl: &mut Acl) {
    let mut gmask = Perm::all();

    'restart: loop {
        acl.owner_mask = Perm::empty();
        acl.group_mask = Perm::empty();
        acl.other_mask = Perm::empty();

        for i in (0..acl.entries.len()).rev() {
            let ace = &acl.entries[i];
            if ace.is_inherit_only() {
                continue;
            }

            if ace.is_owner() {
                if ace.is_allow() {
                    acl.owner_mask |= ace.mask;
                } else {
                    acl.owner_mask &= !ace.mask;
                }
            } else if ace.is_everyone() {
                if ace.is_allow() {
                    acl.owner_mask |= ace.mask;
                    acl.group_mask |= ace.mask & gmask;
                    acl.other_mask |= ace.mask;
                } else {
                    acl.owner_mask &= !ace.mask;
                    acl.group_mask &= !ace.mask;
                    acl.other_mask &= !ace.mask;
                }
            } else if ace.is_allow() {
                acl.owner_mask |= ace.mask & gmask;
                acl.group_mask |= ace.mask & gmask;
            } else if gmask == Perm::all() {
                gmask = group_class_allowed(acl);
                if gmask != Perm::all() {
                    continue 'restart;
                }
            }
        }
        break;
    }

    acl.flags.remove(AclFlags::WRITE_THROUGH | AclFlags::MASKED);
}

/// `richacl_chmod`: set the file masks to exactly what `mode` allows,
/// mark them exact (`WRITE_THROUGH`, `MASKED`), and protect an
/// auto-inheriting ACL from being overwritten by a future `auto_inherit`
/// pass, since the chmod just changed what it means.
pub fn chmod(acl: &mut Acl, mode: u32, is_dir: bool) {
    let strip = if is_dir { Perm::empty() } else { Perm::DELETE_CHILD };

    acl.flags.insert(AclFlags::WRITE_THROUGH | AclFlags::MASKED);
    acl.owner_mask = perm::mode_to_mask(mode >> 6) & !strip;
    acl.group_mask = perm::mode_to_mask(mode >> 3) & !strip;
    acl.other_mask = perm::mode_to_mask(mode) & !strip;

    if acl.is_auto_inherit() {
        acl.flags.insert(AclFlags::PROTECTED);
    }
}

#[cfg(test)]
mod mask_tests {
    use super::*;

    #[test]
    fn test_from_mode_0755_directory() {
        let acl = from_mode(0o755, true);
        assert_eq!(masks_to_mode(&acl), 0o755);
        // owner == group|other already, group == other already: only the
        // owner allow, group allow, and everyone allow entries are needed.
        assert_eq!(acl.entries.len(), 3);
    }

    #[test]
    fn test_from_mode_0640_file_strips_delete_child() {
        let acl = from_mode(0o640, false);
        assert_eq!(masks_to_mode(&acl), 0o640);
        for entry in &acl.entries {
            assert!(!entry.mask.contains(Perm::DELETE_CHILD));
        }
    }

    #[test]
    fn test_from_mode_0750_needs_owner_deny() {
        // owner=rwx, group=r-x, other=---: group has no bit owner lacks, so
        // only an owner allow, group allow, and no deny entries are needed.
        let acl = from_mode(0o750, true);
        assert_eq!(acl.entries.len(), 2);
        assert!(acl.entries.iter().all(|e| e.is_allow()));
    }

    #[test]
    fn test_from_mode_0460_needs_owner_deny_entry() {
        // owner=r--, group=rw-: group has a bit (write) owner lacks.
        let acl = from_mode(0o460, true);
        assert!(acl.entries[0].is_deny());
        assert!(acl.entries[0].is_owner());
    }

    #[test]
    fn test_masks_to_mode_roundtrip() {
        for mode in [0o000, 0o644, 0o755, 0o600, 0o421] {
            let acl = from_mode(mode, true);
            assert_eq!(masks_to_mode(&acl), mode);
        }
    }

    #[test]
    fn test_chmod_sets_write_through_and_masked() {
        let mut acl = from_mode(0o750, true);
        chmod(&mut acl, 0o700, true);
        assert!(acl.is_write_through());
        assert!(acl.is_masked());
        assert_eq!(masks_to_mode(&acl), 0o700);
    }

    #[test]
    fn test_chmod_strips_delete_child_for_files() {
        let mut acl = from_mode(0o750, false);
        chmod(&mut acl, 0o777, false);
        assert!(!acl.owner_mask.contains(Perm::DELETE_CHILD));
    }

    #[test]
    fn test_chmod_protects_auto_inherit_acl() {
        let mut acl = from_mode(0o750, true);
        acl.flags.insert(AclFlags::AUTO_INHERIT);
        chmod(&mut acl, 0o700, true);
        assert!(acl.is_protected());
    }

    #[test]
    fn test_compute_max_masks_everyone_allow_leaks_to_group_without_deny() {
        let mut acl = Acl::alloc(1);
        acl.entries.push(Entry::everyone(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA));
        compute_max_masks(&mut acl);
        assert_eq!(acl.group_mask, Perm::READ_DATA | Perm::WRITE_DATA);
        assert_eq!(acl.owner_mask, Perm::READ_DATA | Perm::WRITE_DATA);
        assert_eq!(acl.other_mask, Perm::READ_DATA | Perm::WRITE_DATA);
    }

    #[test]
    fn test_compute_max_masks_group_deny_restarts_and_excludes_everyone_write() {
        let mut acl = Acl::alloc(2);
        acl.entries.push(Entry::group(EntryType::Deny, Perm::WRITE_DATA));
        acl.entries.push(Entry::everyone(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA));
        compute_max_masks(&mut acl);
        // The group class is always denied WRITE_DATA by the explicit deny,
        // so the restart should exclude it from the group (and owner/other,
        // since everyone@ applies uniformly) upper bound... actually only
        // group is guaranteed denied; owner and other still see the
        // unconditional everyone@ allow.
        assert!(!acl.group_mask.contains(Perm::WRITE_DATA));
    }
}
