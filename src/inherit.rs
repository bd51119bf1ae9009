//! Computing the ACL a new file or directory inherits from its parent, and
//! keeping an auto-inheriting ACL's inherited entries in sync with the
//! parent's inheritable ones.

use nix::unistd::Uid;

use crate::acl::Acl;
use crate::flag::{AclFlags, EntryFlags};
use crate::isolate::apply_masks;
use crate::mask::compute_max_masks;
use crate::perm::{self, Perm};

fn inherits_to_directory(flags: EntryFlags) -> bool {
    flags.contains(EntryFlags::DIRECTORY_INHERIT)
        || (flags.contains(EntryFlags::FILE_INHERIT) && !flags.contains(EntryFlags::NO_PROPAGATE_INHERIT))
}

/// `richacl_inherit`: the ACL a newly created file or directory inherits
/// from `dir_acl`, the ACL of its containing directory. Entries that don't
/// carry an inheritance flag contribute nothing; a plain file never
/// inherits `DIRECTORY_INHERIT`-only entries, and loses every inheritance
/// flag from what it does inherit, since a file has no children to pass
/// anything on to.
pub fn inherit(dir_acl: &Acl, is_dir: bool) -> Acl {
    let mut entries = Vec::new();

    if is_dir {
        for dir_ace in &dir_acl.entries {
            if !inherits_to_directory(dir_ace.flags) {
                continue;
            }
            let mut ace = dir_ace.clone();
            if ace.flags.contains(EntryFlags::NO_PROPAGATE_INHERIT) {
                ace.flags.remove(EntryFlags::INHERITANCE_FLAGS);
            } else if ace.flags.contains(EntryFlags::DIRECTORY_INHERIT) {
                ace.flags.remove(EntryFlags::INHERIT_ONLY);
            } else {
                ace.flags.insert(EntryFlags::INHERIT_ONLY);
            }
            entries.push(ace);
        }
    } else {
        for dir_ace in &dir_acl.entries {
            if !dir_ace.flags.contains(EntryFlags::FILE_INHERIT) {
                continue;
            }
            let mut ace = dir_ace.clone();
            ace.flags.remove(EntryFlags::INHERITANCE_FLAGS);
            ace.mask.remove(Perm::DELETE_CHILD);
            entries.push(ace);
        }
    }

    let flags = if dir_acl.is_auto_inherit() {
        for ace in &mut entries {
            ace.flags.insert(EntryFlags::INHERITED);
        }
        AclFlags::AUTO_INHERIT
    } else {
        for ace in &mut entries {
            ace.flags.remove(EntryFlags::INHERITED);
        }
        AclFlags::empty()
    };

    Acl::new(flags, Perm::empty(), Perm::empty(), Perm::empty(), entries)
}

/// `richacl_inherit_inode`: compute the inherited ACL and adjust `mode`'s
/// permission bits for a new inode, the way a kernel applies `umask` when
/// there's no richacl to inherit and a create-mode cap when there is.
///
/// `mode` must already carry the create mode's permission bits; it comes
/// back with those bits narrowed by `umask` (no inheritable ACL) or by
/// what the inherited ACL's maximal grant allows (there is one). Returns
/// `None` (with `mode` narrowed by `umask`) when there's nothing to
/// inherit or the inherited ACL turned out to be a plain mode after all.
pub fn inherit_inode(dir_acl: &Acl, mode: &mut u32, is_dir: bool, umask: u32) -> Option<Acl> {
    let mut acl = inherit(dir_acl, is_dir);
    if acl.entries.is_empty() {
        *mode &= !umask;
        return None;
    }

    if let Ok(equiv) = crate::equiv::equiv_mode(&acl, is_dir) {
        *mode &= equiv;
        return None;
    }

    if acl.is_auto_inherit() {
        acl.flags.insert(AclFlags::PROTECTED);
    }

    compute_max_masks(&mut acl);
    acl.flags.insert(AclFlags::MASKED);
    acl.owner_mask &= perm::mode_to_mask(*mode >> 6);
    acl.group_mask &= perm::mode_to_mask(*mode >> 3);
    acl.other_mask &= perm::mode_to_mask(*mode);

    Some(acl)
}

/// `richacl_auto_inherit`: re-derive an auto-inheriting ACL's inherited
/// entries from its parent's current inheritable set, keeping everything
/// the owner added by hand. Strips every existing `INHERITED_ACE` entry
/// and appends a fresh copy of each of `inherited_acl`'s entries in its
/// place, each newly marked inherited.
pub fn auto_inherit(acl: &Acl, inherited_acl: &Acl) -> Acl {
    let mut entries: Vec<_> = acl.entries.iter().filter(|e| !e.is_inherited()).cloned().collect();

    for ace in &inherited_acl.entries {
        let mut copy = ace.clone();
        copy.flags.insert(EntryFlags::INHERITED);
        entries.push(copy);
    }

    Acl::new(acl.flags, acl.owner_mask, acl.group_mask, acl.other_mask, entries)
}

/// Apply an inherited, masked ACL to a freshly created inode: narrows the
/// ACL's entries down to what its class masks actually promise and clears
/// the masking flags, the step `richacl_inherit_inode`'s caller is expected
/// to take once the new inode's owner is known.
pub fn finish_inherited(acl: &mut Acl, owner: Uid) {
    apply_masks(acl, owner);
}

#[cfg(test)]
mod inherit_tests {
    use super::*;
    use crate::entry::{Entry, EntryType};
    use crate::identity::{Identity, SpecialWho};

    #[test]
    fn test_inherit_to_directory_keeps_dir_inherit_entries_non_inherit_only() {
        let mut dir_acl = Acl::alloc(1);
        dir_acl.entries.push(Entry::allow(
            EntryFlags::DIRECTORY_INHERIT | EntryFlags::FILE_INHERIT,
            Perm::READ_DATA,
            Identity::Special(SpecialWho::Owner),
        ));
        let acl = inherit(&dir_acl, true);
        assert_eq!(acl.entries.len(), 1);
        assert!(!acl.entries[0].is_inherit_only());
        assert!(acl.entries[0].is_inheritable());
    }

    #[test]
    fn test_inherit_to_directory_marks_file_only_entry_inherit_only() {
        let mut dir_acl = Acl::alloc(1);
        dir_acl.entries.push(Entry::allow(EntryFlags::FILE_INHERIT, Perm::READ_DATA, Identity::Special(SpecialWho::Owner)));
        let acl = inherit(&dir_acl, true);
        assert!(acl.entries[0].is_inherit_only());
    }

    #[test]
    fn test_inherit_to_file_strips_inheritance_flags_and_delete_child() {
        let mut dir_acl = Acl::alloc(1);
        dir_acl.entries.push(Entry::allow(
            EntryFlags::FILE_INHERIT | EntryFlags::DIRECTORY_INHERIT,
            Perm::READ_DATA | Perm::DELETE_CHILD,
            Identity::Special(SpecialWho::Owner),
        ));
        let acl = inherit(&dir_acl, false);
        assert!(!acl.entries[0].is_inheritable());
        assert!(!acl.entries[0].mask.contains(Perm::DELETE_CHILD));
    }

    #[test]
    fn test_inherit_skips_entries_without_matching_inheritance_flag() {
        let mut dir_acl = Acl::alloc(1);
        dir_acl.entries.push(Entry::owner(EntryType::Allow, Perm::READ_DATA));
        let acl = inherit(&dir_acl, true);
        assert!(acl.entries.is_empty());
    }

    #[test]
    fn test_inherit_inode_falls_back_to_umask_with_no_inheritable_entries() {
        let dir_acl = Acl::alloc(0);
        let mut mode = 0o666;
        let result = inherit_inode(&dir_acl, &mut mode, false, 0o022);
        assert!(result.is_none());
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_inherit_inode_drops_equiv_acl_and_narrows_mode() {
        let mut dir_acl = Acl::alloc(1);
        dir_acl.entries.push(Entry::allow(
            EntryFlags::FILE_INHERIT | EntryFlags::DIRECTORY_INHERIT,
            Perm::READ_DATA | Perm::WRITE_DATA,
            Identity::Special(SpecialWho::Owner),
        ));
        let mut mode = 0o666;
        let result = inherit_inode(&dir_acl, &mut mode, false, 0o022);
        assert!(result.is_none());
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_inherit_inode_masks_inherited_acl_by_create_mode() {
        let mut dir_acl = Acl::alloc(1);
        dir_acl.entries.push(Entry::allow(
            EntryFlags::FILE_INHERIT | EntryFlags::DIRECTORY_INHERIT,
            Perm::READ_DATA | Perm::WRITE_DATA | Perm::EXECUTE,
            Identity::Uid(nix::unistd::Uid::from_raw(500)),
        ));
        let mut mode = 0o600;
        let result = inherit_inode(&dir_acl, &mut mode, false, 0o000);
        let acl = result.expect("non-equiv ACL should survive inheritance");
        assert!(acl.is_masked());
        assert!(!acl.owner_mask.contains(Perm::EXECUTE));
    }

    #[test]
    fn test_auto_inherit_replaces_only_inherited_entries() {
        let mut acl = Acl::alloc(2);
        acl.entries.push(Entry::owner(EntryType::Allow, Perm::READ_DATA));
        acl.entries.push(Entry::allow(EntryFlags::INHERITED, Perm::WRITE_DATA, Identity::Special(SpecialWho::Everyone)));
        acl.flags = AclFlags::AUTO_INHERIT;

        let mut parent_inherited = Acl::alloc(1);
        parent_inherited.entries.push(Entry::everyone(EntryType::Allow, Perm::EXECUTE));

        let result = auto_inherit(&acl, &parent_inherited);
        assert_eq!(result.entries.len(), 2);
        assert!(result.entries[0].is_owner());
        assert!(result.entries[1].is_inherited());
        assert_eq!(result.entries[1].mask, Perm::EXECUTE);
    }
}
