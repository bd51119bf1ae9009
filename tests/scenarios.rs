//! End-to-end scenarios spanning mode synthesis, evaluation, masking,
//! inheritance, and the binary codec.

use nix::unistd::{Gid, Uid};

use richacl::{
    eval, inherit, isolate, mask, xattr, Acl, AclFlags, Entry, EntryFlags, EntryType, Identity,
    Perm, SpecialWho,
};

fn uid(n: u32) -> Uid {
    Uid::from_raw(n)
}

fn gid(n: u32) -> Gid {
    Gid::from_raw(n)
}

#[test]
fn scenario_a_mode_to_acl_to_mode_roundtrip_for_directory() {
    let acl = mask::from_mode(0o750, true);
    assert!(acl.entries.iter().all(|e| e.is_allow()));
    assert_eq!(mask::masks_to_mode(&acl), 0o750);

    use richacl::equiv::equiv_mode;
    assert_eq!(equiv_mode(&acl, true), Ok(0o750));
}

#[test]
fn scenario_b_evaluation_with_masking() {
    let mut acl = Acl::alloc(1);
    acl.flags = AclFlags::MASKED;
    acl.owner_mask = Perm::READ_DATA | Perm::WRITE_DATA;
    acl.group_mask = Perm::READ_DATA;
    acl.other_mask = Perm::empty();
    acl.entries.push(Entry::everyone(
        EntryType::Allow,
        Perm::READ_DATA | Perm::WRITE_DATA | Perm::EXECUTE,
    ));

    let owner = uid(100);
    let owning_group = gid(200);

    assert!(eval::permission(&acl, owner, owning_group, uid(100), &[gid(200)], Perm::WRITE_DATA));
    assert!(!eval::permission(&acl, owner, owning_group, uid(300), &[gid(200)], Perm::WRITE_DATA));
    assert!(!eval::permission(&acl, owner, owning_group, uid(400), &[gid(500)], Perm::WRITE_DATA));
}

#[test]
fn scenario_c_chmod_then_apply_masks_preserves_owner_access() {
    let mut acl = Acl::alloc(1);
    acl.entries.push(Entry::everyone(EntryType::Allow, Perm::READ_DATA | Perm::WRITE_DATA | Perm::EXECUTE));

    let owner = uid(1);
    mask::chmod(&mut acl, 0o600, true);
    isolate::apply_masks(&mut acl, owner);

    assert!(!acl.is_masked());
    assert!(eval::permission(&acl, owner, gid(1), owner, &[], Perm::READ_DATA | Perm::WRITE_DATA));
    assert!(!eval::permission(&acl, owner, gid(1), uid(2), &[], Perm::READ_DATA));
}

#[test]
fn scenario_d_inheritance_splits_by_inherit_flag() {
    let mut parent = Acl::alloc(2);
    parent.entries.push(Entry::allow(
        EntryFlags::FILE_INHERIT,
        Perm::READ_DATA,
        Identity::Uid(uid(1001)),
    ));
    parent.entries.push(Entry::allow(
        EntryFlags::DIRECTORY_INHERIT,
        Perm::READ_DATA | Perm::WRITE_DATA,
        Identity::Special(SpecialWho::Group),
    ));

    let file_acl = inherit::inherit(&parent, false);
    assert_eq!(file_acl.entries.len(), 1);
    assert!(!file_acl.entries[0].is_inheritable());
    assert_eq!(file_acl.entries[0].identity, Identity::Uid(uid(1001)));

    let dir_acl = inherit::inherit(&parent, true);
    assert_eq!(dir_acl.entries.len(), 2);
    assert!(dir_acl.entries[0].is_inherit_only());
    assert!(!dir_acl.entries[1].is_inherit_only());
}

#[test]
fn scenario_e_auto_inherit_keeps_hand_added_entries() {
    let mut child = Acl::alloc(2);
    child.flags = AclFlags::AUTO_INHERIT;
    child.entries.push(Entry::allow(EntryFlags::INHERITED, Perm::READ_DATA, Identity::Uid(uid(1))));
    child.entries.push(Entry::allow(EntryFlags::empty(), Perm::WRITE_DATA, Identity::Uid(uid(2))));

    let mut new_inherited = Acl::alloc(1);
    new_inherited.entries.push(Entry::allow(EntryFlags::empty(), Perm::EXECUTE, Identity::Uid(uid(3))));

    let result = inherit::auto_inherit(&child, &new_inherited);
    assert_eq!(result.entries.len(), 2);
    assert_eq!(result.entries[0].identity, Identity::Uid(uid(2)));
    assert_eq!(result.entries[1].identity, Identity::Uid(uid(3)));
    assert!(result.entries[1].is_inherited());
}

#[test]
fn scenario_f_binary_roundtrip_preserves_unmapped_identity() {
    let mut acl = Acl::alloc(1);
    acl.entries.push(Entry::allow(
        EntryFlags::empty(),
        Perm::READ_DATA,
        Identity::Unmapped("guest@FOREIGN".into(), false),
    ));

    let bytes = xattr::to_xattr(&acl);
    let decoded = xattr::from_xattr(&bytes).expect("valid payload decodes");
    assert_eq!(decoded, acl);
    assert!(matches!(&decoded.entries[0].identity, Identity::Unmapped(name, false) if name == "guest@FOREIGN"));
}

#[test]
fn invariant_apply_masks_clears_masking_flags_and_preserves_permission() {
    let mut acl = mask::from_mode(0o750, true);
    acl.flags.insert(AclFlags::MASKED);
    let before = acl.clone();
    let owner = uid(1);

    isolate::apply_masks(&mut acl, owner);
    assert!(!acl.is_masked());
    assert!(!acl.is_write_through());

    for caller in [uid(1), uid(2), uid(3)] {
        for requested in [Perm::READ_DATA, Perm::WRITE_DATA, Perm::EXECUTE] {
            assert_eq!(
                eval::permission(&before, owner, gid(1), caller, &[gid(1)], requested),
                eval::permission(&acl, owner, gid(1), caller, &[gid(1)], requested),
            );
        }
    }
}

#[test]
fn invariant_compare_is_reflexive() {
    use richacl::equiv::compare;
    let acl = mask::from_mode(0o644, false);
    assert!(compare(&acl, &acl.clone()));
}

#[test]
fn invariant_masks_to_mode_roundtrips_from_mode() {
    for m in [0o000, 0o755, 0o644, 0o421, 0o600] {
        let acl = mask::from_mode(m, true);
        assert_eq!(mask::masks_to_mode(&acl), m);
    }
}
