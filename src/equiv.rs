//! Collapsing a rich ACL back down to a bare POSIX mode when it's narrow
//! enough to mean one, and structural equality between two ACLs.

use crate::acl::Acl;
use crate::error::{not_representable, Result};
use crate::flag::AclFlags;
use crate::identity::{Identity, SpecialWho};
use crate::perm::{self, Perm};

#[derive(Clone, Copy)]
struct ClassMask {
    allowed: Perm,
    defined: Perm,
}

/// `richacl_equiv_mode`: an ACL is equivalent to a mode if it names only
/// `owner@`, `group@`, and `everyone@`, carries no flags beyond the masking
/// ones, and the owner's effective permissions don't secretly depend on
/// whether the owner happens to be a member of the owning group. Returns
/// the equivalent mode's permission bits (0 through 0o777), or
/// [`not_representable`] if no mode says the same thing this ACL does.
pub fn equiv_mode(acl: &Acl, is_dir: bool) -> Result<u32> {
    let ignored = if is_dir { Perm::empty() } else { Perm::DELETE_CHILD };

    if !(acl.flags - (AclFlags::WRITE_THROUGH | AclFlags::MASKED)).is_empty() {
        return Err(not_representable("acl carries flags beyond write_through/masked"));
    }

    let mut owner = ClassMask { allowed: Perm::empty(), defined: Perm::POSIX_ALWAYS_ALLOWED | Perm::POSIX_OWNER_ALLOWED | ignored };
    let mut group = ClassMask { allowed: Perm::empty(), defined: Perm::POSIX_ALWAYS_ALLOWED | ignored };
    let mut everyone = ClassMask { allowed: Perm::empty(), defined: Perm::POSIX_ALWAYS_ALLOWED | ignored };

    for ace in &acl.entries {
        let Identity::Special(who) = ace.identity else {
            return Err(not_representable("acl names an identity other than owner@/group@/everyone@"));
        };
        if !ace.flags.is_empty() {
            return Err(not_representable("acl entry carries flags beyond the masking ones"));
        }

        match who {
            SpecialWho::Owner | SpecialWho::Everyone => {
                let x = ace.mask - owner.defined;
                if ace.is_allow() {
                    let group_denied = group.defined - group.allowed;
                    if !(x & group_denied).is_empty() {
                        return Err(not_representable("owner@/everyone@ allow grants a bit the group class is always denied"));
                    }
                    owner.allowed |= x;
                } else if !(x & group.allowed).is_empty() {
                    return Err(not_representable("owner@/everyone@ deny withholds a bit the group class is always allowed"));
                }
                owner.defined |= x;

                if who == SpecialWho::Everyone {
                    let x = ace.mask;
                    if ace.is_allow() {
                        group.allowed |= x - group.defined;
                        everyone.allowed |= x - everyone.defined;
                    }
                    group.defined |= x;
                    everyone.defined |= x;
                }
            }
            SpecialWho::Group => {
                let x = ace.mask - group.defined;
                if ace.is_allow() {
                    group.allowed |= x;
                }
                group.defined |= x;
            }
        }
    }

    if !(group.allowed - owner.defined).is_empty() {
        return Err(not_representable("group class is allowed a bit the owner class is not"));
    }

    if acl.is_masked() {
        if acl.is_write_through() {
            owner.allowed = acl.owner_mask;
            everyone.allowed = acl.other_mask;
        } else {
            owner.allowed &= acl.owner_mask;
            everyone.allowed &= acl.other_mask;
        }
        group.allowed &= acl.group_mask;
    }

    let mode = (perm::mask_to_mode(owner.allowed) << 6) | (perm::mask_to_mode(group.allowed) << 3) | perm::mask_to_mode(everyone.allowed);

    let owner_mismatch = !((perm::mode_to_mask(mode >> 6) ^ owner.allowed) - ignored).is_empty();
    let group_mismatch = !((perm::mode_to_mask(mode >> 3) ^ group.allowed) - ignored).is_empty();
    let other_mismatch = !((perm::mode_to_mask(mode) ^ everyone.allowed) - ignored).is_empty();
    if owner_mismatch || group_mismatch || other_mismatch {
        return Err(not_representable("a class's allowed permissions don't collapse onto a single mode bit"));
    }

    Ok(mode)
}

/// `richacl_compare`: structural equality, field for field. Exposed as a
/// named function (rather than leaving callers to reach for `==`) because
/// it mirrors a public entry point of the reference implementation that
/// callers may want to call out by name, e.g. when deciding whether a
/// chmod actually changed anything.
pub fn compare(a: &Acl, b: &Acl) -> bool {
    a == b
}
