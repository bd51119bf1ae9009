//! The binary wire form stored in the `richacl` extended attribute: a fixed
//! header, one fixed-size record per entry, and a trailing run of
//! NUL-terminated name strings for entries whose identity couldn't be
//! mapped to a numeric id. All multi-byte fields are little-endian.
//!
//! Grounded on `include/uapi/linux/richacl_xattr.h` (`struct richacl_xattr`,
//! `struct richace_xattr`) and the validation order in
//! `lib/richacl_xattr.c`/`lib/richacl_from_xattr.c`.

use nix::unistd::{Gid, Uid};

use crate::acl::Acl;
use crate::entry::{Entry, EntryType};
use crate::error::{capacity_exceeded, invalid_input, Result};
use crate::flag::{AclFlags, EntryFlags};
use crate::identity::{Identity, SpecialWho};
use crate::perm::Perm;

const XATTR_VERSION: u8 = 0;
const HEADER_LEN: usize = 16;
const ENTRY_LEN: usize = 12;

/// The system's typical extended-attribute value size ceiling
/// (`XATTR_SIZE_MAX`), used only to size [`MAX_COUNT`] the way the
/// reference implementation does; this module performs no xattr syscalls
/// itself.
const XATTR_SIZE_MAX: usize = 65536;

/// `RICHACL_XATTR_MAX_COUNT`: the most entries a binary payload can carry
/// before even an all-numeric-id encoding would exceed `XATTR_SIZE_MAX`.
pub const MAX_COUNT: usize = (XATTR_SIZE_MAX - HEADER_LEN) / ENTRY_LEN;

const EVERYONE_SPECIAL_ID: u32 = 2;

fn special_id(who: SpecialWho) -> u32 {
    match who {
        SpecialWho::Owner => 0,
        SpecialWho::Group => 1,
        SpecialWho::Everyone => 2,
    }
}

fn special_from_id(id: u32) -> Option<SpecialWho> {
    match id {
        0 => Some(SpecialWho::Owner),
        1 => Some(SpecialWho::Group),
        2 => Some(SpecialWho::Everyone),
        _ => None,
    }
}

/// The size a binary encoding of `acl` would take, header plus one record
/// per entry plus every unmapped identity's name string.
pub fn xattr_size(acl: &Acl) -> usize {
    let mut size = HEADER_LEN + ENTRY_LEN * acl.entries.len();
    for entry in &acl.entries {
        if let Identity::Unmapped(name, _) = &entry.identity {
            size += name.len() + 1;
        }
    }
    size
}

/// `richacl_to_xattr`: encode `acl` into its binary wire form.
pub fn to_xattr(acl: &Acl) -> Vec<u8> {
    let mut buf = Vec::with_capacity(xattr_size(acl));

    buf.push(XATTR_VERSION);
    buf.push(acl.flags.bits());
    buf.extend_from_slice(&(acl.entries.len() as u16).to_le_bytes());
    buf.extend_from_slice(&acl.owner_mask.bits().to_le_bytes());
    buf.extend_from_slice(&acl.group_mask.bits().to_le_bytes());
    buf.extend_from_slice(&acl.other_mask.bits().to_le_bytes());

    let mut names = Vec::new();
    for entry in &acl.entries {
        let mut flags = entry.flags & EntryFlags::VALID_FLAGS;
        let id = match &entry.identity {
            Identity::Special(who) => {
                flags.insert(EntryFlags::SPECIAL_WHO);
                special_id(*who)
            }
            Identity::Uid(uid) => uid.as_raw(),
            Identity::Gid(gid) => {
                flags.insert(EntryFlags::IDENTIFIER_GROUP);
                gid.as_raw()
            }
            Identity::Unmapped(name, is_group) => {
                flags.insert(EntryFlags::UNMAPPED_WHO);
                if *is_group {
                    flags.insert(EntryFlags::IDENTIFIER_GROUP);
                }
                names.extend_from_slice(name.as_bytes());
                names.push(0);
                0
            }
        };

        let entry_type: u16 = match entry.entry_type {
            EntryType::Allow => 0,
            EntryType::Deny => 1,
        };
        buf.extend_from_slice(&entry_type.to_le_bytes());
        buf.extend_from_slice(&flags.bits().to_le_bytes());
        buf.extend_from_slice(&entry.mask.bits().to_le_bytes());
        buf.extend_from_slice(&id.to_le_bytes());
    }

    buf.extend_from_slice(&names);
    buf
}

/// `richacl_from_xattr`: decode a binary wire-form payload. Rejects
/// anything the version, flag, count, or per-entry checks in the
/// reference decoder would reject, including a trailing-bytes mismatch
/// (the names section must be exactly as long as the entries that claim
/// one need, no more and no less).
pub fn from_xattr(bytes: &[u8]) -> Result<Acl> {
    if bytes.len() < HEADER_LEN {
        return Err(invalid_input("xattr payload shorter than the header"));
    }

    let version = bytes[0];
    if version != XATTR_VERSION {
        return Err(invalid_input(format!("unsupported xattr version {version}")));
    }
    let flags = AclFlags::from_bits_truncate(bytes[1]);
    if !(flags - AclFlags::VALID_FLAGS).is_empty() {
        return Err(invalid_input("acl flags contain unknown bits"));
    }
    let count = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
    if count > MAX_COUNT {
        return Err(capacity_exceeded(format!("{count} entries exceeds the xattr entry limit of {MAX_COUNT}")));
    }
    let owner_mask = Perm::from_bits_truncate(u32::from_le_bytes(bytes[4..8].try_into().unwrap()));
    let group_mask = Perm::from_bits_truncate(u32::from_le_bytes(bytes[8..12].try_into().unwrap()));
    let other_mask = Perm::from_bits_truncate(u32::from_le_bytes(bytes[12..16].try_into().unwrap()));

    let entries_end = HEADER_LEN
        .checked_add(count * ENTRY_LEN)
        .ok_or_else(|| invalid_input("entry count overflows payload size"))?;
    if bytes.len() < entries_end {
        return Err(invalid_input("xattr payload too short for its entry count"));
    }
    let mut names = &bytes[entries_end..];
    if !names.is_empty() && *names.last().unwrap() != 0 {
        return Err(invalid_input("xattr name section is not NUL-terminated"));
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let rec = &bytes[HEADER_LEN + i * ENTRY_LEN..HEADER_LEN + (i + 1) * ENTRY_LEN];
        let entry_type = match u16::from_le_bytes([rec[0], rec[1]]) {
            0 => EntryType::Allow,
            1 => EntryType::Deny,
            other => return Err(invalid_input(format!("entry {i}: invalid entry type {other}"))),
        };
        let raw_flags = u16::from_le_bytes([rec[2], rec[3]]);
        let entry_flags = EntryFlags::from_bits_truncate(raw_flags);
        let mask = Perm::from_bits_truncate(u32::from_le_bytes(rec[4..8].try_into().unwrap()));
        let id = u32::from_le_bytes(rec[8..12].try_into().unwrap());

        let identity = if entry_flags.contains(EntryFlags::SPECIAL_WHO) {
            if id > EVERYONE_SPECIAL_ID {
                return Err(invalid_input(format!("entry {i}: invalid special who id {id}")));
            }
            Identity::Special(special_from_id(id).unwrap())
        } else if entry_flags.contains(EntryFlags::UNMAPPED_WHO) {
            let nul = names
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| invalid_input(format!("entry {i}: missing name for unmapped identity")))?;
            let name = std::str::from_utf8(&names[..nul])
                .map_err(|_| invalid_input(format!("entry {i}: unmapped identity name is not valid UTF-8")))?
                .to_string();
            names = &names[nul + 1..];
            Identity::Unmapped(name, entry_flags.contains(EntryFlags::IDENTIFIER_GROUP))
        } else if entry_flags.contains(EntryFlags::IDENTIFIER_GROUP) {
            Identity::Gid(Gid::from_raw(id))
        } else {
            Identity::Uid(Uid::from_raw(id))
        };

        entries.push(Entry::new(entry_type, entry_flags, mask, identity));
    }

    if !names.is_empty() {
        return Err(invalid_input("trailing bytes after the xattr name section"));
    }

    Ok(Acl::new(flags, owner_mask, group_mask, other_mask, entries))
}
