//! The richacl text form: one line per entry, mnemonic letters for flags
//! and mask bits, parsed back by [`parse`] using the same tables [`to_text`]
//! writes with.
//!
//! Grounded on the four static tables in `richacl_text.c` and the
//! emit/parse logic of `richacl_to_text.c`/`richacl_from_text.c`. The file
//! and directory spellings of a mask bit (`read_data`/`list_directory` and
//! so on) share one bit and one single-character abbreviation; which long
//! name is shown is decided by the `is_dir` the caller passes to
//! [`to_text`], not per entry, which is a simplification against the
//! reference implementation's per-ace file/directory context tracking.

use std::fmt::Write as _;

use bitflags::bitflags;
use nix::unistd::{Gid, Uid};

use crate::acl::Acl;
use crate::entry::{Entry, EntryType};
use crate::error::{invalid_input, DiagnosticReporter, Result};
use crate::flag::{AclFlags, EntryFlags};
use crate::identity::{Identity, IdentityResolver, SpecialWho};
use crate::perm::Perm;

bitflags! {
    /// Formatting knobs for [`to_text`], mirroring `RICHACL_TEXT_*`.
    pub struct TextOptions: u32 {
        /// Spell flags and mask bits out as their long mnemonic names,
        /// slash-separated, instead of single letters.
        const LONG = 0x01;
        /// Entries are being rendered for a plain file.
        const FILE_CONTEXT = 0x02;
        /// Entries are being rendered for a directory.
        const DIRECTORY_CONTEXT = 0x04;
        /// Emit `owner:`/`group:`/`other:` mask header lines.
        const SHOW_MASKS = 0x08;
        /// Omit bits every class is always granted from the rendering.
        const SIMPLIFY = 0x10;
        /// Pad absent single-letter mask bits with `-` so columns line up.
        const ALIGN = 0x20;
        /// Never resolve uids/gids to names.
        const NUMERIC_IDS = 0x40;
    }
}

struct AclFlagBit {
    ch: char,
    flag: AclFlags,
    name: &'static str,
}

const ACL_FLAG_BITS: &[AclFlagBit] = &[
    AclFlagBit { ch: 'm', flag: AclFlags::MASKED, name: "masked" },
    AclFlagBit { ch: 'w', flag: AclFlags::WRITE_THROUGH, name: "write_through" },
    AclFlagBit { ch: 'a', flag: AclFlags::AUTO_INHERIT, name: "auto_inherit" },
    AclFlagBit { ch: 'p', flag: AclFlags::PROTECTED, name: "protected" },
    AclFlagBit { ch: 'd', flag: AclFlags::DEFAULTED, name: "defaulted" },
];

struct AceFlagBit {
    ch: char,
    flag: EntryFlags,
    name: &'static str,
}

const ACE_FLAG_BITS: &[AceFlagBit] = &[
    AceFlagBit { ch: 'f', flag: EntryFlags::FILE_INHERIT, name: "file_inherit" },
    AceFlagBit { ch: 'd', flag: EntryFlags::DIRECTORY_INHERIT, name: "dir_inherit" },
    AceFlagBit { ch: 'n', flag: EntryFlags::NO_PROPAGATE_INHERIT, name: "no_propagate" },
    AceFlagBit { ch: 'i', flag: EntryFlags::INHERIT_ONLY, name: "inherit_only" },
    AceFlagBit { ch: 'a', flag: EntryFlags::INHERITED, name: "inherited" },
    AceFlagBit { ch: 'u', flag: EntryFlags::UNMAPPED_WHO, name: "unmapped" },
];

struct MaskBit {
    ch: char,
    bit: Perm,
    file_name: &'static str,
    dir_name: Option<&'static str>,
}

const MASK_FLAGS: &[MaskBit] = &[
    MaskBit { ch: 'r', bit: Perm::READ_DATA, file_name: "read_data", dir_name: Some("list_directory") },
    MaskBit { ch: 'w', bit: Perm::WRITE_DATA, file_name: "write_data", dir_name: Some("add_file") },
    MaskBit { ch: 'p', bit: Perm::APPEND_DATA, file_name: "append_data", dir_name: Some("add_subdirectory") },
    MaskBit { ch: 'x', bit: Perm::EXECUTE, file_name: "execute", dir_name: None },
    MaskBit { ch: 'd', bit: Perm::DELETE_CHILD, file_name: "delete_child", dir_name: None },
    MaskBit { ch: 'D', bit: Perm::DELETE, file_name: "delete", dir_name: None },
    MaskBit { ch: 'a', bit: Perm::READ_ATTRIBUTES, file_name: "read_attributes", dir_name: None },
    MaskBit { ch: 'A', bit: Perm::WRITE_ATTRIBUTES, file_name: "write_attributes", dir_name: None },
    MaskBit { ch: 'R', bit: Perm::READ_NAMED_ATTRS, file_name: "read_named_attrs", dir_name: None },
    MaskBit { ch: 'W', bit: Perm::WRITE_NAMED_ATTRS, file_name: "write_named_attrs", dir_name: None },
    MaskBit { ch: 'c', bit: Perm::READ_ACL, file_name: "read_acl", dir_name: None },
    MaskBit { ch: 'C', bit: Perm::WRITE_ACL, file_name: "write_acl", dir_name: None },
    MaskBit { ch: 'o', bit: Perm::WRITE_OWNER, file_name: "write_owner", dir_name: None },
    MaskBit { ch: 'S', bit: Perm::SYNCHRONIZE, file_name: "synchronize", dir_name: None },
    MaskBit { ch: 'e', bit: Perm::WRITE_RETENTION, file_name: "write_retention", dir_name: None },
    MaskBit { ch: 'E', bit: Perm::WRITE_RETENTION_HOLD, file_name: "write_retention_hold", dir_name: None },
];

fn write_acl_flags(flags: AclFlags, opts: TextOptions) -> String {
    let long = opts.contains(TextOptions::LONG);
    let mut out = String::new();
    let mut remaining = flags;
    let mut wrote_any = false;
    for b in ACL_FLAG_BITS {
        if remaining.contains(b.flag) {
            if long {
                if wrote_any {
                    out.push('/');
                }
                out.push_str(b.name);
            } else {
                out.push(b.ch);
            }
            wrote_any = true;
            remaining.remove(b.flag);
        }
    }
    if !remaining.is_empty() {
        if long && wrote_any {
            out.push('/');
        }
        let _ = write!(out, "{:#x}", remaining.bits());
    }
    out
}

fn write_ace_flags(flags: EntryFlags, identity: &Identity, opts: TextOptions) -> String {
    let long = opts.contains(TextOptions::LONG);
    let mut effective = flags;
    if identity.is_unmapped() {
        effective.insert(EntryFlags::UNMAPPED_WHO);
    }
    let mut out = String::new();
    let mut wrote_any = false;
    for b in ACE_FLAG_BITS {
        if effective.contains(b.flag) {
            if long {
                if wrote_any {
                    out.push('/');
                }
                out.push_str(b.name);
            } else {
                out.push(b.ch);
            }
            wrote_any = true;
        }
    }
    out
}

fn write_type(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Allow => "allow",
        EntryType::Deny => "deny",
    }
}

fn write_mask(mask: Perm, is_dir: bool, opts: TextOptions) -> String {
    let long = opts.contains(TextOptions::LONG);
    let align = opts.contains(TextOptions::ALIGN);
    let mut effective = mask;
    if opts.contains(TextOptions::SIMPLIFY) {
        effective -= Perm::POSIX_ALWAYS_ALLOWED;
    }
    let mut out = String::new();
    let mut wrote_any = false;
    for b in MASK_FLAGS {
        let present = effective.contains(b.bit);
        if long {
            if present {
                if wrote_any {
                    out.push('/');
                }
                out.push_str(if is_dir { b.dir_name.unwrap_or(b.file_name) } else { b.file_name });
                wrote_any = true;
            }
        } else if present {
            out.push(b.ch);
            wrote_any = true;
        } else if align {
            out.push('-');
        }
    }
    let unrecognized = effective - Perm::VALID_MASK;
    if !unrecognized.is_empty() {
        if long && wrote_any {
            out.push('/');
        }
        let _ = write!(out, "{:#x}", unrecognized.bits());
    }
    out
}

fn identifier_text(identity: &Identity, resolver: &mut impl IdentityResolver, opts: TextOptions) -> String {
    match identity {
        Identity::Special(who) => who.as_str().to_ascii_lowercase(),
        Identity::Unmapped(name, _) => name.clone(),
        Identity::Uid(uid) => {
            if !opts.contains(TextOptions::NUMERIC_IDS) {
                if let Some(name) = resolver.user_name(*uid) {
                    return name;
                }
            }
            uid.as_raw().to_string()
        }
        Identity::Gid(gid) => {
            if !opts.contains(TextOptions::NUMERIC_IDS) {
                if let Some(name) = resolver.group_name(*gid) {
                    return name;
                }
            }
            gid.as_raw().to_string()
        }
    }
}

/// `richacl_to_text`: render `acl` as its text form.
pub fn to_text(acl: &Acl, is_dir: bool, opts: TextOptions, resolver: &mut impl IdentityResolver) -> String {
    let mut out = String::new();

    if !acl.flags.is_empty() {
        let _ = writeln!(out, "flags:{}", write_acl_flags(acl.flags, opts));
    }

    if opts.contains(TextOptions::SHOW_MASKS) {
        let shown = if opts.contains(TextOptions::SIMPLIFY) {
            acl.entries
                .iter()
                .filter(|e| e.is_allow() && !e.is_inherit_only())
                .fold(Perm::empty(), |m, e| m | e.mask)
        } else {
            Perm::VALID_MASK
        };
        let _ = writeln!(out, "owner:{}::mask", write_mask(acl.owner_mask & shown, is_dir, opts));
        let _ = writeln!(out, "group:{}::mask", write_mask(acl.group_mask & shown, is_dir, opts));
        let _ = writeln!(out, "other:{}::mask", write_mask(acl.other_mask & shown, is_dir, opts));
    }

    for ace in &acl.entries {
        let who = identifier_text(&ace.identity, resolver, opts);
        let mask_str = write_mask(ace.mask, is_dir, opts);
        let flags_str = write_ace_flags(ace.flags, &ace.identity, opts);
        let type_str = write_type(ace.entry_type);
        let _ = writeln!(out, "{who}:{mask_str}:{flags_str}:{type_str}");
    }

    out
}

fn parse_numeric(token: &str) -> std::result::Result<u32, ()> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|_| ())
    } else if token.len() > 1 && token.starts_with('0') && token.chars().all(|c| c.is_ascii_digit()) {
        u32::from_str_radix(&token[1..], 8).map_err(|_| ())
    } else {
        token.parse::<u32>().map_err(|_| ())
    }
}

fn acl_flags_from_text(text: &str) -> std::result::Result<AclFlags, String> {
    let mut flags = AclFlags::empty();
    for token in text.split('/') {
        if token.is_empty() {
            continue;
        }
        if let Ok(bits) = parse_numeric(token) {
            flags |= AclFlags::from_bits_truncate(bits as u8);
            continue;
        }
        if let Some(b) = ACL_FLAG_BITS.iter().find(|b| b.name.eq_ignore_ascii_case(token)) {
            flags |= b.flag;
            continue;
        }
        for ch in token.chars() {
            if ch == '-' {
                continue;
            }
            let b = ACL_FLAG_BITS.iter().find(|b| b.ch == ch).ok_or_else(|| format!("invalid acl flag '{ch}'"))?;
            flags |= b.flag;
        }
    }
    Ok(flags)
}

fn ace_flags_from_text(text: &str) -> std::result::Result<EntryFlags, String> {
    let mut flags = EntryFlags::empty();
    for token in text.split('/') {
        if token.is_empty() {
            continue;
        }
        if let Ok(bits) = parse_numeric(token) {
            flags |= EntryFlags::from_bits_truncate(bits as u16);
            continue;
        }
        if let Some(b) = ACE_FLAG_BITS.iter().find(|b| b.name.eq_ignore_ascii_case(token)) {
            flags |= b.flag;
            continue;
        }
        for ch in token.chars() {
            if ch == '-' {
                continue;
            }
            let b = ACE_FLAG_BITS.iter().find(|b| b.ch == ch).ok_or_else(|| format!("invalid entry flag '{ch}'"))?;
            flags |= b.flag;
        }
    }
    Ok(flags)
}

fn mask_from_text(text: &str) -> std::result::Result<Perm, String> {
    let mut mask = Perm::empty();
    for token in text.split('/') {
        if token.is_empty() {
            continue;
        }
        if let Ok(bits) = parse_numeric(token) {
            mask |= Perm::from_bits_truncate(bits);
            continue;
        }
        if let Some(b) = MASK_FLAGS
            .iter()
            .find(|b| b.file_name.eq_ignore_ascii_case(token) || b.dir_name.is_some_and(|n| n.eq_ignore_ascii_case(token)))
        {
            mask |= b.bit;
            continue;
        }
        for ch in token.chars() {
            if ch == '-' {
                continue;
            }
            let b = MASK_FLAGS.iter().find(|b| b.ch == ch).ok_or_else(|| format!("invalid access mask '{ch}'"))?;
            mask |= b.bit;
        }
    }
    Ok(mask)
}

fn type_from_text(text: &str) -> std::result::Result<EntryType, String> {
    if text.eq_ignore_ascii_case("allow") {
        return Ok(EntryType::Allow);
    }
    if text.eq_ignore_ascii_case("deny") {
        return Ok(EntryType::Deny);
    }
    match parse_numeric(text) {
        Ok(0) => Ok(EntryType::Allow),
        Ok(1) => Ok(EntryType::Deny),
        _ => Err(format!("invalid entry type '{text}'")),
    }
}

/// Resolves `who` to an [`Identity`], given whether a `user:`/`group:`
/// prefix put it in group context. Special-who mnemonics (`owner@` etc.)
/// win regardless of that context; the caller rejects the combination of a
/// prefix with a special-who result afterward, matching the reference
/// implementation's separate post-hoc check.
fn identifier_from_text(who: &str, is_group: bool, resolver: &mut impl IdentityResolver) -> std::result::Result<Identity, String> {
    if who.contains('@') {
        return SpecialWho::parse(who).map(Identity::Special).ok_or_else(|| format!("invalid special identifier '{who}'"));
    }
    if let Ok(id) = who.parse::<u32>() {
        return Ok(if is_group { Identity::Gid(Gid::from_raw(id)) } else { Identity::Uid(Uid::from_raw(id)) });
    }
    if is_group {
        resolver.resolve_group(who).map(Identity::Gid).map_err(|e| e.to_string())
    } else {
        resolver.resolve_user(who).map(Identity::Uid).map_err(|e| e.to_string())
    }
}

fn strip_ci_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes()) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn split_entries(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c == '\n').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_entry(entry: &str, resolver: &mut impl IdentityResolver, acl: &mut Acl) -> std::result::Result<(), String> {
    let (prefix_group, rest) = if let Some(r) = strip_ci_prefix(entry, "user:") {
        (Some(false), r)
    } else if let Some(r) = strip_ci_prefix(entry, "u:") {
        (Some(false), r)
    } else if let Some(r) = strip_ci_prefix(entry, "group:") {
        (Some(true), r)
    } else if let Some(r) = strip_ci_prefix(entry, "g:") {
        (Some(true), r)
    } else {
        (None, entry)
    };

    let mut fields = rest.splitn(4, ':');
    let who = fields.next().ok_or_else(|| format!("invalid entry '{entry}'"))?;

    if prefix_group.is_none() && who.eq_ignore_ascii_case("flags") {
        let rest = fields.next().unwrap_or("");
        acl.flags = acl_flags_from_text(rest)?;
        return Ok(());
    }

    let mask_str = fields.next().ok_or_else(|| format!("invalid entry '{entry}'"))?;
    let flags_str = fields.next().ok_or_else(|| format!("invalid entry '{entry}'"))?;
    let type_str = fields.next().ok_or_else(|| format!("invalid entry '{entry}'"))?;

    let mask = mask_from_text(mask_str)?;

    if type_str.eq_ignore_ascii_case("mask") {
        if prefix_group.is_some() {
            return Err(format!("invalid entry '{entry}'"));
        }
        match who.to_ascii_lowercase().as_str() {
            "owner" => acl.owner_mask = mask,
            "group" => acl.group_mask = mask,
            "other" => acl.other_mask = mask,
            _ => return Err(format!("invalid file mask '{who}'")),
        }
        return Ok(());
    }

    let raw_flags = ace_flags_from_text(flags_str)?;
    let identity = if raw_flags.contains(EntryFlags::UNMAPPED_WHO) {
        Identity::Unmapped(who.to_string(), prefix_group.unwrap_or(false))
    } else {
        identifier_from_text(who, prefix_group.unwrap_or(false), resolver)?
    };

    let is_special = matches!(identity, Identity::Special(_));
    if prefix_group.is_some() == is_special {
        return Err(format!("invalid entry '{entry}'"));
    }

    let entry_type = type_from_text(type_str)?;
    acl.entries.push(Entry::new(entry_type, raw_flags, mask, identity));
    Ok(())
}

/// `richacl_from_text`: parse a text-form ACL. `resolver` maps user/group
/// names to ids; `reporter` receives one diagnostic for the first malformed
/// entry before parsing stops.
pub fn parse(text: &str, resolver: &mut impl IdentityResolver, reporter: &mut impl DiagnosticReporter) -> Result<Acl> {
    let mut acl = Acl::alloc(0);
    for (line_no, raw) in split_entries(text).enumerate() {
        if let Err(msg) = parse_entry(raw, resolver, &mut acl) {
            reporter.report(line_no + 1, 1, &msg);
            return Err(invalid_input(msg));
        }
    }
    Ok(acl)
}
