//! The `Acl` container and the growth-cursor helper the isolator and
//! inheritance passes use to delete, split, and append entries while
//! walking the entry list forward.

use crate::entry::Entry;
use crate::error::{capacity_exceeded, invalid_input, Result};
use crate::flag::{AclFlags, EntryFlags};
use crate::perm::Perm;

/// The largest entry count any pass is willing to grow an ACL to. The
/// reference implementation ties this to the xattr size ceiling; entry
/// counts beyond it cannot round-trip through the binary codec, so the
/// isolator refuses to produce them in the first place.
pub const MAX_ENTRIES: usize = 1 << 16;

/// A rich access control list: three per-class masks plus an ordered
/// sequence of entries evaluated first-match-wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub flags: AclFlags,
    pub owner_mask: Perm,
    pub group_mask: Perm,
    pub other_mask: Perm,
    pub entries: Vec<Entry>,
}

impl Acl {
    /// An ACL with empty masks, no flags, and no entries, with `capacity`
    /// entries of storage reserved. Mirrors `richacl_alloc`'s role as the
    /// starting point for the synthesis routines in `mask.rs`, without the
    /// C side's need to pre-zero a fixed-size array: callers push entries
    /// as they're built instead of filling indices of a preallocated run.
    pub fn alloc(capacity: usize) -> Acl {
        Acl {
            flags: AclFlags::empty(),
            owner_mask: Perm::empty(),
            group_mask: Perm::empty(),
            other_mask: Perm::empty(),
            entries: Vec::with_capacity(capacity),
        }
    }

    /// An ACL built from already-constructed masks and entries.
    pub fn new(flags: AclFlags, owner_mask: Perm, group_mask: Perm, other_mask: Perm, entries: Vec<Entry>) -> Acl {
        Acl { flags, owner_mask, group_mask, other_mask, entries }
    }

    pub fn is_auto_inherit(&self) -> bool {
        self.flags.contains(AclFlags::AUTO_INHERIT)
    }

    pub fn is_protected(&self) -> bool {
        self.flags.contains(AclFlags::PROTECTED)
    }

    pub fn is_masked(&self) -> bool {
        self.flags.contains(AclFlags::MASKED)
    }

    pub fn is_write_through(&self) -> bool {
        self.flags.contains(AclFlags::WRITE_THROUGH)
    }

    /// Structural well-formedness: every entry's mask and flags stay
    /// within their valid bit ranges, and the entry count stays within
    /// what the binary codec can represent.
    pub fn validate(&self) -> Result<()> {
        if self.entries.len() > MAX_ENTRIES {
            return Err(capacity_exceeded(format!(
                "{} entries exceeds the {} entry limit",
                self.entries.len(),
                MAX_ENTRIES
            )));
        }
        if !(self.flags & !AclFlags::VALID_FLAGS).is_empty() {
            return Err(invalid_input("acl flags contain unknown bits"));
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if !(entry.flags & !EntryFlags::VALID_FLAGS).is_empty() {
                return Err(invalid_input(format!("entry {i} flags contain unknown bits")));
            }
            if !(entry.mask & !Perm::VALID_MASK).is_empty() {
                return Err(invalid_input(format!("entry {i} mask contains unknown bits")));
            }
        }
        Ok(())
    }
}

/// A position in an entry list that the caller is iterating forward over
/// while possibly deleting, splitting, or appending at the current
/// position. The reference implementation walks a fixed-size array with a
/// raw pointer and a side "room to grow" allocation; here the backing
/// store is a `Vec` that grows itself, so all that's left to model is
/// where the walk should resume after a mutation changes the list's shape
/// out from under it.
pub(crate) struct Cursor<'a> {
    pub entries: &'a mut Vec<Entry>,
    pub index: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(entries: &'a mut Vec<Entry>) -> Cursor<'a> {
        Cursor { entries, index: 0 }
    }

    /// A cursor already positioned at `index`, for callers that located the
    /// entry to mutate by scanning rather than walking from the front.
    pub fn at(entries: &'a mut Vec<Entry>, index: usize) -> Cursor<'a> {
        Cursor { entries, index }
    }

    pub fn done(&self) -> bool {
        self.index >= self.entries.len()
    }

    pub fn get(&self) -> &Entry {
        &self.entries[self.index]
    }

    pub fn get_mut(&mut self) -> &mut Entry {
        &mut self.entries[self.index]
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    /// Removes the current entry. The next entry slides into this index,
    /// so the cursor steps back one position; the caller's subsequent
    /// `advance()` then lands back on it. `index` is `usize`, so stepping
    /// back from 0 wraps to `usize::MAX`; the following `advance()` wraps
    /// it right back to 0, which is exactly where the walk should resume.
    pub fn delete_entry(&mut self) {
        self.entries.remove(self.index);
        self.index = self.index.wrapping_sub(1);
    }

    /// Inserts `entry` immediately before the current position. The
    /// current entry (and everything after it) shifts one slot to the
    /// right; the cursor stays put, so it now names the newly inserted
    /// entry rather than the one it used to name.
    pub fn insert_before(&mut self, entry: Entry) {
        self.entries.insert(self.index, entry);
    }

    pub fn append_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// `richace_change_mask`: give the current entry a new effective mask,
    /// splitting it if it's inheritable and the new mask can't be
    /// expressed as `INHERIT_ONLY` alone, or dropping it if it would
    /// collapse to nothing a non-inheritable entry still needs.
    ///
    /// After this call the cursor still names the entry that should be
    /// treated as "the current one" for the rest of this iteration step;
    /// a plain `advance()` afterward resumes the walk correctly in every
    /// case, including the delete case, where it relies on the wraparound
    /// above.
    pub fn change_mask(&mut self, mask: Perm) {
        let current = self.get();
        if mask == current.mask {
            self.get_mut().flags.remove(EntryFlags::INHERIT_ONLY);
            return;
        }

        let exceeds_always_allowed = !(mask - Perm::POSIX_ALWAYS_ALLOWED).is_empty();
        if exceeds_always_allowed {
            if current.is_inheritable() {
                let mut effective = current.clone();
                effective.flags.remove(EntryFlags::INHERITANCE_FLAGS);
                effective.mask = mask;
                self.get_mut().flags.insert(EntryFlags::INHERIT_ONLY);
                self.entries.insert(self.index + 1, effective);
                self.index += 1;
            } else {
                self.get_mut().mask = mask;
            }
        } else if current.is_inheritable() {
            self.get_mut().flags.insert(EntryFlags::INHERIT_ONLY);
        } else {
            self.delete_entry();
        }
    }
}

#[cfg(test)]
mod acl_tests {
    use super::*;
    use crate::entry::EntryType;
    use crate::identity::{Identity, SpecialWho};

    fn everyone(mask: Perm, flags: EntryFlags) -> Entry {
        Entry::new(EntryType::Allow, flags, mask, Identity::Special(SpecialWho::Everyone))
    }

    #[test]
    fn test_validate_rejects_oversized_mask() {
        let mut acl = Acl::alloc(1);
        let mut bad = everyone(Perm::READ_DATA, EntryFlags::empty());
        bad.mask = Perm::from_bits_truncate(1 << 30);
        acl.entries.push(bad);
        assert!(acl.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed_acl() {
        let mut acl = Acl::alloc(1);
        acl.entries.push(everyone(Perm::READ_DATA, EntryFlags::empty()));
        assert!(acl.validate().is_ok());
    }

    #[test]
    fn test_cursor_delete_resumes_at_same_index() {
        let mut entries = vec![
            everyone(Perm::READ_DATA, EntryFlags::empty()),
            everyone(Perm::WRITE_DATA, EntryFlags::empty()),
            everyone(Perm::EXECUTE, EntryFlags::empty()),
        ];
        let mut cursor = Cursor::new(&mut entries);
        cursor.advance(); // at index 1 (WRITE_DATA)
        cursor.delete_entry();
        cursor.advance();
        assert_eq!(cursor.index, 1);
        assert_eq!(cursor.get().mask, Perm::EXECUTE);
    }

    #[test]
    fn test_change_mask_same_value_clears_inherit_only() {
        let mut entries = vec![everyone(Perm::READ_DATA, EntryFlags::INHERIT_ONLY)];
        let mut cursor = Cursor::new(&mut entries);
        cursor.change_mask(Perm::READ_DATA);
        assert!(!cursor.get().is_inherit_only());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_change_mask_splits_inheritable_entry() {
        let mut entries = vec![everyone(
            Perm::READ_DATA | Perm::WRITE_DATA,
            EntryFlags::FILE_INHERIT | EntryFlags::DIRECTORY_INHERIT,
        )];
        let mut cursor = Cursor::new(&mut entries);
        cursor.change_mask(Perm::READ_DATA);
        assert_eq!(entries.len(), 2);
        // The original survives at the lower index as an inherit-only
        // template, keeping its old mask.
        assert!(entries[0].is_inherit_only());
        assert_eq!(entries[0].mask, Perm::READ_DATA | Perm::WRITE_DATA);
        // The split-off copy lands after it, carrying the new mask and no
        // inheritance flags.
        assert_eq!(entries[1].mask, Perm::READ_DATA);
        assert!(!entries[1].is_inheritable());
        assert_eq!(cursor.index, 1);
    }

    #[test]
    fn test_change_mask_deletes_non_inheritable_entry_with_no_extra_bits() {
        let mut entries = vec![
            everyone(Perm::POSIX_ALWAYS_ALLOWED, EntryFlags::empty()),
            everyone(Perm::EXECUTE, EntryFlags::empty()),
        ];
        let mut cursor = Cursor::new(&mut entries);
        cursor.change_mask(Perm::empty());
        cursor.advance();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mask, Perm::EXECUTE);
    }

    #[test]
    fn test_change_mask_marks_inheritable_template_inherit_only() {
        let mut entries = vec![everyone(Perm::empty(), EntryFlags::FILE_INHERIT)];
        let mut cursor = Cursor::new(&mut entries);
        cursor.change_mask(Perm::empty());
        assert!(entries[0].is_inherit_only());
        assert_eq!(entries.len(), 1);
    }
}
