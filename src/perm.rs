//! Implements the 21-bit richacl permission mask.
//!
//! Bit positions and names follow `include/richacl.h` in the reference
//! implementation: some bits carry a different name depending on whether the
//! entry applies to a directory or a non-directory object, but the
//! underlying bit is the same.

use crate::bititer::{BitIter, BitIterable};
#[cfg(feature = "serde")]
use crate::format;

use bitflags::bitflags;
#[cfg(feature = "serde")]
use num_enum::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde::{de, ser, Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// A richacl permission mask.
    ///
    /// Several bits have two names depending on whether the owning entry
    /// applies to a directory (`LIST_DIRECTORY`, `ADD_FILE`,
    /// `ADD_SUBDIRECTORY`) or not (`READ_DATA`, `WRITE_DATA`,
    /// `APPEND_DATA`). Both spellings are exposed as associated constants
    /// for the same bit.
    #[derive(Default)]
    pub struct Perm: u32 {
        const READ_DATA = 0x0000_0001;
        const LIST_DIRECTORY = 0x0000_0001;
        const WRITE_DATA = 0x0000_0002;
        const ADD_FILE = 0x0000_0002;
        const APPEND_DATA = 0x0000_0004;
        const ADD_SUBDIRECTORY = 0x0000_0004;
        const READ_NAMED_ATTRS = 0x0000_0008;
        const WRITE_NAMED_ATTRS = 0x0000_0010;
        const EXECUTE = 0x0000_0020;
        const DELETE_CHILD = 0x0000_0040;
        const READ_ATTRIBUTES = 0x0000_0080;
        const WRITE_ATTRIBUTES = 0x0000_0100;
        const WRITE_RETENTION = 0x0000_0200;
        const WRITE_RETENTION_HOLD = 0x0000_0400;
        const DELETE = 0x0001_0000;
        const READ_ACL = 0x0002_0000;
        const WRITE_ACL = 0x0004_0000;
        const WRITE_OWNER = 0x0008_0000;
        const SYNCHRONIZE = 0x0010_0000;
    }
}

impl Perm {
    /// Every valid mask bit; unknown bits beyond this are invalid input.
    pub const VALID_MASK: Perm = Perm::from_bits_truncate(
        Perm::READ_DATA.bits
            | Perm::WRITE_DATA.bits
            | Perm::APPEND_DATA.bits
            | Perm::READ_NAMED_ATTRS.bits
            | Perm::WRITE_NAMED_ATTRS.bits
            | Perm::EXECUTE.bits
            | Perm::DELETE_CHILD.bits
            | Perm::READ_ATTRIBUTES.bits
            | Perm::WRITE_ATTRIBUTES.bits
            | Perm::WRITE_RETENTION.bits
            | Perm::WRITE_RETENTION_HOLD.bits
            | Perm::DELETE.bits
            | Perm::READ_ACL.bits
            | Perm::WRITE_ACL.bits
            | Perm::WRITE_OWNER.bits
            | Perm::SYNCHRONIZE.bits,
    );

    /// Bits a POSIX mode's "read" bit maps to.
    pub const POSIX_MODE_READ: Perm = Perm::READ_DATA;

    /// Bits a POSIX mode's "write" bit maps to.
    pub const POSIX_MODE_WRITE: Perm = Perm::from_bits_truncate(
        Perm::WRITE_DATA.bits | Perm::APPEND_DATA.bits | Perm::DELETE_CHILD.bits,
    );

    /// Bits a POSIX mode's "execute" bit maps to.
    pub const POSIX_MODE_EXEC: Perm = Perm::EXECUTE;

    /// Bits every class is granted regardless of mode or ACL.
    pub const POSIX_ALWAYS_ALLOWED: Perm = Perm::from_bits_truncate(
        Perm::SYNCHRONIZE.bits | Perm::READ_ATTRIBUTES.bits | Perm::READ_ACL.bits,
    );

    /// Bits only the owner class is implicitly granted.
    pub const POSIX_OWNER_ALLOWED: Perm = Perm::from_bits_truncate(
        Perm::WRITE_ATTRIBUTES.bits | Perm::WRITE_OWNER.bits | Perm::WRITE_ACL.bits,
    );
}

impl BitIterable for Perm {
    fn overflowing_neg(&self) -> (Self, bool) {
        let (bits, overflow) = self.bits.overflowing_neg();
        (Perm { bits }, overflow)
    }
}

/// `mode_to_mask`: map a three-bit POSIX permission group (r=4,w=2,x=1) to
/// the richacl bits it implies.
pub fn mode_to_mask(perm3: u32) -> Perm {
    let mut mask = Perm::empty();
    if perm3 & 0o4 != 0 {
        mask |= Perm::POSIX_MODE_READ;
    }
    if perm3 & 0o2 != 0 {
        mask |= Perm::POSIX_MODE_WRITE;
    }
    if perm3 & 0o1 != 0 {
        mask |= Perm::POSIX_MODE_EXEC;
    }
    mask
}

/// `mask_to_mode`: inverse of [`mode_to_mask`], probing for the presence of
/// any bit in each POSIX_MODE_* group.
pub fn mask_to_mode(mask: Perm) -> u32 {
    let mut perm3 = 0;
    if mask.intersects(Perm::POSIX_MODE_READ) {
        perm3 |= 0o4;
    }
    if mask.intersects(Perm::POSIX_MODE_WRITE) {
        perm3 |= 0o2;
    }
    if mask.intersects(Perm::POSIX_MODE_EXEC) {
        perm3 |= 0o1;
    }
    perm3
}

#[derive(Deserialize, Serialize, TryFromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg(feature = "serde")]
#[repr(u32)]
#[allow(non_camel_case_types)]
enum PermName {
    read_data = Perm::READ_DATA.bits,
    write_data = Perm::WRITE_DATA.bits,
    append_data = Perm::APPEND_DATA.bits,
    read_named_attrs = Perm::READ_NAMED_ATTRS.bits,
    write_named_attrs = Perm::WRITE_NAMED_ATTRS.bits,
    execute = Perm::EXECUTE.bits,
    delete_child = Perm::DELETE_CHILD.bits,
    read_attributes = Perm::READ_ATTRIBUTES.bits,
    write_attributes = Perm::WRITE_ATTRIBUTES.bits,
    write_retention = Perm::WRITE_RETENTION.bits,
    write_retention_hold = Perm::WRITE_RETENTION_HOLD.bits,
    delete = Perm::DELETE.bits,
    read_acl = Perm::READ_ACL.bits,
    write_acl = Perm::WRITE_ACL.bits,
    write_owner = Perm::WRITE_OWNER.bits,
    synchronize = Perm::SYNCHRONIZE.bits,
}

#[cfg(feature = "serde")]
impl PermName {
    fn from_perm(perm: Perm) -> Option<PermName> {
        use std::convert::TryFrom;
        PermName::try_from(perm.bits).ok()
    }

    const fn to_perm(self) -> Perm {
        Perm { bits: self as u32 }
    }
}

#[cfg(feature = "serde")]
impl fmt::Display for PermName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format::to_string(self))
    }
}

impl fmt::Display for Perm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(feature = "serde")]
        {
            let mut iter = BitIter(*self & Perm::VALID_MASK);
            if let Some(perm) = iter.next() {
                write!(f, "{}", PermName::from_perm(perm).map_or("!!".into(), |n| n.to_string()))?;
                for perm in iter {
                    write!(f, ",{}", PermName::from_perm(perm).map_or("!!".to_string(), |n| n.to_string()))?;
                }
            }
            Ok(())
        }
        #[cfg(not(feature = "serde"))]
        {
            write!(f, "{:#x}", self.bits())
        }
    }
}

#[cfg(feature = "serde")]
impl ser::Serialize for Perm {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        use ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(None)?;
        for perm in BitIter(*self) {
            seq.serialize_element(&PermName::from_perm(perm))?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> de::Deserialize<'de> for Perm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct PermVisitor;

        impl<'de> de::Visitor<'de> for PermVisitor {
            type Value = Perm;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("list of permissions")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut perms = Perm::empty();
                while let Some(value) = seq.next_element()? {
                    let name: PermName = value;
                    perms |= name.to_perm();
                }
                Ok(perms)
            }
        }

        deserializer.deserialize_seq(PermVisitor)
    }
}

////////////////////////////////////////////////////////////////////////////////
