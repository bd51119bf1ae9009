//! Implements the ACL-level and entry-level flag bitsets.

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
    /// ACL-level flags (`struct richacl`'s `a_flags`).
    #[derive(Default)]
    pub struct AclFlags: u8 {
        /// The ACL auto-propagates its inheritable entries to descendants.
        const AUTO_INHERIT = 0x01;
        /// The ACL opts out of auto-inherit updates.
        const PROTECTED = 0x02;
        /// The ACL was synthesized (e.g. from the mode) rather than set
        /// explicitly.
        const DEFAULTED = 0x04;
        /// Per-class masks are exact (rather than upper-bound) for the
        /// class the caller is not a member of.
        const WRITE_THROUGH = 0x40;
        /// Per-class masks gate the final decision.
        const MASKED = 0x80;
    }
}

bitflags! {
    /// Entry-level flags (`struct richace`'s `e_flags`).
    #[derive(Default)]
    pub struct EntryFlags: u16 {
        const FILE_INHERIT = 0x0001;
        const DIRECTORY_INHERIT = 0x0002;
        const NO_PROPAGATE_INHERIT = 0x0004;
        const INHERIT_ONLY = 0x0008;
        const IDENTIFIER_GROUP = 0x0040;
        const INHERITED = 0x0080;
        const UNMAPPED_WHO = 0x2000;
        const SPECIAL_WHO = 0x4000;
    }
}

impl AclFlags {
    pub const VALID_FLAGS: AclFlags = AclFlags::from_bits_truncate(
        AclFlags::AUTO_INHERIT.bits
            | AclFlags::PROTECTED.bits
            | AclFlags::DEFAULTED.bits
            | AclFlags::WRITE_THROUGH.bits
            | AclFlags::MASKED.bits,
    );
}

impl EntryFlags {
    pub const VALID_FLAGS: EntryFlags = EntryFlags::from_bits_truncate(
        EntryFlags::FILE_INHERIT.bits
            | EntryFlags::DIRECTORY_INHERIT.bits
            | EntryFlags::NO_PROPAGATE_INHERIT.bits
            | EntryFlags::INHERIT_ONLY.bits
            | EntryFlags::IDENTIFIER_GROUP.bits
            | EntryFlags::INHERITED.bits
            | EntryFlags::UNMAPPED_WHO.bits
            | EntryFlags::SPECIAL_WHO.bits,
    );

    /// Flags that, taken together, make an entry inheritable to some kind
    /// of descendant.
    pub const INHERITANCE_FLAGS: EntryFlags = EntryFlags::from_bits_truncate(
        EntryFlags::FILE_INHERIT.bits
            | EntryFlags::DIRECTORY_INHERIT.bits
            | EntryFlags::NO_PROPAGATE_INHERIT.bits
            | EntryFlags::INHERIT_ONLY.bits,
    );
}

impl BitIterable for AclFlags {
    fn overflowing_neg(&self) -> (Self, bool) {
        let (bits, overflow) = self.bits.overflowing_neg();
        (AclFlags { bits }, overflow)
    }
}

impl BitIterable for EntryFlags {
    fn overflowing_neg(&self) -> (Self, bool) {
        let (bits, overflow) = self.bits.overflowing_neg();
        (EntryFlags { bits }, overflow)
    }
}

#[derive(Deserialize, Serialize, TryFromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg(feature = "serde")]
#[repr(u8)]
#[allow(non_camel_case_types)]
enum AclFlagName {
    auto_inherit = AclFlags::AUTO_INHERIT.bits,
    protected = AclFlags::PROTECTED.bits,
    defaulted = AclFlags::DEFAULTED.bits,
    write_through = AclFlags::WRITE_THROUGH.bits,
    masked = AclFlags::MASKED.bits,
}

#[derive(Deserialize, Serialize, TryFromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg(feature = "serde")]
#[repr(u16)]
#[allow(non_camel_case_types)]
enum EntryFlagName {
    file_inherit = EntryFlags::FILE_INHERIT.bits,
    directory_inherit = EntryFlags::DIRECTORY_INHERIT.bits,
    no_propagate_inherit = EntryFlags::NO_PROPAGATE_INHERIT.bits,
    inherit_only = EntryFlags::INHERIT_ONLY.bits,
    identifier_group = EntryFlags::IDENTIFIER_GROUP.bits,
    inherited = EntryFlags::INHERITED.bits,
    unmapped_who = EntryFlags::UNMAPPED_WHO.bits,
    special_who = EntryFlags::SPECIAL_WHO.bits,
}

#[cfg(feature = "serde")]
impl AclFlagName {
    fn from_flag(flag: AclFlags) -> Option<AclFlagName> {
        use std::convert::TryFrom;
        AclFlagName::try_from(flag.bits).ok()
    }

    const fn to_flag(self) -> AclFlags {
        AclFlags { bits: self as u8 }
    }
}

#[cfg(feature = "serde")]
impl EntryFlagName {
    fn from_flag(flag: EntryFlags) -> Option<EntryFlagName> {
        use std::convert::TryFrom;
        EntryFlagName::try_from(flag.bits).ok()
    }

    const fn to_flag(self) -> EntryFlags {
        EntryFlags { bits: self as u16 }
    }
}

#[cfg(feature = "serde")]
impl fmt::Display for AclFlagName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format::to_string(self))
    }
}

#[cfg(feature = "serde")]
impl fmt::Display for EntryFlagName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format::to_string(self))
    }
}

impl fmt::Display for AclFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flag_list(f, BitIter(*self & AclFlags::VALID_FLAGS), |bits| {
            #[cfg(feature = "serde")]
            return AclFlagName::from_flag(bits).map(|n| n.to_string());
            #[cfg(not(feature = "serde"))]
            return Some(format!("{:#x}", bits.bits()));
        })
    }
}

impl fmt::Display for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flag_list(f, BitIter(*self & EntryFlags::VALID_FLAGS), |bits| {
            #[cfg(feature = "serde")]
            return EntryFlagName::from_flag(bits).map(|n| n.to_string());
            #[cfg(not(feature = "serde"))]
            return Some(format!("{:#x}", bits.bits()));
        })
    }
}

fn write_flag_list<T: BitIterable>(
    f: &mut fmt::Formatter<'_>,
    mut iter: BitIter<T>,
    name_of: impl Fn(T) -> Option<String>,
) -> fmt::Result {
    if let Some(bit) = iter.next() {
        write!(f, "{}", name_of(bit).unwrap_or_else(|| "!!".into()))?;
        for bit in iter {
            write!(f, ",{}", name_of(bit).unwrap_or_else(|| "!!".into()))?;
        }
    }
    Ok(())
}

#[cfg(feature = "serde")]
impl ser::Serialize for AclFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        use ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(None)?;
        for flag in BitIter(*self) {
            seq.serialize_element(&AclFlagName::from_flag(flag))?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> de::Deserialize<'de> for AclFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct Visitor;
        impl<'de> de::Visitor<'de> for Visitor {
            type Value = AclFlags;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("list of acl flags")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut flags = AclFlags::empty();
                while let Some(value) = seq.next_element()? {
                    let name: AclFlagName = value;
                    flags |= name.to_flag();
                }
                Ok(flags)
            }
        }
        deserializer.deserialize_seq(Visitor)
    }
}

#[cfg(feature = "serde")]
impl ser::Serialize for EntryFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        use ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(None)?;
        for flag in BitIter(*self) {
            seq.serialize_element(&EntryFlagName::from_flag(flag))?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> de::Deserialize<'de> for EntryFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct Visitor;
        impl<'de> de::Visitor<'de> for Visitor {
            type Value = EntryFlags;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("list of entry flags")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut flags = EntryFlags::empty();
                while let Some(value) = seq.next_element()? {
                    let name: EntryFlagName = value;
                    flags |= name.to_flag();
                }
                Ok(flags)
            }
        }
        deserializer.deserialize_seq(Visitor)
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod flag_tests {
    use super::*;

    #[test]
    fn test_inheritance_flags_cover_file_and_dir_inherit() {
        assert!(EntryFlags::INHERITANCE_FLAGS.contains(EntryFlags::FILE_INHERIT));
        assert!(EntryFlags::INHERITANCE_FLAGS.contains(EntryFlags::DIRECTORY_INHERIT));
    }

    #[test]
    fn test_acl_flags_display_empty() {
        assert_eq!(AclFlags::empty().to_string(), "");
    }
}
