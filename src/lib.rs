//! # richacl
//!
//! An in-memory model of the NFSv4-style rich access control list: entries,
//! evaluation, mode synthesis/projection, mask isolation, inheritance, and
//! the text and binary wire codecs.
//!
//! This crate owns the ACL data model and its algorithms. It performs no
//! filesystem I/O itself: reading or writing the `richacl` extended
//! attribute of an actual file is left to the caller, who decodes what
//! [`xattr::from_xattr`] or [`text::parse`] gives back and encodes what
//! [`xattr::to_xattr`] or [`text::to_text`] produces.
//!
//! ## Example
//!
//! ```
//! use richacl::{mask, eval};
//! use nix::unistd::{Gid, Uid};
//!
//! let acl = mask::from_mode(0o640, false);
//! let owner = Uid::from_raw(1000);
//! let group = Gid::from_raw(1000);
//!
//! assert!(eval::permission(&acl, owner, group, owner, &[group], richacl::Perm::READ_DATA));
//! ```

mod acl;
mod bititer;
mod entry;
mod error;
mod flag;
mod format;
mod identity;
mod perm;

pub mod equiv;
pub mod eval;
pub mod inherit;
pub mod isolate;
pub mod mask;
pub mod text;
pub mod xattr;

pub use acl::{Acl, MAX_ENTRIES};
pub use entry::{Entry, EntryType};
pub use error::{DiagnosticReporter, Error, NullReporter, Result, VecReporter};
pub use flag::{AclFlags, EntryFlags};
pub use identity::{Identity, IdentityResolver, NumericResolver, SpecialWho};
pub use perm::Perm;
pub use text::TextOptions;
