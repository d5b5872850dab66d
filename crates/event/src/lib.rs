#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Shape of the signed records exchanged with relays and the identities derived from them.
//!
//! Records are immutable once observed; a newer version of the same logical thing is a
//! different [`Record`] that shares a [`LogicalKey`] with the older one.

mod filter;
mod key;
mod kind;
mod record;
mod reference;

pub use filter::Filter;
pub use key::LogicalKey;
pub use kind::{Kind, KindClass};
pub use record::{Record, Tag, Timestamp};
pub use reference::{is_hex_id, Coordinate, Reference};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	#[error("invalid coordinate <raw='{0}'>")]
	InvalidCoordinate(String),
	#[error("invalid record id <raw='{0}'>")]
	InvalidId(String),
	#[error("unsupported reference tag <name='{0}'>")]
	UnsupportedReferenceTag(String),
}
