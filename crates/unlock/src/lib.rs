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

//! Unlocking of confidential record payloads.
//!
//! Records never change once observed, so decrypted rows live in a side table owned by
//! [`UnlockPipeline`], keyed by record id.

mod capability;
mod detect;
mod pipeline;

pub use capability::{Algorithm, Decrypt, DecryptCapability};
pub use detect::{detect, Marker};
pub use pipeline::{UnlockPipeline, UnlockState, Unlocked};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
	#[error("no decrypt capability available")]
	Unavailable,
	#[error("decryption failed: {0}")]
	Failed(String),
}
