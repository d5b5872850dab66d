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

mod engine;
mod memory;
mod publish;
mod relay;
mod source;

pub use engine::{query, OnRecord, QueryOptions};
pub use memory::{Completion, MemorySource};
pub use publish::publish;
pub use relay::{partition, RelayUrl};
pub use source::{Ack, RecordStream, Source, SourceError, SourceMessage};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	#[error("no relays configured")]
	NoRelays,
	#[error("invalid relay url <url='{url}'>: {reason}")]
	InvalidRelayUrl { url: String, reason: String },
}
