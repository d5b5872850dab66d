use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric record kind as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(pub u16);

/// How records of a kind collapse into logical identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindClass {
	/// One live version per author.
	Replaceable,
	/// One live version per author and `d` tag.
	Addressable,
	/// Every record stands on its own.
	Regular,
}

impl Kind {
	pub const METADATA: Self = Self(0);
	pub const CONTACTS: Self = Self(3);
	pub const HIGHLIGHT: Self = Self(9802);
	pub const BOOKMARK_LIST: Self = Self(10003);
	pub const LEGACY_CATEGORIZED_LIST: Self = Self(30001);
	pub const BOOKMARK_SET: Self = Self(30003);
	pub const LONG_FORM_ARTICLE: Self = Self(30023);
	pub const WEB_BOOKMARK: Self = Self(39701);
	pub const READING_PROGRESS: Self = Self(39802);

	#[must_use]
	pub const fn class(self) -> KindClass {
		match self.0 {
			0 | 3 | 10_000..=19_999 => KindClass::Replaceable,
			30_000..=39_999 => KindClass::Addressable,
			_ => KindClass::Regular,
		}
	}

	/// List kinds keep their private rows encrypted in `content`.
	#[must_use]
	pub const fn is_list(self) -> bool {
		matches!(self.0, 10_000..=10_999 | 30_000..=30_003)
	}
}

impl fmt::Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u16> for Kind {
	fn from(value: u16) -> Self {
		Self(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classes_follow_numeric_ranges() {
		assert_eq!(Kind::METADATA.class(), KindClass::Replaceable);
		assert_eq!(Kind::BOOKMARK_LIST.class(), KindClass::Replaceable);
		assert_eq!(Kind::BOOKMARK_SET.class(), KindClass::Addressable);
		assert_eq!(Kind::READING_PROGRESS.class(), KindClass::Addressable);
		assert_eq!(Kind::HIGHLIGHT.class(), KindClass::Regular);
		assert_eq!(Kind(1).class(), KindClass::Regular);
	}

	#[test]
	fn list_kinds() {
		assert!(Kind::BOOKMARK_LIST.is_list());
		assert!(Kind::BOOKMARK_SET.is_list());
		assert!(Kind::LEGACY_CATEGORIZED_LIST.is_list());
		assert!(!Kind::LONG_FORM_ARTICLE.is_list());
		assert!(!Kind::HIGHLIGHT.is_list());
	}
}
