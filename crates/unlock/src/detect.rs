use quire_event::Record;

/// Which heuristic flagged a record as confidential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
	/// List kind carrying a non-empty content, where private rows are kept.
	HiddenListContent,
	/// Content ends in the legacy `?iv=<base64>` suffix.
	LegacyCipherSuffix,
	/// An explicit `encrypted` tag.
	EncryptedTag,
}

/// Any single heuristic matching is enough.
#[must_use]
pub fn detect(record: &Record) -> Option<Marker> {
	if record.tags_named("encrypted").next().is_some() && !record.content.is_empty() {
		Some(Marker::EncryptedTag)
	} else if has_legacy_suffix(&record.content) {
		Some(Marker::LegacyCipherSuffix)
	} else if record.kind.is_list() && !record.content.trim().is_empty() {
		Some(Marker::HiddenListContent)
	} else {
		None
	}
}

fn has_legacy_suffix(content: &str) -> bool {
	content.rsplit_once("?iv=").is_some_and(|(ciphertext, iv)| {
		!ciphertext.is_empty() && !iv.is_empty() && iv.bytes().all(is_base64_byte)
	})
}

const fn is_base64_byte(b: u8) -> bool {
	b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')
}

#[cfg(test)]
mod tests {
	use super::*;

	use quire_event::{Kind, Tag, Timestamp};

	fn record(kind: Kind, content: &str, tags: Vec<Tag>) -> Record {
		Record {
			id: "1".to_string(),
			kind,
			created_at: Timestamp(1),
			tags,
			content: content.to_string(),
			author: "a".to_string(),
		}
	}

	#[test]
	fn plain_records_are_public() {
		assert_eq!(detect(&record(Kind::BOOKMARK_LIST, "", vec![])), None);
		assert_eq!(detect(&record(Kind::BOOKMARK_LIST, "   ", vec![])), None);
		assert_eq!(detect(&record(Kind::HIGHLIGHT, "a quote", vec![])), None);
		assert_eq!(
			detect(&record(Kind::HIGHLIGHT, "what?iv=", vec![])),
			None,
			"empty iv is not a cipher suffix"
		);
	}

	#[test]
	fn each_heuristic_is_sufficient() {
		assert_eq!(
			detect(&record(Kind::BOOKMARK_LIST, "AqJk3w==", vec![])),
			Some(Marker::HiddenListContent)
		);
		assert_eq!(
			detect(&record(Kind::HIGHLIGHT, "Zm9v?iv=YmFy", vec![])),
			Some(Marker::LegacyCipherSuffix)
		);
		assert_eq!(
			detect(&record(
				Kind::HIGHLIGHT,
				"ciphertext",
				vec![Tag::new(["encrypted"])]
			)),
			Some(Marker::EncryptedTag)
		);
	}
}
