use std::fmt;

use super::Kind;

/// Identity used to decide that two records are versions of the same thing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalKey {
	/// `kind:author`
	Replaceable { kind: Kind, author: String },
	/// `kind:author:identifier`
	Addressable {
		kind: Kind,
		author: String,
		identifier: String,
	},
	/// Append-only records are their own identity.
	Event(String),
}

impl fmt::Display for LogicalKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Replaceable { kind, author } => write!(f, "{kind}:{author}"),
			Self::Addressable {
				kind,
				author,
				identifier,
			} => write!(f, "{kind}:{author}:{identifier}"),
			Self::Event(id) => f.write_str(id),
		}
	}
}
