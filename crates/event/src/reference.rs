use std::{fmt, str::FromStr};

use hex::FromHex;
use serde::{Deserialize, Serialize};

use super::{Error, Kind, Record, Tag};

/// Whether `raw` is a 32 byte lowercase or uppercase hex string.
#[must_use]
pub fn is_hex_id(raw: &str) -> bool {
	<[u8; 32]>::from_hex(raw).is_ok()
}

/// `kind:author:identifier` address of a replaceable or addressable record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
	pub kind: Kind,
	pub author: String,
	pub identifier: String,
}

impl Coordinate {
	#[must_use]
	pub fn matches(&self, record: &Record) -> bool {
		record.kind == self.kind
			&& record.author == self.author
			&& record.identifier() == self.identifier
	}
}

impl FromStr for Coordinate {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let mut parts = raw.splitn(3, ':');

		let kind = parts
			.next()
			.and_then(|kind| kind.parse::<u16>().ok())
			.map(Kind)
			.ok_or_else(|| Error::InvalidCoordinate(raw.to_string()))?;

		let author = parts
			.next()
			.filter(|author| is_hex_id(author))
			.ok_or_else(|| Error::InvalidCoordinate(raw.to_string()))?
			.to_lowercase();

		Ok(Self {
			kind,
			author,
			identifier: parts.next().unwrap_or_default().to_string(),
		})
	}
}

impl TryFrom<String> for Coordinate {
	type Error = Error;

	fn try_from(raw: String) -> Result<Self, Self::Error> {
		raw.parse()
	}
}

impl From<Coordinate> for String {
	fn from(coordinate: Coordinate) -> Self {
		coordinate.to_string()
	}
}

impl fmt::Display for Coordinate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}:{}", self.kind, self.author, self.identifier)
	}
}

/// Pointer to a record that has not been fetched yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Reference {
	Id(String),
	Coordinate(Coordinate),
}

impl Reference {
	/// Bare 64-hex ids become [`Reference::Id`], everything else must be a coordinate.
	pub fn parse(raw: &str) -> Result<Self, Error> {
		if is_hex_id(raw) {
			Ok(Self::Id(raw.to_lowercase()))
		} else {
			raw.parse().map(Self::Coordinate)
		}
	}

	/// Reads an `e` or `a` tag row.
	pub fn from_tag(tag: &Tag) -> Result<Self, Error> {
		match tag.name() {
			Some("e") => tag
				.value()
				.filter(|id| is_hex_id(id))
				.map(|id| Self::Id(id.to_lowercase()))
				.ok_or_else(|| Error::InvalidId(tag.value().unwrap_or_default().to_string())),
			Some("a") => tag
				.value()
				.ok_or_else(|| Error::InvalidCoordinate(String::new()))?
				.parse()
				.map(Self::Coordinate),
			other => Err(Error::UnsupportedReferenceTag(
				other.unwrap_or_default().to_string(),
			)),
		}
	}

	#[must_use]
	pub fn matches(&self, record: &Record) -> bool {
		match self {
			Self::Id(id) => record.id == *id,
			Self::Coordinate(coordinate) => coordinate.matches(record),
		}
	}
}

impl fmt::Display for Reference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Id(id) => f.write_str(id),
			Self::Coordinate(coordinate) => fmt::Display::fmt(coordinate, f),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;

	const AUTHOR: &str = "b1576eb99a4774158a32fc5e190afa3ded4da19f51fbe0c7f4b1f5b5d2aa4e4a";

	#[test]
	fn parses_coordinates_with_colons_in_identifier() {
		let coordinate: Coordinate = format!("30023:{AUTHOR}:notes:2024").parse().unwrap();

		assert_eq!(coordinate.kind, Kind::LONG_FORM_ARTICLE);
		assert_eq!(coordinate.author, AUTHOR);
		assert_eq!(coordinate.identifier, "notes:2024");
		assert_eq!(coordinate.to_string(), format!("30023:{AUTHOR}:notes:2024"));
	}

	#[test]
	fn rejects_bad_coordinates() {
		assert!("nope".parse::<Coordinate>().is_err());
		assert!("30023:not-hex:x".parse::<Coordinate>().is_err());
		assert!(format!("kind:{AUTHOR}:x").parse::<Coordinate>().is_err());
	}

	#[test]
	fn reference_from_tags() {
		let id = "e".repeat(64);

		assert_eq!(
			Reference::from_tag(&Tag::new(["e", id.as_str(), "wss://relay"])).unwrap(),
			Reference::Id(id)
		);
		assert!(matches!(
			Reference::from_tag(&Tag::new(["a", &format!("30023:{AUTHOR}:x")])).unwrap(),
			Reference::Coordinate(_)
		));
		assert!(Reference::from_tag(&Tag::new(["e", "short"])).is_err());
		assert!(Reference::from_tag(&Tag::new(["p", AUTHOR])).is_err());
	}

	#[test]
	fn reference_matches_records() {
		let record = Record {
			id: "f".repeat(64),
			kind: Kind::LONG_FORM_ARTICLE,
			created_at: 1.into(),
			tags: vec![Tag::new(["d", "x"])],
			content: String::new(),
			author: AUTHOR.to_string(),
		};

		assert!(Reference::parse(&"f".repeat(64)).unwrap().matches(&record));
		assert!(Reference::parse(&format!("30023:{AUTHOR}:x"))
			.unwrap()
			.matches(&record));
		assert!(!Reference::parse(&format!("30023:{AUTHOR}:y"))
			.unwrap()
			.matches(&record));
	}
}
