use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use super::Error;

/// A websocket relay address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelayUrl(Url);

impl RelayUrl {
	#[must_use]
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}

	/// Loopback relays are served from the same host and answer fast.
	#[must_use]
	pub fn is_local(&self) -> bool {
		match self.0.host() {
			Some(Host::Domain(domain)) => {
				domain.eq_ignore_ascii_case("localhost") || domain.ends_with(".localhost")
			}
			Some(Host::Ipv4(ip)) => ip.is_loopback(),
			Some(Host::Ipv6(ip)) => ip.is_loopback(),
			None => false,
		}
	}
}

impl FromStr for RelayUrl {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let url = Url::parse(raw.trim()).map_err(|e| Error::InvalidRelayUrl {
			url: raw.to_string(),
			reason: e.to_string(),
		})?;

		if !matches!(url.scheme(), "ws" | "wss") {
			return Err(Error::InvalidRelayUrl {
				url: raw.to_string(),
				reason: format!("unsupported scheme '{}'", url.scheme()),
			});
		}

		if url.host().is_none() {
			return Err(Error::InvalidRelayUrl {
				url: raw.to_string(),
				reason: "missing host".to_string(),
			});
		}

		Ok(Self(url))
	}
}

impl TryFrom<String> for RelayUrl {
	type Error = Error;

	fn try_from(raw: String) -> Result<Self, Self::Error> {
		raw.parse()
	}
}

impl From<RelayUrl> for String {
	fn from(relay: RelayUrl) -> Self {
		relay.0.into()
	}
}

impl fmt::Display for RelayUrl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Splits relays into `(local, remote)`, preserving order inside each side.
#[must_use]
pub fn partition(relays: &[RelayUrl]) -> (Vec<RelayUrl>, Vec<RelayUrl>) {
	relays.iter().cloned().partition(RelayUrl::is_local)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn relay(raw: &str) -> RelayUrl {
		raw.parse().unwrap()
	}

	#[test]
	fn classifies_loopback_hosts_as_local() {
		assert!(relay("ws://localhost:10547").is_local());
		assert!(relay("ws://LOCALHOST:4869").is_local());
		assert!(relay("ws://relay.localhost").is_local());
		assert!(relay("ws://127.0.0.1:7777").is_local());
		assert!(relay("ws://[::1]:7777").is_local());

		assert!(!relay("wss://relay.damus.io").is_local());
		assert!(!relay("wss://192.168.1.4").is_local());
		assert!(!relay("wss://localhost.example.com").is_local());
	}

	#[test]
	fn rejects_non_websocket_urls() {
		assert!("https://relay.example.com".parse::<RelayUrl>().is_err());
		assert!("not a url".parse::<RelayUrl>().is_err());
	}

	#[test]
	fn partition_keeps_order() {
		let relays = [
			relay("wss://a.example"),
			relay("ws://localhost:1"),
			relay("wss://b.example"),
			relay("ws://127.0.0.1:2"),
		];

		let (local, remote) = partition(&relays);

		assert_eq!(local, vec![relays[1].clone(), relays[3].clone()]);
		assert_eq!(remote, vec![relays[0].clone(), relays[2].clone()]);
	}
}
