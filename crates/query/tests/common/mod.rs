#![allow(dead_code)]

use quire_event::{Kind, Record, Tag, Timestamp};
use quire_query::RelayUrl;

pub const AUTHOR: &str = "b1576eb99a4774158a32fc5e190afa3ded4da19f51fbe0c7f4b1f5b5d2aa4e4a";

pub fn relay(raw: &str) -> RelayUrl {
	raw.parse().expect("valid relay url")
}

pub fn local_relay() -> RelayUrl {
	relay("ws://localhost:10547")
}

pub fn remote_relay() -> RelayUrl {
	relay("wss://relay.example.com")
}

pub fn hex_id(n: u64) -> String {
	format!("{n:064x}")
}

pub fn record(n: u64, kind: Kind, created_at: u64, tags: Vec<Tag>) -> Record {
	Record {
		id: hex_id(n),
		kind,
		created_at: Timestamp(created_at),
		tags,
		content: String::new(),
		author: AUTHOR.to_string(),
	}
}
