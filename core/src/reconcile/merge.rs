use std::collections::HashSet;

/// Concatenates the public and confidential halves of one payload, keeping the first
/// occurrence of every id.
///
/// The halves are disjoint by construction, so this only guards against a payload repeating
/// an entry.
pub fn merge_sub_lists<T, F>(public: Vec<T>, confidential: Vec<T>, id_of: F) -> Vec<T>
where
	F: Fn(&T) -> &str,
{
	let mut seen = HashSet::with_capacity(public.len() + confidential.len());

	public
		.into_iter()
		.chain(confidential)
		.filter(|item| seen.insert(id_of(item).to_string()))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;

	#[test]
	fn first_seen_wins() {
		let public = vec![("e:1", "public"), ("e:2", "public"), ("e:1", "repeat")];
		let confidential = vec![("e:3", "confidential"), ("e:2", "confidential")];

		assert_eq!(
			merge_sub_lists(public, confidential, |(id, _)| *id),
			vec![("e:1", "public"), ("e:2", "public"), ("e:3", "confidential")]
		);
	}

	#[test]
	fn empty_confidential_half_keeps_public_order() {
		let public = vec!["b", "a", "c"];

		assert_eq!(merge_sub_lists(public, vec![], |id| *id), vec!["b", "a", "c"]);
	}
}
