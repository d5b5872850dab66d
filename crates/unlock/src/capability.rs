use std::{fmt, sync::Arc};

use async_trait::async_trait;

use super::DecryptError;

/// One decryption algorithm offered by the signer.
#[async_trait]
pub trait Decrypt: Send + Sync + 'static {
	async fn decrypt(&self, counterparty: &str, ciphertext: &str) -> Result<String, DecryptError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
	Primary,
	Fallback,
}

/// What the signer can do, decided once instead of checked per call.
#[derive(Clone, Default)]
pub enum DecryptCapability {
	#[default]
	Unavailable,
	PrimaryOnly(Arc<dyn Decrypt>),
	PrimaryAndFallback {
		primary: Arc<dyn Decrypt>,
		fallback: Arc<dyn Decrypt>,
	},
}

impl DecryptCapability {
	#[must_use]
	pub const fn is_available(&self) -> bool {
		!matches!(self, Self::Unavailable)
	}

	/// Tries the primary algorithm, then the fallback when there is one.
	pub async fn decrypt(
		&self,
		counterparty: &str,
		ciphertext: &str,
	) -> Result<(String, Algorithm), DecryptError> {
		match self {
			Self::Unavailable => Err(DecryptError::Unavailable),
			Self::PrimaryOnly(primary) => primary
				.decrypt(counterparty, ciphertext)
				.await
				.map(|plaintext| (plaintext, Algorithm::Primary)),
			Self::PrimaryAndFallback { primary, fallback } => {
				match primary.decrypt(counterparty, ciphertext).await {
					Ok(plaintext) => Ok((plaintext, Algorithm::Primary)),
					Err(primary_error) => fallback
						.decrypt(counterparty, ciphertext)
						.await
						.map(|plaintext| (plaintext, Algorithm::Fallback))
						.map_err(|fallback_error| {
							DecryptError::Failed(format!(
								"primary: {primary_error}; fallback: {fallback_error}"
							))
						}),
				}
			}
		}
	}
}

impl fmt::Debug for DecryptCapability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Unavailable => "DecryptCapability::Unavailable",
			Self::PrimaryOnly(_) => "DecryptCapability::PrimaryOnly",
			Self::PrimaryAndFallback { .. } => "DecryptCapability::PrimaryAndFallback",
		})
	}
}
