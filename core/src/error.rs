use super::{config::ConfigError, storage::StorageError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Query(#[from] quire_query::Error),
	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error(transparent)]
	Config(#[from] ConfigError),
}
