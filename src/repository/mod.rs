//! Repositories over the keyed store.
//!
//! Each repository owns an explicitly constructed store handle and exposes
//! a closed error set: missing items surface as `NotFound`, everything else
//! the adapter reports passes through as `Store`.

use thiserror::Error;

use crate::store::StoreError;

pub mod order;
pub mod product;

pub use order::OrderRepository;
pub use product::ProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            // The only condition ever used is "the item exists".
            StoreError::NotFound | StoreError::ConditionFailed => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
