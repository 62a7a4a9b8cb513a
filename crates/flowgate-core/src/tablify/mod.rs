//! Turns a raw response body into a [`crate::table::Table`], by way of an
//! optional remapping pass that reshapes arbitrary JSON into the
//! columns-as-arrays object a [`JSONTablifier`] expects.

mod json;

pub use json::{JSONTablifier, JSONTablifierConfig};

use bytes::Bytes;

use crate::table::Table;

#[derive(Debug, thiserror::Error)]
pub enum TablifyError {
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),
    #[error("cannot remap input: {0}")]
    Remap(String),
    #[error(transparent)]
    Table(#[from] crate::table::TableError),
    #[error("malformed input: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Builds a [`Table`] out of a raw body.
pub trait Tablifier: Send + Sync {
    fn table(&self, input: &[u8]) -> Result<Table, TablifyError>;
}

/// Reshapes a raw body into the representation the downstream [`Tablifier`]
/// expects, without altering the underlying tabular semantics. A no-op
/// remapper is provided as [`NoOpRemapper`]; a real remapping DSL equivalent
/// to the `kazaam`-based one this is modelled on is out of scope (see
/// SPEC_FULL.md §10.4).
pub trait Remapper: Send + Sync {
    fn remap(&self, input: &[u8]) -> Result<Bytes, TablifyError>;
}

/// Passes the input through unchanged. The default remapper when no
/// remapping configuration is specified for a route.
pub struct NoOpRemapper;

impl Remapper for NoOpRemapper {
    fn remap(&self, input: &[u8]) -> Result<Bytes, TablifyError> {
        Ok(Bytes::copy_from_slice(input))
    }
}
