//! Error taxonomy for the untangle core.
//!
//! Mirrors the teacher's `thiserror`-derived error enums (one variant per
//! distinguishable failure mode, `#[from]` for the I/O boundary) with
//! `anyhow` doing the wrapping at the binary entry point.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UntangleError {
    #[error("unknown path: {0}")]
    UnknownPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
