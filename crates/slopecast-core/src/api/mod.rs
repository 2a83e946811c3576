//! Network access for the resort data corpus.
//!
//! This module provides the `Transport` seam every fetch goes through, the
//! reqwest-backed `HttpTransport`, URL construction for the corpus layout,
//! and the error types the loader surfaces.

pub mod endpoints;
pub mod error;
pub mod transport;

pub use endpoints::Endpoints;
pub use error::{FetchError, LoadError};
pub use transport::{HttpTransport, Request, Response, Transport};
