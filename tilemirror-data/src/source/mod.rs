//! Remote access to tile catalogues and tile payloads.
//!
//! [`TileSource`] is the seam between the synchroniser and the network:
//! production code uses [`HttpTileSource`], tests substitute
//! [`test_support::StubTileSource`].
#![forbid(unsafe_code)]

mod error;
mod http;
mod types;
mod util;

#[doc(hidden)]
pub mod test_support;

pub use error::TransportError;
pub use http::{DEFAULT_USER_AGENT, HttpTileSource, TileSource};
pub use types::{BaseUrl, DEFAULT_BASE_URL, ManifestResponse};
