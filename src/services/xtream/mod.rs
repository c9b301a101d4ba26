//! Xtream Codes Integration
//!
//! Upstream side of the catalog API. The gateway talks to exactly one
//! Xtream account; this module owns its credentials.
//!
//! - **Detection**: derive the account from a `get.php` playlist URL
//! - **API Client**: `player_api.php`, `get.php` and `xmltv.php` calls
//!
//! ```text
//! http://server:port/player_api.php?username=X&password=Y&action=get_live_streams
//! ```

pub mod client;
pub mod detector;
pub mod types;

// Re-exports for convenience
pub use client::{CatalogClient, XtreamClient, XtreamError};
pub use detector::{extract_credentials, playlist_params, CREDENTIAL_PARAMS};
pub use types::{CatalogAction, XtreamCredentials};
