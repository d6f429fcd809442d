//! Optional JSON uplink of acknowledged samples over HTTPS

#[cfg(feature = "uplink")]
pub mod http;
pub mod json;
pub mod reporter;
pub mod traits;

pub use json::UplinkRecord;
pub use reporter::UplinkReporter;
pub use traits::{Disabled, HttpClient, UplinkError};
