//! *arr (Sonarr, Radarr, Lidarr, Readarr, Whisparr) queue sources.
//!
//! [`ArrClient`] is the capability surface the detection jobs depend on;
//! [`ArrApiClient`] implements it over the v1/v3 REST APIs.

mod client;
mod types;

pub use client::ArrApiClient;
pub use types::*;
