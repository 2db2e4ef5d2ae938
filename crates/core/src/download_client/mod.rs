//! Download-client abstraction.
//!
//! Provides the [`DownloadClient`] trait used by orphan detection, done-seeding
//! cleanup and the removal policy, plus a qBittorrent WebUI implementation and
//! SABnzbd/NZBGet adapters that present usenet jobs through the same surface.

mod nzbget;
mod qbittorrent;
mod sabnzbd;
mod types;

pub use nzbget::NzbgetClient;
pub use qbittorrent::QBittorrentClient;
pub use sabnzbd::SabnzbdClient;
pub use types::*;
