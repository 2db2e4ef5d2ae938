use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::download_client::DownloadClientError;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("No obsolete tag configured")]
    NoObsoleteTag,

    #[error("Download {0} not found in any download client")]
    NotFound(String),

    #[error("Download client {client}: {source}")]
    Client {
        client: String,
        #[source]
        source: DownloadClientError,
    },
}

/// Disposition of an item that reached its strike limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalAction {
    Remove,
    Tag,
    Skip,
}

impl RemovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalAction::Remove => "remove",
            RemovalAction::Tag => "tag",
            RemovalAction::Skip => "skip",
        }
    }
}

impl fmt::Display for RemovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured handling for one tracker class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerHandling {
    Remove,
    Skip,
    ObsoleteTag,
}

impl TrackerHandling {
    pub fn action(&self) -> RemovalAction {
        match self {
            TrackerHandling::Remove => RemovalAction::Remove,
            TrackerHandling::Skip => RemovalAction::Skip,
            TrackerHandling::ObsoleteTag => RemovalAction::Tag,
        }
    }
}

impl FromStr for TrackerHandling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remove" => Ok(TrackerHandling::Remove),
            "skip" => Ok(TrackerHandling::Skip),
            "obsolete_tag" => Ok(TrackerHandling::ObsoleteTag),
            other => Err(format!("unknown tracker handling mode: {}", other)),
        }
    }
}
