use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SerieRow", into = "SerieRow")]
pub struct Serie {
    pub name: String,
    pub progress: Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Finished,
    Ongoing { season: u32, episode: u32 },
}

/// Which counters an update touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Season(u32),
    Episode(u32),
    Both { season: u32, episode: u32 },
}

impl Update {
    /// `None` when neither counter is given.
    pub fn from_parts(season: Option<u32>, episode: Option<u32>) -> Option<Self> {
        match (season, episode) {
            (Some(season), Some(episode)) => Some(Update::Both { season, episode }),
            (Some(season), None) => Some(Update::Season(season)),
            (None, Some(episode)) => Some(Update::Episode(episode)),
            (None, None) => None,
        }
    }
}

impl Serie {
    pub fn finished(name: impl Into<String>) -> Self {
        Serie {
            name: name.into(),
            progress: Progress::Finished,
        }
    }

    pub fn ongoing(name: impl Into<String>, season: u32, episode: u32) -> Self {
        Serie {
            name: name.into(),
            progress: Progress::Ongoing { season, episode },
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.progress, Progress::Finished)
    }
}

impl fmt::Display for Serie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.progress {
            Progress::Finished => write!(f, "{}", self.name),
            Progress::Ongoing { season, episode } => {
                write!(f, "{} (S{season}E{episode})", self.name)
            }
        }
    }
}

/// Stored shape of a record: season/episode are set iff `finished` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerieRow {
    name: String,
    finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    episode: Option<u32>,
}

#[derive(Debug, Error)]
#[error("series row '{name}' {problem}")]
pub struct InvalidRow {
    name: String,
    problem: &'static str,
}

impl TryFrom<SerieRow> for Serie {
    type Error = InvalidRow;

    fn try_from(row: SerieRow) -> Result<Self, Self::Error> {
        let invalid = |problem| InvalidRow {
            name: row.name.clone(),
            problem,
        };
        if row.name.trim().is_empty() {
            return Err(invalid("has an empty name"));
        }

        let progress = match (row.finished, row.season, row.episode) {
            (true, None, None) => Progress::Finished,
            (false, Some(season), Some(episode)) => Progress::Ongoing { season, episode },
            (true, _, _) => return Err(invalid("is finished but has season/episode")),
            (false, _, _) => return Err(invalid("is ongoing but lacks season/episode")),
        };

        Ok(Serie {
            name: row.name,
            progress,
        })
    }
}

impl From<Serie> for SerieRow {
    fn from(serie: Serie) -> Self {
        let (finished, season, episode) = match serie.progress {
            Progress::Finished => (true, None, None),
            Progress::Ongoing { season, episode } => (false, Some(season), Some(episode)),
        };
        SerieRow {
            name: serie.name,
            finished,
            season,
            episode,
        }
    }
}
