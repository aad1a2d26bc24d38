use crate::gate::Unlocked;
use crate::series::{Progress, Serie, Update};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("series name is required")]
    NameRequired,
    #[error("series '{0}' already exists")]
    AlreadyExists(String),
    #[error("series '{0}' not found")]
    NotFound(String),
    #[error("series '{0}' is finished, only ongoing series can be updated")]
    NotOngoing(String),
    #[error("series table {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Series table kept as one JSON file. Every mutation needs an `Unlocked` token.
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Store { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Series with the given finished flag, ordered by name.
    pub fn list(&self, finished: bool) -> Result<Vec<Serie>, StoreError> {
        let mut rows = self.load()?;
        rows.retain(|s| s.is_finished() == finished);
        Ok(rows)
    }

    pub fn list_all(&self) -> Result<Vec<Serie>, StoreError> {
        self.load()
    }

    pub fn add_finished(&self, _: &Unlocked, name: &str) -> Result<Serie, StoreError> {
        self.insert(Serie::finished(clean_name(name)?))
    }

    pub fn add_ongoing(
        &self,
        _: &Unlocked,
        name: &str,
        season: u32,
        episode: u32,
    ) -> Result<Serie, StoreError> {
        self.insert(Serie::ongoing(clean_name(name)?, season, episode))
    }

    pub fn update(&self, _: &Unlocked, name: &str, update: Update) -> Result<Serie, StoreError> {
        self.modify(name, |serie| match &mut serie.progress {
            Progress::Finished => Err(StoreError::NotOngoing(serie.name.clone())),
            Progress::Ongoing { season, episode } => {
                match update {
                    Update::Season(s) => *season = s,
                    Update::Episode(e) => *episode = e,
                    Update::Both {
                        season: s,
                        episode: e,
                    } => {
                        *season = s;
                        *episode = e;
                    }
                }
                Ok(())
            }
        })
    }

    /// Mark an ongoing series finished and drop its counters.
    pub fn convert(&self, _: &Unlocked, name: &str) -> Result<Serie, StoreError> {
        self.modify(name, |serie| {
            if serie.is_finished() {
                debug!(name = %serie.name, "series already finished");
            }
            serie.progress = Progress::Finished;
            Ok(())
        })
    }

    pub fn delete(&self, _: &Unlocked, name: &str) -> Result<(), StoreError> {
        let name = clean_name(name)?;
        let mut rows = self.load()?;
        let before = rows.len();
        rows.retain(|s| s.name != name);
        if rows.len() == before {
            return Err(StoreError::NotFound(name.to_string()));
        }

        self.save(rows)?;
        info!(name, "series deleted");
        Ok(())
    }

    fn insert(&self, serie: Serie) -> Result<Serie, StoreError> {
        let mut rows = self.load()?;
        if rows.iter().any(|s| s.name == serie.name) {
            return Err(StoreError::AlreadyExists(serie.name));
        }

        rows.push(serie.clone());
        self.save(rows)?;
        info!(name = %serie.name, finished = serie.is_finished(), "series added");
        Ok(serie)
    }

    fn modify<F>(&self, name: &str, f: F) -> Result<Serie, StoreError>
    where
        F: FnOnce(&mut Serie) -> Result<(), StoreError>,
    {
        let name = clean_name(name)?;
        let mut rows = self.load()?;
        let serie = rows
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        f(serie)?;
        let updated = serie.clone();
        self.save(rows)?;
        info!(name, finished = updated.is_finished(), "series updated");
        Ok(updated)
    }

    fn load(&self) -> Result<Vec<Serie>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let data = std::fs::read_to_string(&self.path)?;
        let mut rows: Vec<Serie> =
            serde_json::from_str(&data).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    /// Write through a temp file so a crash never leaves half a table.
    fn save(&self, mut rows: Vec<Serie>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        rows.sort_by(|a, b| a.name.cmp(&b.name));
        let json = serde_json::to_string_pretty(&rows)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn clean_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        Err(StoreError::NameRequired)
    } else {
        Ok(name)
    }
}
