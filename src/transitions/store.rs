//! # Transition Store
//!
//! Episode and series transitions share one id sequence.

use std::path::Path;
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};

use super::model::{
    EpisodeAclTransition, NewEpisodeTransition, NewSeriesTransition, SeriesAclTransition,
    TransitionId, TransitionResult,
};
use super::query::TransitionQuery;
use crate::persistence::{JsonFile, PersistenceError, PersistenceResult};

/// Durable storage of scheduled transitions
pub trait TransitionStore: Send + Sync + std::fmt::Debug {
    fn add_episode_transition(&self, new: NewEpisodeTransition) -> PersistenceResult<EpisodeAclTransition>;

    fn add_series_transition(&self, new: NewSeriesTransition) -> PersistenceResult<SeriesAclTransition>;

    fn episode_transition(&self, id: TransitionId) -> PersistenceResult<Option<EpisodeAclTransition>>;

    fn series_transition(&self, id: TransitionId) -> PersistenceResult<Option<SeriesAclTransition>>;

    /// Read, change and save one transition as a single step. `None` when
    /// absent, otherwise the stored result.
    fn modify_episode_transition(
        &self,
        id: TransitionId,
        f: &mut dyn FnMut(&mut EpisodeAclTransition),
    ) -> PersistenceResult<Option<EpisodeAclTransition>>;

    fn modify_series_transition(
        &self,
        id: TransitionId,
        f: &mut dyn FnMut(&mut SeriesAclTransition),
    ) -> PersistenceResult<Option<SeriesAclTransition>>;

    fn delete_episode_transition(&self, id: TransitionId) -> PersistenceResult<bool>;

    fn delete_series_transition(&self, id: TransitionId) -> PersistenceResult<bool>;

    /// Transitions of `organization` matching `query`, ordered by
    /// application date then id
    fn find(&self, organization: &str, query: &TransitionQuery) -> PersistenceResult<TransitionResult>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TransitionDocument {
    last_id: TransitionId,
    episodes: Vec<EpisodeAclTransition>,
    series: Vec<SeriesAclTransition>,
}

impl TransitionDocument {
    fn next_id(&mut self) -> TransitionId {
        self.last_id += 1;
        self.last_id
    }

    fn add_episode(&mut self, new: NewEpisodeTransition) -> EpisodeAclTransition {
        let t = new.into_transition(self.next_id());
        self.episodes.push(t.clone());
        t
    }

    fn add_series(&mut self, new: NewSeriesTransition) -> SeriesAclTransition {
        let t = new.into_transition(self.next_id());
        self.series.push(t.clone());
        t
    }

    fn episode(&self, id: TransitionId) -> Option<EpisodeAclTransition> {
        self.episodes.iter().find(|t| t.transition_id == id).cloned()
    }

    fn series(&self, id: TransitionId) -> Option<SeriesAclTransition> {
        self.series.iter().find(|t| t.transition_id == id).cloned()
    }

    fn modify_episode(
        &mut self,
        id: TransitionId,
        f: &mut dyn FnMut(&mut EpisodeAclTransition),
    ) -> Option<EpisodeAclTransition> {
        let t = self.episodes.iter_mut().find(|t| t.transition_id == id)?;
        f(t);
        Some(t.clone())
    }

    fn modify_series(
        &mut self,
        id: TransitionId,
        f: &mut dyn FnMut(&mut SeriesAclTransition),
    ) -> Option<SeriesAclTransition> {
        let t = self.series.iter_mut().find(|t| t.transition_id == id)?;
        f(t);
        Some(t.clone())
    }

    fn delete_episode(&mut self, id: TransitionId) -> bool {
        let before = self.episodes.len();
        self.episodes.retain(|t| t.transition_id != id);
        self.episodes.len() != before
    }

    fn delete_series(&mut self, id: TransitionId) -> bool {
        let before = self.series.len();
        self.series.retain(|t| t.transition_id != id);
        self.series.len() != before
    }

    fn find(&self, organization: &str, query: &TransitionQuery) -> TransitionResult {
        let mut episode_transitions: Vec<_> = self
            .episodes
            .iter()
            .filter(|t| t.organization == organization && query.matches_episode(t))
            .cloned()
            .collect();
        episode_transitions.sort_by_key(|t| (t.application_date, t.transition_id));

        let mut series_transitions: Vec<_> = self
            .series
            .iter()
            .filter(|t| t.organization == organization && query.matches_series(t))
            .cloned()
            .collect();
        series_transitions.sort_by_key(|t| (t.application_date, t.transition_id));

        TransitionResult {
            episode_transitions,
            series_transitions,
        }
    }
}

/// Transition store backed by one JSON document
#[derive(Debug)]
pub struct FileTransitionStore {
    file: JsonFile<TransitionDocument>,
    doc: Mutex<TransitionDocument>,
}

impl FileTransitionStore {
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let file = JsonFile::new(path);
        let doc = file.load()?;
        Ok(Self {
            file,
            doc: Mutex::new(doc),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&TransitionDocument) -> R) -> PersistenceResult<R> {
        let doc = self
            .doc
            .lock()
            .map_err(|_| PersistenceError::Poisoned("transitions"))?;
        Ok(f(&doc))
    }

    /// Apply `f` to a copy and publish it once saved
    fn mutate<R>(&self, f: impl FnOnce(&mut TransitionDocument) -> R) -> PersistenceResult<R> {
        let mut doc = self
            .doc
            .lock()
            .map_err(|_| PersistenceError::Poisoned("transitions"))?;
        let mut next = doc.clone();
        let result = f(&mut next);
        if next != *doc {
            self.file.save(&next)?;
            *doc = next;
        }
        Ok(result)
    }
}

impl TransitionStore for FileTransitionStore {
    fn add_episode_transition(&self, new: NewEpisodeTransition) -> PersistenceResult<EpisodeAclTransition> {
        self.mutate(|doc| doc.add_episode(new))
    }

    fn add_series_transition(&self, new: NewSeriesTransition) -> PersistenceResult<SeriesAclTransition> {
        self.mutate(|doc| doc.add_series(new))
    }

    fn episode_transition(&self, id: TransitionId) -> PersistenceResult<Option<EpisodeAclTransition>> {
        self.read(|doc| doc.episode(id))
    }

    fn series_transition(&self, id: TransitionId) -> PersistenceResult<Option<SeriesAclTransition>> {
        self.read(|doc| doc.series(id))
    }

    fn modify_episode_transition(
        &self,
        id: TransitionId,
        f: &mut dyn FnMut(&mut EpisodeAclTransition),
    ) -> PersistenceResult<Option<EpisodeAclTransition>> {
        self.mutate(|doc| doc.modify_episode(id, f))
    }

    fn modify_series_transition(
        &self,
        id: TransitionId,
        f: &mut dyn FnMut(&mut SeriesAclTransition),
    ) -> PersistenceResult<Option<SeriesAclTransition>> {
        self.mutate(|doc| doc.modify_series(id, f))
    }

    fn delete_episode_transition(&self, id: TransitionId) -> PersistenceResult<bool> {
        self.mutate(|doc| doc.delete_episode(id))
    }

    fn delete_series_transition(&self, id: TransitionId) -> PersistenceResult<bool> {
        self.mutate(|doc| doc.delete_series(id))
    }

    fn find(&self, organization: &str, query: &TransitionQuery) -> PersistenceResult<TransitionResult> {
        self.read(|doc| doc.find(organization, query))
    }
}

/// In-memory transition store
#[derive(Debug, Default)]
pub struct MemTransitionStore {
    doc: RwLock<TransitionDocument>,
}

impl MemTransitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<R>(&self, f: impl FnOnce(&TransitionDocument) -> R) -> PersistenceResult<R> {
        let doc = self
            .doc
            .read()
            .map_err(|_| PersistenceError::Poisoned("transitions"))?;
        Ok(f(&doc))
    }

    fn write<R>(&self, f: impl FnOnce(&mut TransitionDocument) -> R) -> PersistenceResult<R> {
        let mut doc = self
            .doc
            .write()
            .map_err(|_| PersistenceError::Poisoned("transitions"))?;
        Ok(f(&mut doc))
    }
}

impl TransitionStore for MemTransitionStore {
    fn add_episode_transition(&self, new: NewEpisodeTransition) -> PersistenceResult<EpisodeAclTransition> {
        self.write(|doc| doc.add_episode(new))
    }

    fn add_series_transition(&self, new: NewSeriesTransition) -> PersistenceResult<SeriesAclTransition> {
        self.write(|doc| doc.add_series(new))
    }

    fn episode_transition(&self, id: TransitionId) -> PersistenceResult<Option<EpisodeAclTransition>> {
        self.read(|doc| doc.episode(id))
    }

    fn series_transition(&self, id: TransitionId) -> PersistenceResult<Option<SeriesAclTransition>> {
        self.read(|doc| doc.series(id))
    }

    fn modify_episode_transition(
        &self,
        id: TransitionId,
        f: &mut dyn FnMut(&mut EpisodeAclTransition),
    ) -> PersistenceResult<Option<EpisodeAclTransition>> {
        self.write(|doc| doc.modify_episode(id, f))
    }

    fn modify_series_transition(
        &self,
        id: TransitionId,
        f: &mut dyn FnMut(&mut SeriesAclTransition),
    ) -> PersistenceResult<Option<SeriesAclTransition>> {
        self.write(|doc| doc.modify_series(id, f))
    }

    fn delete_episode_transition(&self, id: TransitionId) -> PersistenceResult<bool> {
        self.write(|doc| doc.delete_episode(id))
    }

    fn delete_series_transition(&self, id: TransitionId) -> PersistenceResult<bool> {
        self.write(|doc| doc.delete_series(id))
    }

    fn find(&self, organization: &str, query: &TransitionQuery) -> PersistenceResult<TransitionResult> {
        self.read(|doc| doc.find(organization, query))
    }
}
