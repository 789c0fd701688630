//! In-memory store implementations for the API service, the CLI and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{Entry, EntryId, Race, RaceNumber, RaceResult, Regatta, RegattaId};
use super::engine::ScoringInput;
use super::policy::ScoringConfig;
use super::store::{ResultStore, SnapshotStore, StandingsSnapshot, StoreError};

#[derive(Debug, Clone)]
struct RegattaBook {
    regatta: Regatta,
    entries: BTreeMap<EntryId, Entry>,
    races: BTreeMap<RaceNumber, Race>,
    results: BTreeMap<(RaceNumber, EntryId), RaceResult>,
}

#[derive(Default, Clone)]
pub struct InMemoryResultStore {
    books: Arc<Mutex<HashMap<RegattaId, RegattaBook>>>,
}

impl InMemoryResultStore {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<RegattaId, RegattaBook>>, StoreError> {
        self.books
            .lock()
            .map_err(|_| StoreError::Unavailable("result store lock poisoned".to_string()))
    }

    fn with_book<T>(
        &self,
        regatta: &RegattaId,
        read: impl FnOnce(&mut RegattaBook) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.lock()?;
        let book = guard
            .get_mut(regatta)
            .ok_or_else(|| StoreError::RegattaNotFound(regatta.clone()))?;
        read(book)
    }

    /// Registers a regatta, replacing any previous registration with the same id.
    pub fn insert_regatta(&self, regatta: Regatta) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.insert(
            regatta.regatta_id.clone(),
            RegattaBook {
                regatta,
                entries: BTreeMap::new(),
                races: BTreeMap::new(),
                results: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn insert_entry(&self, entry: Entry) -> Result<(), StoreError> {
        let regatta = entry.regatta_id.clone();
        self.with_book(&regatta, |book| {
            book.entries.insert(entry.entry_id.clone(), entry);
            Ok(())
        })
    }

    pub fn insert_race(&self, regatta: &RegattaId, race: Race) -> Result<(), StoreError> {
        if race.number == 0 {
            return Err(StoreError::Rejected("race numbers start at 1".to_string()));
        }
        self.with_book(regatta, |book| {
            book.races.insert(race.number, race);
            Ok(())
        })
    }

    pub fn regatta(&self, regatta: &RegattaId) -> Result<Regatta, StoreError> {
        self.with_book(regatta, |book| Ok(book.regatta.clone()))
    }
}

impl ResultStore for InMemoryResultStore {
    fn confirmed_entries(&self, regatta: &RegattaId) -> Result<Vec<Entry>, StoreError> {
        self.with_book(regatta, |book| Ok(book.entries.values().cloned().collect()))
    }

    fn race_results(&self, regatta: &RegattaId) -> Result<Vec<RaceResult>, StoreError> {
        self.with_book(regatta, |book| Ok(book.results.values().cloned().collect()))
    }

    fn scoring_config(&self, regatta: &RegattaId) -> Result<ScoringConfig, StoreError> {
        self.with_book(regatta, |book| Ok(book.regatta.scoring.clone()))
    }

    fn races(&self, regatta: &RegattaId) -> Result<Vec<Race>, StoreError> {
        self.with_book(regatta, |book| {
            let mut races = book.races.clone();
            for (race, _) in book.results.keys() {
                races.entry(*race).or_insert_with(|| Race::new(*race));
            }
            Ok(races.into_values().collect())
        })
    }

    fn upsert_race_result(&self, result: RaceResult) -> Result<(), StoreError> {
        if result.race == 0 {
            return Err(StoreError::Rejected("race numbers start at 1".to_string()));
        }
        let regatta = result.regatta_id.clone();
        self.with_book(&regatta, |book| {
            book.results
                .insert((result.race, result.entry_id.clone()), result);
            Ok(())
        })
    }

    fn put_scoring_config(
        &self,
        regatta: &RegattaId,
        config: ScoringConfig,
    ) -> Result<(), StoreError> {
        self.with_book(regatta, |book| {
            book.regatta.scoring = config;
            Ok(())
        })
    }

    fn load_scoring_input(&self, regatta: &RegattaId) -> Result<ScoringInput, StoreError> {
        self.with_book(regatta, |book| {
            Ok(ScoringInput {
                regatta_id: regatta.clone(),
                config: book.regatta.scoring.clone(),
                entries: book.entries.values().cloned().collect(),
                results: book.results.values().cloned().collect(),
            })
        })
    }
}

#[derive(Default, Clone)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<Mutex<HashMap<RegattaId, Arc<StandingsSnapshot>>>>,
}

impl SnapshotStore for InMemorySnapshotStore {
    fn publish(&self, snapshot: StandingsSnapshot) -> Result<Arc<StandingsSnapshot>, StoreError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|_| StoreError::Unavailable("snapshot store lock poisoned".to_string()))?;
        let snapshot = Arc::new(snapshot);
        guard.insert(snapshot.regatta_id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    fn latest(&self, regatta: &RegattaId) -> Result<Option<Arc<StandingsSnapshot>>, StoreError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|_| StoreError::Unavailable("snapshot store lock poisoned".to_string()))?;
        Ok(guard.get(regatta).cloned())
    }
}
