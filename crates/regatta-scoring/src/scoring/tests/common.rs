use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use axum::body::to_bytes;
use axum::response::Response;
use serde_json::Value;

use crate::scoring::domain::{Entry, EntryId, Race, RaceResult, Regatta, RegattaId, ResultCode};
use crate::scoring::engine::ScoringInput;
use crate::scoring::memory::{InMemoryResultStore, InMemorySnapshotStore};
use crate::scoring::policy::ScoringConfig;
use crate::scoring::store::{ResultStore, StoreError};
use crate::scoring::RecalculationCoordinator;

pub(super) type MemoryCoordinator =
    RecalculationCoordinator<InMemoryResultStore, InMemorySnapshotStore>;

pub(super) fn regatta() -> RegattaId {
    RegattaId::from("spring-series")
}

pub(super) fn other_regatta() -> RegattaId {
    RegattaId::from("harbour-cup")
}

pub(super) fn entry(regatta: &RegattaId, id: &str, sail: u32) -> Entry {
    Entry {
        entry_id: EntryId::from(id),
        regatta_id: regatta.clone(),
        sail_number: format!("GBR {sail}"),
        boat_name: format!("Boat {id}"),
        skipper_name: None,
        withdrawn: false,
    }
}

/// Both test regattas with entries A, B and C and one discard from four races.
pub(super) fn seeded_store() -> InMemoryResultStore {
    let store = InMemoryResultStore::default();
    for (regatta, name) in [(regatta(), "Spring Series"), (other_regatta(), "Harbour Cup")] {
        store
            .insert_regatta(Regatta {
                regatta_id: regatta.clone(),
                name: name.to_string(),
                scoring: ScoringConfig::with_schedule([(4, 1)]),
            })
            .expect("regatta registers");
        for (sail, id) in ["A", "B", "C"].into_iter().enumerate() {
            store
                .insert_entry(entry(&regatta, id, sail as u32 + 1))
                .expect("entry registers");
        }
    }
    store
}

pub(super) fn memory_coordinator() -> Arc<MemoryCoordinator> {
    Arc::new(RecalculationCoordinator::new(
        Arc::new(seeded_store()),
        Arc::new(InMemorySnapshotStore::default()),
    ))
}

pub(super) fn finish(race: u32, id: &str, position: u32) -> RaceResult {
    RaceResult::finished(regatta(), race, EntryId::from(id), position)
}

pub(super) fn code(race: u32, id: &str, code: ResultCode) -> RaceResult {
    RaceResult::status(regatta(), race, EntryId::from(id), code)
}

/// Four races for A, B, C with race 3 already corrected (B scored DNS).
pub(super) fn corrected_series() -> Vec<RaceResult> {
    vec![
        finish(1, "A", 1),
        finish(1, "B", 2),
        finish(1, "C", 3),
        finish(2, "A", 2),
        finish(2, "B", 1),
        code(2, "C", ResultCode::Dnf),
        finish(3, "A", 3),
        code(3, "B", ResultCode::Dns),
        code(3, "C", ResultCode::Dnf),
        finish(4, "A", 1),
        finish(4, "B", 2),
        finish(4, "C", 3),
    ]
}

pub(super) fn record_all(store: &InMemoryResultStore, results: Vec<RaceResult>) {
    for result in results {
        store.upsert_race_result(result).expect("result stored");
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Every call fails as if the backing database were down.
pub(super) struct UnavailableResultStore;

fn unavailable<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

impl ResultStore for UnavailableResultStore {
    fn confirmed_entries(&self, _regatta: &RegattaId) -> Result<Vec<Entry>, StoreError> {
        unavailable()
    }

    fn race_results(&self, _regatta: &RegattaId) -> Result<Vec<RaceResult>, StoreError> {
        unavailable()
    }

    fn scoring_config(&self, _regatta: &RegattaId) -> Result<ScoringConfig, StoreError> {
        unavailable()
    }

    fn races(&self, _regatta: &RegattaId) -> Result<Vec<Race>, StoreError> {
        unavailable()
    }

    fn upsert_race_result(&self, _result: RaceResult) -> Result<(), StoreError> {
        unavailable()
    }

    fn put_scoring_config(
        &self,
        _regatta: &RegattaId,
        _config: ScoringConfig,
    ) -> Result<(), StoreError> {
        unavailable()
    }
}

/// In-memory store whose reads can be switched to fail mid-series.
#[derive(Clone)]
pub(super) struct FlakyResultStore {
    pub(super) inner: InMemoryResultStore,
    failing: Arc<AtomicBool>,
}

impl FlakyResultStore {
    pub(super) fn new(inner: InMemoryResultStore) -> Self {
        Self {
            inner,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(super) fn fail_reads(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl ResultStore for FlakyResultStore {
    fn confirmed_entries(&self, regatta: &RegattaId) -> Result<Vec<Entry>, StoreError> {
        self.inner.confirmed_entries(regatta)
    }

    fn race_results(&self, regatta: &RegattaId) -> Result<Vec<RaceResult>, StoreError> {
        self.inner.race_results(regatta)
    }

    fn scoring_config(&self, regatta: &RegattaId) -> Result<ScoringConfig, StoreError> {
        self.inner.scoring_config(regatta)
    }

    fn races(&self, regatta: &RegattaId) -> Result<Vec<Race>, StoreError> {
        self.inner.races(regatta)
    }

    fn upsert_race_result(&self, result: RaceResult) -> Result<(), StoreError> {
        self.inner.upsert_race_result(result)
    }

    fn put_scoring_config(
        &self,
        regatta: &RegattaId,
        config: ScoringConfig,
    ) -> Result<(), StoreError> {
        self.inner.put_scoring_config(regatta, config)
    }

    fn load_scoring_input(&self, regatta: &RegattaId) -> Result<ScoringInput, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return unavailable();
        }
        self.inner.load_scoring_input(regatta)
    }
}

/// In-memory store that holds recompute reads for one regatta until the gate opens.
#[derive(Clone)]
pub(super) struct GatedResultStore {
    pub(super) inner: InMemoryResultStore,
    gated: RegattaId,
    gate: Arc<(Mutex<bool>, Condvar)>,
    loads: Arc<AtomicUsize>,
    hold_result_reads: bool,
}

impl GatedResultStore {
    pub(super) fn new(inner: InMemoryResultStore, gated: RegattaId) -> Self {
        Self {
            inner,
            gated,
            gate: Arc::new((Mutex::new(false), Condvar::new())),
            loads: Arc::new(AtomicUsize::new(0)),
            hold_result_reads: false,
        }
    }

    /// Also holds plain result reads, the check a configuration change makes.
    pub(super) fn holding_result_reads(mut self) -> Self {
        self.hold_result_reads = true;
        self
    }

    pub(super) fn open(&self) {
        let (open, signal) = &*self.gate;
        *open.lock().expect("gate lock") = true;
        signal.notify_all();
    }

    /// Number of held reads started for the gated regatta.
    pub(super) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(super) fn wait_for_loads(&self, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.loads() < expected {
            assert!(Instant::now() < deadline, "timed out waiting for {expected} loads");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn hold(&self, regatta: &RegattaId) {
        if *regatta != self.gated {
            return;
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        let (open, signal) = &*self.gate;
        let mut guard = open.lock().expect("gate lock");
        while !*guard {
            guard = signal.wait(guard).expect("gate wait");
        }
    }
}

impl ResultStore for GatedResultStore {
    fn confirmed_entries(&self, regatta: &RegattaId) -> Result<Vec<Entry>, StoreError> {
        self.inner.confirmed_entries(regatta)
    }

    fn race_results(&self, regatta: &RegattaId) -> Result<Vec<RaceResult>, StoreError> {
        if self.hold_result_reads {
            self.hold(regatta);
        }
        self.inner.race_results(regatta)
    }

    fn scoring_config(&self, regatta: &RegattaId) -> Result<ScoringConfig, StoreError> {
        self.inner.scoring_config(regatta)
    }

    fn races(&self, regatta: &RegattaId) -> Result<Vec<Race>, StoreError> {
        self.inner.races(regatta)
    }

    fn upsert_race_result(&self, result: RaceResult) -> Result<(), StoreError> {
        self.inner.upsert_race_result(result)
    }

    fn put_scoring_config(
        &self,
        regatta: &RegattaId,
        config: ScoringConfig,
    ) -> Result<(), StoreError> {
        self.inner.put_scoring_config(regatta, config)
    }

    fn load_scoring_input(&self, regatta: &RegattaId) -> Result<ScoringInput, StoreError> {
        self.hold(regatta);
        self.inner.load_scoring_input(regatta)
    }
}
