use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use equipment_analytics::execution::{
    Deadline, ExecutionEngine, ExecutionEvent, ExecutionObserver, ExecutionOptions,
};
use equipment_analytics::ingestion::IngestionService;
use equipment_analytics::store::{DatasetStore, InMemoryDatasetStore};
use equipment_analytics::types::{Dataset, DatasetDraft, DatasetId, DatasetSummary, TypeCount};
use equipment_analytics::{IngestError, ParseError, StoreError, StoreResult};

fn engine() -> Arc<ExecutionEngine> {
    Arc::new(ExecutionEngine::new(ExecutionOptions {
        num_threads: Some(2),
        max_in_flight_jobs: 2,
    }))
}

fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(format!("tests/fixtures/{name}")).unwrap()
}

#[test]
fn ingest_stores_records_and_aggregates() {
    let store = Arc::new(InMemoryDatasetStore::new());
    let svc = IngestionService::new(store.clone(), engine());
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    let outcome = svc
        .ingest_at("equipment.csv", &fixture("equipment.csv"), at)
        .unwrap();
    assert_eq!(outcome.id, DatasetId::new(1));
    assert!(outcome.skipped.is_empty());

    let ds = store.get(&outcome.id).unwrap();
    assert_eq!(ds.file_name, "equipment.csv");
    assert_eq!(ds.uploaded_at, at);
    assert_eq!(ds.records.len(), 3);
    assert_eq!(ds.aggregates.total_count, 3);
    assert_eq!(
        ds.aggregates.type_distribution,
        vec![
            TypeCount {
                equipment_type: "Pump".into(),
                count: 2
            },
            TypeCount {
                equipment_type: "Valve".into(),
                count: 1
            },
        ]
    );
    assert!((ds.aggregates.averages.flowrate - 35.0 / 3.0).abs() < 1e-9);
    assert_eq!(ds.aggregates.averages.pressure, 5.0);
    assert_eq!(ds.aggregates.averages.temperature, 20.0);
}

#[test]
fn sole_invalid_row_fails_and_stores_nothing() {
    let store = Arc::new(InMemoryDatasetStore::new());
    let svc = IngestionService::new(store.clone(), engine());

    let input = "equipment_name,equipment_type,flowrate,pressure,temperature\nPump1,Pump,abc,5,20\n";
    let err = svc.ingest("bad.csv", input.as_bytes()).unwrap_err();

    assert!(matches!(err, IngestError::Parse(ParseError::EmptyDataset { .. })));
    assert!(store.is_empty());
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn skipped_rows_are_returned_and_excluded_from_aggregates() {
    let store = Arc::new(InMemoryDatasetStore::new());
    let svc = IngestionService::new(store.clone(), engine());

    let outcome = svc
        .ingest("aliased.csv", &fixture("equipment_aliased.csv"))
        .unwrap();
    assert_eq!(outcome.skipped.len(), 1);

    let ds = store.get(&outcome.id).unwrap();
    assert_eq!(ds.aggregates.total_count, 2);
    assert_eq!(ds.aggregates.type_distribution.len(), 2);
}

#[test]
fn ids_increase_in_upload_order() {
    let store = Arc::new(InMemoryDatasetStore::new());
    let svc = IngestionService::new(store.clone(), engine());
    let bytes = fixture("equipment.csv");

    let ids: Vec<_> = ["a.csv", "b.csv", "c.csv"]
        .iter()
        .map(|name| svc.ingest(name, &bytes).unwrap().id)
        .collect();
    assert_eq!(ids, vec![DatasetId::new(1), DatasetId::new(2), DatasetId::new(3)]);

    let names: Vec<_> = store.list().unwrap().into_iter().map(|s| s.file_name).collect();
    assert_eq!(names, vec!["a.csv", "b.csv", "c.csv"]);
}

/// Sleeps before delegating, honoring the deadline like the real stores.
struct SlowStore {
    inner: InMemoryDatasetStore,
    delay: Duration,
}

impl DatasetStore for SlowStore {
    fn save(&self, draft: DatasetDraft, deadline: Option<Deadline>) -> StoreResult<DatasetId> {
        thread::sleep(self.delay);
        self.inner.save(draft, deadline)
    }

    fn get(&self, id: &DatasetId) -> StoreResult<Arc<Dataset>> {
        self.inner.get(id)
    }

    fn list(&self) -> StoreResult<Vec<DatasetSummary>> {
        self.inner.list()
    }
}

#[test]
fn slow_save_times_out_and_never_becomes_visible() {
    let store = Arc::new(SlowStore {
        inner: InMemoryDatasetStore::new(),
        delay: Duration::from_millis(150),
    });
    let svc = IngestionService::new(store.clone(), engine())
        .with_store_timeout(Duration::from_millis(20));

    let err = svc.ingest("slow.csv", &fixture("equipment.csv")).unwrap_err();
    assert!(matches!(err, IngestError::Store(StoreError::Timeout { .. })));

    // Let the abandoned job run to completion; it must not publish.
    thread::sleep(Duration::from_millis(300));
    assert!(store.list().unwrap().is_empty());
}

/// Publishes through the inner store, then keeps the job busy.
struct LingeringStore {
    inner: InMemoryDatasetStore,
    linger: Duration,
}

impl DatasetStore for LingeringStore {
    fn save(&self, draft: DatasetDraft, deadline: Option<Deadline>) -> StoreResult<DatasetId> {
        let id = self.inner.save(draft, deadline)?;
        thread::sleep(self.linger);
        Ok(id)
    }

    fn get(&self, id: &DatasetId) -> StoreResult<Arc<Dataset>> {
        self.inner.get(id)
    }

    fn list(&self) -> StoreResult<Vec<DatasetSummary>> {
        self.inner.list()
    }
}

#[test]
fn save_published_before_the_timeout_is_reported_as_success() {
    let store = Arc::new(LingeringStore {
        inner: InMemoryDatasetStore::new(),
        linger: Duration::from_millis(150),
    });
    let svc = IngestionService::new(store.clone(), engine())
        .with_store_timeout(Duration::from_millis(30));

    let id = svc.ingest("late.csv", &fixture("equipment.csv")).unwrap().id;
    let listed: Vec<_> = store.list().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(listed, vec![id]);
}

/// Blocks the worker thread when it sees one kind of event.
struct StallingObserver {
    on_started: bool,
    stall: Duration,
}

impl ExecutionObserver for StallingObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        let stall = match event {
            ExecutionEvent::JobStarted { .. } => self.on_started,
            ExecutionEvent::JobFinished { .. } => !self.on_started,
            _ => false,
        };
        if stall {
            thread::sleep(self.stall);
        }
    }
}

fn stalled_service(store: Arc<InMemoryDatasetStore>, on_started: bool) -> IngestionService {
    let observer = Arc::new(StallingObserver {
        on_started,
        stall: Duration::from_millis(200),
    });
    let engine = ExecutionEngine::new(ExecutionOptions {
        num_threads: Some(2),
        max_in_flight_jobs: 2,
    })
    .with_observer(observer);
    IngestionService::new(store, Arc::new(engine)).with_store_timeout(Duration::from_millis(50))
}

#[test]
fn slow_finish_observer_does_not_turn_a_save_into_a_timeout() {
    let store = Arc::new(InMemoryDatasetStore::new());
    let svc = stalled_service(store.clone(), false);

    let id = svc.ingest("observed.csv", &fixture("equipment.csv")).unwrap().id;
    assert_eq!(store.len(), 1);
    assert!(store.get(&id).is_ok());
}

#[test]
fn timeout_result_always_matches_store_contents() {
    let store = Arc::new(InMemoryDatasetStore::new());
    let svc = stalled_service(store.clone(), true);

    let result = svc.ingest("stalled.csv", &fixture("equipment.csv"));
    thread::sleep(Duration::from_millis(400));
    match result {
        Ok(id) => assert!(store.get(&id.id).is_ok()),
        Err(IngestError::Store(StoreError::Timeout { .. })) => assert!(store.is_empty()),
        Err(other) => panic!("unexpected error {other:?}"),
    }
}
