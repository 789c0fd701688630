use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::coordinator::{RecalculationCoordinator, RecomputeError};
use super::domain::{EntryId, RaceNumber, RegattaId, ResultSubmission};
use super::errors::ScoringError;
use super::export::{to_csv_string, ExportFormat};
use super::policy::ScoringConfig;
use super::store::{ResultStore, SnapshotStore, StoreError};

pub struct ScoringState<S, P> {
    coordinator: Arc<RecalculationCoordinator<S, P>>,
    recompute_wait: Duration,
}

impl<S, P> Clone for ScoringState<S, P> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            recompute_wait: self.recompute_wait,
        }
    }
}

/// Router exposing recompute, standings, result entry, configuration and export endpoints.
///
/// `recompute_wait` bounds how long a synchronous recompute request blocks before the caller is
/// told the recompute is still running.
pub fn scoring_router<S, P>(
    coordinator: Arc<RecalculationCoordinator<S, P>>,
    recompute_wait: Duration,
) -> Router
where
    S: ResultStore + 'static,
    P: SnapshotStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/regattas/:regatta_id/recompute",
            post(recompute_handler::<S, P>),
        )
        .route(
            "/api/v1/regattas/:regatta_id/standings",
            get(standings_handler::<S, P>),
        )
        .route(
            "/api/v1/regattas/:regatta_id/races/:race/results/:entry_id",
            put(result_handler::<S, P>),
        )
        .route(
            "/api/v1/regattas/:regatta_id/scoring-config",
            put(config_handler::<S, P>),
        )
        .route(
            "/api/v1/regattas/:regatta_id/export/standings",
            get(export_standings_handler::<S, P>),
        )
        .route(
            "/api/v1/regattas/:regatta_id/export/results",
            get(export_results_handler::<S, P>),
        )
        .with_state(ScoringState {
            coordinator,
            recompute_wait,
        })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RecomputeParams {
    #[serde(default)]
    wait: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfigParams {
    #[serde(default)]
    rescore: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExportParams {
    #[serde(default)]
    format: ExportFormat,
}

#[derive(Debug, Serialize)]
struct AcceptedResult {
    regatta_id: RegattaId,
    race: RaceNumber,
    entry_id: EntryId,
    status: &'static str,
}

pub(crate) async fn recompute_handler<S, P>(
    State(state): State<ScoringState<S, P>>,
    Path(regatta_id): Path<String>,
    Query(params): Query<RecomputeParams>,
) -> Response
where
    S: ResultStore + 'static,
    P: SnapshotStore + 'static,
{
    let regatta = RegattaId(regatta_id);
    let coordinator = state.coordinator.clone();

    if params.wait == Some(false) {
        let worker = tokio::task::spawn_blocking(move || coordinator.try_recompute(&regatta));
        return match worker.await {
            Ok(Ok(snapshot)) => (StatusCode::OK, axum::Json(snapshot.as_ref())).into_response(),
            Ok(Err(err)) => err.into_response(),
            Err(err) => RecomputeError::Worker(err.to_string()).into_response(),
        };
    }

    let pending = regatta.clone();
    let worker = tokio::task::spawn_blocking(move || coordinator.recompute(&regatta));
    match tokio::time::timeout(state.recompute_wait, worker).await {
        Ok(Ok(Ok(snapshot))) => (StatusCode::OK, axum::Json(snapshot.as_ref())).into_response(),
        Ok(Ok(Err(err))) => err.into_response(),
        Ok(Err(err)) => RecomputeError::Worker(err.to_string()).into_response(),
        Err(_) => {
            let payload = json!({
                "error": RecomputeError::InProgress(pending.clone()).to_string(),
                "regatta_id": pending,
                "retry": "standings publish when the running recompute completes",
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn standings_handler<S, P>(
    State(state): State<ScoringState<S, P>>,
    Path(regatta_id): Path<String>,
) -> Response
where
    S: ResultStore + 'static,
    P: SnapshotStore + 'static,
{
    let regatta = RegattaId(regatta_id);
    match state.coordinator.standings(&regatta) {
        Ok(Some(snapshot)) => (StatusCode::OK, axum::Json(snapshot.as_ref())).into_response(),
        Ok(None) => RecomputeError::NotPublished(regatta).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Records one result and schedules a recompute without waiting for it.
pub(crate) async fn result_handler<S, P>(
    State(state): State<ScoringState<S, P>>,
    Path((regatta_id, race, entry_id)): Path<(String, RaceNumber, String)>,
    axum::Json(submission): axum::Json<ResultSubmission>,
) -> Response
where
    S: ResultStore + 'static,
    P: SnapshotStore + 'static,
{
    let regatta = RegattaId(regatta_id);
    let entry = EntryId(entry_id);
    let result = match submission.into_result(regatta.clone(), race, entry.clone()) {
        Ok(result) => result,
        Err(err) => {
            let payload = json!({
                "error": err.to_string(),
                "race": race,
                "entry_id": entry,
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
        }
    };

    if let Err(err) = state.coordinator.record_result(result) {
        return err.into_response();
    }

    let coordinator = state.coordinator.clone();
    let background = regatta.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(err) = coordinator.recompute(&background) {
            warn!(regatta = %background, error = %err, "background recompute failed");
        }
    });

    let accepted = AcceptedResult {
        regatta_id: regatta,
        race,
        entry_id: entry,
        status: "accepted",
    };
    (StatusCode::ACCEPTED, axum::Json(accepted)).into_response()
}

pub(crate) async fn config_handler<S, P>(
    State(state): State<ScoringState<S, P>>,
    Path(regatta_id): Path<String>,
    Query(params): Query<ConfigParams>,
    axum::Json(config): axum::Json<ScoringConfig>,
) -> Response
where
    S: ResultStore + 'static,
    P: SnapshotStore + 'static,
{
    let regatta = RegattaId(regatta_id);
    let coordinator = state.coordinator.clone();

    if !params.rescore {
        return match coordinator.configure(&regatta, config) {
            Ok(()) => StatusCode::NO_CONTENT.into_response(),
            Err(err) => err.into_response(),
        };
    }

    let worker = tokio::task::spawn_blocking(move || coordinator.rescore(&regatta, config));
    match worker.await {
        Ok(Ok(snapshot)) => (StatusCode::OK, axum::Json(snapshot.as_ref())).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(err) => RecomputeError::Worker(err.to_string()).into_response(),
    }
}

pub(crate) async fn export_standings_handler<S, P>(
    State(state): State<ScoringState<S, P>>,
    Path(regatta_id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Response
where
    S: ResultStore + 'static,
    P: SnapshotStore + 'static,
{
    match state.coordinator.export_standings(&RegattaId(regatta_id)) {
        Ok(rows) => render_rows(&rows, params.format),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn export_results_handler<S, P>(
    State(state): State<ScoringState<S, P>>,
    Path(regatta_id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Response
where
    S: ResultStore + 'static,
    P: SnapshotStore + 'static,
{
    match state.coordinator.export_results(&RegattaId(regatta_id)) {
        Ok(rows) => render_rows(&rows, params.format),
        Err(err) => err.into_response(),
    }
}

fn render_rows<T: Serialize>(rows: &[T], format: ExportFormat) -> Response {
    match format {
        ExportFormat::Json => (StatusCode::OK, axum::Json(rows)).into_response(),
        ExportFormat::Csv => match to_csv_string(rows) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(err) => {
                let payload = json!({ "error": err.to_string() });
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
            }
        },
    }
}

impl IntoResponse for RecomputeError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, payload) = match self {
            RecomputeError::Scoring(ScoringError::AmbiguousResults { race, collisions }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": message, "race": race, "collisions": collisions }),
            ),
            RecomputeError::Scoring(ScoringError::InvalidResult { race, entry, .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": message, "race": race, "entry_id": entry }),
            ),
            RecomputeError::Scoring(ScoringError::PointsOverflow { entry }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": message, "entry_id": entry }),
            ),
            RecomputeError::Scoring(ScoringError::InvalidConfiguration(_))
            | RecomputeError::Store(StoreError::Rejected(_)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": message }),
            ),
            RecomputeError::Store(StoreError::RegattaNotFound(regatta))
            | RecomputeError::NotPublished(regatta) => (
                StatusCode::NOT_FOUND,
                json!({ "error": message, "regatta_id": regatta }),
            ),
            RecomputeError::InProgress(regatta) | RecomputeError::ConfigurationLocked(regatta) => (
                StatusCode::CONFLICT,
                json!({ "error": message, "regatta_id": regatta }),
            ),
            RecomputeError::Store(StoreError::Unavailable(_)) | RecomputeError::Worker(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            ),
        };
        (status, axum::Json(payload)).into_response()
    }
}
