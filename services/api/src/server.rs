use crate::cli::ServeArgs;
use crate::demo::{demo_regatta, demo_results, demo_store};
use crate::infra::{load_regatta, scoring_service, AppState, ScoringService};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use regatta_scoring::config::AppConfig;
use regatta_scoring::error::AppError;
use regatta_scoring::scoring::{InMemoryResultStore, RecomputeError, RegattaId, ResultStore};
use regatta_scoring::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let mut preloaded = Vec::new();
    let store = if args.demo {
        let store = demo_store()?;
        for result in demo_results() {
            store
                .upsert_race_result(result)
                .map_err(RecomputeError::from)?;
        }
        preloaded.push(demo_regatta());
        store
    } else {
        InMemoryResultStore::default()
    };
    if let Some(source) = args.source() {
        let recorded = load_regatta(&store, &source)?;
        info!(regatta = %source.regatta, recorded, "regatta preloaded");
        preloaded.push(source.regatta);
    }

    let coordinator = scoring_service(store);
    publish_initial_standings(coordinator.clone(), preloaded).await?;

    let app = with_scoring_routes(coordinator, config.scoring.recompute_wait)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "regatta scoring service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Scores preloaded regattas on the blocking pool. A regatta that fails to score is logged and
/// left unpublished.
async fn publish_initial_standings(
    coordinator: Arc<ScoringService>,
    regattas: Vec<RegattaId>,
) -> Result<(), AppError> {
    let worker = tokio::task::spawn_blocking(move || {
        for regatta in &regattas {
            if let Err(err) = coordinator.recompute(regatta) {
                warn!(%regatta, error = %err, "initial standings not published");
            }
        }
    });
    worker
        .await
        .map_err(|err| RecomputeError::Worker(err.to_string()))?;
    Ok(())
}
