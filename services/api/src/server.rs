use crate::cli::ServeArgs;
use crate::infra::{seed_quality_repository, seed_study_repository, AppState};
use crate::routes::with_engine_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use clinic_quality::config::AppConfig;
use clinic_quality::error::AppError;
use clinic_quality::telemetry;
use clinic_quality::workflows::quality::QualityService;
use clinic_quality::workflows::research::ResearchService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let today = Local::now().date_naive();
    let quality_service = Arc::new(QualityService::new(
        Arc::new(seed_quality_repository(today)?),
        config.engine,
    ));
    let research_service = Arc::new(ResearchService::new(
        Arc::new(seed_study_repository(today)?),
        config.engine,
    ));

    let app = with_engine_routes(quality_service, research_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        write_retries = config.engine.write_retries,
        "quality metrics engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
