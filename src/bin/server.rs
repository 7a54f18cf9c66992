use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use opticut::PackConfig;
use opticut::solver::Solver;
use opticut::types::{PieceSpec, Report};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    pieces: Vec<PieceSpec>,
    #[serde(flatten)]
    config: PackConfig,
}

async fn optimize(
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<Report>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    req.config
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let solver = Solver::new(req.config, req.pieces);
    let result = tokio::task::spawn_blocking(move || solver.solve())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "packing task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "packing failed".to_string(),
            )
        })?;

    if !result.unplaceable.is_empty() {
        tracing::warn!(
            count = result.unplaceable.len(),
            "some pieces do not fit on the sheet"
        );
    }

    Ok(Json(Report::from(result)))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await
}
