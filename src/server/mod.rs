//! HTTP boundary: the only place an error kind becomes a status code.

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::cleanup;
use crate::config::Config;
use crate::language::Language;
use crate::pipeline::{JobResult, TranslationPipeline};
use crate::validate;
use crate::GeneratorError;

/// Shared state handed to every handler
pub struct AppState {
    pub pipeline: Arc<TranslationPipeline>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    content: String,
    title: String,
    original_transcription: String,
    video_file: String,
    audio_file: String,
    target_language: Language,
}

impl From<JobResult> for GenerateResponse {
    fn from(result: JobResult) -> Self {
        Self {
            content: result.content,
            title: result.title,
            original_transcription: result.original_transcription,
            video_file: result.video_file.to_string_lossy().into_owned(),
            audio_file: result.audio_file.to_string_lossy().into_owned(),
            target_language: result.target_language,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn generate_route() -> MethodRouter<Arc<AppState>> {
    post(generate_translation).fallback(method_not_allowed)
}

pub fn build_router(state: Arc<AppState>, media_root: &Path) -> Router {
    Router::new()
        .route("/generate-translation", generate_route())
        .route("/generate-translation/", generate_route())
        .route("/health", get(health))
        .nest_service("/media", ServeDir::new(media_root))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> impl IntoResponse {
    "ok"
}

async fn method_not_allowed() -> Response {
    error_json(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed. Use POST.")
}

async fn generate_translation(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let data = match validate::parse_body(&body) {
        Ok(data) => data,
        Err(e) => return error_response(&GeneratorError::from(e)),
    };

    // Run on its own task so a panic inside a stage still produces a response
    let pipeline = state.pipeline.clone();
    let outcome = tokio::spawn(async move { pipeline.run_raw(&data).await })
        .await
        .unwrap_or_else(|e| Err(GeneratorError::Unexpected(e.to_string())));

    match outcome {
        Ok(result) => (StatusCode::OK, Json(GenerateResponse::from(result))).into_response(),
        Err(e) => error_response(&e),
    }
}

fn status_for(error: &GeneratorError) -> StatusCode {
    match error {
        GeneratorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &GeneratorError) -> Response {
    let status = status_for(error);
    let message = match error {
        GeneratorError::InvalidInput(e) => {
            tracing::warn!("Invalid data: {}", e);
            e.message().to_string()
        }
        GeneratorError::Unexpected(detail) => {
            tracing::error!("Unexpected error: {}", detail);
            "An unexpected error occurred".to_string()
        }
        other => {
            tracing::error!("{}", other);
            other.to_string()
        }
    };

    error_json(status, message)
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

/// Bind and serve until Ctrl-C, sweeping the media directory in the background if configured
pub async fn serve(config: &Config, pipeline: Arc<TranslationPipeline>) -> crate::Result<()> {
    fs_err::create_dir_all(&config.media.root)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    let sweeper = config
        .cleanup_interval()
        .map(|interval| cleanup::spawn_periodic(config.media.root.clone(), config.retention(), interval));

    let app = build_router(Arc::new(AppState { pipeline }), &config.media.root);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(%addr, "translation generator listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::DownloadError;
    use crate::validate::InvalidInput;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&GeneratorError::InvalidInput(InvalidInput::new("bad"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&GeneratorError::Download(DownloadError::MissingTitle)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&GeneratorError::Unexpected("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_download_message_names_the_stage() {
        let err = GeneratorError::Download(DownloadError::MissingTitle);
        assert_eq!(err.to_string(), "Download failed: Could not retrieve YouTube video title.");
    }
}
