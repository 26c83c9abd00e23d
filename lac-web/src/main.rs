//! Servidor web Axum para etiquetagem léxica com dicionário de customização
//!
//! Variáveis de ambiente:
//! - `LAC_CONFIG`: caminho de um JSON de [`LacConfig`] (opcional).
//! - `LAC_ADDR`: endereço de escuta (padrão `0.0.0.0:3000`).
//! - `RUST_LOG`: filtro do `tracing` (padrão `info`).

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use lac_core::{Lac, LacConfig, LacError, SingletonTagger, TaggedSpan, WordItem};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Estado compartilhado da aplicação
#[derive(Clone)]
struct AppState {
    lac: Arc<Lac>,
}

#[derive(Deserialize)]
struct TagRequest {
    text: String,
    #[serde(default)]
    capacity: Option<usize>,
}

#[derive(Deserialize)]
struct RunRequest {
    text: String,
}

#[derive(Deserialize)]
struct BatchRequest {
    texts: Vec<String>,
    #[serde(default)]
    capacity: Option<usize>,
}

/// Span com o trecho original já recortado, para exibição.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct SpanView {
    offset: usize,
    length: usize,
    label: String,
    confidence: f64,
    text: String,
}

impl SpanView {
    fn from_span(span: TaggedSpan, query: &str) -> Self {
        Self {
            text: span.text(query).unwrap_or_default().to_string(),
            offset: span.offset,
            length: span.length,
            label: span.label,
            confidence: span.confidence,
        }
    }
}

#[derive(Serialize)]
struct TagResponse {
    spans: Vec<SpanView>,
    total_spans: usize,
    processing_ms: u64,
}

#[derive(Serialize)]
struct RunResponse {
    words: Vec<WordItem>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum BatchItem {
    Spans { spans: Vec<SpanView> },
    Failed { error: String },
}

#[derive(Serialize)]
struct BatchResponse {
    results: Vec<BatchItem>,
    processing_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("LAC_CONFIG") {
        Ok(path) => {
            info!("Carregando configuração de {}", path);
            LacConfig::from_json_file(&path)?
        }
        Err(_) => LacConfig::default(),
    };

    // Nenhum modelo acoplado: um span "O" por token, o dicionário decide o resto
    let lac = Lac::from_config(&config, Arc::new(SingletonTagger::default()))?;
    let state = AppState { lac: Arc::new(lac) };

    let addr = std::env::var("LAC_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Servidor LAC iniciado em http://{}", addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/tag", post(tag_handler))
        .route("/run", post(run_handler))
        .route("/batch", post(batch_handler))
        .layer(cors)
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn lac_error_response(err: &LacError) -> Response {
    let status = match err {
        LacError::Overflow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "customized": state.lac.has_customization(),
    }))
}

/// Etiquetagem de uma consulta. A etiquetagem é síncrona e roda fora do runtime.
async fn tag_handler(State(state): State<AppState>, Json(req): Json<TagRequest>) -> Response {
    if req.text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Texto vazio");
    }

    let start = Instant::now();
    let capacity = req.capacity.unwrap_or(state.lac.default_capacity());
    let lac = Arc::clone(&state.lac);
    let text = req.text;

    let joined = tokio::task::spawn_blocking(move || {
        let result = lac.tag(&text, capacity);
        (text, result)
    })
    .await;

    match joined {
        Ok((text, Ok(spans))) => {
            let spans: Vec<SpanView> = spans.into_iter().map(|s| SpanView::from_span(s, &text)).collect();
            Json(TagResponse {
                total_spans: spans.len(),
                spans,
                processing_ms: start.elapsed().as_millis() as u64,
            })
            .into_response()
        }
        Ok((_, Err(e))) => lac_error_response(&e),
        Err(e) => {
            error!("Tarefa de etiquetagem falhou: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "falha interna")
        }
    }
}

async fn run_handler(State(state): State<AppState>, Json(req): Json<RunRequest>) -> Response {
    if req.text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Texto vazio");
    }

    let lac = Arc::clone(&state.lac);
    match tokio::task::spawn_blocking(move || lac.run(&req.text)).await {
        Ok(Ok(words)) => Json(RunResponse { words }).into_response(),
        Ok(Err(e)) => lac_error_response(&e),
        Err(e) => {
            error!("Tarefa de etiquetagem falhou: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "falha interna")
        }
    }
}

/// Lote de consultas etiquetadas em paralelo; a falha de uma não afeta as outras.
async fn batch_handler(State(state): State<AppState>, Json(req): Json<BatchRequest>) -> Response {
    let start = Instant::now();
    let capacity = req.capacity.unwrap_or(state.lac.default_capacity());
    let lac = Arc::clone(&state.lac);
    let texts = req.texts;
    info!("Lote com {} consultas", texts.len());

    let joined = tokio::task::spawn_blocking(move || {
        let results = lac.tag_batch(&texts, capacity);
        texts
            .iter()
            .zip(results)
            .map(|(text, result)| match result {
                Ok(spans) => BatchItem::Spans {
                    spans: spans.into_iter().map(|s| SpanView::from_span(s, text)).collect(),
                },
                Err(e) => BatchItem::Failed { error: e.to_string() },
            })
            .collect::<Vec<_>>()
    })
    .await;

    match joined {
        Ok(results) => Json(BatchResponse {
            results,
            processing_ms: start.elapsed().as_millis() as u64,
        })
        .into_response(),
        Err(e) => {
            error!("Tarefa de lote falhou: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "falha interna")
        }
    }
}
