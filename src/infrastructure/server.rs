use crate::generator::Generator;
use crate::model::{ModelError, ModelProvider};
use crate::types::SummaryLength;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub(crate) struct ServerState<P: ModelProvider> {
    generator: Arc<Generator<P>>,
}

impl<P: ModelProvider> ServerState<P> {
    pub(crate) fn new(generator: Arc<Generator<P>>) -> Self {
        Self { generator }
    }

    pub(crate) fn generator(&self) -> Arc<Generator<P>> {
        Arc::clone(&self.generator)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(summarize_handler, faq_handler, models_handler, health_handler),
    components(schemas(
        SummarizeRequest,
        FaqRequest,
        GenerateResponse,
        ModelListResponse,
        HealthResponse,
        ErrorResponse,
        SummaryLength
    )),
    tags(
        (name = "generate", description = "Summary and FAQ generation"),
        (name = "models", description = "Model server inventory and health")
    )
)]
struct ApiDoc;

pub async fn serve<P>(generator: Arc<Generator<P>>, addr: SocketAddr) -> Result<(), ServerError>
where
    P: ModelProvider + 'static,
{
    let api = ApiDoc::openapi();
    info!(%addr, "Binding REST server");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let state = Arc::new(ServerState::new(generator));
    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", api))
        .route("/summarize", post(summarize_handler::<P>))
        .route("/faq", post(faq_handler::<P>))
        .route("/models", get(models_handler::<P>))
        .route("/health", get(health_handler::<P>))
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}

#[derive(Debug, Deserialize, ToSchema)]
struct SummarizeRequest {
    text: String,
    length: Option<SummaryLength>,
    model: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
struct FaqRequest {
    text: String,
    num_questions: Option<usize>,
    model: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct GenerateResponse {
    content: String,
}

#[derive(Debug, Serialize, ToSchema)]
struct ModelListResponse {
    models: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    models_available: usize,
}

#[derive(Debug, Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
}

const DEFAULT_QUESTIONS: usize = 5;

fn reject_empty(text: &str) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if text.trim().is_empty() {
        error!("Rejecting request due to empty text");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "text cannot be empty".to_string(),
            }),
        ));
    }
    Ok(())
}

fn model_error_response(error: ModelError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match error {
        ModelError::ModelNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.user_message(),
        }),
    )
}

#[utoipa::path(
    post,
    path = "/summarize",
    tag = "generate",
    request_body = SummarizeRequest,
    responses(
        (status = 200, description = "Summary generated", body = GenerateResponse),
        (status = 400, description = "Empty input text", body = ErrorResponse),
        (status = 404, description = "Model not found", body = ErrorResponse),
        (status = 502, description = "Model server unavailable", body = ErrorResponse)
    )
)]
async fn summarize_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    Json(payload): Json<SummarizeRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(chars = payload.text.chars().count(), "Received /summarize request");
    reject_empty(&payload.text)?;

    let length = payload.length.unwrap_or(SummaryLength::Medium);
    let result = state
        .generator()
        .summarize(&payload.text, length, payload.model.as_deref(), None)
        .await;

    match result {
        Ok(content) => {
            info!("Summary request completed");
            Ok(Json(GenerateResponse { content }))
        }
        Err(err) => {
            error!(error = %err, "Summary request failed");
            Err(model_error_response(err))
        }
    }
}

#[utoipa::path(
    post,
    path = "/faq",
    tag = "generate",
    request_body = FaqRequest,
    responses(
        (status = 200, description = "FAQ generated", body = GenerateResponse),
        (status = 400, description = "Empty input text", body = ErrorResponse),
        (status = 404, description = "Model not found", body = ErrorResponse),
        (status = 502, description = "Model server unavailable", body = ErrorResponse)
    )
)]
async fn faq_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    Json(payload): Json<FaqRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        chars = payload.text.chars().count(),
        num_questions = payload.num_questions,
        "Received /faq request"
    );
    reject_empty(&payload.text)?;

    let num_questions = payload.num_questions.unwrap_or(DEFAULT_QUESTIONS);
    let result = state
        .generator()
        .generate_faq(&payload.text, num_questions, payload.model.as_deref(), None)
        .await;

    match result {
        Ok(content) => {
            info!("FAQ request completed");
            Ok(Json(GenerateResponse { content }))
        }
        Err(err) => {
            error!(error = %err, "FAQ request failed");
            Err(model_error_response(err))
        }
    }
}

#[utoipa::path(
    get,
    path = "/models",
    tag = "models",
    responses(
        (status = 200, description = "Available model names", body = ModelListResponse),
        (status = 502, description = "Model server unavailable", body = ErrorResponse)
    )
)]
async fn models_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
) -> Result<Json<ModelListResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Serving /models request");
    let generator = state.generator();
    match generator.provider().list_models().await {
        Ok(models) => Ok(Json(ModelListResponse { models })),
        Err(err) => {
            error!(error = %err, "Model listing failed");
            Err(model_error_response(err))
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "models",
    responses(
        (status = 200, description = "Model server reachable", body = HealthResponse),
        (status = 503, description = "Model server unreachable", body = HealthResponse)
    )
)]
async fn health_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let generator = state.generator();
    match generator.provider().list_models().await {
        Ok(models) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                models_available: models.len(),
            }),
        ),
        Err(err) => {
            error!(error = %err, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "model server unreachable".to_string(),
                    models_available: 0,
                }),
            )
        }
    }
}
