//! HTTP surface: `POST /generate`.
//!
//! The body is validated and the upstream call is started before any status
//! is committed. Failures up to the first non-empty fragment become JSON
//! error responses; after that the response is `200 text/plain` streamed one
//! chunk per fragment, and a later failure cuts the connection.

use crate::accumulator::StreamAccumulator;
use crate::client::GenerationClient;
use crate::config::{Settings, DEFAULT_MAX_BODY_BYTES};
use crate::error::{ErrorKind, StoryError};
use crate::pipeline::StoryPipeline;
use crate::request::{GenerationRequest, RequestValidator, NOT_JSON_MESSAGE};
use crate::sink::ChannelSink;
use actix_cors::Cors;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::http::StatusCode;
use actix_web::{post, web, App, HttpRequest, HttpResponse, HttpServer, ResponseError};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

/// Reported for failures that are neither request nor upstream problems.
const INTERNAL_ERROR_MESSAGE: &str = "生成小说时发生内部错误";

pub struct AppState {
    pipeline: Option<StoryPipeline>,
    validator: RequestValidator,
    unavailable_reason: String,
    max_body_bytes: usize,
}

impl AppState {
    /// State backed by a working pipeline.
    pub fn new(pipeline: StoryPipeline) -> Self {
        Self {
            validator: *pipeline.validator(),
            pipeline: Some(pipeline),
            unavailable_reason: String::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// State without a client; valid requests are answered with 503.
    pub fn unavailable(validator: RequestValidator, reason: impl Into<String>) -> Self {
        Self {
            pipeline: None,
            validator,
            unavailable_reason: reason.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Bodies longer than `limit` bytes are answered with 413.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Build the client from `settings`. A client that cannot be built leaves
    /// the server running in the unavailable state.
    pub fn from_settings(settings: &Settings) -> Self {
        let validator = RequestValidator::new(settings.validation);
        let state = match GenerationClient::from_settings(settings) {
            Ok(client) => {
                tracing::info!(
                    base_url = client.base_url(),
                    model = %client.params().model,
                    "generation client ready"
                );
                Self::new(StoryPipeline::new(Arc::new(client), validator))
            }
            Err(e) => {
                tracing::error!(error = %e, "generation client unavailable, /generate will answer 503");
                Self::unavailable(validator, e.to_string())
            }
        };
        state.with_max_body_bytes(settings.max_body_bytes)
    }

    pub fn is_available(&self) -> bool {
        self.pipeline.is_some()
    }
}

#[derive(Serialize)]
struct JsonError {
    error: String,
}

impl ResponseError for StoryError {
    fn status_code(&self) -> StatusCode {
        if let StoryError::PayloadTooLarge(_) = self {
            return StatusCode::PAYLOAD_TOO_LARGE;
        }
        match self.kind() {
            ErrorKind::MalformedRequest => StatusCode::BAD_REQUEST,
            ErrorKind::ClientNotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Generation | ErrorKind::SinkWrite | ErrorKind::Config => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self.kind() {
            ErrorKind::MalformedRequest | ErrorKind::ClientNotInitialized => self.to_string(),
            ErrorKind::Generation => format!("AI 服务调用失败: {}", self),
            ErrorKind::SinkWrite | ErrorKind::Config => INTERNAL_ERROR_MESSAGE.to_string(),
        };
        HttpResponse::build(self.status_code()).json(JsonError { error })
    }
}

/// `application/json` or any `application/*+json` media type.
fn is_json_content_type(req: &HttpRequest) -> bool {
    let Some(value) = req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Collect the body, failing as soon as it grows past `limit`.
async fn read_body(mut payload: web::Payload, limit: usize) -> Result<web::BytesMut, StoryError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::warn!(error = %e, "failed to read request body");
            StoryError::MalformedRequest(NOT_JSON_MESSAGE.to_string())
        })?;
        if body.len() + chunk.len() > limit {
            tracing::warn!(limit, "request body over size limit");
            return Err(StoryError::PayloadTooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn log_failure(request: &GenerationRequest, error: &StoryError) {
    tracing::error!(
        style = request.style(),
        title = request.title(),
        is_continue = request.is_continue,
        source_chars = request.continue_from.as_deref().map_or(0, |s| s.chars().count()),
        error = %error,
        "generation failed"
    );
}

#[post("/generate")]
pub async fn generate(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, StoryError> {
    if !is_json_content_type(&req) {
        tracing::warn!("rejected request without JSON content type");
        return Err(StoryError::MalformedRequest(NOT_JSON_MESSAGE.to_string()));
    }
    let body = read_body(payload, state.max_body_bytes).await?;
    let request = state.validator.validate_bytes(&body)?;
    tracing::info!(
        style = request.style(),
        title = request.title(),
        is_continue = request.is_continue,
        "generation requested"
    );

    let Some(pipeline) = state.pipeline.as_ref() else {
        return Err(StoryError::ClientNotInitialized(
            state.unavailable_reason.clone(),
        ));
    };

    let prompt = StoryPipeline::prompt_for(&request);
    let mut stream = pipeline
        .open(&prompt)
        .await
        .inspect_err(|e| log_failure(&request, e))?;
    stream.prime().await.inspect_err(|e| log_failure(&request, e))?;

    let (mut sink, rx) = ChannelSink::channel();
    tokio::spawn(async move {
        if let Err(e) = StreamAccumulator::forward(stream, &mut sink).await {
            log_failure(&request, &e);
        }
    });

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .streaming(ReceiverStream::new(rx)))
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(generate);
}

/// Serve until the process is stopped.
pub async fn run(settings: Settings) -> std::io::Result<()> {
    let state = web::Data::new(AppState::from_settings(&settings));
    let addr = settings.bind_addr();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .bind(&addr)?
    .run();

    tracing::info!("story server listening on http://{addr}");
    server.await
}
