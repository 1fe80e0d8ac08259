use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::models::{ErrorResponse, HealthResponse};
use super::state::ServerState;
use crate::jobs::{
    build_engine, generate_job_id, CreateJobResponse, ErrorCode, GetJobResponse, JobStore,
    LocalizationJob,
};
use crate::settings::Settings;

const ALLOWED_MEDIA_TYPES: [&str; 2] = ["image/jpeg", "image/png"];
const SERVED_FILE_NAMES: [&str; 4] = ["output.png", "thumb.png", "poster.jpg", "poster.png"];
const ESTIMATED_SECONDS: u32 = 8;

type HandlerError = (StatusCode, Json<ErrorResponse>);

pub async fn run_server(settings: Settings, addr: String) -> Result<()> {
    let store = Arc::new(JobStore::new(settings.max_jobs, settings.job_ttl_seconds));
    let engine = build_engine(&settings)?;
    tokio::fs::create_dir_all(&settings.uploads_dir)
        .await
        .with_context(|| "failed to create uploads directory")?;
    // Multipart framing and the form fields ride on top of the poster bytes.
    let body_limit = settings.max_upload_bytes() as usize + 1024 * 1024;
    let state = Arc::new(ServerState {
        settings,
        store,
        engine,
        started_at: Instant::now(),
    });
    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/localization-jobs", post(create_job))
        .route("/v1/localization-jobs/:job_id", get(get_job))
        .route("/static/jobs/:job_id/:file_name", get(static_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok",
        uptime_seconds: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    };
    (StatusCode::OK, Json(body))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

struct UploadedFile {
    file_name: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct JobForm {
    target_language: Option<String>,
    source_language: Option<String>,
    job_metadata: Option<String>,
    file: Option<UploadedFile>,
}

async fn create_job(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateJobResponse>), HandlerError> {
    let form = read_form(&mut multipart).await?;

    let target_language = match form.target_language {
        Some(value) if !value.trim().is_empty() => value,
        _ => return Err(invalid_input("targetLanguage is required.")),
    };
    let upload = match form.file {
        Some(upload) if !upload.file_name.is_empty() => upload,
        _ => return Err(invalid_input("File is required.")),
    };
    let media_type = match sniff_media_type(&upload.bytes) {
        Some(media_type) => media_type,
        None => {
            return Err((
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Json(ErrorResponse::new(
                    ErrorCode::UnsupportedMediaType,
                    format!(
                        "Unsupported file type. Allowed types: {}",
                        ALLOWED_MEDIA_TYPES.join(", ")
                    ),
                )),
            ));
        }
    };
    let job_metadata = match form.job_metadata {
        None => None,
        Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => Some(value),
            Err(_) => return Err(invalid_input("jobMetadata must be valid JSON.")),
        },
    };
    if upload.bytes.len() as u64 > state.settings.max_upload_bytes() {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(ErrorResponse::new(
                ErrorCode::PayloadTooLarge,
                format!(
                    "File size exceeds maximum allowed size of {} MB.",
                    state.settings.max_upload_mb
                ),
            )),
        ));
    }

    let job_id = generate_job_id();
    let job_dir = state.settings.uploads_dir.join(&job_id);
    let file_path = job_dir.join(format!("poster{}", extension_for(media_type)));
    let saved = async {
        tokio::fs::create_dir_all(&job_dir).await?;
        tokio::fs::write(&file_path, &upload.bytes).await
    }
    .await;
    if let Err(err) = saved {
        error!("Failed to save uploaded file: {}", err);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                ErrorCode::InternalError,
                "Failed to save uploaded file.",
            )),
        ));
    }

    let mut job = LocalizationJob::new(job_id, target_language);
    job.source_language = form.source_language;
    job.file_path = Some(file_path.clone());
    job.file_name = Some(upload.file_name);
    job.file_size = Some(upload.bytes.len() as u64);
    job.job_metadata = job_metadata;

    let job = match state.store.create(job) {
        Ok(job) => job,
        Err(err) => {
            let _ = tokio::fs::remove_file(&file_path).await;
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(ErrorCode::InternalError, err.to_string())),
            ));
        }
    };

    let accepted = CreateJobResponse {
        job_id: job.job_id.clone(),
        status: job.status,
        created_at: job.created_at,
        estimated_seconds: Some(ESTIMATED_SECONDS),
    };
    tokio::spawn(state.engine.run(job, state.store.clone()));
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn read_form(multipart: &mut Multipart) -> Result<JobForm, HandlerError> {
    let mut form = JobForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => return Err(invalid_input("Malformed multipart request body.")),
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| invalid_input("Malformed multipart request body."))?;
                form.file = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "targetLanguage" => form.target_language = Some(read_text(field).await?),
            "sourceLanguage" => {
                let value = read_text(field).await?;
                if !value.trim().is_empty() {
                    form.source_language = Some(value);
                }
            }
            "jobMetadata" => form.job_metadata = Some(read_text(field).await?),
            _ => {}
        }
    }
    Ok(form)
}

async fn read_text(field: Field<'_>) -> Result<String, HandlerError> {
    field
        .text()
        .await
        .map_err(|_| invalid_input("Malformed multipart request body."))
}

async fn get_job(
    State(state): State<Arc<ServerState>>,
    Path(job_id): Path<String>,
) -> Result<Json<GetJobResponse>, HandlerError> {
    match state.store.get(&job_id) {
        Some(job) => Ok(Json(GetJobResponse::from(&job))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                ErrorCode::NotFound,
                "Localization job not found.",
            )),
        )),
    }
}

async fn static_file(
    State(state): State<Arc<ServerState>>,
    Path((job_id, file_name)): Path<(String, String)>,
) -> Result<Response<Body>, HandlerError> {
    if !is_job_id(&job_id) || !SERVED_FILE_NAMES.contains(&file_name.as_str()) {
        return Err(file_not_found());
    }
    let path = state.settings.uploads_dir.join(&job_id).join(&file_name);
    let bytes = tokio::fs::read(&path).await.map_err(|_| file_not_found())?;
    let media_type = if file_name.ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    };
    let mut response = Response::new(Body::from(bytes));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(media_type));
    Ok(response)
}

fn invalid_input(message: &str) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(ErrorCode::InvalidInput, message)),
    )
}

fn file_not_found() -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(ErrorCode::NotFound, "File not found.")),
    )
}

fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    ALLOWED_MEDIA_TYPES
        .iter()
        .copied()
        .find(|media_type| *media_type == kind.mime_type())
}

fn extension_for(media_type: &str) -> &'static str {
    if media_type == "image/png" {
        ".png"
    } else {
        ".jpg"
    }
}

/// `loc_` plus 26 uppercase hex characters. Anything else never reaches
/// the filesystem.
fn is_job_id(candidate: &str) -> bool {
    let Some(hex) = candidate.strip_prefix("loc_") else {
        return false;
    };
    hex.len() == 26 && hex.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];

    #[test]
    fn sniffing_accepts_only_poster_image_types() {
        assert_eq!(sniff_media_type(&PNG_MAGIC), Some("image/png"));
        assert_eq!(sniff_media_type(&JPEG_MAGIC), Some("image/jpeg"));
        assert_eq!(sniff_media_type(b"GIF89a trailer bytes"), None);
        assert_eq!(sniff_media_type(b"plain text"), None);
    }

    #[test]
    fn extension_follows_the_sniffed_type() {
        assert_eq!(extension_for("image/png"), ".png");
        assert_eq!(extension_for("image/jpeg"), ".jpg");
    }

    #[test]
    fn generated_ids_pass_the_path_guard() {
        assert!(is_job_id(&generate_job_id()));
    }

    #[test]
    fn path_guard_rejects_traversal_shapes() {
        assert!(!is_job_id(".."));
        assert!(!is_job_id("loc_.."));
        assert!(!is_job_id("loc_abcdef0123456789abcdef0123"));
        assert!(!is_job_id("loc_ABCDEF0123456789ABCDEF012"));
        assert!(!is_job_id("other_ABCDEF0123456789ABCDEF0123"));
        assert!(!SERVED_FILE_NAMES.contains(&"settings.toml"));
    }
}
