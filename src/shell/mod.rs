//! HTTP front end: a single page form plus the JSON endpoints it polls.

pub mod messages;

use crate::{
    ReplyEngine, ReplyEngineResult, ReplyEngineState, ReplyModel,
    error::{ReplyError, ScheduleError},
    payload::{ImageAsset, MimeType, SUPPORTED_TONES, resolve_tone},
    pipeline::ReplyRequest,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;

const INDEX_PAGE: &str = include_str!("page.html");

/// Builds the router serving the form and the reply endpoints.
pub fn router<M>(engine: Arc<ReplyEngine<M>>) -> Router
where
    M: ReplyModel<Request = ReplyRequest, Response = String, Error = ReplyError> + Send + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/tones", get(list_tones))
        .route("/status", get(get_status::<M>))
        .route("/reply", post(post_reply::<M>))
        .route("/results", get(get_result::<M>))
        // uploads are passed through whole
        .layer(DefaultBodyLimit::disable())
        .with_state(engine)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn list_tones() -> Json<messages::Tones> {
    Json(messages::Tones {
        tones: SUPPORTED_TONES.iter().map(|tone| tone.to_string()).collect(),
    })
}

async fn get_status<M>(State(engine): State<Arc<ReplyEngine<M>>>) -> impl IntoResponse
where
    M: ReplyModel<Request = ReplyRequest, Response = String, Error = ReplyError> + Send + 'static,
{
    Json(json!({ "status": engine.state().as_str() }))
}

#[derive(Default)]
struct ReplyForm {
    image: Option<ImageAsset>,
    tone: String,
    custom_tone: Option<String>,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    let message = message.into();
    log::debug!("Rejected reply request: {message}");
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

async fn read_form(
    mut multipart: Multipart,
) -> Result<ReplyForm, (StatusCode, Json<serde_json::Value>)> {
    let mut form = ReplyForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field
                    .content_type()
                    .and_then(MimeType::from_content_type)
                    .or_else(|| MimeType::from_filename(&file_name));
                let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;

                // browsers send an empty part when no file was picked
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let Some(mime_type) = mime_type else {
                    return Err(bad_request(format!(
                        "Unsupported image format: {file_name} (expected png, jpg or jpeg)"
                    )));
                };
                form.image = Some(ImageAsset::new(bytes.to_vec(), mime_type));
            }
            "tone" => {
                form.tone = field.text().await.map_err(|e| bad_request(e.body_text()))?;
            }
            "custom_tone" => {
                form.custom_tone =
                    Some(field.text().await.map_err(|e| bad_request(e.body_text()))?);
            }
            other => log::debug!("Ignoring form field '{other}'"),
        }
    }

    Ok(form)
}

async fn post_reply<M>(
    State(engine): State<Arc<ReplyEngine<M>>>,
    multipart: Multipart,
) -> impl IntoResponse
where
    M: ReplyModel<Request = ReplyRequest, Response = String, Error = ReplyError> + Send + 'static,
{
    if engine.state() != ReplyEngineState::Idle {
        log::debug!("Engine is still processing");
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": ScheduleError::Busy.to_string() })),
        );
    }

    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(rejection) => return rejection,
    };

    let Some(image) = form.image else {
        return bad_request("Please upload an image first!");
    };
    let Some(tone) = resolve_tone(&form.tone, form.custom_tone.as_deref()) else {
        return bad_request("Please select or enter a tone");
    };

    match engine.schedule(ReplyRequest { image, tone }) {
        Ok(id) => {
            log::info!("Scheduled reply request {id}");
            let body = messages::Scheduled {
                status: "scheduled".to_string(),
                id,
            };
            (StatusCode::OK, Json(json!(body)))
        }
        Err(ScheduleError::Busy) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": ScheduleError::Busy.to_string() })),
        ),
        Err(e @ ScheduleError::Stopped) => {
            log::error!("Could not schedule reply: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn get_result<M>(State(engine): State<Arc<ReplyEngine<M>>>) -> impl IntoResponse
where
    M: ReplyModel<Request = ReplyRequest, Response = String, Error = ReplyError> + Send + 'static,
{
    match engine.try_poll_response() {
        ReplyEngineResult::Ready(response) => match response.outcome {
            Ok(reply) => {
                log::info!("Reply {} collected", response.id);
                let body = messages::ReplyResult {
                    status: "success".to_string(),
                    id: response.id,
                    tone: response.request_metadata.tone,
                    reply,
                    duration_ms: response.duration.as_millis() as u64,
                };
                (StatusCode::OK, Json(json!(body)))
            }
            Err(e) => {
                let body = messages::ReplyFailure {
                    status: "failed".to_string(),
                    id: response.id,
                    stage: e.stage().to_string(),
                    message: e.user_message(),
                };
                (StatusCode::BAD_GATEWAY, Json(json!(body)))
            }
        },
        ReplyEngineResult::Empty(state) => {
            (StatusCode::OK, Json(json!({ "status": state.as_str() })))
        }
        ReplyEngineResult::Error(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": e })),
        ),
    }
}
