//! Handlers for the `/test-files` resource.
//!
//! An upload writes the file under the application root, then resolves
//! its logical path in the artifact registry. Re-uploading the same path
//! overwrites the bytes and keeps the artifact id.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use testrun_core::artifact::Artifact;
use testrun_core::pagination::{Page, PaginationParams};
use testrun_core::upload::{
    write_test_file, TestFileUpload, UploadedFile, FIELD_TEST_FILE, FIELD_UPLOAD_DIR,
};
use testrun_events::{event_types, PlatformEvent};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/v1/test-files
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Vec<Artifact>>> {
    let artifacts = state.registry.list(Page::from(&params)).await?;
    Ok(Json(artifacts))
}

/// POST /api/v1/test-files
///
/// Multipart fields `upload_dir` (text) and `test_file` (file). Responds
/// 201 with an empty object.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let mut multipart = multipart?;
    let mut form = TestFileUpload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            FIELD_UPLOAD_DIR => {
                form.upload_dir = Some(field.text().await?);
            }
            FIELD_TEST_FILE => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                form.test_file = Some(UploadedFile {
                    name: file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {} // ignore unknown fields
        }
    }

    let validated = form.validate()?;

    let target = write_test_file(&state.config.app_root, &validated)
        .await
        .map_err(|e| AppError::InternalError(format!("failed to write test file: {e}")))?;

    let artifact = state.registry.resolve_or_create(&validated.logical_path).await?;

    tracing::info!(
        artifact_id = artifact.id,
        path = %artifact.path,
        target = %target.display(),
        bytes = validated.bytes.len(),
        "Test file uploaded",
    );

    state.event_bus.publish(
        PlatformEvent::new(event_types::ARTIFACT_UPLOADED)
            .with_source(event_types::ENTITY_ARTIFACT, artifact.id)
            .with_payload(json!({ "path": artifact.path })),
    );

    Ok((StatusCode::CREATED, Json(json!({}))))
}
