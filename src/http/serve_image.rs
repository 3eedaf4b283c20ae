use axum::{
  extract::{Path, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
};
use tracing::error;

use crate::http::error::{AppError, ErrorResponse};
use crate::http::storage::{ImageType, StorageError};
use crate::http::AppState;
use crate::image_processing::{format_to_mime_ext, intake};

#[utoipa::path(
  get,
  path = "/resized/{name}",
  params(("name" = String, Path, description = "Name of the resized image")),
  responses(
    (status = 200, description = "The resized image", content_type = "image/*"),
    (status = 404, description = "No resized image with that name", body = ErrorResponse)
  )
)]
pub async fn resized(
  Path(name): Path<String>,
  State(state): State<AppState>,
) -> Result<Response, AppError> {
  serve(&state, &name, ImageType::Resized).await
}

#[utoipa::path(
  get,
  path = "/uploads/{name}",
  params(("name" = String, Path, description = "Name of the stored original")),
  responses(
    (status = 200, description = "The original upload", content_type = "image/*"),
    (status = 404, description = "No original with that name", body = ErrorResponse)
  )
)]
pub async fn original(
  Path(name): Path<String>,
  State(state): State<AppState>,
) -> Result<Response, AppError> {
  serve(&state, &name, ImageType::Original).await
}

async fn serve(state: &AppState, name: &str, image_type: ImageType) -> Result<Response, AppError> {
  let data = state
    .storage_client
    .download_object(name, image_type)
    .await
    .map_err(|e| match e {
      StorageError::NotFound(_) | StorageError::InvalidKey(_) => AppError::NotFound,
      e => {
        error!("failed to read {:?} image {}: {}", image_type, name, e);
        AppError::InternalServerError(e.to_string())
      }
    })?;

  let mime = intake::sniff_format(&data)
    .map(|format| format_to_mime_ext(format).0)
    .unwrap_or("application/octet-stream");
  let headers = [(header::CONTENT_TYPE, mime)];

  Ok((StatusCode::OK, headers, data).into_response())
}
