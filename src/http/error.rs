use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::image_processing::ProcessingError;

#[derive(Error, Debug)]
pub enum AppError {
  #[error("bad request {0}")]
  BadRequest(String),
  #[error("unsupported type {0}")]
  UnsupportedType(String),
  #[error("content mismatch {0}")]
  ContentMismatch(String),
  #[error("decode error {0}")]
  DecodeError(String),
  #[error("store error {0}")]
  StoreError(String),
  #[error("not found")]
  NotFound,
  #[error("internal server error {0}")]
  InternalServerError(String),
}

/// Body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
  #[schema(value_type = String, example = "unsupported_type")]
  pub error: &'static str,
  pub message: String,
}

/// Attached to error responses so request metrics can label them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorKind(pub &'static str);

impl AppError {
  /// Short label used in responses and metrics.
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::BadRequest(_) => "bad_request",
      AppError::UnsupportedType(_) => "unsupported_type",
      AppError::ContentMismatch(_) => "content_mismatch",
      AppError::DecodeError(_) => "decode_error",
      AppError::StoreError(_) => "store_error",
      AppError::NotFound => "not_found",
      AppError::InternalServerError(_) => "internal_server_error",
    }
  }
}

impl From<ProcessingError> for AppError {
  fn from(err: ProcessingError) -> Self {
    match err {
      ProcessingError::BadRequest(msg) => AppError::BadRequest(msg),
      ProcessingError::UnsupportedType(msg) => AppError::UnsupportedType(msg),
      e @ ProcessingError::ContentMismatch { .. } => AppError::ContentMismatch(e.to_string()),
      ProcessingError::DecodeError(msg) => AppError::DecodeError(msg),
      ProcessingError::StoreError(msg) => AppError::StoreError(msg),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let kind = self.kind();
    let (status, message) = match self {
      AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
      AppError::UnsupportedType(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
      AppError::ContentMismatch(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
      AppError::DecodeError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
      AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_owned()),
      AppError::StoreError(_) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to store image".to_owned(),
      ),
      AppError::InternalServerError(_msg) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_owned(),
      ),
    };

    let mut response = (
      status,
      Json(ErrorResponse {
        error: kind,
        message,
      }),
    )
      .into_response();
    response.extensions_mut().insert(ErrorKind(kind));

    response
  }
}
