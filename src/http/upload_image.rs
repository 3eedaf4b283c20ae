use std::panic::{self, AssertUnwindSafe};

use axum::{
  extract::{self, State},
  response::Redirect,
};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::http::error::{AppError, ErrorResponse};
use crate::http::storage::{ImageType, StorageError};
use crate::http::AppState;
use crate::image_processing::{
  codec, format_to_mime_ext, intake, naming, DerivedArtifact, StoredOriginal, UploadRequest,
};

/// Multipart form accepted by `POST /upload`.
#[derive(ToSchema)]
pub struct UploadForm {
  #[schema(value_type = String, format = Binary)]
  file: Vec<u8>,
  /// Target width in pixels, empty to derive it from the height
  width: String,
  /// Target height in pixels, empty to derive it from the width
  height: String,
  /// Opaque token that stays the same while the client keeps resizing the same file
  change_token: Option<String>,
}

impl UploadForm {
  fn into_request(self, filename: String, max_dimension: u32) -> Result<UploadRequest, AppError> {
    Ok(UploadRequest {
      width: intake::parse_dimension("width", &self.width, max_dimension)?,
      height: intake::parse_dimension("height", &self.height, max_dimension)?,
      data: self.file,
      filename,
      change_token: self.change_token.filter(|t| !t.is_empty()),
    })
  }
}

#[utoipa::path(
  post,
  path = "/upload",
  request_body(content = UploadForm, content_type = "multipart/form-data"),
  responses(
    (status = 303, description = "Resized image stored, redirect to it"),
    (status = 400, description = "Missing field, empty filename or dimensions over the limit", body = ErrorResponse),
    (status = 415, description = "Extension not allowed", body = ErrorResponse),
    (status = 422, description = "Content does not match the extension or cannot be decoded", body = ErrorResponse),
    (status = 500, description = "Image could not be stored", body = ErrorResponse)
  )
)]
pub async fn upload_image(
  State(state): State<AppState>,
  multipart: extract::Multipart,
) -> Result<Redirect, AppError> {
  let res = match read_upload_request(multipart, state.max_dimension).await {
    Ok(request) => run_pipeline(&state, request).await,
    Err(e) => Err(e),
  };

  let artifact = res.map_err(|e| {
    warn!(kind = e.kind(), "rejected upload: {}", e);
    e
  })?;

  info!(
    name = %artifact.name,
    width = artifact.width,
    height = artifact.height,
    size = artifact.size,
    mime = artifact.mime,
    "stored resized image"
  );

  Ok(Redirect::to(&format!("/resized/{}", artifact.name)))
}

async fn read_upload_request(
  mut multipart: extract::Multipart,
  max_dimension: u32,
) -> Result<UploadRequest, AppError> {
  let mut file: Option<(String, axum::body::Bytes)> = None;
  let mut width: Option<String> = None;
  let mut height: Option<String> = None;
  let mut change_token: Option<String> = None;

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| AppError::BadRequest(e.to_string()))?
  {
    let name = field.name().unwrap_or("").to_owned();

    match name.as_str() {
      "file" => {
        let filename = field.file_name().unwrap_or("").to_owned();
        let data = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
        file = Some((filename, data));
      }
      "width" => {
        width = Some(field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?);
      }
      "height" => {
        height = Some(field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?);
      }
      "change_token" => {
        change_token = Some(field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?);
      }
      _ => {}
    }
  }

  match (file, width, height) {
    (Some((filename, data)), Some(width), Some(height)) => UploadForm {
      file: data.to_vec(),
      width,
      height,
      change_token,
    }
    .into_request(filename, max_dimension),
    (file, width, height) => Err(AppError::BadRequest(format!(
      "missing form fields: file({}) width({}) height({})",
      file.is_some(),
      width.is_some(),
      height.is_some()
    ))),
  }
}

async fn run_pipeline(state: &AppState, request: UploadRequest) -> Result<DerivedArtifact, AppError> {
  let extension = intake::validate_extension(&request.filename, &state.allowed_extensions)?;

  let original = match reuse_original(state, request.change_token.as_deref()).await {
    Some(original) => original,
    None => {
      let original = store_original(state, &request, &extension).await?;
      if let Some(token) = request.change_token.as_deref() {
        state.sessions.remember(token, original.clone()).await;
      }
      original
    }
  };

  resize_original(state, &original, request.width, request.height).await
}

/// Stored original remembered for this change token, if it is still on disk.
async fn reuse_original(state: &AppState, change_token: Option<&str>) -> Option<StoredOriginal> {
  let token = change_token?;
  let original = state.sessions.lookup(token).await?;

  match state
    .storage_client
    .object_exists(&original.name, ImageType::Original)
    .await
  {
    Ok(true) => {
      debug!(name = %original.name, "reusing stored original");
      Some(original)
    }
    Ok(false) => {
      state.sessions.forget(token).await;
      None
    }
    Err(e) => {
      warn!("failed to check stored original {}: {}", original.name, e);
      None
    }
  }
}

async fn store_original(
  state: &AppState,
  request: &UploadRequest,
  extension: &str,
) -> Result<StoredOriginal, AppError> {
  let name = naming::storage_name_now(&request.filename)?;
  let format = intake::validate_content(extension, &request.data)?;

  state
    .storage_client
    .upload_object(
      request.data.clone(),
      &name,
      format_to_mime_ext(format).0,
      ImageType::Original,
    )
    .await
    .map_err(|e| {
      error!("failed to store original: {}", e);
      AppError::StoreError(e.to_string())
    })?;

  debug!(name = %name, ?format, "stored original");

  Ok(StoredOriginal { name, format })
}

async fn resize_original(
  state: &AppState,
  original: &StoredOriginal,
  width: i64,
  height: i64,
) -> Result<DerivedArtifact, AppError> {
  let data = state
    .storage_client
    .download_object(&original.name, ImageType::Original)
    .await
    .map_err(|e| match e {
      StorageError::NotFound(_) => AppError::NotFound,
      e => AppError::InternalServerError(e.to_string()),
    })?;

  let derived_name = original.derived_name();
  let output = codec::format_for_name(&derived_name)
    .ok_or_else(|| AppError::StoreError(format!("no image format for {}", derived_name)))?;
  let source = original.format;
  let jpeg_quality = state.jpeg_quality;
  let max_dimension = state.max_dimension;

  // Run the image transformation in a thread from the thread pool.
  // A panic on a rayon worker aborts the process unless caught here.
  let (send, recv) = tokio::sync::oneshot::channel();
  rayon::spawn(move || {
    let res = panic::catch_unwind(AssertUnwindSafe(|| {
      codec::resize_and_encode(
        &data,
        source,
        width,
        height,
        output,
        jpeg_quality,
        max_dimension,
      )
    }));
    let _ = send.send(res);
  });

  let resized = recv
    .await
    .map_err(|e| AppError::InternalServerError(format!("failed to receive: {}", e)))?
    .map_err(|_| {
      error!(name = %original.name, "image worker panicked");
      AppError::InternalServerError("image worker panicked".to_owned())
    })??;

  let mime = format_to_mime_ext(output).0;
  let upload_res = state
    .storage_client
    .upload_object(resized.data, &derived_name, mime, ImageType::Resized)
    .await
    .map_err(|e| {
      error!("failed to store resized image: {}", e);
      AppError::StoreError(e.to_string())
    })?;

  Ok(DerivedArtifact {
    name: derived_name,
    width: resized.width,
    height: resized.height,
    mime,
    size: upload_res.size,
  })
}
