//! Image upload routes
//!
//! Listing photos go straight to Supabase Storage; the client then sends
//! the returned URLs with the listing.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::MethodRouter,
};
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::api::Created;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::listings::MAX_IMAGES;
use crate::error::{ApiError, ValidationErrors};
use crate::services::storage::{check_image, object_path, SupabaseStorage};

#[derive(Debug, Serialize)]
pub struct UploadedImages {
    pub urls: Vec<String>,
}

/// Request body cap for the upload route: every part at the size limit
/// plus room for multipart framing.
pub(crate) fn upload_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes
        .saturating_mul(MAX_IMAGES)
        .saturating_add(64 * 1024)
}

/// Where accepted images are written
pub(crate) trait ImageStore {
    async fn upload(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<String, ApiError>;
    async fn remove(&self, paths: &[String]) -> Result<(), ApiError>;
}

impl ImageStore for SupabaseStorage {
    async fn upload(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<String, ApiError> {
        SupabaseStorage::upload(self, path, content_type, bytes).await
    }

    async fn remove(&self, paths: &[String]) -> Result<(), ApiError> {
        SupabaseStorage::remove(self, paths).await
    }
}

/// Upload every file, or none: when one upload fails the objects already
/// written are deleted again.
pub(crate) async fn store_batch(
    store: &impl ImageStore,
    user_id: Uuid,
    files: Vec<(&'static str, String, Bytes)>,
) -> Result<Vec<String>, ApiError> {
    let mut paths = Vec::with_capacity(files.len());
    let mut urls = Vec::with_capacity(files.len());

    for (ext, content_type, bytes) in files {
        let path = object_path(user_id, ext);
        match store.upload(&path, &content_type, bytes).await {
            Ok(url) => {
                paths.push(path);
                urls.push(url);
            }
            Err(e) => {
                if !paths.is_empty() {
                    if let Err(cleanup) = store.remove(&paths).await {
                        tracing::warn!(
                            %user_id,
                            ?paths,
                            error = %cleanup,
                            "Failed to remove images from an aborted upload"
                        );
                    }
                }
                return Err(e);
            }
        }
    }

    Ok(urls)
}

/// Replaces axum's default 2 MB body cap with one sized for a full batch.
pub(crate) fn with_upload_limit<S>(route: MethodRouter<S>, max_upload_bytes: usize) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route
        .layer::<_, Infallible>(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_body_limit(max_upload_bytes)))
}

/// POST /uploads/images
///
/// Multipart form, one image per part. All parts are checked before
/// anything is stored.
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let max_bytes = state.settings.max_upload_bytes;
    let mut files = Vec::new();
    let mut errors = ValidationErrors::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if files.len() == MAX_IMAGES {
            return Err(ApiError::bad_request(format!(
                "At most {} images can be uploaded at once",
                MAX_IMAGES
            )));
        }

        let name = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read '{}': {}", name, e)))?;

        match check_image(content_type.as_deref(), bytes.len(), max_bytes) {
            Ok(ext) => files.push((ext, content_type.unwrap_or_default(), bytes)),
            Err(reason) => errors.add("images", format!("{}: {}", name, reason)),
        }
    }

    errors.into_result(())?;
    if files.is_empty() {
        return Err(ApiError::bad_request("No images in request"));
    }

    let urls = store_batch(&state.storage, auth.user_id, files).await?;

    tracing::info!(user_id = %auth.user_id, count = urls.len(), "Images uploaded");

    Ok(Created(UploadedImages { urls }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::post, Router};
    use parking_lot::Mutex;
    use tower::ServiceExt;

    /// Fails the upload whose index is `fail_at`
    #[derive(Default)]
    struct FlakyStore {
        fail_at: Option<usize>,
        uploaded: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
    }

    impl ImageStore for FlakyStore {
        async fn upload(&self, path: &str, _content_type: &str, _bytes: Bytes) -> Result<String, ApiError> {
            let mut uploaded = self.uploaded.lock();
            if self.fail_at == Some(uploaded.len()) {
                return Err(ApiError::upstream("storage error 503"));
            }
            uploaded.push(path.to_string());
            Ok(format!("https://cdn.test/{}", path))
        }

        async fn remove(&self, paths: &[String]) -> Result<(), ApiError> {
            self.removed.lock().extend_from_slice(paths);
            Ok(())
        }
    }

    fn batch(n: usize) -> Vec<(&'static str, String, Bytes)> {
        (0..n)
            .map(|_| ("png", "image/png".to_string(), Bytes::from_static(b"img")))
            .collect()
    }

    #[tokio::test]
    async fn failed_upload_removes_earlier_objects() {
        let store = FlakyStore {
            fail_at: Some(2),
            ..Default::default()
        };

        let result = store_batch(&store, Uuid::new_v4(), batch(4)).await;

        assert!(result.is_err());
        let uploaded = store.uploaded.lock().clone();
        assert_eq!(uploaded.len(), 2);
        assert_eq!(*store.removed.lock(), uploaded);
    }

    #[tokio::test]
    async fn successful_batch_keeps_everything() {
        let store = FlakyStore::default();

        let urls = store_batch(&store, Uuid::new_v4(), batch(3)).await.unwrap();

        assert_eq!(urls.len(), 3);
        assert!(urls.iter().all(|u| u.starts_with("https://cdn.test/homes/")));
        assert!(store.removed.lock().is_empty());
    }

    async fn post_body(max_upload_bytes: usize, len: usize) -> StatusCode {
        let app = Router::new().route(
            "/",
            with_upload_limit(
                post(|body: Bytes| async move { body.len().to_string() }),
                max_upload_bytes,
            ),
        );
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-length", len)
                .body(Body::from(vec![0u8; len]))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn upload_limit_replaces_the_default_cap() {
        // 3 MB is over axum's default but within 20 images of 200 KB
        assert_eq!(post_body(200 * 1024, 3 * 1024 * 1024).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn bodies_over_the_upload_limit_are_refused() {
        let limit = upload_body_limit(1024);
        assert_eq!(post_body(1024, limit + 1).await, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn body_limit_fits_a_full_batch() {
        let limit = upload_body_limit(10 * 1024 * 1024);
        assert!(limit > 10 * 1024 * 1024 * MAX_IMAGES);
        assert_eq!(upload_body_limit(usize::MAX), usize::MAX);
    }
}
