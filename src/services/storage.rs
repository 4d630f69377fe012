//! Supabase Storage client for listing images.
//!
//! Objects are written once (`x-upsert: false`) under a fresh name and
//! served from the bucket's public URL.

use axum::body::Bytes;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::ApiError;

/// Image formats accepted for listing photos
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

const CACHE_CONTROL_SECONDS: u32 = 3600;

/// File extension for an accepted image content type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

/// Check one uploaded part, returning its extension.
pub fn check_image(content_type: Option<&str>, size: usize, max_bytes: usize) -> Result<&'static str, String> {
    let content_type = content_type.ok_or_else(|| "file has no content type".to_string())?;
    let ext = image_extension(content_type)
        .ok_or_else(|| format!("'{}' is not a supported image type", content_type))?;
    if size == 0 {
        return Err("file is empty".to_string());
    }
    if size > max_bytes {
        return Err(format!(
            "file is {} bytes, the limit is {} bytes",
            size, max_bytes
        ));
    }
    Ok(ext)
}

/// `homes/{user_id}-{uuid}.{ext}`
pub fn object_path(user_id: Uuid, ext: &str) -> String {
    format!("homes/{}-{}.{}", user_id, Uuid::new_v4(), ext)
}

#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            base_url: settings.supabase_url.clone(),
            service_key: settings.supabase_service_role_key.clone(),
            bucket: settings.storage_bucket.clone(),
        }
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    /// Upload an object and return its public URL. Network failures and
    /// 5xx answers are retried with exponential backoff.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<String, ApiError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path);

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(Duration::from_secs(10)))
            .build();

        backoff::future::retry(policy, || async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.service_key)
                .header("apikey", &self.service_key)
                .header("content-type", content_type)
                .header("cache-control", format!("max-age={}", CACHE_CONTROL_SECONDS))
                .header("x-upsert", "false")
                .body(bytes.clone())
                .send()
                .await
                .map_err(|e| {
                    warn!(error = %e, "Storage upload request failed");
                    backoff::Error::transient(ApiError::upstream("storage service unavailable"))
                })?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Storage upload rejected");
            Err(match status {
                StatusCode::CONFLICT => {
                    backoff::Error::permanent(ApiError::conflict("an object already exists at this path"))
                }
                StatusCode::PAYLOAD_TOO_LARGE => {
                    backoff::Error::permanent(ApiError::bad_request("image is too large"))
                }
                s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                    backoff::Error::transient(ApiError::upstream(format!("storage error {}", s)))
                }
                s => backoff::Error::permanent(ApiError::upstream(format!("storage error {}", s))),
            })
        })
        .await?;

        debug!(path, "Uploaded object");
        Ok(self.public_url(path))
    }

    /// Delete objects from the bucket. Not retried; callers log what is left.
    #[instrument(skip(self), fields(count = paths.len()))]
    pub async fn remove(&self, paths: &[String]) -> Result<(), ApiError> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&remove_body(paths))
            .send()
            .await
            .map_err(|e| ApiError::upstream(format!("storage delete failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::upstream(format!("storage delete error {}", status)));
        }
        debug!(?paths, "Removed objects");
        Ok(())
    }
}

fn remove_body(paths: &[String]) -> serde_json::Value {
    serde_json::json!({ "prefixes": paths })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("image/png", Some("png"))]
    #[case("image/JPEG", Some("jpg"))]
    #[case("image/webp; charset=binary", Some("webp"))]
    #[case("application/pdf", None)]
    #[case("", None)]
    fn maps_content_types(#[case] content_type: &str, #[case] expected: Option<&str>) {
        assert_eq!(image_extension(content_type), expected);
    }

    #[rstest]
    #[case(None, 10, false)]
    #[case(Some("image/png"), 0, false)]
    #[case(Some("image/png"), 1024, true)]
    #[case(Some("image/png"), 1025, false)]
    #[case(Some("text/plain"), 10, false)]
    fn checks_parts(#[case] content_type: Option<&str>, #[case] size: usize, #[case] ok: bool) {
        assert_eq!(check_image(content_type, size, 1024).is_ok(), ok);
    }

    #[test]
    fn removal_lists_every_path() {
        let paths = vec!["homes/a.png".to_string(), "homes/b.jpg".to_string()];
        assert_eq!(
            remove_body(&paths),
            serde_json::json!({ "prefixes": ["homes/a.png", "homes/b.jpg"] })
        );
    }

    #[test]
    fn object_paths_are_unique_per_upload() {
        let user = Uuid::nil();
        let a = object_path(user, "png");
        let b = object_path(user, "png");
        assert!(a.starts_with("homes/00000000-0000-0000-0000-000000000000-"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }
}
