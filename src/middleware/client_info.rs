//! Caller network details recorded in the admin audit log

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use axum_extra::{headers::UserAgent, TypedHeader};
use std::convert::Infallible;

/// Client address and user agent, both best effort
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// First hop of `x-forwarded-for`, else `x-real-ip`.
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let from_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    from_forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = TypedHeader::<UserAgent>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(ua)| ua.as_str().to_string());

        Ok(Self {
            ip_address: forwarded_ip(&parts.headers),
            user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use rstest::rstest;

    async fn extract(headers: &[(&str, &str)]) -> ClientInfo {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        ClientInfo::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[rstest]
    #[case(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")], Some("203.0.113.7"))]
    #[case(&[("x-real-ip", "198.51.100.4")], Some("198.51.100.4"))]
    #[case(&[], None)]
    #[tokio::test]
    async fn picks_client_address(#[case] headers: &[(&str, &str)], #[case] expected: Option<&str>) {
        assert_eq!(extract(headers).await.ip_address.as_deref(), expected);
    }

    #[tokio::test]
    async fn reads_user_agent() {
        let info = extract(&[("user-agent", "Mozilla/5.0")]).await;
        assert_eq!(info.user_agent.as_deref(), Some("Mozilla/5.0"));
    }
}
