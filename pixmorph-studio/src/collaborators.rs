//! External image services.
//!
//! The AI editor and the background remover are opaque to the controllers:
//! each is an async function from an encoded image to an encoded image. The
//! HTTP implementations here speak a small JSON protocol where images travel
//! as base64 data URIs:
//!
//! ```text
//! POST <endpoint>            { "image": "data:image/png;base64,...", "prompt": "..." }
//! 200 OK                     { "image": "data:image/png;base64,..." }
//! 200 OK (service failure)   { "error": "quota exceeded" }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pixmorph_renderer::EncodedImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors that can occur when talking to an image service.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The endpoint URL is invalid.
    #[error("invalid service URL: {0}")]
    InvalidUrl(String),
    /// No endpoint was configured for this service.
    #[error("{0} service is not configured")]
    NotConfigured(&'static str),
    /// HTTP layer failed (connection, timeout, etc.).
    #[error("service request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// The service reported a failure in its payload.
    #[error("service error: {0}")]
    Service(String),
    /// JSON parsing failed.
    #[error("failed to parse service payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The response did not carry a usable image.
    #[error("unexpected service response: {0}")]
    UnexpectedResponse(String),
}

impl CollaboratorError {
    /// Whether a manual retry could plausibly succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Generative editing: `image × prompt → image`.
#[async_trait]
pub trait AiEditor: Send + Sync {
    /// Edit `image` as instructed by `prompt`.
    ///
    /// # Errors
    ///
    /// Any network, service or payload failure.
    async fn edit(&self, image: EncodedImage, prompt: &str) -> Result<EncodedImage, CollaboratorError>;
}

/// Background removal: `image → image with alpha`.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Return `image` with its background made transparent.
    ///
    /// # Errors
    ///
    /// Any network, service or payload failure.
    async fn remove_background(&self, image: EncodedImage) -> Result<EncodedImage, CollaboratorError>;
}

/// Stand-in for a service with no configured endpoint. Every call fails with
/// [`CollaboratorError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl AiEditor for Unconfigured {
    async fn edit(&self, _image: EncodedImage, _prompt: &str) -> Result<EncodedImage, CollaboratorError> {
        Err(CollaboratorError::NotConfigured("AI edit"))
    }
}

#[async_trait]
impl BackgroundRemover for Unconfigured {
    async fn remove_background(&self, _image: EncodedImage) -> Result<EncodedImage, CollaboratorError> {
        Err(CollaboratorError::NotConfigured("background removal"))
    }
}

/// JSON-over-HTTP client for one image endpoint.
#[derive(Clone)]
struct ImageEndpoint {
    inner: Arc<InnerClient>,
}

struct InnerClient {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Longest response body echoed into an error.
const MAX_ERROR_BODY: usize = 512;

impl ImageEndpoint {
    fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| CollaboratorError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .user_agent(concat!("pixmorph-studio/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            inner: Arc::new(InnerClient {
                http,
                endpoint,
                api_key,
            }),
        })
    }

    fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    async fn post(&self, image: &EncodedImage, prompt: Option<&str>) -> Result<EncodedImage, CollaboratorError> {
        let request = ImageRequest {
            image: image.to_data_uri(),
            prompt,
        };

        let mut builder = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .json(&request);
        if let Some(key) = &self.inner.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(
            "POST {} ({} image bytes)",
            self.inner.endpoint,
            image.bytes.len()
        );
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ImageResponse = serde_json::from_slice(&response.bytes().await?)?;
        if let Some(message) = payload.error {
            return Err(CollaboratorError::Service(message));
        }
        let uri = payload
            .image
            .ok_or_else(|| CollaboratorError::UnexpectedResponse("missing image".into()))?;

        EncodedImage::from_data_uri(&uri)
            .map_err(|e| CollaboratorError::UnexpectedResponse(e.to_string()))
    }
}

/// [`AiEditor`] backed by an HTTP endpoint.
#[derive(Clone)]
pub struct HttpAiEditor {
    endpoint: ImageEndpoint,
}

impl HttpAiEditor {
    /// Create a client for `endpoint`, sending `api_key` as a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::InvalidUrl`] if the URL is malformed.
    /// Returns [`CollaboratorError::Http`] if the HTTP client fails to build.
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: ImageEndpoint::new(endpoint, api_key, timeout)?,
        })
    }

    /// The configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        self.endpoint.endpoint()
    }
}

#[async_trait]
impl AiEditor for HttpAiEditor {
    async fn edit(&self, image: EncodedImage, prompt: &str) -> Result<EncodedImage, CollaboratorError> {
        self.endpoint.post(&image, Some(prompt)).await
    }
}

/// [`BackgroundRemover`] backed by an HTTP endpoint.
#[derive(Clone)]
pub struct HttpBackgroundRemover {
    endpoint: ImageEndpoint,
}

impl HttpBackgroundRemover {
    /// Create a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::InvalidUrl`] if the URL is malformed.
    /// Returns [`CollaboratorError::Http`] if the HTTP client fails to build.
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: ImageEndpoint::new(endpoint, api_key, timeout)?,
        })
    }

    /// The configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        self.endpoint.endpoint()
    }
}

#[async_trait]
impl BackgroundRemover for HttpBackgroundRemover {
    async fn remove_background(&self, image: EncodedImage) -> Result<EncodedImage, CollaboratorError> {
        self.endpoint.post(&image, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn sample() -> EncodedImage {
        EncodedImage::new(vec![1, 2, 3], "image/png")
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = HttpAiEditor::new("not a url", None, TIMEOUT)
            .err()
            .expect("invalid url");
        assert!(matches!(err, CollaboratorError::InvalidUrl(_)));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CollaboratorError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!CollaboratorError::Status {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!CollaboratorError::Service("no".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_unconfigured_always_fails() {
        let err = AiEditor::edit(&Unconfigured, sample(), "x")
            .await
            .expect_err("unconfigured");
        assert!(matches!(err, CollaboratorError::NotConfigured(_)));
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_ai_edit_sends_prompt_and_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/edit"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "image": "data:image/png;base64,AQID",
                "prompt": "make it blue"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "image": "data:image/jpeg;base64,BAUG"
            })))
            .mount(&server)
            .await;

        let editor = HttpAiEditor::new(
            &format!("{}/edit", server.uri()),
            Some("secret".into()),
            TIMEOUT,
        )
        .expect("client");
        let result = editor.edit(sample(), "make it blue").await.expect("edit");
        assert_eq!(result.mime, "image/jpeg");
        assert_eq!(result.bytes, vec![4, 5, 6]);
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_service_error_payload_propagates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "quota exceeded"
            })))
            .mount(&server)
            .await;

        let remover = HttpBackgroundRemover::new(&server.uri(), None, TIMEOUT).expect("client");
        match remover.remove_background(sample()).await {
            Err(CollaboratorError::Service(message)) => assert_eq!(message, "quota exceeded"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_http_status_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let editor = HttpAiEditor::new(&server.uri(), None, TIMEOUT).expect("client");
        match editor.edit(sample(), "x").await {
            Err(err @ CollaboratorError::Status { status: 503, .. }) => assert!(err.is_retryable()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_missing_image_is_unexpected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let editor = HttpAiEditor::new(&server.uri(), None, TIMEOUT).expect("client");
        let err = editor.edit(sample(), "x").await.expect_err("missing");
        assert!(matches!(err, CollaboratorError::UnexpectedResponse(_)));
    }
}
