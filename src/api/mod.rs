//! Typed client for the EcoHoliday backend REST API.
//!
//! `ApiClient` owns the HTTP plumbing (base URL, bearer header, status and
//! body handling). Each submodule wraps one resource as a
//! `CollectionSource`/`DocumentSource` so it plugs into the generic
//! controllers in `crate::collection`.
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::model::UploadSignature;
use crate::session::SessionContext;
use crate::upload::{UploadSigner, UploadTarget};

pub mod bento;
pub mod bookings;
pub mod feedback;
pub mod gallery;
pub mod pricing;
pub mod reels;
pub mod room_images;

const BACKEND: &str = "backend";

/// Whether a call carries the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// Public reads: attach the token when there is one.
    Optional,
    /// Mutations and signatures: refuse to send without a usable session.
    Required,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: SessionContext,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: Url, session: SessionContext, timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("ecoholiday-admin/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                target: BACKEND,
                source,
            })?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::validation(format!("invalid endpoint {}: {}", path, err)))
    }

    fn request(&self, method: Method, path: &str, auth: Auth) -> ApiResult<reqwest::RequestBuilder> {
        let mut builder = self.http.request(method, self.endpoint(path)?);
        match (auth, self.session.bearer()) {
            (_, Some(token)) => builder = builder.bearer_auth(token),
            (Auth::Required, None) => return Err(ApiError::Unauthorized),
            (Auth::Optional, None) => {}
        }
        Ok(builder)
    }

    /// Build a JSON request without sending it.
    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        body: Option<&Value>,
    ) -> ApiResult<reqwest::Request> {
        let mut builder = self.request(method, path, auth)?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.build().map_err(|source| ApiError::Transport {
            target: BACKEND,
            source,
        })
    }

    async fn execute(&self, request: reqwest::Request) -> ApiResult<String> {
        debug!(
            method = %request.method(),
            url = %request.url(),
            authorized = request.headers().contains_key(reqwest::header::AUTHORIZATION),
            "backend request"
        );
        let res = self
            .http
            .execute(request)
            .await
            .map_err(|source| ApiError::Transport {
                target: BACKEND,
                source,
            })?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            self.session.invalidate().await;
            return Err(ApiError::Unauthorized);
        }
        let body = res.text().await.map_err(|source| ApiError::Transport {
            target: BACKEND,
            source,
        })?;
        if !status.is_success() {
            warn!(%status, body = %body, "backend error");
            return Err(ApiError::Status {
                target: BACKEND,
                status,
                body,
            });
        }
        if let Some(err) = rejection(status, &body) {
            warn!(%status, error = %err, "backend refused request");
            return Err(err);
        }
        debug!(%status, "backend response");
        Ok(body)
    }

    #[instrument(skip(self, body))]
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        body: Option<&Value>,
    ) -> ApiResult<T> {
        let request = self.build_request(method, path, auth, body)?;
        let text = self.execute(request).await?;
        parse_body(&text)
    }

    /// Send and ignore whatever body comes back.
    pub async fn send_unit(&self, method: Method, path: &str, auth: Auth, body: Option<&Value>) -> ApiResult<()> {
        let request = self.build_request(method, path, auth, body)?;
        self.execute(request).await.map(|_| ())
    }

    #[instrument(skip(self, form))]
    pub async fn send_multipart<T: DeserializeOwned>(&self, path: &str, auth: Auth, form: Form) -> ApiResult<T> {
        let request = self
            .request(Method::POST, path, auth)?
            .multipart(form)
            .build()
            .map_err(|source| ApiError::Transport {
                target: BACKEND,
                source,
            })?;
        let text = self.execute(request).await?;
        parse_body(&text)
    }
}

/// A 2xx reply may still carry `{ "success": false, "message": .. }`.
fn rejection(status: StatusCode, body: &str) -> Option<ApiError> {
    let value: Value = serde_json::from_str(body).ok()?;
    if value.get("success").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("backend reported success=false");
    Some(ApiError::Status {
        target: BACKEND,
        status,
        body: message.to_string(),
    })
}

fn parse_body<T: DeserializeOwned>(text: &str) -> ApiResult<T> {
    let body = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(body).map_err(|err| ApiError::decode(BACKEND, err))
}

/// List responses come either bare or wrapped as `{ success, data }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Envelope {
        #[serde(default)]
        success: Option<bool>,
        #[serde(default)]
        message: Option<String>,
        data: Vec<T>,
    },
}

pub(crate) fn unwrap_listing<T: DeserializeOwned>(body: Value) -> ApiResult<Vec<T>> {
    match serde_json::from_value::<Listing<T>>(body) {
        Ok(Listing::Bare(items)) => Ok(items),
        Ok(Listing::Envelope {
            success: Some(false),
            message,
            ..
        }) => Err(ApiError::decode(
            BACKEND,
            message.unwrap_or_else(|| "backend reported success=false".into()),
        )),
        Ok(Listing::Envelope { data, .. }) => Ok(data),
        Err(err) => Err(ApiError::decode(BACKEND, err)),
    }
}

/// Pull a record out of a mutation response, bare or under `data`.
/// Backends that answer with a bare acknowledgement yield `None`.
pub(crate) fn record_from<T: DeserializeOwned>(body: &Value) -> Option<T> {
    serde_json::from_value(body.clone())
        .ok()
        .or_else(|| body.get("data").and_then(|d| serde_json::from_value(d.clone()).ok()))
}

#[async_trait]
impl UploadSigner for ApiClient {
    async fn signature(&self, target: UploadTarget) -> ApiResult<UploadSignature> {
        let path = match target {
            UploadTarget::Gallery | UploadTarget::Bento => "gallery/gallery-signature",
            UploadTarget::RoomImages => "room-images/signature",
        };
        self.send_json(Method::GET, path, Auth::Required, None).await
    }
}
