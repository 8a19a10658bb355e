//! Signed direct-to-host media uploads.
//!
//! Phase one asks the backend for a short-lived signature, phase two sends
//! the file straight to the media host, and the resulting URL is then
//! persisted through a normal backend call. When that last step fails the
//! uploaded asset is destroyed again; if even that fails the caller gets
//! `ApiError::OrphanedAsset` naming the asset to clean up by hand.
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::model::{UploadSignature, UploadedAsset};

const HOST: &str = "media host";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn missing_file_message(&self) -> &'static str {
        match self {
            MediaKind::Image => "Please select an image file",
            MediaKind::Video => "Please select a video file",
        }
    }
}

/// Where a signed image upload ends up. Reels go to the backend as
/// multipart instead and never take this path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    Gallery,
    RoomImages,
    Bento,
}

impl UploadTarget {
    pub fn folder(&self) -> &'static str {
        match self {
            UploadTarget::Gallery => "eco-holiday-gallery",
            UploadTarget::RoomImages => "eco-holiday-rooms",
            UploadTarget::Bento => "eco-holiday-bento",
        }
    }
}

#[derive(Clone)]
pub struct MediaFile {
    pub name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl MediaFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = content_type_for(Path::new(&name));
        Self {
            name,
            content_type,
            bytes,
        }
    }

    pub async fn read<P: AsRef<Path>>(path: P) -> ApiResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::validation(format!("invalid file name: {}", path.display())))?;
        let bytes = fs::read(path).await.map_err(|err| {
            ApiError::validation(format!("cannot read {}: {}", path.display(), err))
        })?;
        Ok(Self::from_bytes(name, bytes))
    }

    pub fn kind(&self) -> Option<MediaKind> {
        if self.content_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else if self.content_type.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

pub fn content_type_for(file_path: &Path) -> &'static str {
    match file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "mov" => "video/quicktime",
        Some(ext) if ext == "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Reject a missing file or one of the wrong kind before any network call.
pub fn check_media(kind: MediaKind, file: Option<&MediaFile>) -> ApiResult<&MediaFile> {
    match file {
        Some(f) if f.kind() == Some(kind) => Ok(f),
        _ => Err(ApiError::validation(kind.missing_file_message())),
    }
}

/// Every signed upload target takes images.
pub fn check_file(_target: UploadTarget, file: Option<&MediaFile>) -> ApiResult<&MediaFile> {
    check_media(MediaKind::Image, file)
}

/// Issues upload signatures (implemented by the backend client).
#[async_trait]
pub trait UploadSigner: Send + Sync {
    async fn signature(&self, target: UploadTarget) -> ApiResult<UploadSignature>;
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(
        &self,
        file: &MediaFile,
        signature: &UploadSignature,
        folder: &str,
        kind: MediaKind,
    ) -> ApiResult<UploadedAsset>;

    async fn destroy(&self, public_id: &str, signature: &UploadSignature) -> ApiResult<()>;
}

/// Cloudinary-style host: `{base}/v1_1/{cloud}/{kind}/upload`.
#[derive(Clone)]
pub struct CloudinaryHost {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for CloudinaryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryHost")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CloudinaryHost {
    pub fn new(base_url: Url, timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("ecoholiday-admin/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport { target: HOST, source })?;
        Ok(Self { http, base_url })
    }

    pub fn endpoint(&self, cloud_name: &str, kind: MediaKind, action: &str) -> ApiResult<Url> {
        self.base_url
            .join(&format!("v1_1/{}/{}/{}", cloud_name, kind.as_str(), action))
            .map_err(|err| ApiError::validation(format!("invalid media host URL: {}", err)))
    }

    fn signed_form(signature: &UploadSignature) -> Form {
        Form::new()
            .text("api_key", signature.api_key.clone())
            .text("timestamp", signature.timestamp.clone())
            .text("signature", signature.signature.clone())
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(&self, url: Url, form: Form) -> ApiResult<T> {
        debug!(url = %url, "posting to media host");
        let res = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| ApiError::Transport { target: HOST, source })?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|source| ApiError::Transport { target: HOST, source })?;
        if !status.is_success() {
            warn!(%status, "media host rejected request");
            return Err(ApiError::Status {
                target: HOST,
                status,
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| ApiError::decode(HOST, err))
    }
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    #[instrument(skip_all, fields(file = %file.name, folder = %folder))]
    async fn upload(
        &self,
        file: &MediaFile,
        signature: &UploadSignature,
        folder: &str,
        kind: MediaKind,
    ) -> ApiResult<UploadedAsset> {
        let url = self.endpoint(&signature.cloud_name, kind, "upload")?;
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(file.content_type)
            .map_err(|err| ApiError::validation(format!("bad content type: {}", err)))?;
        let form = Self::signed_form(signature)
            .text("folder", folder.to_string())
            .part("file", part);
        let asset: UploadedAsset = self.post_form(url, form).await?;
        info!(public_id = %asset.public_id, "uploaded media");
        Ok(asset)
    }

    #[instrument(skip(self, signature))]
    async fn destroy(&self, public_id: &str, signature: &UploadSignature) -> ApiResult<()> {
        let url = self.endpoint(&signature.cloud_name, MediaKind::Image, "destroy")?;
        let form = Self::signed_form(signature).text("public_id", public_id.to_string());
        let res: DestroyResponse = self.post_form(url, form).await?;
        match res.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(ApiError::Status {
                target: HOST,
                status: StatusCode::OK,
                body: format!("destroy returned {}", other),
            }),
        }
    }
}

/// Runs the sign → upload → persist sequence.
pub struct SignedUpload<'a> {
    signer: &'a dyn UploadSigner,
    host: &'a dyn MediaHost,
}

impl<'a> SignedUpload<'a> {
    pub fn new(signer: &'a dyn UploadSigner, host: &'a dyn MediaHost) -> Self {
        Self { signer, host }
    }

    /// Sign and upload only. Nothing touches the media host when the file is
    /// missing or the signature request fails.
    pub async fn upload(&self, target: UploadTarget, file: Option<&MediaFile>) -> ApiResult<UploadedAsset> {
        let file = check_file(target, file)?;
        let signature = self.signer.signature(target).await?;
        self.host
            .upload(file, &signature, target.folder(), MediaKind::Image)
            .await
    }

    /// Upload, then hand the asset to `persist`. If `persist` fails the
    /// asset is removed from the host again.
    pub async fn upload_and_persist<T, F, Fut>(
        &self,
        target: UploadTarget,
        file: Option<&MediaFile>,
        persist: F,
    ) -> ApiResult<T>
    where
        F: FnOnce(UploadedAsset) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let asset = self.upload(target, file).await?;
        match persist(asset.clone()).await {
            Ok(value) => Ok(value),
            Err(err) => Err(self.compensate(target, &asset, err).await),
        }
    }

    /// Remove an asset that is no longer referenced by the backend.
    pub async fn destroy(&self, target: UploadTarget, public_id: &str) -> ApiResult<()> {
        let signature = self.signer.signature(target).await?;
        self.host.destroy(public_id, &signature).await
    }

    async fn compensate(&self, target: UploadTarget, asset: &UploadedAsset, cause: ApiError) -> ApiError {
        warn!(public_id = %asset.public_id, error = %cause, "persist failed after upload; removing asset");
        match self.destroy(target, &asset.public_id).await {
            Ok(()) => cause,
            Err(cleanup) => {
                warn!(public_id = %asset.public_id, error = %cleanup, "could not remove uploaded asset");
                ApiError::OrphanedAsset {
                    public_id: asset.public_id.clone(),
                    reason: cause.to_string(),
                }
            }
        }
    }
}
