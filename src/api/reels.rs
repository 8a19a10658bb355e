use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::Value;

use super::{record_from, unwrap_listing, ApiClient, Auth};
use crate::collection::CollectionSource;
use crate::error::{ApiError, ApiResult};
use crate::model::Reel;
use crate::upload::{check_media, MediaFile, MediaKind};

/// New reel as entered in the upload form.
#[derive(Debug, Clone)]
pub struct ReelDraft {
    pub title: String,
    pub description: String,
    pub video: Option<MediaFile>,
}

impl ReelDraft {
    /// Title and a video file are required; nothing is sent otherwise.
    pub fn validate(&self) -> ApiResult<&MediaFile> {
        if self.title.trim().is_empty() {
            return Err(ApiError::validation("Please enter a title"));
        }
        check_media(MediaKind::Video, self.video.as_ref())
    }

    fn into_form(self) -> ApiResult<Form> {
        let video = self.validate()?.clone();
        let part = Part::bytes(video.bytes)
            .file_name(video.name)
            .mime_str(video.content_type)
            .map_err(|err| ApiError::validation(format!("bad content type: {}", err)))?;
        Ok(Form::new()
            .text("title", self.title)
            .text("description", self.description)
            .part("video", part))
    }
}

/// Promotional reels. The backend stores the video itself, so creation is a
/// single multipart call.
#[derive(Debug, Clone)]
pub struct ReelsSource {
    api: ApiClient,
}

impl ReelsSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource for ReelsSource {
    type Item = Reel;
    type Draft = ReelDraft;
    type Patch = ();

    fn name(&self) -> &'static str {
        "reel"
    }

    async fn list(&self) -> ApiResult<Vec<Reel>> {
        let body: Value = self
            .api
            .send_json(Method::GET, "reels", Auth::Optional, None)
            .await?;
        unwrap_listing(body)
    }

    async fn create(&self, draft: ReelDraft) -> ApiResult<Reel> {
        let form = draft.into_form()?;
        let res: Value = self.api.send_multipart("reels", Auth::Required, form).await?;
        record_from(&res).ok_or_else(|| ApiError::decode("backend", "reel missing from create response"))
    }

    async fn delete(&self, current: &Reel) -> ApiResult<()> {
        self.api
            .send_unit(
                Method::DELETE,
                &format!("reels/{}", current.id),
                Auth::Required,
                None,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_requires_title_and_video() {
        let mut draft = ReelDraft {
            title: " ".into(),
            description: String::new(),
            video: Some(MediaFile::from_bytes("tour.mp4", vec![0])),
        };
        assert_eq!(draft.validate().unwrap_err().to_string(), "Please enter a title");

        draft.title = "Resort tour".into();
        assert!(draft.validate().is_ok());

        draft.video = Some(MediaFile::from_bytes("poster.jpg", vec![0]));
        assert_eq!(
            draft.validate().unwrap_err().to_string(),
            "Please select a video file"
        );
    }
}
