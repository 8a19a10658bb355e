use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::{record_from, unwrap_listing, ApiClient, Auth};
use crate::collection::{CollectionSource, Placement, RemoteCollection};
use crate::error::{ApiError, ApiResult};
use crate::model::{GalleryImage, GALLERY_CATEGORIES};
use crate::upload::{check_file, MediaFile, SignedUpload, UploadTarget};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGalleryImage {
    pub url: String,
    pub category: String,
}

/// Property gallery images.
#[derive(Debug, Clone)]
pub struct GallerySource {
    api: ApiClient,
}

impl GallerySource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource for GallerySource {
    type Item = GalleryImage;
    type Draft = NewGalleryImage;
    type Patch = ();

    fn name(&self) -> &'static str {
        "gallery image"
    }

    async fn list(&self) -> ApiResult<Vec<GalleryImage>> {
        let body: Value = self
            .api
            .send_json(Method::GET, "gallery", Auth::Optional, None)
            .await?;
        unwrap_listing(body)
    }

    async fn create(&self, draft: NewGalleryImage) -> ApiResult<GalleryImage> {
        let body = serde_json::to_value(&draft).map_err(|err| ApiError::decode("gallery", err))?;
        let res: Value = self
            .api
            .send_json(Method::POST, "gallery", Auth::Required, Some(&body))
            .await?;
        record_from(&res)
            .ok_or_else(|| ApiError::decode("backend", "gallery image missing from create response"))
    }

    async fn delete(&self, current: &GalleryImage) -> ApiResult<()> {
        self.api
            .send_unit(
                Method::DELETE,
                &format!("gallery/{}", current.id),
                Auth::Required,
                None,
            )
            .await
    }
}

pub fn normalize_category(category: &str) -> ApiResult<&'static str> {
    GALLERY_CATEGORIES
        .into_iter()
        .find(|c| c.eq_ignore_ascii_case(category.trim()))
        .ok_or_else(|| {
            ApiError::validation(format!(
                "Unknown category '{}'; expected one of: {}",
                category,
                GALLERY_CATEGORIES.join(", ")
            ))
        })
}

/// Upload an image to the media host and add it to the gallery. A missing
/// file is reported before an unknown category.
pub async fn upload_image<S>(
    gallery: &RemoteCollection<S>,
    uploader: &SignedUpload<'_>,
    file: Option<&MediaFile>,
    category: &str,
) -> ApiResult<Arc<GalleryImage>>
where
    S: CollectionSource<Item = GalleryImage, Draft = NewGalleryImage>,
{
    let file = check_file(UploadTarget::Gallery, file)?;
    let category = normalize_category(category)?;
    uploader
        .upload_and_persist(UploadTarget::Gallery, Some(file), |asset| {
            gallery.create(
                NewGalleryImage {
                    url: asset.secure_url,
                    category: category.to_string(),
                },
                Placement::Back,
            )
        })
        .await
}
