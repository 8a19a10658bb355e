use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::{record_from, unwrap_listing, ApiClient, Auth};
use crate::collection::{CollectionSource, RemoteCollection};
use crate::error::{ApiError, ApiResult};
use crate::model::{BentoEdit, BentoItem};
use crate::upload::{MediaFile, SignedUpload, UploadTarget};

/// Homepage grid sections as `(title, first slot, last slot)`.
pub const BENTO_SECTIONS: [(&str, u32, u32); 3] = [
    ("Hero Section Bento Grid", 1, 6),
    ("Camping Grid", 7, 9),
    ("Day Out Party Grid", 10, 12),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBento {
    pub bento_id: String,
    pub url: String,
    pub img_text: String,
}

/// Homepage bento grid tiles.
#[derive(Debug, Clone)]
pub struct BentoSource {
    api: ApiClient,
}

impl BentoSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource for BentoSource {
    type Item = BentoItem;
    type Draft = NewBento;
    type Patch = BentoEdit;

    fn name(&self) -> &'static str {
        "bento item"
    }

    async fn list(&self) -> ApiResult<Vec<BentoItem>> {
        let body: Value = self
            .api
            .send_json(Method::GET, "bento", Auth::Optional, None)
            .await?;
        unwrap_listing(body)
    }

    async fn create(&self, draft: NewBento) -> ApiResult<BentoItem> {
        let body = serde_json::to_value(&draft).map_err(|err| ApiError::decode("bento", err))?;
        let res: Value = self
            .api
            .send_json(Method::POST, "bento", Auth::Required, Some(&body))
            .await?;
        record_from(&res).ok_or_else(|| ApiError::decode("backend", "bento item missing from create response"))
    }

    async fn update(&self, current: &BentoItem, edit: BentoEdit) -> ApiResult<BentoItem> {
        let body = serde_json::to_value(&edit).map_err(|err| ApiError::decode("bento", err))?;
        let res: Value = self
            .api
            .send_json(
                Method::PUT,
                &format!("bento/{}", current.id),
                Auth::Required,
                Some(&body),
            )
            .await?;
        Ok(record_from::<BentoItem>(&res)
            .filter(|b| b.id == current.id && b.url == edit.url && b.img_text == edit.img_text)
            .unwrap_or_else(|| BentoItem {
                url: edit.url,
                img_text: edit.img_text,
                ..current.clone()
            }))
    }

    async fn delete(&self, current: &BentoItem) -> ApiResult<()> {
        self.api
            .send_unit(
                Method::DELETE,
                &format!("bento/{}", current.id),
                Auth::Required,
                None,
            )
            .await
    }
}

/// Edit a tile's caption and, when a file is given, swap its image first.
/// Unset fields keep the tile's current value.
pub async fn edit_tile<S>(
    bento: &RemoteCollection<S>,
    uploader: &SignedUpload<'_>,
    id: &str,
    url: Option<String>,
    img_text: Option<String>,
    image: Option<&MediaFile>,
) -> ApiResult<Arc<BentoItem>>
where
    S: CollectionSource<Item = BentoItem, Patch = BentoEdit>,
{
    let current = bento
        .get(id)
        .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    let img_text = img_text.unwrap_or_else(|| current.img_text.clone());
    match image {
        Some(file) => {
            uploader
                .upload_and_persist(UploadTarget::Bento, Some(file), |asset| {
                    bento.update(
                        id,
                        BentoEdit {
                            url: asset.secure_url,
                            img_text,
                        },
                    )
                })
                .await
        }
        None => {
            let edit = BentoEdit {
                url: url.unwrap_or_else(|| current.url.clone()),
                img_text,
            };
            bento.update(id, edit).await
        }
    }
}
