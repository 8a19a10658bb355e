use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{ApiClient, Auth};
use crate::collection::{DocumentSource, RemoteDocument};
use crate::error::{ApiError, ApiResult};
use crate::model::{RoomImage, RoomImages, RoomType};
use crate::upload::{MediaFile, SignedUpload, UploadTarget};

/// Image sets per room type. The backend stores each type's list whole, so
/// every change writes the full list for that type through `put`; there is
/// no whole-document save.
#[derive(Debug, Clone)]
pub struct RoomImagesSource {
    api: ApiClient,
}

impl RoomImagesSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

/// Writes one room type's full image list.
#[async_trait]
pub trait RoomListWriter: DocumentSource<Doc = RoomImages> {
    async fn put(&self, room: RoomType, images: &[RoomImage]) -> ApiResult<()>;
}

#[async_trait]
impl RoomListWriter for RoomImagesSource {
    #[instrument(skip(self, images), fields(count = images.len()))]
    async fn put(&self, room: RoomType, images: &[RoomImage]) -> ApiResult<()> {
        let body = json!({ "images": images });
        self.api
            .send_unit(
                Method::PUT,
                &format!("room-images/{}", room.as_str()),
                Auth::Required,
                Some(&body),
            )
            .await
    }
}

#[async_trait]
impl DocumentSource for RoomImagesSource {
    type Doc = RoomImages;

    fn name(&self) -> &'static str {
        "room images"
    }

    async fn fetch(&self) -> ApiResult<RoomImages> {
        let body: Value = self
            .api
            .send_json(Method::GET, "room-images", Auth::Optional, None)
            .await?;
        // Every field defaults, so an envelope would also parse as an empty set.
        let doc = match body {
            Value::Null => return Ok(RoomImages::default()),
            Value::Object(ref map) if map.contains_key("data") => &map["data"],
            ref bare => bare,
        };
        serde_json::from_value(doc.clone()).map_err(|err| ApiError::decode("backend", err))
    }
}

pub type RoomGallery = RemoteDocument<RoomImagesSource>;

fn with_room(doc: &RoomImages, room: RoomType, images: Vec<RoomImage>) -> RoomImages {
    let mut next = doc.clone();
    next.set(room, images);
    next
}

fn position(doc: &RoomImages, room: RoomType, public_id: &str) -> ApiResult<usize> {
    doc.get(room)
        .iter()
        .position(|img| img.public_id == public_id)
        .ok_or_else(|| ApiError::NotFound(format!("{} image {}", room.as_str(), public_id)))
}

/// Upload a new image and append it to the room's list, not featured.
pub async fn add<S: RoomListWriter>(
    rooms: &RemoteDocument<S>,
    uploader: &SignedUpload<'_>,
    room: RoomType,
    file: Option<&MediaFile>,
) -> ApiResult<Arc<RoomImages>> {
    let source = rooms.source();
    rooms
        .apply(|current| async move {
            uploader
                .upload_and_persist(UploadTarget::RoomImages, file, |asset| async move {
                    let mut images = current.get(room).to_vec();
                    images.push(RoomImage {
                        url: asset.secure_url,
                        public_id: asset.public_id,
                        is_featured: false,
                    });
                    source.put(room, &images).await?;
                    Ok(with_room(&current, room, images))
                })
                .await
        })
        .await
}

/// Swap the image at `index` for a new upload. The slot keeps its featured flag.
pub async fn replace<S: RoomListWriter>(
    rooms: &RemoteDocument<S>,
    uploader: &SignedUpload<'_>,
    room: RoomType,
    index: usize,
    file: Option<&MediaFile>,
) -> ApiResult<Arc<RoomImages>> {
    let source = rooms.source();
    rooms
        .apply(|current| async move {
            if index >= current.get(room).len() {
                return Err(ApiError::NotFound(format!("{} image #{}", room.as_str(), index)));
            }
            uploader
                .upload_and_persist(UploadTarget::RoomImages, file, |asset| async move {
                    let mut images = current.get(room).to_vec();
                    let is_featured = images[index].is_featured;
                    images[index] = RoomImage {
                        url: asset.secure_url,
                        public_id: asset.public_id,
                        is_featured,
                    };
                    source.put(room, &images).await?;
                    Ok(with_room(&current, room, images))
                })
                .await
        })
        .await
}

/// Make `public_id` the only featured image of its room.
pub async fn set_featured<S: RoomListWriter>(
    rooms: &RemoteDocument<S>,
    room: RoomType,
    public_id: &str,
) -> ApiResult<Arc<RoomImages>> {
    let source = rooms.source();
    rooms
        .apply(|current| async move {
            position(&current, room, public_id)?;
            let images: Vec<RoomImage> = current
                .get(room)
                .iter()
                .map(|img| RoomImage {
                    is_featured: img.public_id == public_id,
                    ..img.clone()
                })
                .collect();
            source.put(room, &images).await?;
            Ok(with_room(&current, room, images))
        })
        .await
}

/// Destroy the stored asset, then drop it from the room's list.
pub async fn remove<S: RoomListWriter>(
    rooms: &RemoteDocument<S>,
    uploader: &SignedUpload<'_>,
    room: RoomType,
    public_id: &str,
) -> ApiResult<Arc<RoomImages>> {
    let source = rooms.source();
    rooms
        .apply(|current| async move {
            position(&current, room, public_id)?;
            uploader.destroy(UploadTarget::RoomImages, public_id).await?;
            let images: Vec<RoomImage> = current
                .get(room)
                .iter()
                .filter(|img| img.public_id != public_id)
                .cloned()
                .collect();
            source.put(room, &images).await?;
            info!(room = room.as_str(), public_id, "room image removed");
            Ok(with_room(&current, room, images))
        })
        .await
}
