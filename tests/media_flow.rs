use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use ecoholiday_admin::api::bento::{self, NewBento};
use ecoholiday_admin::api::gallery::{self, NewGalleryImage};
use ecoholiday_admin::api::room_images::{self, RoomListWriter};
use ecoholiday_admin::collection::{CollectionSource, DocumentSource, RemoteCollection, RemoteDocument};
use ecoholiday_admin::error::{ApiError, ApiResult, ErrorKind};
use ecoholiday_admin::model::{
    BentoEdit, BentoItem, GalleryImage, RoomImage, RoomImages, RoomType, UploadSignature, UploadedAsset,
};
use ecoholiday_admin::upload::{MediaFile, MediaHost, MediaKind, SignedUpload, UploadSigner, UploadTarget};

fn signature() -> UploadSignature {
    serde_json::from_value(serde_json::json!({
        "signature": "sig",
        "timestamp": 1717000000,
        "apiKey": "key",
        "cloudName": "eco"
    }))
    .unwrap()
}

fn server_error() -> ApiError {
    ApiError::Status {
        target: "backend",
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: "boom".into(),
    }
}

fn photo() -> MediaFile {
    MediaFile::from_bytes("pool.jpg", vec![0xff, 0xd8])
}

#[derive(Default)]
struct RecordingSigner {
    responses: Mutex<VecDeque<ApiResult<UploadSignature>>>,
    calls: Mutex<Vec<UploadTarget>>,
}

impl RecordingSigner {
    fn failing_first() -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(vec![Err(server_error())])),
            ..Default::default()
        }
    }

    async fn calls(&self) -> Vec<UploadTarget> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl UploadSigner for RecordingSigner {
    async fn signature(&self, target: UploadTarget) -> ApiResult<UploadSignature> {
        self.calls.lock().await.push(target);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(signature()))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct UploadCall {
    file: String,
    folder: String,
    kind: MediaKind,
}

#[derive(Default)]
struct RecordingHost {
    uploads: Mutex<Vec<UploadCall>>,
    destroyed: Mutex<Vec<String>>,
    fail_upload: bool,
    fail_destroy: bool,
}

impl RecordingHost {
    async fn uploads(&self) -> Vec<UploadCall> {
        self.uploads.lock().await.clone()
    }

    async fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().await.clone()
    }
}

#[async_trait]
impl MediaHost for RecordingHost {
    async fn upload(
        &self,
        file: &MediaFile,
        _signature: &UploadSignature,
        folder: &str,
        kind: MediaKind,
    ) -> ApiResult<UploadedAsset> {
        let mut uploads = self.uploads.lock().await;
        uploads.push(UploadCall {
            file: file.name.clone(),
            folder: folder.to_string(),
            kind,
        });
        if self.fail_upload {
            return Err(server_error());
        }
        let n = uploads.len();
        Ok(UploadedAsset {
            secure_url: format!("https://cdn.example/{}/asset-{}.jpg", folder, n),
            public_id: format!("{}/asset-{}", folder, n),
        })
    }

    async fn destroy(&self, public_id: &str, _signature: &UploadSignature) -> ApiResult<()> {
        self.destroyed.lock().await.push(public_id.to_string());
        if self.fail_destroy {
            return Err(server_error());
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingGallery {
    created: Mutex<Vec<NewGalleryImage>>,
    fail_create: bool,
}

#[async_trait]
impl CollectionSource for RecordingGallery {
    type Item = GalleryImage;
    type Draft = NewGalleryImage;
    type Patch = ();

    fn name(&self) -> &'static str {
        "gallery image"
    }

    async fn list(&self) -> ApiResult<Vec<GalleryImage>> {
        Ok(vec![GalleryImage {
            id: "g1".into(),
            url: "https://cdn.example/old.jpg".into(),
            category: "PROPERTY".into(),
            created_at: None,
        }])
    }

    async fn create(&self, draft: NewGalleryImage) -> ApiResult<GalleryImage> {
        let mut created = self.created.lock().await;
        created.push(draft.clone());
        if self.fail_create {
            return Err(ApiError::validation("gallery write rejected"));
        }
        Ok(GalleryImage {
            id: format!("g{}", created.len() + 1),
            url: draft.url,
            category: draft.category,
            created_at: None,
        })
    }
}

async fn gallery(fail_create: bool) -> RemoteCollection<RecordingGallery> {
    let coll = RemoteCollection::new(RecordingGallery {
        fail_create,
        ..Default::default()
    });
    coll.load().await.unwrap();
    coll
}

#[tokio::test]
async fn gallery_upload_without_file_makes_no_calls() {
    let signer = RecordingSigner::default();
    let host = RecordingHost::default();
    let images = gallery(false).await;

    let err = gallery::upload_image(&images, &SignedUpload::new(&signer, &host), None, "VILLA")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "Please select an image file");
    assert!(signer.calls().await.is_empty());
    assert!(host.uploads().await.is_empty());
    assert!(images.source().created.lock().await.is_empty());
    assert_eq!(images.len(), 1);
}

#[tokio::test]
async fn missing_file_reported_before_unknown_category() {
    let signer = RecordingSigner::default();
    let host = RecordingHost::default();
    let images = gallery(false).await;

    let err = gallery::upload_image(&images, &SignedUpload::new(&signer, &host), None, "rooftop")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Please select an image file");

    let file = photo();
    let err = gallery::upload_image(&images, &SignedUpload::new(&signer, &host), Some(&file), "rooftop")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().starts_with("Unknown category 'rooftop'"));
    assert!(signer.calls().await.is_empty());
    assert!(host.uploads().await.is_empty());
}

#[tokio::test]
async fn signature_failure_stops_before_media_host() {
    let signer = RecordingSigner::failing_first();
    let host = RecordingHost::default();
    let images = gallery(false).await;
    let file = photo();

    let err = gallery::upload_image(&images, &SignedUpload::new(&signer, &host), Some(&file), "villa")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Status);
    assert_eq!(signer.calls().await, vec![UploadTarget::Gallery]);
    assert!(host.uploads().await.is_empty());
    assert!(images.source().created.lock().await.is_empty());
    assert_eq!(images.len(), 1);
}

#[tokio::test]
async fn media_host_failure_skips_backend_write() {
    let signer = RecordingSigner::default();
    let host = RecordingHost {
        fail_upload: true,
        ..Default::default()
    };
    let images = gallery(false).await;
    let file = photo();

    let err = gallery::upload_image(&images, &SignedUpload::new(&signer, &host), Some(&file), "villa")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Status);
    assert_eq!(host.uploads().await.len(), 1);
    assert!(images.source().created.lock().await.is_empty());
    assert!(host.destroyed().await.is_empty());
}

#[tokio::test]
async fn gallery_upload_appends_uploaded_url() {
    let signer = RecordingSigner::default();
    let host = RecordingHost::default();
    let images = gallery(false).await;
    let file = photo();

    let added = gallery::upload_image(&images, &SignedUpload::new(&signer, &host), Some(&file), "wooden cottage")
        .await
        .unwrap();
    assert_eq!(added.category, "WOODEN COTTAGE");
    assert_eq!(added.url, "https://cdn.example/eco-holiday-gallery/asset-1.jpg");

    let uploads = host.uploads().await;
    assert_eq!(
        uploads,
        vec![UploadCall {
            file: "pool.jpg".into(),
            folder: "eco-holiday-gallery".into(),
            kind: MediaKind::Image,
        }]
    );
    let ids: Vec<String> = images.items().iter().map(|g| g.id.clone()).collect();
    assert_eq!(ids, vec!["g1", "g2"]);
}

#[tokio::test]
async fn failed_persist_removes_uploaded_asset() {
    let signer = RecordingSigner::default();
    let host = RecordingHost::default();
    let images = gallery(true).await;
    let file = photo();

    let err = gallery::upload_image(&images, &SignedUpload::new(&signer, &host), Some(&file), "villa")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "gallery write rejected");
    assert_eq!(
        host.destroyed().await,
        vec!["eco-holiday-gallery/asset-1".to_string()]
    );
    // one signature for the upload, a fresh one for the cleanup
    assert_eq!(signer.calls().await.len(), 2);
    assert_eq!(images.len(), 1);
}

#[tokio::test]
async fn failed_cleanup_surfaces_orphan() {
    let signer = RecordingSigner::default();
    let host = RecordingHost {
        fail_destroy: true,
        ..Default::default()
    };
    let images = gallery(true).await;
    let file = photo();

    let err = gallery::upload_image(&images, &SignedUpload::new(&signer, &host), Some(&file), "villa")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OrphanedAsset);
    match err {
        ApiError::OrphanedAsset { public_id, reason } => {
            assert_eq!(public_id, "eco-holiday-gallery/asset-1");
            assert!(reason.contains("gallery write rejected"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[derive(Default)]
struct RecordingRooms {
    initial: RoomImages,
    puts: Mutex<Vec<(RoomType, Vec<RoomImage>)>>,
}

#[async_trait]
impl DocumentSource for RecordingRooms {
    type Doc = RoomImages;

    fn name(&self) -> &'static str {
        "room images"
    }

    async fn fetch(&self) -> ApiResult<RoomImages> {
        Ok(self.initial.clone())
    }
}

#[async_trait]
impl RoomListWriter for RecordingRooms {
    async fn put(&self, room: RoomType, images: &[RoomImage]) -> ApiResult<()> {
        self.puts.lock().await.push((room, images.to_vec()));
        Ok(())
    }
}

fn room_image(id: &str, featured: bool) -> RoomImage {
    RoomImage {
        url: format!("https://cdn.example/{}.jpg", id),
        public_id: id.into(),
        is_featured: featured,
    }
}

async fn rooms() -> RemoteDocument<RecordingRooms> {
    let mut initial = RoomImages::default();
    initial.set(
        RoomType::Villa,
        vec![room_image("v1", true), room_image("v2", false)],
    );
    initial.set(RoomType::Cottage, vec![room_image("c1", true)]);
    let doc = RemoteDocument::new(RecordingRooms {
        initial,
        ..Default::default()
    });
    doc.load().await.unwrap();
    doc
}

fn featured(doc: &RoomImages, room: RoomType) -> Vec<String> {
    doc.get(room)
        .iter()
        .filter(|img| img.is_featured)
        .map(|img| img.public_id.clone())
        .collect()
}

#[tokio::test]
async fn room_add_and_replace_keep_featured_flags() {
    let signer = RecordingSigner::default();
    let host = RecordingHost::default();
    let uploader = SignedUpload::new(&signer, &host);
    let doc = rooms().await;
    let file = photo();

    let after_add = room_images::add(&doc, &uploader, RoomType::Villa, Some(&file))
        .await
        .unwrap();
    let villa = after_add.get(RoomType::Villa);
    assert_eq!(villa.len(), 3);
    assert_eq!(villa[2].public_id, "eco-holiday-rooms/asset-1");
    assert!(!villa[2].is_featured);

    let after_replace = room_images::replace(&doc, &uploader, RoomType::Villa, 0, Some(&file))
        .await
        .unwrap();
    let villa = after_replace.get(RoomType::Villa);
    assert_eq!(villa[0].public_id, "eco-holiday-rooms/asset-2");
    assert!(villa[0].is_featured);
    assert_eq!(after_replace.get(RoomType::Cottage), doc.source().initial.get(RoomType::Cottage));

    let puts = doc.source().puts.lock().await.clone();
    assert_eq!(puts.len(), 2);
    assert!(puts.iter().all(|(room, _)| *room == RoomType::Villa));
    assert!(host.uploads().await.iter().all(|u| u.folder == "eco-holiday-rooms"));
}

#[tokio::test]
async fn room_replace_out_of_range_uploads_nothing() {
    let signer = RecordingSigner::default();
    let host = RecordingHost::default();
    let doc = rooms().await;
    let file = photo();

    let err = room_images::replace(&doc, &SignedUpload::new(&signer, &host), RoomType::PoolRoom, 0, Some(&file))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(signer.calls().await.is_empty());
    assert!(!doc.is_busy());
}

#[tokio::test]
async fn room_feature_is_exclusive() {
    let doc = rooms().await;
    let updated = room_images::set_featured(&doc, RoomType::Villa, "v2").await.unwrap();
    assert_eq!(featured(&updated, RoomType::Villa), vec!["v2"]);
    assert_eq!(featured(&updated, RoomType::Cottage), vec!["c1"]);

    let err = room_images::set_featured(&doc, RoomType::Villa, "missing")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(featured(&doc.current().unwrap(), RoomType::Villa), vec!["v2"]);
}

#[tokio::test]
async fn room_remove_destroys_then_writes_filtered_list() {
    let signer = RecordingSigner::default();
    let host = RecordingHost::default();
    let doc = rooms().await;

    let updated = room_images::remove(&doc, &SignedUpload::new(&signer, &host), RoomType::Villa, "v1")
        .await
        .unwrap();
    assert_eq!(host.destroyed().await, vec!["v1".to_string()]);
    assert_eq!(signer.calls().await, vec![UploadTarget::RoomImages]);
    let villa: Vec<&str> = updated
        .get(RoomType::Villa)
        .iter()
        .map(|img| img.public_id.as_str())
        .collect();
    assert_eq!(villa, vec!["v2"]);
    let puts = doc.source().puts.lock().await.clone();
    assert_eq!(puts, vec![(RoomType::Villa, vec![room_image("v2", false)])]);
}

#[tokio::test]
async fn room_remove_keeps_list_when_destroy_fails() {
    let signer = RecordingSigner::default();
    let host = RecordingHost {
        fail_destroy: true,
        ..Default::default()
    };
    let doc = rooms().await;

    assert!(room_images::remove(&doc, &SignedUpload::new(&signer, &host), RoomType::Villa, "v1")
        .await
        .is_err());
    assert!(doc.source().puts.lock().await.is_empty());
    assert_eq!(doc.current().unwrap().get(RoomType::Villa).len(), 2);
}

#[derive(Default)]
struct RecordingBento {
    edits: Mutex<Vec<BentoEdit>>,
}

#[async_trait]
impl CollectionSource for RecordingBento {
    type Item = BentoItem;
    type Draft = NewBento;
    type Patch = BentoEdit;

    fn name(&self) -> &'static str {
        "bento item"
    }

    async fn list(&self) -> ApiResult<Vec<BentoItem>> {
        Ok(vec![BentoItem {
            id: "t3".into(),
            bento_id: "3".into(),
            url: "https://cdn.example/old.jpg".into(),
            img_text: "Sunset deck".into(),
        }])
    }

    async fn update(&self, current: &BentoItem, edit: BentoEdit) -> ApiResult<BentoItem> {
        self.edits.lock().await.push(edit.clone());
        Ok(BentoItem {
            url: edit.url,
            img_text: edit.img_text,
            ..current.clone()
        })
    }
}

#[tokio::test]
async fn bento_edit_with_image_uploads_to_bento_folder() {
    let signer = RecordingSigner::default();
    let host = RecordingHost::default();
    let tiles = RemoteCollection::new(RecordingBento::default());
    tiles.load().await.unwrap();
    let file = photo();
    let uploader = SignedUpload::new(&signer, &host);

    let tile = bento::edit_tile(&tiles, &uploader, "t3", None, None, Some(&file))
        .await
        .unwrap();
    assert_eq!(tile.url, "https://cdn.example/eco-holiday-bento/asset-1.jpg");
    assert_eq!(tile.img_text, "Sunset deck");
    assert_eq!(signer.calls().await, vec![UploadTarget::Bento]);

    let tile = bento::edit_tile(&tiles, &uploader, "t3", None, Some("Pool at dusk".into()), None)
        .await
        .unwrap();
    assert_eq!(tile.url, "https://cdn.example/eco-holiday-bento/asset-1.jpg");
    assert_eq!(tile.img_text, "Pool at dusk");
    assert_eq!(host.uploads().await.len(), 1);
    assert_eq!(tiles.source().edits.lock().await.len(), 2);
    assert!(Arc::ptr_eq(&tiles.get("t3").unwrap(), &tiles.items()[0]));
}
