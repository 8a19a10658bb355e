use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Records that carry a backend-assigned identity.
pub trait Keyed {
    fn key(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Other(String),
}

impl BookingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Other(s) => s,
        }
    }

    /// Pending bookings become confirmed; anything else goes back to pending.
    pub fn toggled(&self) -> BookingStatus {
        match self {
            BookingStatus::Pending => BookingStatus::Confirmed,
            _ => BookingStatus::Pending,
        }
    }
}

impl From<String> for BookingStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => BookingStatus::Pending,
            "confirmed" => BookingStatus::Confirmed,
            _ => BookingStatus::Other(s),
        }
    }
}

impl From<BookingStatus> for String {
    fn from(s: BookingStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: BookingStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Form fields vary by booking type; keep whatever else the backend sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reel {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

pub const GALLERY_CATEGORIES: [&str; 8] = [
    "PROPERTY",
    "SWIMMING POOL",
    "COMMON AREA",
    "DINING AREA",
    "RAIN DANCE",
    "VILLA",
    "WOODEN COTTAGE",
    "POOL ROOM",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    pub category: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    #[serde(rename = "cottage")]
    Cottage,
    #[serde(rename = "villa")]
    Villa,
    #[serde(rename = "poolRoom")]
    PoolRoom,
}

impl RoomType {
    pub const ALL: [RoomType; 3] = [RoomType::Cottage, RoomType::Villa, RoomType::PoolRoom];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Cottage => "cottage",
            RoomType::Villa => "villa",
            RoomType::PoolRoom => "poolRoom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        RoomType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomImage {
    pub url: String,
    pub public_id: String,
    #[serde(default)]
    pub is_featured: bool,
}

impl Keyed for RoomImage {
    fn key(&self) -> &str {
        &self.public_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomImages {
    #[serde(default)]
    pub cottage: Vec<RoomImage>,
    #[serde(default)]
    pub villa: Vec<RoomImage>,
    #[serde(default)]
    pub pool_room: Vec<RoomImage>,
}

impl RoomImages {
    pub fn get(&self, room: RoomType) -> &[RoomImage] {
        match room {
            RoomType::Cottage => &self.cottage,
            RoomType::Villa => &self.villa,
            RoomType::PoolRoom => &self.pool_room,
        }
    }

    pub fn set(&mut self, room: RoomType, images: Vec<RoomImage>) {
        match room {
            RoomType::Cottage => self.cottage = images,
            RoomType::Villa => self.villa = images,
            RoomType::PoolRoom => self.pool_room = images,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BentoItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub bento_id: String,
    pub url: String,
    #[serde(default)]
    pub img_text: String,
}

impl BentoItem {
    pub fn slot(&self) -> Option<u32> {
        self.bento_id.trim().parse().ok()
    }
}

/// Editable fields of a bento tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BentoEdit {
    pub url: String,
    pub img_text: String,
}

/// Tiles whose numeric slot falls in `start..=end`, ordered by slot.
pub fn bento_section<'a>(
    items: impl IntoIterator<Item = &'a BentoItem>,
    start: u32,
    end: u32,
) -> Vec<BentoItem> {
    let mut section: Vec<(u32, BentoItem)> = items
        .into_iter()
        .filter_map(|b| b.slot().map(|slot| (slot, b.clone())))
        .filter(|(slot, _)| (start..=end).contains(slot))
        .collect();
    section.sort_by_key(|(slot, _)| *slot);
    section.into_iter().map(|(_, b)| b).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

macro_rules! keyed_by_id {
    ($($ty:ty),*) => {
        $(impl Keyed for $ty {
            fn key(&self) -> &str {
                &self.id
            }
        })*
    };
}

keyed_by_id!(Booking, Reel, GalleryImage, BentoItem, Feedback);

/// Package pricing, kept as a JSON object so fields the admin never edits
/// survive a save untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingDocument(pub Map<String, Value>);

impl PricingDocument {
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Set a dotted path such as `party.timing.from`. Intermediate objects
    /// are created when missing; returns false if a non-object sits on the path.
    pub fn set_path(&mut self, path: &str, value: Value) -> bool {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        let Some((last, parents)) = parts.split_last() else {
            return false;
        };
        let mut current = &mut self.0;
        for part in parents {
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match entry.as_object_mut() {
                Some(obj) => current = obj,
                None => return false,
            }
        }
        current.insert(last.to_string(), value);
        true
    }
}

/// Short-lived authorization for a direct upload to the media host.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSignature {
    pub signature: String,
    #[serde(deserialize_with = "string_or_number")]
    pub timestamp: String,
    pub api_key: String,
    pub cloud_name: String,
    #[serde(default)]
    pub folder: Option<String>,
}

impl fmt::Debug for UploadSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSignature")
            .field("timestamp", &self.timestamp)
            .field("cloud_name", &self.cloud_name)
            .field("folder", &self.folder)
            .finish_non_exhaustive()
    }
}

/// What the media host reports for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadedAsset {
    pub secure_url: String,
    pub public_id: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
