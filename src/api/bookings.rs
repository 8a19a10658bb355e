use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use super::{record_from, unwrap_listing, ApiClient, Auth};
use crate::collection::{CollectionSource, RemoteCollection};
use crate::error::{ApiError, ApiResult};
use crate::model::{Booking, BookingStatus};

/// Booking submissions: list, change status, delete.
#[derive(Debug, Clone)]
pub struct BookingsSource {
    api: ApiClient,
}

impl BookingsSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource for BookingsSource {
    type Item = Booking;
    type Draft = ();
    type Patch = BookingStatus;

    fn name(&self) -> &'static str {
        "booking"
    }

    async fn list(&self) -> ApiResult<Vec<Booking>> {
        let body: Value = self
            .api
            .send_json(Method::GET, "bookings", Auth::Optional, None)
            .await?;
        unwrap_listing(body)
    }

    async fn update(&self, current: &Booking, status: BookingStatus) -> ApiResult<Booking> {
        let body = json!({ "status": status.as_str() });
        let res: Value = self
            .api
            .send_json(
                Method::PATCH,
                &format!("bookings/{}", current.id),
                Auth::Required,
                Some(&body),
            )
            .await?;
        // Some deployments answer with just `{ success: true }`.
        Ok(record_from::<Booking>(&res)
            .filter(|b| b.id == current.id && b.status == status)
            .unwrap_or_else(|| Booking {
                status,
                ..current.clone()
            }))
    }

    async fn delete(&self, current: &Booking) -> ApiResult<()> {
        self.api
            .send_unit(
                Method::DELETE,
                &format!("bookings/{}", current.id),
                Auth::Required,
                None,
            )
            .await
    }
}

/// Flip a booking between pending and confirmed.
pub async fn toggle_status<S>(bookings: &RemoteCollection<S>, id: &str) -> ApiResult<BookingStatus>
where
    S: CollectionSource<Item = Booking, Patch = BookingStatus>,
{
    let current = bookings
        .get(id)
        .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    let updated = bookings.update(id, current.status.toggled()).await?;
    Ok(updated.status.clone())
}
