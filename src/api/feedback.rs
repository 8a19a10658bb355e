use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::{unwrap_listing, ApiClient, Auth};
use crate::collection::CollectionSource;
use crate::error::ApiResult;
use crate::model::Feedback;

/// Guest feedback, read-only from the admin side.
#[derive(Debug, Clone)]
pub struct FeedbackSource {
    api: ApiClient,
}

impl FeedbackSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource for FeedbackSource {
    type Item = Feedback;
    type Draft = ();
    type Patch = ();

    fn name(&self) -> &'static str {
        "feedback"
    }

    async fn list(&self) -> ApiResult<Vec<Feedback>> {
        let body: Value = self
            .api
            .send_json(Method::GET, "feedback", Auth::Optional, None)
            .await?;
        unwrap_listing(body)
    }
}
