use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

use super::{ApiClient, Auth};
use crate::collection::{DocumentSource, RemoteDocument};
use crate::error::{ApiError, ApiResult};
use crate::model::PricingDocument;

/// Package pricing singleton.
#[derive(Debug, Clone)]
pub struct PricingSource {
    api: ApiClient,
}

impl PricingSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

/// A pricing document is only trusted once it carries the party section.
fn as_pricing(body: Value) -> Option<PricingDocument> {
    let body = match body {
        Value::Object(mut map) if !map.contains_key("party") => map.remove("data")?,
        other => other,
    };
    match body {
        Value::Object(map) if map.contains_key("party") => Some(PricingDocument(map)),
        _ => None,
    }
}

#[async_trait]
impl DocumentSource for PricingSource {
    type Doc = PricingDocument;

    fn name(&self) -> &'static str {
        "pricing"
    }

    async fn fetch(&self) -> ApiResult<PricingDocument> {
        let body: Value = self
            .api
            .send_json(Method::GET, "pricing", Auth::Optional, None)
            .await?;
        as_pricing(body).ok_or_else(|| ApiError::decode("backend", "pricing has no party section"))
    }

    async fn save(&self, doc: &PricingDocument) -> ApiResult<PricingDocument> {
        let body = Value::Object(doc.0.clone());
        let res: Value = self
            .api
            .send_json(Method::PUT, "pricing", Auth::Required, Some(&body))
            .await?;
        Ok(as_pricing(res).unwrap_or_else(|| doc.clone()))
    }
}

pub type PricingEditor = RemoteDocument<PricingSource>;

/// Parse a CLI value: numbers and JSON literals as such, anything else as text.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Change one dotted field of the loaded pricing and save the whole document.
pub async fn set_field(pricing: &PricingEditor, path: &str, value: Value) -> ApiResult<Arc<PricingDocument>> {
    let source = pricing.source();
    pricing
        .apply(|current| async move {
            let mut next = (*current).clone();
            if !next.set_path(path, value) {
                return Err(ApiError::validation(format!("cannot set '{}' in pricing", path)));
            }
            source.save(&next).await
        })
        .await
}
