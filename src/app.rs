//! Wiring of config, session slot, backend client and media host.
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::config::Config;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::gate::{AccessGate, AdminView, GateDecision};
use crate::session::{Credential, SessionContext, SqliteSessionStore};
use crate::upload::{CloudinaryHost, SignedUpload};

pub struct AdminApp {
    pub config: Config,
    pub session: SessionContext,
    pub api: ApiClient,
    pub host: CloudinaryHost,
    pub gate: AccessGate,
}

impl AdminApp {
    /// Open the local database, restore the session and build the clients.
    pub async fn start(config: Config) -> Result<Self> {
        config.ensure_dirs().context("creating data dir")?;
        let pool = db::init_pool(&config.database_url()).await?;
        db::run_migrations(&pool).await?;

        let session = SessionContext::restore(Arc::new(SqliteSessionStore::new(pool)))
            .await
            .context("restoring session")?;
        Self::with_session(config, session)
    }

    /// Build the clients around an existing session context.
    pub fn with_session(config: Config, session: SessionContext) -> Result<Self> {
        let timeout = Duration::from_secs(config.app.request_timeout_secs);
        let api = ApiClient::new(config.api_base_url()?, session.clone(), timeout)?;
        let host = CloudinaryHost::new(config.media_base_url()?, timeout)?;
        let gate = AccessGate::new(session.clone());
        debug!(api = %api.base_url(), "admin client ready");
        Ok(Self {
            config,
            session,
            api,
            host,
            gate,
        })
    }

    pub fn uploader(&self) -> SignedUpload<'_> {
        SignedUpload::new(&self.api, &self.host)
    }

    /// Pass the gate for `view`; a redirect means the session is missing or expired.
    pub fn open(&self, view: AdminView) -> ApiResult<AdminView> {
        match self.gate.navigate(view.path()) {
            GateDecision::Render(view) => Ok(view),
            GateDecision::Redirect(to) => {
                info!(requested = view.path(), redirect = to, "not signed in");
                Err(ApiError::Unauthorized)
            }
        }
    }

    /// Store a token issued by the backend's login endpoint.
    pub async fn login(&self, token: &str) -> ApiResult<Credential> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::validation("token must not be empty"));
        }
        let ttl = match self.config.session.ttl_hours {
            0 => None,
            hours => Some(chrono::Duration::hours(hours as i64)),
        };
        let credential = Credential::new(token, ttl);
        self.session.login(credential.clone()).await?;
        Ok(credential)
    }
}
