//! Remote data gateway for the management API.
//!
//! Thin wrapper over the token, user and statistics endpoints. Every call
//! returns either the decoded envelope payload or a [`ConsoleError`]:
//! - `Transport` when no usable response arrived (including non-2xx),
//! - `Api` when the server answered `success: false`,
//! - `Decode` when the body was not the expected shape.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

use crate::billing::DateRange;
use crate::config::Config;
use crate::errors::ConsoleError;
use crate::models::billing::{BillingTagReport, BillingTagReportEnvelope};
use crate::models::envelope::{decode, ApiEnvelope, Page};
use crate::models::group::UserGroup;
use crate::models::token::{Token, TokenStatus};
use crate::models::user::{UserOption, UserRecord};
use crate::scope::QueryScope;

/// Page size of the impersonation autocomplete.
pub const USER_LOOKUP_PAGE_SIZE: u32 = 20;

/// Query string of a token list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListParams {
    /// 1-based.
    pub page: u32,
    pub size: u32,
    pub keyword: String,
    /// Column id, `-` prefixed for descending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusUpdate {
    id: i64,
    status: TokenStatus,
}

#[async_trait]
pub trait TokenGateway: Send + Sync {
    async fn list_tokens(
        &self,
        scope: QueryScope,
        params: &ListParams,
    ) -> Result<Page<Token>, ConsoleError>;

    /// Raw envelope, so callers can report the server's message either way.
    async fn delete_token(
        &self,
        scope: QueryScope,
        id: i64,
    ) -> Result<ApiEnvelope<Value>, ConsoleError>;

    async fn update_token_status(
        &self,
        scope: QueryScope,
        id: i64,
        status: TokenStatus,
    ) -> Result<ApiEnvelope<Value>, ConsoleError>;

    async fn list_users(&self, keyword: &str) -> Result<Vec<UserOption>, ConsoleError>;

    async fn list_groups(&self) -> Result<HashMap<String, UserGroup>, ConsoleError>;

    async fn billing_tag_report(&self, range: &DateRange)
        -> Result<BillingTagReport, ConsoleError>;

    async fn export_billing_tag_csv(&self, range: &DateRange) -> Result<Vec<u8>, ConsoleError>;
}

/// reqwest-backed gateway.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    access_token: Option<String>,
    http: Client,
}

impl HttpGateway {
    pub fn new(cfg: &Config) -> Result<Self, ConsoleError> {
        let http = Client::builder()
            .timeout(cfg.http_timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("token-console/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: cfg.base_url.as_str().trim_end_matches('/').to_string(),
            access_token: cfg.access_token.clone(),
            http,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        req
    }

    fn scoped(req: RequestBuilder, scope: QueryScope) -> RequestBuilder {
        match scope.user_id() {
            Some(user_id) => req.query(&[("user_id", user_id)]),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Vec<u8>, ConsoleError> {
        let resp = req.send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn send_envelope<T: serde::de::DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<ApiEnvelope<T>, ConsoleError> {
        let body = self.send(req).await?;
        decode(&body)
    }
}

#[async_trait]
impl TokenGateway for HttpGateway {
    async fn list_tokens(
        &self,
        scope: QueryScope,
        params: &ListParams,
    ) -> Result<Page<Token>, ConsoleError> {
        tracing::debug!(
            path = scope.base_path(),
            page = params.page,
            size = params.size,
            keyword = %params.keyword,
            order = ?params.order,
            user_id = ?scope.user_id(),
            "listing tokens"
        );
        let req = self.request(Method::GET, scope.base_path()).query(params);
        self.send_envelope(Self::scoped(req, scope))
            .await?
            .into_data()
    }

    async fn delete_token(
        &self,
        scope: QueryScope,
        id: i64,
    ) -> Result<ApiEnvelope<Value>, ConsoleError> {
        tracing::info!(id, user_id = ?scope.user_id(), "deleting token");
        let path = format!("{}{}", scope.base_path(), id);
        let req = self.request(Method::DELETE, &path);
        self.send_envelope(Self::scoped(req, scope)).await
    }

    async fn update_token_status(
        &self,
        scope: QueryScope,
        id: i64,
        status: TokenStatus,
    ) -> Result<ApiEnvelope<Value>, ConsoleError> {
        tracing::info!(id, status = status.label(), user_id = ?scope.user_id(), "updating token status");
        let req = self
            .request(Method::PUT, scope.base_path())
            .query(&[("status_only", "true")])
            .json(&StatusUpdate { id, status });
        self.send_envelope(Self::scoped(req, scope)).await
    }

    async fn list_users(&self, keyword: &str) -> Result<Vec<UserOption>, ConsoleError> {
        let req = self.request(Method::GET, "/api/user/").query(&[
            ("page", "1".to_string()),
            ("size", USER_LOOKUP_PAGE_SIZE.to_string()),
            ("keyword", keyword.to_string()),
        ]);
        let page: Page<UserRecord> = self.send_envelope(req).await?.into_data()?;
        Ok(page.data.into_iter().map(UserOption::from).collect())
    }

    async fn list_groups(&self) -> Result<HashMap<String, UserGroup>, ConsoleError> {
        let req = self.request(Method::GET, "/api/user_group_map");
        self.send_envelope(req).await?.into_data()
    }

    async fn billing_tag_report(
        &self,
        range: &DateRange,
    ) -> Result<BillingTagReport, ConsoleError> {
        let req = self
            .request(Method::GET, "/api/billing_tag/statistics")
            .query(&range.query());
        let body = self.send(req).await?;
        let env: BillingTagReportEnvelope = serde_json::from_slice(&body)?;
        if !env.success {
            return Err(ConsoleError::api(env.message));
        }
        Ok(BillingTagReport {
            statistics: env.data,
            model_usage: env.model_usage,
        })
    }

    async fn export_billing_tag_csv(&self, range: &DateRange) -> Result<Vec<u8>, ConsoleError> {
        let req = self
            .request(Method::GET, "/api/billing_tag/statistics/export")
            .query(&range.query());
        let resp = req.send().await?.error_for_status()?;

        // Validation failures come back as a JSON envelope with status 200.
        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);
        let body = resp.bytes().await?.to_vec();
        if is_json {
            let env: ApiEnvelope<Value> = decode(&body)?;
            env.into_ack()?;
        }
        Ok(body)
    }
}
