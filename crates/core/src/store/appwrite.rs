use crate::account::{Execution, FunctionRunner};
use crate::auth::{Session, SessionProvider};
use crate::config::{clamp_store_retries, Settings};
use crate::store::query::{cursor_after_clause, limit_clause, DocumentQuery};
use crate::store::{DocumentStore, StoreError};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const ACCOUNT_SCOPE: &str = "account";
const FUNCTIONS_SCOPE: &str = "functions";
const BASE_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 8_000;

#[derive(Debug, Clone)]
pub struct AppwriteClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    api_key: Option<String>,
    database_id: String,
    page_size: u32,
    retries: u32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    total: u64,
    documents: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(rename = "$id")]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: Option<String>,
}

impl AppwriteClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let endpoint = settings.require_appwrite_endpoint()?.to_string();
        let project_id = settings.require_appwrite_project_id()?.to_string();
        let database_id = settings.require_appwrite_database_id()?.to_string();

        let http = reqwest::Client::builder()
            .timeout(settings.store_timeout())
            .build()
            .context("failed to build document store http client")?;

        Ok(Self {
            http,
            endpoint,
            project_id,
            api_key: settings.appwrite_api_key.clone(),
            database_id,
            page_size: settings.store_page_size,
            retries: clamp_store_retries(settings.store_retries),
            timeout: settings.store_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn documents_url(&self, collection: &str) -> String {
        self.url(&format!(
            "databases/{}/collections/{collection}/documents",
            self.database_id
        ))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-appwrite-project", HeaderValue::from_str(&self.project_id)?);
        if let Some(api_key) = &self.api_key {
            headers.insert("x-appwrite-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    fn session_headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-appwrite-project", HeaderValue::from_str(&self.project_id)?);
        headers.insert(
            "x-appwrite-jwt",
            HeaderValue::from_str(token).context("session token is not a valid header value")?,
        );
        Ok(headers)
    }

    fn transport_error(&self, scope: &str, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout {
                collection: scope.to_string(),
                after: self.timeout,
            }
        } else {
            StoreError::Transport {
                collection: scope.to_string(),
                detail: err.to_string(),
            }
        }
    }

    /// Sends one request and returns status plus body text, mapping transport
    /// failures into `StoreError`.
    async fn send(
        &self,
        scope: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), StoreError> {
        let res = req.send().await.map_err(|e| self.transport_error(scope, e))?;
        let status = res.status();
        let text = res.text().await.map_err(|e| self.transport_error(scope, e))?;
        Ok((status, text))
    }

    async fn list_page(
        &self,
        collection: &str,
        queries: &[String],
    ) -> Result<DocumentList, StoreError> {
        let params: Vec<(&str, &str)> = queries.iter().map(|q| ("queries[]", q.as_str())).collect();
        let headers = self.headers().map_err(|e| StoreError::Transport {
            collection: collection.to_string(),
            detail: format!("{e:#}"),
        })?;
        let req = self
            .http
            .get(self.documents_url(collection))
            .headers(headers)
            .query(&params);

        let (status, text) = self.send(collection, req).await?;
        if !status.is_success() {
            return Err(StoreError::Http {
                collection: collection.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str::<DocumentList>(&text).map_err(|e| StoreError::Decode {
            collection: collection.to_string(),
            detail: e.to_string(),
        })
    }

    async fn list_page_with_retry(
        &self,
        collection: &str,
        queries: &[String],
    ) -> Result<DocumentList, StoreError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.list_page(collection, queries).await {
                Ok(page) => return Ok(page),
                Err(err) => {
                    if attempt >= self.retries || !err.is_retryable() {
                        return Err(err);
                    }
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(collection, attempt, ?backoff, error = %err, "store list failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Exponential backoff before retry number `attempt` (1-based), capped.
fn retry_backoff(attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    Duration::from_millis((BASE_BACKOFF_MS << shift).min(MAX_BACKOFF_MS))
}

#[async_trait::async_trait]
impl DocumentStore for AppwriteClient {
    async fn list_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<Value>> {
        let base = query.to_query_strings();
        let mut out: Vec<Value> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let remaining = query
                .limit
                .map(|limit| limit.saturating_sub(out.len() as u32));
            let page_size = match remaining {
                Some(0) => break,
                Some(r) => r.min(self.page_size),
                None => self.page_size,
            };

            let mut queries = base.clone();
            queries.push(limit_clause(page_size));
            if let Some(id) = &cursor {
                queries.push(cursor_after_clause(id));
            }

            let page = self.list_page_with_retry(collection, &queries).await?;
            let fetched = page.documents.len();
            tracing::debug!(collection, fetched, total = page.total, "store page fetched");

            cursor = page
                .documents
                .last()
                .and_then(|doc| doc.get("$id"))
                .and_then(Value::as_str)
                .map(str::to_string);
            out.extend(page.documents);

            if fetched < page_size as usize || cursor.is_none() {
                break;
            }
        }

        Ok(out)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let url = format!("{}/{id}", self.documents_url(collection));
        let req = self.http.get(url).headers(self.headers()?);
        let (status, text) = self.send(collection, req).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Http {
                collection: collection.to_string(),
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let doc = serde_json::from_str::<Value>(&text).map_err(|e| StoreError::Decode {
            collection: collection.to_string(),
            detail: e.to_string(),
        })?;
        Ok(Some(doc))
    }
}

#[async_trait::async_trait]
impl SessionProvider for AppwriteClient {
    async fn current_session(&self, token: &str) -> Result<Option<Session>> {
        let req = self
            .http
            .get(self.url("account"))
            .headers(self.session_headers(token)?);
        let (status, text) = self.send(ACCOUNT_SCOPE, req).await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Http {
                collection: ACCOUNT_SCOPE.to_string(),
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let account = serde_json::from_str::<AccountResponse>(&text)
            .with_context(|| format!("failed to parse account response: {text}"))?;
        Ok(Some(Session {
            user_id: account.id,
            email: account.email,
            name: account.name.filter(|s| !s.trim().is_empty()),
        }))
    }

    async fn end_session(&self, token: &str) -> Result<()> {
        let req = self
            .http
            .delete(self.url("account/sessions/current"))
            .headers(self.session_headers(token)?);
        let (status, text) = self.send(ACCOUNT_SCOPE, req).await?;

        // An already-invalid session counts as ended.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        Err(StoreError::Http {
            collection: ACCOUNT_SCOPE.to_string(),
            status: status.as_u16(),
            body: text,
        }
        .into())
    }
}

#[async_trait::async_trait]
impl FunctionRunner for AppwriteClient {
    async fn execute(&self, function_id: &str, body: &str) -> Result<Execution> {
        let req = self
            .http
            .post(self.url(&format!("functions/{function_id}/executions")))
            .headers(self.headers()?)
            .json(&serde_json::json!({ "body": body, "async": false }));
        let (status, text) = self.send(FUNCTIONS_SCOPE, req).await?;

        if !status.is_success() {
            return Err(StoreError::Http {
                collection: FUNCTIONS_SCOPE.to_string(),
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let execution = serde_json::from_str::<Execution>(&text)
            .with_context(|| format!("failed to parse execution response: {text}"))?;
        tracing::debug!(function_id, execution_id = %execution.id, status = %execution.status, "function executed");
        Ok(execution)
    }
}
