/*!
Firestore REST API document store.

Documents travel in the API's typed field representation and are converted
with [`crate::wire`]. Requests carry a bearer token from the injected
[`TokenProvider`]; service-account credentials mint tokens through a signed
JWT assertion exchanged at the account's token endpoint.
*/

use super::token::{AccessToken, CachingTokenProvider, StaticTokenProvider, TokenProvider, TokenSource};
use super::{with_id, DocumentStore};
use crate::codec::Document;
use crate::config::{CredentialSource, DatabaseConfig};
use crate::wire;
use crate::{BcupError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Public Firestore REST endpoint
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// OAuth scope granting document read/write access
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const PAGE_SIZE: usize = 300;

/// The fields of a service-account key file that are needed to mint tokens
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| {
            BcupError::auth(format!("Failed to read service account {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            BcupError::auth(format!("Invalid service account {}: {}", path.display(), e))
        })
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Exchanges a signed JWT assertion for an OAuth access token
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    scope: String,
    http: Client,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            scope: DATASTORE_SCOPE.to_string(),
            http: Client::new(),
        }
    }

    /// Build the RS256-signed assertion for the token exchange
    pub fn signed_assertion(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| BcupError::auth(format!("Invalid service account private key: {e}")))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| BcupError::auth(format!("Failed to sign token assertion: {e}")))
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn fetch_token(&self) -> Result<AccessToken> {
        let assertion = self.signed_assertion()?;
        debug!(account = %self.key.client_email, "Exchanging token assertion");

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| BcupError::auth(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BcupError::auth(format!(
                "Token endpoint returned HTTP {status}: {}",
                body.trim()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BcupError::auth(format!("Malformed token response: {e}")))?;

        Ok(AccessToken {
            token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RestDocument>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsResponse {
    #[serde(default)]
    collection_ids: Vec<String>,
    next_page_token: Option<String>,
}

/// Document store backed by the Firestore REST API
pub struct RestDocumentStore {
    http: Client,
    base_url: String,
    project_id: String,
    database: String,
    tokens: Arc<dyn TokenProvider>,
}

impl RestDocumentStore {
    /// Store for the `(default)` database of `project_id`
    pub fn new<S: Into<String>>(project_id: S, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: Client::new(),
            base_url: FIRESTORE_BASE_URL.to_string(),
            project_id: project_id.into(),
            database: "(default)".to_string(),
            tokens,
        }
    }

    /// Point at another endpoint (emulator, proxy)
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = database.into();
        self
    }

    /// Build a store from configuration, wiring up the token provider
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let (tokens, key_project): (Arc<dyn TokenProvider>, Option<String>) = match &config.credentials {
            CredentialSource::AccessToken(token) => (Arc::new(StaticTokenProvider::new(token.clone())), None),
            CredentialSource::ServiceAccountFile(path) => {
                let key = ServiceAccountKey::from_file(path)?;
                let project = key.project_id.clone();
                (
                    Arc::new(CachingTokenProvider::new(ServiceAccountTokenSource::new(key))),
                    project,
                )
            }
        };

        let project_id = config
            .project_id
            .clone()
            .or(key_project)
            .ok_or_else(|| BcupError::validation("No project id configured or found in credentials"))?;

        info!(project = %project_id, database = %config.database, "Using Firestore REST backend");

        let mut store = Self::new(project_id, tokens).with_database(config.database.clone());
        if let Some(base_url) = &config.base_url {
            store = store.with_base_url(base_url.clone());
        }
        Ok(store)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.base_url, self.project_id, self.database
        )
    }

    fn url_with_segments(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.documents_url())
            .map_err(|e| BcupError::validation(format!("Invalid Firestore URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| BcupError::validation("Firestore URL cannot take path segments"))?
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, target: &str, request: RequestBuilder) -> Result<Response> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| BcupError::upstream(target, e))?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| BcupError::upstream(target, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BcupError::upstream(target, format!("HTTP {status}: {}", body.trim())))
    }

    async fn send_json<T: DeserializeOwned>(&self, target: &str, request: RequestBuilder) -> Result<T> {
        self.send(target, request)
            .await?
            .json()
            .await
            .map_err(|e| BcupError::upstream(target, e))
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn list_collection_names(&self) -> Result<Vec<String>> {
        let url = format!("{}:listCollectionIds", self.documents_url());
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut body = json!({ "pageSize": PAGE_SIZE });
            if let Some(token) = &page_token {
                body["pageToken"] = Value::String(token.clone());
            }
            let page: ListCollectionIdsResponse = self
                .send_json("collections", self.http.post(&url).json(&body))
                .await?;

            names.extend(page.collection_ids);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(names)
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        let url = self.url_with_segments(&[collection])?;
        let page_size = PAGE_SIZE.to_string();
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", page_size.as_str())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.as_str()));
            }
            let page: ListDocumentsResponse = self
                .send_json(collection, self.http.get(url.clone()).query(&query))
                .await?;

            for document in page.documents {
                let id = document.name.rsplit('/').next().unwrap_or_default().to_string();
                let fields = wire::decode_fields(&wire::fields_from_json(&document.fields));
                documents.push(with_id(&id, fields));
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(collection, count = documents.len(), "Fetched documents");
        Ok(documents)
    }

    async fn write_document(&self, collection: &str, id: &str, fields: &Document) -> Result<()> {
        let target = format!("{collection}/{id}");
        let url = self.url_with_segments(&[collection, id])?;
        let body = json!({ "fields": wire::fields_to_json(&wire::encode_fields(fields)) });

        self.send(&target, self.http.patch(url).json(&body)).await?;
        Ok(())
    }
}
