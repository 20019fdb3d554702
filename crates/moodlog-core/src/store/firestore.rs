//! Cloud Firestore remote store over the REST v1 API.
//!
//! Documents are stored at `users/{userId}/journals/{remoteId}` using the
//! field names of the MoodLog mobile app, so existing collections stay readable.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{require_remote_id, RemoteError, RemoteJournalStore, RemoteListing, RemoteResult};
use crate::models::{EntryFields, Location, Mood, RemoteJournal};
use crate::util::{compact_text, is_http_url, normalize_text_option};

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const LIST_PAGE_SIZE: &str = "300";

const FIELD_USER_ID: &str = "userId";
const FIELD_CONTENT: &str = "journalContent";
const FIELD_DATE: &str = "journalDate";
const FIELD_TIME: &str = "journalTime";
const FIELD_MOOD: &str = "journalMood";
const FIELD_LATITUDE: &str = "journalLocationLatitude";
const FIELD_LONGITUDE: &str = "journalLocationLongitude";
const FIELD_ADDRESS: &str = "journalLocationAddress";
const FIELD_IMAGE: &str = "journalImage";

/// Every field written by `create`/`update`, used as the update mask
const DOCUMENT_FIELDS: [&str; 9] = [
    FIELD_USER_ID,
    FIELD_CONTENT,
    FIELD_DATE,
    FIELD_TIME,
    FIELD_MOOD,
    FIELD_LATITUDE,
    FIELD_LONGITUDE,
    FIELD_ADDRESS,
    FIELD_IMAGE,
];

/// Connection settings for a Firestore project
#[derive(Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    /// REST root, e.g. `https://firestore.googleapis.com/v1` or an emulator URL
    pub base_url: String,
    /// Firebase Auth ID token sent as a bearer token
    pub id_token: Option<String>,
    /// Web API key sent as the `key` query parameter
    pub api_key: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            id_token: None,
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = normalize_text_option(Some(id_token.into()));
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for FirestoreConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("base_url", &self.base_url)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Firestore-backed remote journal store
#[derive(Clone)]
pub struct FirestoreJournalStore {
    documents_root: String,
    id_token: Option<String>,
    api_key: Option<String>,
    client: Client,
}

impl FirestoreJournalStore {
    pub fn new(config: FirestoreConfig) -> RemoteResult<Self> {
        let project_id = normalize_text_option(Some(config.project_id)).ok_or_else(|| {
            RemoteError::NotConfigured("Firestore project id must not be empty".to_string())
        })?;
        let database = normalize_text_option(Some(config.database))
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let base_url = normalize_text_option(Some(config.base_url))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !is_http_url(&base_url) {
            return Err(RemoteError::NotConfigured(
                "Firestore base URL must include http:// or https://".to_string(),
            ));
        }

        let documents_root = format!(
            "{}/projects/{}/databases/{}/documents",
            base_url.trim_end_matches('/'),
            project_id,
            database,
        );

        Ok(Self {
            documents_root,
            id_token: config.id_token,
            api_key: config.api_key,
            client: Client::builder().timeout(config.request_timeout).build()?,
        })
    }

    fn collection_url(&self, user_id: &str) -> String {
        format!(
            "{}/users/{}/journals",
            self.documents_root,
            urlencoding::encode(user_id)
        )
    }

    fn document_url(&self, user_id: &str, remote_id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(user_id),
            urlencoding::encode(remote_id)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.id_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        match &self.api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self
            .authorize(request)
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::Api(parse_api_error(status, &body)))
        }
    }
}

#[async_trait]
impl RemoteJournalStore for FirestoreJournalStore {
    async fn create(&self, user_id: &str, fields: &EntryFields) -> RemoteResult<String> {
        let body = json!({ "fields": encode_fields(user_id, fields) });
        let response = self
            .send(self.client.post(self.collection_url(user_id)).json(&body))
            .await?;
        let document = response.json::<Document>().await?;
        let remote_id = document_id(&document.name)?;
        tracing::debug!("Created Firestore document {remote_id} for user {user_id}");
        Ok(remote_id.to_string())
    }

    async fn update(
        &self,
        user_id: &str,
        remote_id: &str,
        fields: &EntryFields,
    ) -> RemoteResult<()> {
        let remote_id = require_remote_id(remote_id)?;
        let mut query = DOCUMENT_FIELDS
            .iter()
            .map(|field| ("updateMask.fieldPaths", *field))
            .collect::<Vec<_>>();
        query.push(("currentDocument.exists", "true"));

        let body = json!({ "fields": encode_fields(user_id, fields) });
        self.send(
            self.client
                .patch(self.document_url(user_id, remote_id))
                .query(&query)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, user_id: &str, remote_id: &str) -> RemoteResult<()> {
        let remote_id = require_remote_id(remote_id)?;
        self.send(self.client.delete(self.document_url(user_id, remote_id)))
            .await?;
        Ok(())
    }

    async fn list(&self, user_id: &str) -> RemoteResult<RemoteListing> {
        let mut listing = RemoteListing::default();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", LIST_PAGE_SIZE), ("orderBy", FIELD_DATE)];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self
                .send(self.client.get(self.collection_url(user_id)).query(&query))
                .await?;
            let page = response.json::<ListDocumentsResponse>().await?;

            collect_documents(user_id, &page.documents, &mut listing);

            match normalize_text_option(page.next_page_token) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(listing)
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorBody {
    error: Option<FirestoreErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

fn encode_fields(user_id: &str, fields: &EntryFields) -> Value {
    let (latitude, longitude, address) = fields.location.as_ref().map_or(
        (0.0, 0.0, ""),
        |location| {
            (
                location.latitude,
                location.longitude,
                location.address.as_str(),
            )
        },
    );

    json!({
        FIELD_USER_ID: { "stringValue": user_id },
        FIELD_CONTENT: { "stringValue": fields.content },
        FIELD_DATE: { "stringValue": fields.date },
        FIELD_TIME: { "stringValue": fields.time },
        FIELD_MOOD: { "stringValue": fields.mood.as_str() },
        FIELD_LATITUDE: { "doubleValue": latitude },
        FIELD_LONGITUDE: { "doubleValue": longitude },
        FIELD_ADDRESS: { "stringValue": address },
        FIELD_IMAGE: { "stringValue": fields.image },
    })
}

fn decode_document(user_id: &str, document: &Document) -> RemoteResult<RemoteJournal> {
    let remote_id = document_id(&document.name)?;
    let fields = &document.fields;

    let mood = match string_field(fields, FIELD_MOOD).trim() {
        "" => Mood::default(),
        label => label
            .parse::<Mood>()
            .map_err(|error| RemoteError::InvalidDocument(error.to_string()))?,
    };

    let location = Location::from_parts(
        number_field(fields, FIELD_LATITUDE)?,
        number_field(fields, FIELD_LONGITUDE)?,
        string_field(fields, FIELD_ADDRESS),
    );

    Ok(RemoteJournal {
        remote_id: remote_id.to_string(),
        user_id: user_id.to_string(),
        fields: EntryFields {
            content: string_field(fields, FIELD_CONTENT),
            date: string_field(fields, FIELD_DATE),
            time: string_field(fields, FIELD_TIME),
            mood,
            location,
            image: string_field(fields, FIELD_IMAGE),
        },
    })
}

/// Decode one page into `listing`, keeping the ids of documents that fail to decode
fn collect_documents(user_id: &str, documents: &[Document], listing: &mut RemoteListing) {
    for document in documents {
        match decode_document(user_id, document) {
            Ok(journal) => listing.journals.push(journal),
            Err(error) => {
                tracing::warn!("Skipping Firestore document {}: {}", document.name, error);
                match document_id(&document.name) {
                    Ok(remote_id) => listing.skipped_ids.push(remote_id.to_string()),
                    Err(_) => listing.unidentified += 1,
                }
            }
        }
    }
}

/// Last path segment of a document resource name
fn document_id(name: &str) -> RemoteResult<&str> {
    name.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RemoteError::InvalidDocument(format!("bad document name '{name}'")))
}

fn string_field(fields: &Map<String, Value>, field: &str) -> String {
    fields
        .get(field)
        .and_then(|value| value.get("stringValue"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Read a numeric field stored as `doubleValue` or `integerValue`. Missing is `0.0`.
#[allow(clippy::cast_precision_loss)]
fn number_field(fields: &Map<String, Value>, field: &str) -> RemoteResult<f64> {
    let Some(value) = fields.get(field) else {
        return Ok(0.0);
    };

    if let Some(double) = value.get("doubleValue") {
        return double
            .as_f64()
            .or_else(|| double.as_str().and_then(|raw| raw.parse().ok()))
            .ok_or_else(|| RemoteError::InvalidDocument(format!("field {field} is not a number")));
    }
    if let Some(integer) = value.get("integerValue") {
        return integer
            .as_str()
            .and_then(|raw| raw.parse::<i64>().ok())
            .or_else(|| integer.as_i64())
            .map(|raw| raw as f64)
            .ok_or_else(|| RemoteError::InvalidDocument(format!("field {field} is not a number")));
    }
    if value.get("nullValue").is_some() {
        return Ok(0.0);
    }

    Err(RemoteError::InvalidDocument(format!(
        "field {field} has an unsupported value type"
    )))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<FirestoreErrorBody>(body) {
        if let Some(detail) = payload.error {
            if let Some(message) = detail.message {
                let code = detail.status.unwrap_or_else(|| status.as_u16().to_string());
                return format!("{} ({code})", message.trim());
            }
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
