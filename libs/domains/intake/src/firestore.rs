//! Firestore REST v1 document store

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::error::{IntakeError, IntakeResult};
use crate::google_auth::GoogleTokenSource;
use crate::models::{Document, FieldFilter, FieldValue, Fields};
use crate::store::DocumentStore;

pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";

/// [`DocumentStore`] backed by the Firestore REST API
#[derive(Clone)]
pub struct FirestoreStore {
    project_id: String,
    database: String,
    base_url: String,
    client: Client,
    tokens: GoogleTokenSource,
}

impl FirestoreStore {
    pub fn new(project_id: impl Into<String>, tokens: GoogleTokenSource, client: Client) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            base_url: FIRESTORE_BASE_URL.to_string(),
            client,
            tokens,
        }
    }

    /// Point at another endpoint, such as a local emulator
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
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

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_url(), collection, id)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    #[instrument(skip(self, filter), fields(project = %self.project_id, field = %filter.field_path))]
    async fn query(&self, collection: &str, filter: &FieldFilter) -> IntakeResult<Vec<Document>> {
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(format!("{}:runQuery", self.documents_url()))
            .bearer_auth(token)
            .json(&run_query_body(collection, filter))
            .send()
            .await
            .map_err(|e| IntakeError::Store(format!("runQuery request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IntakeError::Store(format!(
                "runQuery on {} failed ({}): {}",
                collection, status, body
            )));
        }

        let items: Vec<RunQueryItem> = response
            .json()
            .await
            .map_err(|e| IntakeError::Decode(format!("Invalid runQuery response: {}", e)))?;

        let documents = documents_from_items(items);

        debug!(count = documents.len(), "Query returned documents");
        Ok(documents)
    }

    #[instrument(skip(self, fields), fields(project = %self.project_id))]
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> IntakeResult<()> {
        let token = self.tokens.access_token().await?;

        let mut params: Vec<(&str, &str)> = fields
            .keys()
            .map(|path| ("updateMask.fieldPaths", path.as_str()))
            .collect();
        params.push(("currentDocument.exists", "true"));

        let response = self
            .client
            .patch(self.document_url(collection, id))
            .bearer_auth(token)
            .query(&params)
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await
            .map_err(|e| IntakeError::Store(format!("PATCH request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(IntakeError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(IntakeError::Store(format!(
                    "Update of {}/{} failed ({}): {}",
                    collection, id, status, body
                )))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<RawDocument>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    /// `projects/{p}/databases/{d}/documents/{collection}/{id}`
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RawDocument {
    fn into_document(self) -> IntakeResult<Document> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| IntakeError::Decode(format!("Invalid document name: {}", self.name)))?
            .to_string();
        Ok(Document::new(id, decode_fields(&self.fields)?))
    }
}

/// Undecodable documents are dropped with a warning so they cannot block the rest.
fn documents_from_items(items: Vec<RunQueryItem>) -> Vec<Document> {
    items
        .into_iter()
        .filter_map(|item| item.document)
        .filter_map(|raw| {
            let name = raw.name.clone();
            match raw.into_document() {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!(document = %name, error = %e, "Skipping undecodable document");
                    None
                }
            }
        })
        .collect()
}

fn run_query_body(collection: &str, filter: &FieldFilter) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": filter.field_path },
                    "op": "EQUAL",
                    "value": encode_value(&filter.value),
                }
            }
        }
    })
}

/// Encode a value in Firestore's tagged JSON form
pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
        }
        FieldValue::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

pub fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Decode Firestore's tagged JSON form
///
/// References and bytes decode to strings, geo points to a
/// `latitude`/`longitude` map.
pub fn decode_value(value: &Value) -> IntakeResult<FieldValue> {
    let object = value
        .as_object()
        .ok_or_else(|| IntakeError::Decode(format!("Expected a tagged value, got {}", value)))?;
    let (tag, inner) = object
        .iter()
        .next()
        .ok_or_else(|| IntakeError::Decode("Empty value object".to_string()))?;

    let decoded = match tag.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Bool(inner.as_bool().ok_or_else(|| invalid(tag, inner))?),
        "integerValue" => FieldValue::Integer(match inner {
            Value::String(s) => s.parse().map_err(|_| invalid(tag, inner))?,
            other => other.as_i64().ok_or_else(|| invalid(tag, inner))?,
        }),
        "doubleValue" => FieldValue::Double(match inner {
            Value::String(s) => s.parse().map_err(|_| invalid(tag, inner))?,
            other => other.as_f64().ok_or_else(|| invalid(tag, inner))?,
        }),
        "stringValue" | "referenceValue" | "bytesValue" => FieldValue::String(
            inner
                .as_str()
                .ok_or_else(|| invalid(tag, inner))?
                .to_string(),
        ),
        "timestampValue" => {
            let raw = inner.as_str().ok_or_else(|| invalid(tag, inner))?;
            let ts = DateTime::parse_from_rfc3339(raw).map_err(|_| invalid(tag, inner))?;
            FieldValue::Timestamp(ts.with_timezone(&Utc))
        }
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values
                    .iter()
                    .map(decode_value)
                    .collect::<IntakeResult<Vec<_>>>()?,
                Some(_) => return Err(invalid(tag, inner)),
                None => Vec::new(),
            };
            FieldValue::Array(values)
        }
        "mapValue" => {
            let fields = match inner.get("fields") {
                Some(Value::Object(fields)) => decode_fields(fields)?,
                Some(_) => return Err(invalid(tag, inner)),
                None => Fields::new(),
            };
            FieldValue::Map(fields)
        }
        "geoPointValue" => {
            let mut point = Fields::new();
            for axis in ["latitude", "longitude"] {
                let coordinate = inner.get(axis).and_then(Value::as_f64).unwrap_or_default();
                point.insert(axis.to_string(), FieldValue::Double(coordinate));
            }
            FieldValue::Map(point)
        }
        other => {
            return Err(IntakeError::Decode(format!("Unknown value type: {}", other)));
        }
    };
    Ok(decoded)
}

pub fn decode_fields(fields: &Map<String, Value>) -> IntakeResult<Fields> {
    fields
        .iter()
        .map(|(key, value)| Ok::<_, IntakeError>((key.clone(), decode_value(value)?)))
        .collect()
}

fn invalid(tag: &str, inner: &Value) -> IntakeError {
    IntakeError::Decode(format!("Invalid {}: {}", tag, inner))
}
