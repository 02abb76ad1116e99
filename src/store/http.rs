use super::config::StoreConfig;
use super::{CatalogStore, Collection, Payload, UPLOAD_FIELD, records_from_json, routes};
use crate::core::{RemoteId, StoreError, StoreResult};
use crate::model::Record;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value as JsonValue;
use tracing::{Level, event};

/// `CatalogStore` backed by the catalog HTTP API.
///
/// Plain fields go out form-encoded; anything carrying an upload goes out as
/// multipart with the file under [`UPLOAD_FIELD`].
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    config: StoreConfig,
}

impl HttpStore {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate().map_err(StoreError::Config)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| StoreError::Config("token is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| StoreError::Config(err.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.config.url_for(path))
    }

    async fn with_body(&self, request: RequestBuilder, payload: &Payload) -> StoreResult<RequestBuilder> {
        let Some(upload) = &payload.upload else {
            return Ok(request.form(&payload.form_pairs()));
        };

        let data = if upload.data.is_empty() {
            match &upload.source {
                Some(path) => tokio::fs::read(path).await.map_err(|err| {
                    StoreError::Transport(format!("cannot read upload {}: {}", path.display(), err))
                })?,
                None => Vec::new(),
            }
        } else {
            upload.data.clone()
        };

        let part = Part::bytes(data)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)?;
        let form = payload
            .form_pairs()
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value))
            .part(UPLOAD_FIELD, part);
        Ok(request.multipart(form))
    }

    /// Sends a request and decodes its JSON body, if any.
    async fn send(&self, request: RequestBuilder, what: &str) -> StoreResult<Option<JsonValue>> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            event!(Level::WARN, resource = what, "not found");
            return Err(StoreError::NotFound(what.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            event!(Level::WARN, resource = what, status = status.as_u16(), error = %message, "request rejected");
            return Err(StoreError::rejected(status.as_u16(), message));
        }

        let bytes = response.bytes().await?;
        if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn send_record(&self, request: RequestBuilder, what: &str) -> StoreResult<Record> {
        match self.send(request, what).await? {
            Some(JsonValue::Object(record)) => Ok(record),
            Some(_) => Err(StoreError::decode(format!("{} did not return an object", what))),
            None => Err(StoreError::decode(format!("{} returned an empty body", what))),
        }
    }
}

/// Picks the human-readable message out of an error body.
///
/// Looks at `detail`, `message` and `error` first; per-field error maps are
/// flattened into `field: message` pairs.
pub fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let json: JsonValue = match serde_json::from_str(trimmed) {
        Ok(json) => json,
        Err(_) => return Some(trimmed.chars().take(200).collect()),
    };

    let object = json.as_object()?;
    for key in ["detail", "message", "error"] {
        if let Some(message) = object.get(key).and_then(JsonValue::as_str) {
            return Some(message.to_string());
        }
    }

    let parts: Vec<String> = object
        .iter()
        .map(|(field, value)| match value {
            JsonValue::Array(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            }
            JsonValue::String(message) => format!("{}: {}", field, message),
            other => format!("{}: {}", field, other),
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

#[async_trait]
impl CatalogStore for HttpStore {
    async fn fetch(&self, collection: Collection, id: RemoteId) -> StoreResult<Record> {
        let path = routes::item_path(collection, id);
        event!(Level::DEBUG, method = "GET", path = %path);
        self.send_record(self.request(Method::GET, &path), &path).await
    }

    async fn list(&self, collection: Collection, parent: Option<RemoteId>) -> StoreResult<Vec<Record>> {
        let path = routes::list_path(collection, parent, self.config.page_size)?;
        let mut url = self.config.url_for(&path);
        let mut records = Vec::new();

        for page in 1..=self.config.max_pages {
            event!(Level::DEBUG, method = "GET", url = %url, page);
            let body = self
                .send(self.client.get(&url), &path)
                .await?
                .unwrap_or(JsonValue::Array(Vec::new()));
            let (items, next) = records_from_json(body)?;
            records.extend(items);

            match next {
                Some(next) if page < self.config.max_pages => url = next,
                Some(_) => {
                    event!(
                        Level::WARN,
                        collection = %collection,
                        max_pages = self.config.max_pages,
                        "stopped following pages"
                    );
                    break;
                }
                None => break,
            }
        }

        Ok(records)
    }

    async fn create(&self, collection: Collection, parent: Option<RemoteId>, payload: &Payload) -> StoreResult<Record> {
        let path = routes::create_path(collection, parent)?;
        event!(
            Level::DEBUG,
            method = "POST",
            path = %path,
            multipart = payload.upload.is_some()
        );
        let request = self.with_body(self.request(Method::POST, &path), payload).await?;
        self.send_record(request, &path).await
    }

    async fn update(&self, collection: Collection, id: RemoteId, payload: &Payload) -> StoreResult<Record> {
        let path = routes::item_path(collection, id);
        event!(
            Level::DEBUG,
            method = "PATCH",
            path = %path,
            fields = ?payload.field_names()
        );
        let request = self.with_body(self.request(Method::PATCH, &path), payload).await?;
        self.send_record(request, &path).await
    }

    async fn delete(&self, collection: Collection, id: RemoteId) -> StoreResult<()> {
        let path = routes::item_path(collection, id);
        event!(Level::DEBUG, method = "DELETE", path = %path);
        self.send(self.request(Method::DELETE, &path), &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_keys() {
        assert_eq!(error_message(r#"{"detail": "Not allowed"}"#).as_deref(), Some("Not allowed"));
        assert_eq!(error_message(r#"{"message": "bad"}"#).as_deref(), Some("bad"));
        assert_eq!(error_message(r#"{"error": "boom"}"#).as_deref(), Some("boom"));
    }

    #[test]
    fn test_error_message_field_map() {
        let message = error_message(r#"{"hex": ["Invalid color"], "stock": "must be >= 0"}"#).unwrap();
        assert!(message.contains("hex: Invalid color"));
        assert!(message.contains("stock: must be >= 0"));
    }

    #[test]
    fn test_error_message_plain_text() {
        assert_eq!(error_message("  ").as_deref(), None);
        assert_eq!(error_message("Bad Gateway").as_deref(), Some("Bad Gateway"));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = HttpStore::new(StoreConfig::new("not-a-url")).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        assert!(HttpStore::new(StoreConfig::new("http://127.0.0.1:1").token("t")).is_ok());
    }
}
