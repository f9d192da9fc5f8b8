//! Odoo JSON-2 backend over HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::error::LedgerError;
use crate::{Domain, LedgerBackend, Record, RecordId, Result};

/// Backend calling `POST {url}/json/2/{model}/{method}`.
pub struct Json2Backend {
    base_url: String,
    database: String,
    api_key: String,
    http_client: reqwest::Client,
}

/// Subset of the user context returned by `res.users/context_get`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserContext {
    /// Logged-in user id; `false` when the key is not bound to a user.
    #[serde(default)]
    pub uid: Value,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl Json2Backend {
    /// Create a backend for the server at `url` (without the `/json/2` suffix).
    pub fn new(url: &str, database: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: format!("{}/json/2", url.trim_end_matches('/')),
            database: database.to_string(),
            api_key: api_key.to_string(),
            http_client,
        })
    }

    /// Validate API access.
    ///
    /// JSON-2 has no login step, so access is verified by fetching the
    /// context of the user the key belongs to.
    pub async fn connect(&self) -> Result<UserContext> {
        let value = self.call("res.users", "context_get", json!({})).await?;
        let context: UserContext = serde_json::from_value(value)?;

        match context.uid {
            Value::Number(_) => Ok(context),
            _ => Err(LedgerError::Authentication(
                "no user bound to API key".to_string(),
            )),
        }
    }

    async fn call(&self, model: &str, method: &str, payload: Value) -> Result<Value> {
        let url = format!("{}/{}/{}", self.base_url, model, method);
        trace!("POST {} {}", url, payload);

        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Odoo-Database", &self.database)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(LedgerError::Authentication(format!("HTTP {}: {}", status, error_message(&body))));
            }
            return Err(LedgerError::remote(
                model,
                method,
                format!("HTTP {}: {}", status, error_message(&body)),
            ));
        }

        let data: Value = resp.json().await?;
        if let Some(error) = data.as_object().and_then(|o| o.get("error")) {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(LedgerError::remote(model, method, message));
        }

        debug!("{}.{} ok", model, method);
        Ok(data)
    }
}

#[async_trait]
impl LedgerBackend for Json2Backend {
    async fn search(&self, model: &str, domain: &Domain, limit: Option<usize>) -> Result<Vec<RecordId>> {
        let mut payload = json!({ "domain": domain });
        if let Some(limit) = limit {
            payload["limit"] = json!(limit);
        }

        let value = self.call(model, "search", payload).await?;
        serde_json::from_value(value).map_err(|e| LedgerError::unexpected(model, "search", e.to_string()))
    }

    async fn read(&self, model: &str, ids: &[RecordId], fields: &[&str]) -> Result<Vec<Record>> {
        let value = self
            .call(model, "read", json!({ "ids": ids, "fields": fields }))
            .await?;
        serde_json::from_value(value).map_err(|e| LedgerError::unexpected(model, "read", e.to_string()))
    }

    async fn create(&self, model: &str, values: Record) -> Result<RecordId> {
        let value = self
            .call(model, "create", json!({ "vals_list": [values] }))
            .await?;

        // create returns the list of new ids
        let ids: Vec<RecordId> = serde_json::from_value(value)
            .map_err(|e| LedgerError::unexpected(model, "create", e.to_string()))?;
        ids.first()
            .copied()
            .ok_or_else(|| LedgerError::unexpected(model, "create", "empty id list"))
    }

    async fn action(&self, model: &str, method: &str, ids: &[RecordId], kwargs: Record) -> Result<Value> {
        let mut payload = kwargs;
        payload.insert("ids".to_string(), json!(ids));
        self.call(model, method, Value::Object(payload)).await
    }

    fn name(&self) -> &'static str {
        "json2"
    }
}

/// Pull the human-readable message out of an error body, falling back to the
/// raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { message: Some(message), .. }) => message,
        Ok(ErrorBody { name: Some(name), .. }) => name,
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// What the server saw of one request.
    struct Received {
        request_line: String,
        headers: Vec<(String, String)>,
        body: Value,
    }

    impl Received {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Answer exactly one request on a local port with a canned response.
    async fn serve_once(status: u16, canned: &'static str) -> (Json2Backend, JoinHandle<Received>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
            let mut lines = head.split("\r\n").filter(|l| !l.is_empty());
            let request_line = lines.next().unwrap_or_default().to_string();
            let headers: Vec<(String, String)> = lines
                .filter_map(|l| l.split_once(':'))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect();
            let length: usize = headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(0);

            while buf.len() < header_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before body");
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = serde_json::from_slice(&buf[header_end..header_end + length]).unwrap_or(Value::Null);

            let reply = format!(
                "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                canned.len(),
                canned
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            Received {
                request_line,
                headers,
                body,
            }
        });

        let backend = Json2Backend::new(&url, "prod", "secret", Duration::from_secs(5)).unwrap();
        (backend, handle)
    }

    #[test]
    fn test_base_url_normalization() {
        let backend = Json2Backend::new("https://erp.example.com/", "prod", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.base_url, "https://erp.example.com/json/2");
    }

    #[test]
    fn test_error_message_prefers_server_message() {
        let body = r#"{"name": "odoo.exceptions.AccessError", "message": "You are not allowed to access 'Journal Entry'"}"#;
        assert_eq!(error_message(body), "You are not allowed to access 'Journal Entry'");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_create_sends_vals_list() {
        let (backend, server) = serve_once(200, "[42]").await;

        let mut values = Record::new();
        values.insert("name".to_string(), json!("Acme Food BV"));
        let id = backend.create("res.partner", values).await.unwrap();
        assert_eq!(id, 42);

        let received = server.await.unwrap();
        assert_eq!(received.request_line, "POST /json/2/res.partner/create HTTP/1.1");
        assert_eq!(received.header("authorization"), Some("Bearer secret"));
        assert_eq!(received.header("x-odoo-database"), Some("prod"));
        assert_eq!(received.body, json!({ "vals_list": [{ "name": "Acme Food BV" }] }));
    }

    #[tokio::test]
    async fn test_create_with_empty_id_list() {
        let (backend, _server) = serve_once(200, "[]").await;
        let err = backend.create("res.partner", Record::new()).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnexpectedResponse { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_search_sends_domain_and_limit() {
        let (backend, server) = serve_once(200, "[3, 5]").await;

        let domain = Domain::new().field_eq("vat", "BE0477472701");
        let ids = backend.search("res.partner", &domain, Some(1)).await.unwrap();
        assert_eq!(ids, vec![3, 5]);

        let received = server.await.unwrap();
        assert_eq!(received.request_line, "POST /json/2/res.partner/search HTTP/1.1");
        assert_eq!(received.body["domain"], serde_json::to_value(&domain).unwrap());
        assert_eq!(received.body["limit"], 1);
    }

    #[tokio::test]
    async fn test_read_sends_ids_and_fields() {
        let (backend, server) = serve_once(200, r#"[{"id": 7, "state": "posted"}]"#).await;

        let records = backend.read("account.move", &[7], &["state"]).await.unwrap();
        assert_eq!(records[0]["state"], "posted");

        let received = server.await.unwrap();
        assert_eq!(received.body, json!({ "ids": [7], "fields": ["state"] }));
    }

    #[tokio::test]
    async fn test_action_merges_ids_into_kwargs() {
        let (backend, server) = serve_once(200, "true").await;

        let mut kwargs = Record::new();
        kwargs.insert("context".to_string(), json!({ "lang": "nl_BE" }));
        let value = backend.action("account.move", "action_post", &[9], kwargs).await.unwrap();
        assert_eq!(value, json!(true));

        let received = server.await.unwrap();
        assert_eq!(received.request_line, "POST /json/2/account.move/action_post HTTP/1.1");
        assert_eq!(received.body, json!({ "ids": [9], "context": { "lang": "nl_BE" } }));
    }

    #[tokio::test]
    async fn test_error_key_is_a_remote_failure() {
        let (backend, _server) = serve_once(200, r#"{"error": "Record does not exist"}"#).await;

        let err = backend.action("account.move", "action_post", &[1], Record::new()).await.unwrap_err();
        match err {
            LedgerError::Remote { model, method, message } => {
                assert_eq!(model, "account.move");
                assert_eq!(method, "action_post");
                assert_eq!(message, "Record does not exist");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_carries_message() {
        let (backend, _server) = serve_once(422, r#"{"name": "odoo.exceptions.UserError", "message": "Missing journal"}"#).await;

        let err = backend.search("account.journal", &Domain::new(), None).await.unwrap_err();
        assert!(matches!(err, LedgerError::Remote { .. }));
        assert!(err.to_string().contains("Missing journal"), "{}", err);
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        let (backend, _server) = serve_once(401, r#"{"message": "Invalid apikey"}"#).await;

        let err = backend.connect().await.unwrap_err();
        assert!(matches!(err, LedgerError::Authentication(ref m) if m.contains("Invalid apikey")), "{:?}", err);
    }

    #[tokio::test]
    async fn test_connect_requires_uid() {
        let (backend, server) = serve_once(200, r#"{"uid": 2, "lang": "nl_BE"}"#).await;
        let user = backend.connect().await.unwrap();
        assert_eq!(user.uid, json!(2));
        assert_eq!(user.lang.as_deref(), Some("nl_BE"));
        assert_eq!(server.await.unwrap().request_line, "POST /json/2/res.users/context_get HTTP/1.1");

        let (backend, _server) = serve_once(200, r#"{"uid": false}"#).await;
        assert!(matches!(backend.connect().await, Err(LedgerError::Authentication(_))));
    }
}
