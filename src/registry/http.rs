//! Confluent-compatible REST adapter

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BearerTokenProvider, Lookup, RegistryClient, RegistryError, SchemaId};
use crate::config::RegistrySettings;
use crate::schema::ParsedSchema;
use crate::subject::Subject;

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";
const GROUP_HEADER: &str = "X-Registry-GroupId";

/// Error codes meaning "absent", as opposed to a failed request
const SUBJECT_NOT_FOUND: u32 = 40401;
const SCHEMA_NOT_FOUND: u32 = 40403;

#[derive(Debug, Serialize)]
struct SchemaRequest<'a> {
    schema: &'a str,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: SchemaId,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error_code: u32,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for a Confluent-compatible schema registry
#[derive(Debug)]
pub struct HttpRegistryClient {
    base_url: Url,
    group: Option<String>,
    auth: Option<BearerTokenProvider>,
    http: Client,
}

impl HttpRegistryClient {
    /// Build a client from validated settings
    pub fn new(settings: &RegistrySettings) -> Result<Self, RegistryError> {
        let base_url = parse_base_url(&settings.url)?;
        let http = http_client(&settings.url, settings.timeout)?;
        let auth = BearerTokenProvider::new(
            settings.bearer.issuer_endpoint_url.clone(),
            settings.bearer.client_id.clone(),
            settings.bearer.client_secret.clone(),
            settings.bearer.scope.clone(),
            http.clone(),
        );

        Ok(Self {
            base_url,
            group: settings.group.clone(),
            auth: Some(auth),
            http,
        })
    }

    /// Client without bearer authentication or group header
    pub fn unauthenticated(url: &str, timeout: Duration) -> Result<Self, RegistryError> {
        Ok(Self {
            base_url: parse_base_url(url)?,
            group: None,
            auth: None,
            http: http_client(url, timeout)?,
        })
    }

    /// Send the group header with every request
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// `{base}/subjects/{subject}[/{tail}...]` with the subject percent-encoded
    fn subject_url(&self, subject: &Subject, tail: &[&str]) -> Result<Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("subjects")
            .push(subject.as_str())
            .extend(tail);
        Ok(url)
    }

    fn post(&self, url: &Url, schema: &ParsedSchema) -> Result<(StatusCode, String), RegistryError> {
        let body = serde_json::to_string(&SchemaRequest {
            schema: schema.schema_text(),
        })
        .map_err(|e| RegistryError::Decode(format!("Failed to encode request: {}", e)))?;

        let mut request: RequestBuilder = self
            .http
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body);

        if let Some(group) = &self.group {
            request = request.header(GROUP_HEADER, group);
        }
        if let Some(auth) = &self.auth {
            request = request.bearer_auth(auth.token()?);
        }

        let response = request.send().map_err(|e| RegistryError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().map_err(|e| RegistryError::Http {
            url: url.to_string(),
            message: format!("Failed to read response body: {}", e),
        })?;

        tracing::debug!(url = %url, status = status.as_u16(), "Registry response");
        Ok((status, body))
    }
}

impl RegistryClient for HttpRegistryClient {
    fn lookup(&self, subject: &Subject, schema: &ParsedSchema) -> Result<Lookup, RegistryError> {
        let url = self.subject_url(subject, &[])?;
        let (status, body) = self.post(&url, schema)?;
        interpret_lookup(url.as_str(), status, &body)
    }

    fn register(&self, subject: &Subject, schema: &ParsedSchema) -> Result<SchemaId, RegistryError> {
        let url = self.subject_url(subject, &["versions"])?;
        let (status, body) = self.post(&url, schema)?;
        if !status.is_success() {
            return Err(status_error(url.as_str(), status, body));
        }
        parse_id(&body)
    }
}

fn parse_base_url(url: &str) -> Result<Url, RegistryError> {
    match Url::parse(url) {
        Ok(parsed) if !parsed.cannot_be_a_base() => Ok(parsed),
        _ => Err(RegistryError::InvalidUrl(url.to_string())),
    }
}

fn http_client(url: &str, timeout: Duration) -> Result<Client, RegistryError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RegistryError::Http {
            url: url.to_string(),
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// 404 counts as absent only when the registry says so with its own error code.
fn interpret_lookup(url: &str, status: StatusCode, body: &str) -> Result<Lookup, RegistryError> {
    if status.is_success() {
        return parse_id(body).map(Lookup::Found);
    }

    if status == StatusCode::NOT_FOUND {
        if let Ok(error) = serde_json::from_str::<ErrorResponse>(body) {
            if matches!(error.error_code, SUBJECT_NOT_FOUND | SCHEMA_NOT_FOUND) {
                tracing::debug!(
                    url,
                    error_code = error.error_code,
                    message = error.message.as_deref().unwrap_or(""),
                    "Schema not registered"
                );
                return Ok(Lookup::NotFound);
            }
        }
    }

    Err(status_error(url, status, body.to_string()))
}

fn parse_id(body: &str) -> Result<SchemaId, RegistryError> {
    serde_json::from_str::<IdResponse>(body)
        .map(|response| response.id)
        .map_err(|e| RegistryError::Decode(format!("{}: {}", e, body)))
}

fn status_error(url: &str, status: StatusCode, body: String) -> RegistryError {
    RegistryError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BearerSettings;
    use crate::registry::testing::serve;

    fn schema() -> ParsedSchema {
        ParsedSchema::parse(r#"{"type":"record","name":"Order","namespace":"com.example","fields":[]}"#)
            .unwrap()
    }

    #[test]
    fn test_lookup_found() {
        let result = interpret_lookup(
            "http://sr/subjects/orders-value",
            StatusCode::OK,
            r#"{"subject":"orders-value","id":7,"version":1,"schema":"\"string\""}"#,
        );
        assert_eq!(result, Ok(Lookup::Found(7)));
    }

    #[test]
    fn test_lookup_not_found_codes() {
        for code in [40401, 40403] {
            let body = format!(r#"{{"error_code":{},"message":"not found"}}"#, code);
            let result = interpret_lookup("http://sr/subjects/x", StatusCode::NOT_FOUND, &body);
            assert_eq!(result, Ok(Lookup::NotFound));
        }
    }

    #[test]
    fn test_bare_404_is_not_absence() {
        let result = interpret_lookup("http://sr/wrong/path", StatusCode::NOT_FOUND, "<html>nope</html>");
        assert!(matches!(result, Err(RegistryError::Status { status: 404, .. })));
    }

    #[test]
    fn test_auth_failure_is_transport_error() {
        let result = interpret_lookup(
            "http://sr/subjects/x",
            StatusCode::UNAUTHORIZED,
            r#"{"error_code":40101,"message":"unauthorized"}"#,
        );
        assert!(matches!(result, Err(RegistryError::Status { status: 401, .. })));
    }

    #[test]
    fn test_subject_url_encodes_subject() {
        let client =
            HttpRegistryClient::unauthenticated("http://localhost:8081/apis/ccompat/v7/", Duration::from_secs(1))
                .unwrap();
        let url = client
            .subject_url(&Subject::new("orders/com.example.Order"), &["versions"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8081/apis/ccompat/v7/subjects/orders%2Fcom.example.Order/versions"
        );
    }

    #[test]
    fn test_invalid_url() {
        let result = HttpRegistryClient::unauthenticated("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(RegistryError::InvalidUrl(_))));
    }

    #[test]
    fn test_lookup_then_register_over_http() {
        let (base, server) = serve(vec![
            (404, r#"{"error_code":40403,"message":"Schema not found"}"#),
            (200, r#"{"id":42}"#),
        ]);
        let client = HttpRegistryClient::unauthenticated(&base, Duration::from_secs(5))
            .unwrap()
            .with_group("dev");
        let subject = Subject::new("orders-com.example.Order");

        assert_eq!(client.lookup(&subject, &schema()), Ok(Lookup::NotFound));
        assert_eq!(client.register(&subject, &schema()), Ok(42));

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("POST /subjects/orders-com.example.Order HTTP/1.1"));
        assert!(requests[1].starts_with("POST /subjects/orders-com.example.Order/versions HTTP/1.1"));
        let first = requests[0].to_ascii_lowercase();
        assert!(first.contains("x-registry-groupid: dev"));
        assert!(first.contains("application/vnd.schemaregistry.v1+json"));
        assert!(requests[0].contains("com.example"));
    }

    #[test]
    fn test_bearer_token_sent() {
        let (base, server) = serve(vec![
            (200, r#"{"access_token":"tok-1","expires_in":300}"#),
            (200, r#"{"subject":"s","id":3,"version":1,"schema":"{}"}"#),
        ]);
        let settings = RegistrySettings {
            url: base.clone(),
            group: None,
            bearer: BearerSettings {
                issuer_endpoint_url: format!("{}/token", base),
                client_id: "migrator".to_string(),
                client_secret: "secret".to_string(),
                scope: None,
            },
            timeout: Duration::from_secs(5),
            cache_capacity: 16,
        };
        let client = HttpRegistryClient::new(&settings).unwrap();

        assert_eq!(client.lookup(&Subject::new("s"), &schema()), Ok(Lookup::Found(3)));

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("POST /token"));
        assert!(requests[1].to_ascii_lowercase().contains("authorization: bearer tok-1"));
    }
}
