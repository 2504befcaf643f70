use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the manufacturing data backend
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

impl ApiClient {
  pub fn new(base_url: &str) -> Result<Self> {
    // Without the trailing slash `join` would replace the last segment
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    let base =
      Url::parse(&normalized).map_err(|e| eyre!("Invalid server URL {}: {}", base_url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Invalid server URL {}: not a base URL", base_url));
    }

    let http = reqwest::Client::builder()
      .connect_timeout(CONNECT_TIMEOUT)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// Host and port, for display
  pub fn host(&self) -> String {
    match (self.base.host_str(), self.base.port()) {
      (Some(host), Some(port)) => format!("{}:{}", host, port),
      (Some(host), None) => host.to_string(),
      _ => self.base.to_string(),
    }
  }

  /// Collection endpoint, e.g. `tools` -> `<base>/tools/`
  pub fn endpoint(&self, resource: &str) -> Result<Url> {
    self
      .base
      .join(&format!("{}/", resource.trim_matches('/')))
      .map_err(|e| eyre!("Invalid resource {}: {}", resource, e))
  }

  /// Item endpoint, e.g. `tools`, 7 -> `<base>/tools/7/`
  pub fn item_endpoint(&self, resource: &str, id: &Value) -> Result<Url> {
    let id = match id {
      Value::String(s) if !s.is_empty() => s.clone(),
      Value::Number(n) => n.to_string(),
      other => return Err(eyre!("Invalid {} id: {}", resource, other)),
    };
    self
      .base
      .join(&format!("{}/{}/", resource.trim_matches('/'), id))
      .map_err(|e| eyre!("Invalid resource {}: {}", resource, e))
  }

  /// List a collection, optionally filtered by query parameters.
  ///
  /// Returns the decoded body as is: either an array or a paginated object.
  pub async fn list(&self, resource: &str, params: Option<&Value>) -> Result<Value> {
    let mut url = self.endpoint(resource)?;
    let pairs = params.map(query_pairs).unwrap_or_default();
    if !pairs.is_empty() {
      url.query_pairs_mut().extend_pairs(pairs);
    }

    debug!(%url, "GET");
    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", resource, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("Failed to fetch {}: server returned {}", resource, status));
    }

    response
      .json::<Value>()
      .await
      .map_err(|e| eyre!("Failed to parse {} response: {}", resource, e))
  }

  /// Delete one record
  pub async fn delete(&self, resource: &str, id: &Value) -> Result<()> {
    let url = self.item_endpoint(resource, id)?;

    debug!(%url, "DELETE");
    let response = self
      .http
      .delete(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete {} {}: {}", resource, id, e))?;

    match response.status() {
      status if status.is_success() => Ok(()),
      StatusCode::NOT_FOUND => Err(eyre!("{} {} no longer exists", resource, id)),
      status => Err(eyre!("Failed to delete {} {}: server returned {}", resource, id, status)),
    }
  }
}

/// Flatten an object of parameters into query pairs.
///
/// Nulls are skipped, strings are sent verbatim and arrays repeat the key.
pub fn query_pairs(params: &Value) -> Vec<(String, String)> {
  let Value::Object(map) = params else {
    return Vec::new();
  };

  let mut pairs = Vec::new();
  for (key, value) in map {
    match value {
      Value::Null => {}
      Value::Array(items) => pairs.extend(
        items
          .iter()
          .filter(|v| !v.is_null())
          .map(|v| (key.clone(), query_value(v))),
      ),
      other => pairs.push((key.clone(), query_value(other))),
    }
  }
  pairs
}

fn query_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::sync::oneshot;

  /// Serve one canned HTTP response and report the request line.
  async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut buf = vec![0u8; 4096];
      let n = socket.read(&mut buf).await.unwrap();
      let request = String::from_utf8_lossy(&buf[..n]).to_string();
      let line = request.lines().next().unwrap_or_default().to_string();
      let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
      );
      socket.write_all(response.as_bytes()).await.unwrap();
      let _ = tx.send(line);
    });

    (format!("http://{}/api", addr), rx)
  }

  #[test]
  fn test_endpoints() {
    let client = ApiClient::new("http://127.0.0.1:8000/api").unwrap();
    assert_eq!(client.endpoint("tools").unwrap().as_str(), "http://127.0.0.1:8000/api/tools/");
    assert_eq!(
      client.item_endpoint("composite-materials", &json!(7)).unwrap().as_str(),
      "http://127.0.0.1:8000/api/composite-materials/7/"
    );
    assert_eq!(client.host(), "127.0.0.1:8000");
  }

  #[test]
  fn test_trailing_slash_is_normalized() {
    let client = ApiClient::new("http://factory.local/api/").unwrap();
    assert_eq!(client.endpoint("users").unwrap().as_str(), "http://factory.local/api/users/");
    assert_eq!(client.host(), "factory.local");
  }

  #[test]
  fn test_rejects_invalid_urls() {
    assert!(ApiClient::new("not a url").is_err());
    assert!(ApiClient::new("mailto:ops@factory.local").is_err());
    let client = ApiClient::new("http://factory.local/api").unwrap();
    assert!(client.item_endpoint("tools", &Value::Null).is_err());
  }

  #[test]
  fn test_query_pairs() {
    let pairs = query_pairs(&json!({
      "status": "running",
      "page": 2,
      "skip": null,
      "tag": ["a", "b"]
    }));
    assert_eq!(
      pairs,
      vec![
        ("page".to_string(), "2".to_string()),
        ("status".to_string(), "running".to_string()),
        ("tag".to_string(), "a".to_string()),
        ("tag".to_string(), "b".to_string()),
      ]
    );
    assert!(query_pairs(&json!([1, 2])).is_empty());
  }

  #[tokio::test]
  async fn test_list_sends_params() {
    let (base, request) = serve_once("200 OK", r#"[{"id": 1}]"#).await;
    let client = ApiClient::new(&base).unwrap();

    let value = client
      .list("sensor-data", Some(&json!({"task": 3})))
      .await
      .unwrap();

    assert_eq!(value, json!([{"id": 1}]));
    assert_eq!(request.await.unwrap(), "GET /api/sensor-data/?task=3 HTTP/1.1");
  }

  #[tokio::test]
  async fn test_list_reports_server_errors() {
    let (base, _request) = serve_once("500 Internal Server Error", "{}").await;
    let client = ApiClient::new(&base).unwrap();

    let err = client.list("tools", None).await.unwrap_err();
    assert!(err.to_string().contains("500"));
  }

  #[tokio::test]
  async fn test_delete() {
    let (base, request) = serve_once("204 No Content", "").await;
    let client = ApiClient::new(&base).unwrap();

    client.delete("tools", &json!(4)).await.unwrap();
    assert_eq!(request.await.unwrap(), "DELETE /api/tools/4/ HTTP/1.1");
  }
}
