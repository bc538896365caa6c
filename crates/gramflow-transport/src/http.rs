//! [`Session`] implementation over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use tracing::{debug, trace};

use gramflow_core::{
    ApiError, ApiResult, ContentStream, Session, TelegramApiServer, TelegramMethod,
    decode_response,
};

/// Default timeout for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP session: each method call is a JSON `POST` to
/// `{base}/bot{token}/{method}`.
///
/// # Example
///
/// ```rust,ignore
/// let session = Arc::new(HttpSession::new()?);
/// let bot = Bot::new(token, session)?;
/// ```
pub struct HttpSession {
    client: Client,
    api: TelegramApiServer,
    timeout: Duration,
}

impl HttpSession {
    /// Creates a session against the public Bot API server.
    pub fn new() -> ApiResult<Self> {
        Self::with_api(TelegramApiServer::default(), DEFAULT_TIMEOUT)
    }

    /// Creates a session against `api` with a default request timeout.
    pub fn with_api(api: TelegramApiServer, timeout: Duration) -> ApiResult<Self> {
        let client = ClientBuilder::new()
            .build()
            .map_err(|e| ApiError::network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api,
            timeout,
        })
    }

    /// The default request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::network(err.to_string())
    }
}

#[async_trait]
impl Session for HttpSession {
    fn api(&self) -> &TelegramApiServer {
        &self.api
    }

    async fn make_request(
        &self,
        token: &str,
        method: &TelegramMethod,
        timeout: Option<Duration>,
    ) -> ApiResult<Value> {
        let url = self.api.api_url(token, &method.name);
        trace!(method = %method.name, "Sending Bot API request");

        // Error responses carry a JSON envelope too, so the status code is
        // not checked before decoding.
        let resp = self
            .client
            .post(&url)
            .json(&method.params)
            .timeout(timeout.unwrap_or(self.timeout))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(map_reqwest_error)?;

        let result = decode_response::<Value>(&body);
        if let Err(e) = &result {
            debug!(method = %method.name, status = status.as_u16(), error = %e, "Bot API request failed");
        }
        result
    }

    async fn stream_content(
        &self,
        url: &str,
        timeout: Duration,
        chunk_size: usize,
    ) -> ApiResult<ContentStream> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::from_code(
                i32::from(status.as_u16()),
                format!("download failed with HTTP {}", status.as_u16()),
            ));
        }

        let chunk_size = chunk_size.max(1);
        let stream = futures::stream::try_unfold(resp, |mut resp| async move {
            let next = resp.chunk().await.map_err(map_reqwest_error)?;
            Ok::<_, ApiError>(next.map(|bytes| (bytes, resp)))
        })
        .map_ok(move |bytes| {
            let pieces: Vec<ApiResult<Vec<u8>>> =
                bytes.chunks(chunk_size).map(|c| Ok(c.to_vec())).collect();
            futures::stream::iter(pieces)
        })
        .try_flatten()
        .boxed();
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single canned HTTP response and returns the base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_make_request_ok() {
        let base = serve_once("200 OK", r#"{"ok":true,"result":{"id":1,"is_bot":true,"first_name":"B"}}"#).await;
        let session = HttpSession::with_api(TelegramApiServer::new(base), DEFAULT_TIMEOUT).unwrap();
        let value = session
            .make_request("1:x", &TelegramMethod::get_me(), None)
            .await
            .unwrap();
        assert_eq!(value["first_name"], "B");
    }

    #[tokio::test]
    async fn test_make_request_error_envelope() {
        let base = serve_once(
            "403 Forbidden",
            r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#,
        )
        .await;
        let session = HttpSession::with_api(TelegramApiServer::new(base), DEFAULT_TIMEOUT).unwrap();
        let err = session
            .make_request("1:x", &TelegramMethod::send_message(5, "hi"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_stream_content_chunks() {
        let base = serve_once("200 OK", "abcdefghij").await;
        let session = HttpSession::with_api(TelegramApiServer::new(base.clone()), DEFAULT_TIMEOUT).unwrap();
        let chunks: Vec<Vec<u8>> = session
            .stream_content(&format!("{base}/file"), Duration::from_secs(5), 4)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(chunks.iter().all(|c| c.len() <= 4));
        assert_eq!(chunks.concat(), b"abcdefghij");
    }
}
