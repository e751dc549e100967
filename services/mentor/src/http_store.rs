use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use mentor_core::{
    ConversationUsageRecord, HistoryStore, HistoryUpdate, TranscriptionUsageRecord, UsageSink,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateHistoryRequest<'a> {
    module_id: &'a str,
}

#[derive(Deserialize)]
struct CreatedHistory {
    id: String,
}

/// History and usage backend reached over JSON/HTTP.
pub struct HttpHistoryStore {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpHistoryStore {
    pub fn new(base_url: &str, token: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("history API responded with {}: {}", status, body);
        }
        Ok(response)
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn create_history_entry(&self, module_id: &str) -> Result<String> {
        let request = self
            .request(Method::POST, "/history")
            .json(&CreateHistoryRequest { module_id });
        let created = Self::send(request)
            .await
            .context("Failed to create history entry")?
            .json::<CreatedHistory>()
            .await
            .context("History API returned an unexpected body")?;
        Ok(created.id)
    }

    async fn update_history_entry(&self, update: HistoryUpdate) -> Result<()> {
        let request = self
            .request(Method::PATCH, &format!("/history/{}", update.id))
            .json(&update);
        Self::send(request)
            .await
            .with_context(|| format!("Failed to update history entry {}", update.id))?;
        Ok(())
    }

    async fn delete_history_entry(&self, id: &str) -> Result<()> {
        Self::send(self.request(Method::DELETE, &format!("/history/{}", id)))
            .await
            .with_context(|| format!("Failed to delete history entry {}", id))?;
        Ok(())
    }
}

#[async_trait]
impl UsageSink for HttpHistoryStore {
    async fn update_conversation_usage(&self, record: ConversationUsageRecord) -> Result<()> {
        let request = self
            .request(Method::POST, "/usage/conversation")
            .json(&record);
        Self::send(request)
            .await
            .context("Failed to record conversation usage")?;
        Ok(())
    }

    async fn update_transcription_usage(&self, record: TranscriptionUsageRecord) -> Result<()> {
        let request = self
            .request(Method::POST, "/usage/transcription")
            .json(&record);
        Self::send(request)
            .await
            .context("Failed to record transcription usage")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serves one canned HTTP response and hands back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            tx.send(String::from_utf8_lossy(&raw).to_string()).ok();
        });
        (format!("http://{}", addr), rx)
    }

    #[tokio::test]
    async fn create_posts_module_and_returns_id() {
        let (base_url, request) = serve_once("201 Created", r#"{"id":"hist_42"}"#).await;
        let store = HttpHistoryStore::new(&base_url, Some(SecretString::from("token-1".to_string())));

        let id = store.create_history_entry("module-7").await.unwrap();

        assert_eq!(id, "hist_42");
        let request = request.await.unwrap();
        assert!(request.starts_with("POST /history HTTP/1.1"));
        assert!(request.to_lowercase().contains("authorization: bearer token-1"));
        assert!(request.contains(r#"{"moduleId":"module-7"}"#));
    }

    #[tokio::test]
    async fn update_patches_only_present_fields() {
        let (base_url, request) = serve_once("204 No Content", "").await;
        let store = HttpHistoryStore::new(&base_url, None);
        let update = HistoryUpdate {
            transcript_text: Some("Alice: Hi".to_string()),
            ..HistoryUpdate::new("hist_42")
        };

        store.update_history_entry(update).await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("PATCH /history/hist_42 HTTP/1.1"));
        assert!(request.ends_with(r#"{"id":"hist_42","transcriptText":"Alice: Hi"}"#));
        assert!(!request.to_lowercase().contains("authorization"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (base_url, _request) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let store = HttpHistoryStore::new(&base_url, None);

        let err = store.delete_history_entry("hist_42").await.unwrap_err();

        let message = format!("{:#}", err);
        assert!(message.contains("Failed to delete history entry hist_42"));
        assert!(message.contains("500"));
    }
}
