//! HTTP webhook client for the conversational backend

use async_trait::async_trait;
use futures::StreamExt;

use super::{ChunkStream, ConversationBackend};
use crate::config::BackendConfig;
use crate::error::Service;
use crate::{Error, Result};

/// Request body sent to the backend webhook
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    chat_input: &'a str,
    session_id: &'a str,
}

/// Backend reached over a streaming HTTP webhook
pub struct WebhookBackend {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookBackend {
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl ConversationBackend for WebhookBackend {
    async fn open(&self, transcript: &str, request_id: &str) -> Result<ChunkStream> {
        tracing::debug!(request_id, chars = transcript.chars().count(), "calling backend webhook");

        let mut request = self.client.post(&self.url).json(&ChatRequest {
            chat_input: transcript,
            session_id: request_id,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "backend request failed");
            Error::upstream(Service::Backend, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "backend error");
            return Err(Error::upstream(
                Service::Backend,
                format!("backend error {status}: {body}"),
            ));
        }

        let chunks = response.bytes_stream().map(|item| {
            item.map(|bytes| bytes.to_vec())
                .map_err(|e| Error::StreamTransport(e.to_string()))
        });
        Ok(chunks.boxed())
    }
}
