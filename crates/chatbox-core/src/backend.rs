use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::ChatError;

pub const DEFAULT_ASK_URL: &str = "http://localhost:5000/ask";
pub const DEFAULT_STREAM_URL: &str = "http://localhost:7777/api/chat";

/// Raw reply bytes, in the order the server sent them.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ChatError>>;

#[derive(Serialize)]
struct AskRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct AskReply {
    reply: String,
}

#[derive(Serialize)]
struct StreamRequest<'a> {
    query: &'a str,
}

/// A chat backend reachable over one of the two integration contracts.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Whole-body contract: one request, one `reply` string.
    async fn ask(&self, text: &str) -> Result<String, ChatError>;

    /// Streaming contract: one request, an unframed byte stream back.
    async fn open_stream(&self, text: &str) -> Result<ByteStream, ChatError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    ask_url: String,
    stream_url: String,
}

impl HttpBackend {
    pub fn new(ask_url: &str, stream_url: &str) -> Self {
        Self {
            client: Client::new(),
            ask_url: ask_url.to_string(),
            stream_url: stream_url.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.ask_url, &settings.stream_url)
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new(DEFAULT_ASK_URL, DEFAULT_STREAM_URL)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn ask(&self, text: &str) -> Result<String, ChatError> {
        tracing::debug!(url = %self.ask_url, "sending whole-body request");

        let response = self
            .client
            .post(&self.ask_url)
            .json(&AskRequest { message: text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::Status(response.status()));
        }

        let body = response.text().await?;
        let reply: AskReply =
            serde_json::from_str(&body).map_err(|e| ChatError::Decode(e.to_string()))?;
        Ok(reply.reply)
    }

    async fn open_stream(&self, text: &str) -> Result<ByteStream, ChatError> {
        tracing::debug!(url = %self.stream_url, "opening reply stream");

        let response = self
            .client
            .post(&self.stream_url)
            .json(&StreamRequest { query: text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status));
        }
        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(ChatError::MissingBody);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| ChatError::Stream(e.to_string()))
            })
            .boxed();

        Ok(stream)
    }
}
