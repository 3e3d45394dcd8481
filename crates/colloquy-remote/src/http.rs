// HTTP implementation of the chat service (JSON records, plain-text stream body)

use async_trait::async_trait;
use colloquy_types::{
    validate_messages, ChatError, Message, OutgoingText, Result, Thread, ThreadId,
};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::RemoteConfig;
use crate::service::{ByteStream, ChatService};

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct NewThreadBody<'a> {
    title: &'a str,
    first_message: &'a str,
}

pub struct HttpChatService {
    http_client: reqwest::Client,
    base_url: String,
    request_timeout: std::time::Duration,
}

impl HttpChatService {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // Timeouts are per request; streamed bodies run unbounded
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChatError::transport(None, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.http_client.get(self.url(path));
        self.execute(request).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.http_client.post(self.url(path)).json(body);
        self.execute(request).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;

        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&body)
            .map_err(|e| ChatError::Validation(format!("Unexpected response shape: {}", e)))
    }
}

fn transport_error(e: reqwest::Error) -> ChatError {
    ChatError::transport(e.status().map(|s| s.as_u16()), e.to_string())
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response.text().await.unwrap_or_default();
    let reason = status.canonical_reason().unwrap_or("request failed");
    let message = if detail.is_empty() {
        reason.to_string()
    } else {
        format!("{}: {}", reason, detail)
    };
    Err(ChatError::transport(Some(status.as_u16()), message))
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn list_threads(&self) -> Result<Vec<Thread>> {
        let threads: Vec<Thread> = self.get_json("threads").await?;
        for thread in &threads {
            thread.validate()?;
        }
        Ok(threads)
    }

    async fn get_thread(&self, thread_id: ThreadId) -> Result<Thread> {
        let thread: Thread = self.get_json(&format!("threads/{}", thread_id)).await?;
        thread.validate()?;
        Ok(thread)
    }

    async fn list_messages(&self, thread_id: ThreadId) -> Result<Vec<Message>> {
        let messages: Vec<Message> = self.get_json(&format!("messages/{}", thread_id)).await?;
        validate_messages(&messages)?;
        Ok(messages)
    }

    async fn send_user_message(&self, thread_id: ThreadId, text: &OutgoingText) -> Result<Message> {
        self.post_json(
            &format!("messages/{}", thread_id),
            &TextBody { text: text.as_str() },
        )
        .await
    }

    async fn send_assistant_message(&self, thread_id: ThreadId, text: &str) -> Result<Message> {
        self.post_json(&format!("messages/{}/assistant", thread_id), &TextBody { text })
            .await
    }

    async fn send_assistant_message_streaming(
        &self,
        thread_id: ThreadId,
        text: &str,
    ) -> Result<ByteStream> {
        let response = self
            .http_client
            .post(self.url(&format!("messages/{}/assistant/stream", thread_id)))
            .json(&TextBody { text })
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;

        tracing::debug!(thread_id, status = %response.status(), "stream opened");

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| ChatError::Stream(e.to_string()))
        });
        Ok(Box::pin(stream))
    }

    async fn create_thread(&self, title: &str, first_message: &OutgoingText) -> Result<Thread> {
        let thread: Thread = self
            .post_json(
                "threads",
                &NewThreadBody {
                    title,
                    first_message: first_message.as_str(),
                },
            )
            .await?;
        thread.validate()?;
        Ok(thread)
    }
}
