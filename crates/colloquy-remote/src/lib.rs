pub mod config;
pub mod decoder;
pub mod http;
pub mod ingest;
pub mod service;

pub use config::RemoteConfig;
pub use decoder::Utf8StreamDecoder;
pub use http::HttpChatService;
pub use ingest::{decode_text_stream, IngestConfig, IngestOutcome, StreamIngestor, TextChunkStream};
pub use service::{ByteStream, ChatService};

pub use tokio_util::sync::CancellationToken;
