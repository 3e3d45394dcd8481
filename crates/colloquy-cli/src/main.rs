mod config;
mod repl;
mod session;

use colloquy_controller::ConversationController;
use colloquy_remote::HttpChatService;
use colloquy_store::{JsonFileSnapshotStore, Store};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!(base_url = %config.remote.base_url, "starting colloquy");

    let service = Arc::new(HttpChatService::new(config.remote.remote_config())?);
    let store = Store::new();

    let mut builder = ConversationController::builder()
        .store(store)
        .service(service)
        .config(config.chat.controller_config());
    if let Some(path) = &config.snapshot.path {
        builder = builder.with_snapshots(Arc::new(JsonFileSnapshotStore::new(path.clone())));
    }
    let controller = builder.build()?;

    let source = session::open(&controller).await;
    repl::run(controller.clone(), config.chat.streaming).await?;
    session::close(&controller, source).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Conversation output owns stdout
    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}
