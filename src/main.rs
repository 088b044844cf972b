use std::sync::Arc;

use landing_forge::config::Config;
use landing_forge::generator::ContentGenerator;
use landing_forge::llm::OpenAiChatModel;
use landing_forge::{Request, Server, api};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(model = %config.openai.model, base_url = %config.openai.base_url, "configuration loaded");

    let generator = ContentGenerator::new(Arc::new(OpenAiChatModel::new(config.openai)));
    let router = Arc::new(api::router(generator));

    let server = Server::bind(&config.addr).await?;
    info!("open http://{} in a browser", server.local_addr());

    server
        .run(move |req: Request| {
            let router = Arc::clone(&router);
            async move { router.route(req).await }
        })
        .await?;

    Ok(())
}
