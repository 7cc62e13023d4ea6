use anyhow::Result;
use clap::Parser;
use whatsapp_ai_bot::bootstrap::BotLauncher;
use whatsapp_ai_bot::core::config::AppConfig;
use whatsapp_ai_bot::logger;

#[tokio::main]
async fn main() -> Result<()> {
    // .env 不存在时忽略
    dotenv::dotenv().ok();

    let cfg = AppConfig::parse();
    logger::init(&cfg.log_config())?;
    cfg.validate()?;

    tracing::debug!(config = ?cfg, "configuration loaded");

    BotLauncher::new(cfg).launch().await
}
