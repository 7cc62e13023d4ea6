//! # Bot Bootstrap Module
//!
//! Wires configuration, logger, provider, WhatsApp gateway client and the
//! HTTP server together, then runs until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::AppConfig;
use crate::core::dispatcher::MessageDispatcher;
use crate::core::generator::ResponseGenerator;
use crate::infrastructure::llm::Provider;
use crate::infrastructure::logger::SanitizingLogger;
use crate::infrastructure::web::{start_web_server, AppState};
use crate::infrastructure::whatsapp::{EvolutionClient, SessionState};

/// Bot Launcher
pub struct BotLauncher {
    config: AppConfig,
}

impl BotLauncher {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Build the response generator from whichever provider key is configured
    pub fn build_generator(&self, logger: Arc<SanitizingLogger>) -> Result<ResponseGenerator> {
        match self.config.provider_config() {
            Some(provider_config) => {
                let provider = Provider::from_config(&provider_config, self.config.request_timeout())?;
                info!(
                    provider = %provider.kind(),
                    model = %provider_config.model,
                    "🤖 AI provider selected"
                );
                Ok(ResponseGenerator::new(Arc::new(provider), logger).with_config(&provider_config))
            }
            None => {
                warn!("⚠️  No AI API key configured, every reply will be the fallback apology");
                Ok(ResponseGenerator::unconfigured(logger).with_personality(&self.config.bot_personality))
            }
        }
    }

    /// Start the bot and block until shutdown
    pub async fn launch(&self) -> Result<()> {
        info!("🚀 Starting WhatsApp AI Chatbot...");

        let logger = Arc::new(SanitizingLogger::tracing(self.config.log_level));
        let generator = Arc::new(self.build_generator(logger.clone())?);

        let gateway = Arc::new(
            EvolutionClient::new(
                &self.config.evolution_api_url,
                self.config.evolution_api_key.clone(),
                &self.config.evolution_instance,
                self.config.request_timeout(),
            )
            .context("failed to create WhatsApp gateway client")?,
        );

        let session = Arc::new(SessionState::new());
        match gateway.connection_state().await {
            Ok(update) => session.apply(&update).await,
            Err(err) => warn!("⚠️  Could not query WhatsApp gateway state: {:#}", err),
        }

        let dispatcher = Arc::new(MessageDispatcher::new(generator, gateway.clone(), logger));
        let state = AppState::new(dispatcher, session).with_instance(gateway.instance());

        start_web_server(&self.config.bind_addr(), state, shutdown_signal()).await?;

        info!("✅ Shut down gracefully");
        Ok(())
    }
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl+c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("⏹️  Shutting down gracefully..."),
        _ = terminate => info!("⏹️  Received SIGTERM, shutting down gracefully..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::logger::{LogLevel, MemorySink};
    use clap::Parser;

    fn launcher(args: &[&str]) -> BotLauncher {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        BotLauncher::new(AppConfig::parse_from(argv))
    }

    fn logger() -> Arc<SanitizingLogger> {
        Arc::new(SanitizingLogger::new(LogLevel::Debug, Arc::new(MemorySink::new())))
    }

    #[test]
    fn test_build_generator_selects_configured_provider() {
        let generator = launcher(&["--openai-api-key", "o-key"])
            .build_generator(logger())
            .unwrap();
        assert_eq!(generator.provider_name(), Some("openai"));

        let generator = launcher(&["--gemini-api-key", "g-key", "--openai-api-key", "o-key"])
            .build_generator(logger())
            .unwrap();
        assert_eq!(generator.provider_name(), Some("gemini"));
    }

    #[test]
    fn test_build_generator_without_key() {
        let generator = launcher(&["--gemini-api-key", "", "--openai-api-key", ""])
            .build_generator(logger())
            .unwrap();
        assert_eq!(generator.provider_name(), None);
    }
}
