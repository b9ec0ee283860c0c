//! `remedy serve`: start the webhook gateway.

use remedy_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Remedy gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", config.model, config.provider);
    println!("   Repo:      {}/{}", config.agent.repository, config.agent.app_dir);
    println!(
        "   Signed webhooks: {}",
        config.gateway.webhook_secret.as_deref().is_some_and(|s| !s.is_empty())
    );

    remedy_gateway::start(config).await?;

    Ok(())
}
