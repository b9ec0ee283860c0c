//! `remedy tools`: list what the agent can call.

use remedy_config::AppConfig;
use remedy_core::tool::ToolInvoker;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (source, definitions) = match config.tools.endpoint.as_deref() {
        Some(endpoint) if !endpoint.is_empty() => {
            let client = remedy_tools::build_from_config(&config).await?;
            (endpoint.to_string(), client.definitions())
        }
        _ => (
            "built-in catalog (no endpoint configured)".to_string(),
            remedy_tools::github_catalog().definitions(),
        ),
    };

    println!("Tools from {source}:");
    for def in &definitions {
        let summary = def.description.lines().next().unwrap_or_default();
        println!("   {:<24} {summary}", def.name);
    }
    println!("{} tools", definitions.len());
    Ok(())
}
