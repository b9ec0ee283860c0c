//! `remedy todo`: start the to-do service.

use remedy_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.todo.port = port;
    }

    println!("Todo service on {}:{}", config.todo.host, config.todo.port);
    remedy_todo::start(&config.todo).await
}
