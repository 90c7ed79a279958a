//! `chatbuffer serve`: Start the HTTP gateway.

use chatbuffer_config::EngineConfig;

pub async fn run(
    mut config: EngineConfig,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("ChatBuffer Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Industry:  {}", config.industry);
    println!("   Store:     {}", config.store.backend);
    println!("   ML:        {}", if config.ml.enabled { "enabled" } else { "disabled" });

    chatbuffer_gateway::start(config).await
}
