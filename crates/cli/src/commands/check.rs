//! `chatbuffer check`: Validate config and ping dependencies.

use chatbuffer_config::EngineConfig;
use chatbuffer_engine::Orchestrator;
use chatbuffer_semantic::SemanticAnalyzer;
use std::path::Path;

pub async fn run(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("ChatBuffer Check");
    println!("================\n");

    let default_path = EngineConfig::config_dir().join("config.toml");
    let config_path = path.unwrap_or(&default_path);
    if !config_path.exists() {
        println!("  No config file at {} (using defaults)", config_path.display());
    }

    let config = match path {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    }
    .inspect_err(|e| println!("  Config invalid: {e}"))?;
    println!("  Config valid (industry: {}, profile: {:?})", config.industry, config.timing.profile);

    SemanticAnalyzer::new(&config.semantic).inspect_err(|e| println!("  Pattern error: {e}"))?;
    let patterns = &config.semantic.patterns;
    println!(
        "  Patterns compiled: {} complete, {} fragment, {} intents, {} entity kinds",
        patterns.complete.len(),
        patterns.fragments.len(),
        patterns.intents.len(),
        patterns.entities.len()
    );

    let engine = Orchestrator::from_config(&config)
        .await
        .inspect_err(|e| println!("  Engine failed to start: {e}"))?;
    let health = engine.health();
    println!("  Store backend: {} ({})", health.store_backend, health.store.status);
    if let Some(ml) = &health.ml {
        println!("  ML classifier: {}", ml.status);
    } else {
        println!("  ML classifier: disabled");
    }

    println!("\n  All checks passed.");
    Ok(())
}
