//! `chatbuffer init`: Write the default config file.

use chatbuffer_config::EngineConfig;
use std::path::Path;

pub fn run(path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_path = EngineConfig::config_dir().join("config.toml");
    let config_path = path.unwrap_or(&default_path);

    if config_path.exists() && !force {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.");
        return Ok(());
    }

    write_default(config_path)?;
    println!("Created config.toml at: {}", config_path.display());
    println!("   Next: chatbuffer check && chatbuffer serve");
    Ok(())
}

fn write_default(path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, EngineConfig::default_toml())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_config_loads_back() {
        let dir = std::env::temp_dir().join(format!("chatbuffer-init-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");

        run(Some(&path), false).unwrap();
        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.industry, "medical");

        std::fs::write(&path, "industry = \"generic\"\n").unwrap();
        run(Some(&path), false).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap().industry, "generic");

        run(Some(&path), true).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap().industry, "medical");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
