//! `mnemo config` — Configuration management commands.

use super::Context;
use mnemo_config::AppConfig;

pub async fn show(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let config = ctx.load_config()?;
    println!("{}", render_redacted(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", AppConfig::default_toml());
    Ok(())
}

/// TOML with the API key masked.
fn render_redacted(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut config = config.clone();
    if config.model.api_key.is_some() {
        config.model.api_key = Some("***".into());
    }
    toml::to_string_pretty(&config)
}
