//! `mnemo serve` — Start the HTTP API server.

use super::Context;

pub async fn run(ctx: &Context, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ctx.load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("mnemo gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Storage:   {}", config.storage.path);
    println!("   Model:     {}", config.model.provider);

    mnemo_gateway::start(config).await?;

    Ok(())
}
