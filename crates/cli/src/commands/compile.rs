//! `mnemo compile` — Show exactly what a model would be sent.

use super::Context;
use mnemo_runtime::{CompileOptions, CompileResult};

pub async fn run(
    ctx: &Context,
    message: String,
    budget: Option<usize>,
    prefix: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, session) = ctx.session().await?;

    let mut options =
        CompileOptions::new(message, budget.unwrap_or(config.compiler.default_budget_tokens));
    if let Some(prefix) = prefix {
        options = options.with_stable_prefix(prefix);
    }

    let result = session.compile(&options).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render(&result, options.budget_tokens));
    }
    Ok(())
}

fn render(result: &CompileResult, budget: usize) -> String {
    let mut out = String::new();
    for message in &result.messages {
        out.push_str(&format!("=== {} ===\n{}\n\n", message.role.as_str(), message.content));
    }

    let debug = &result.debug;
    out.push_str(&format!("Tokens:   {} / {budget}\n", debug.token_estimate));
    out.push_str(&format!("Included: {}\n", debug.included_artifacts.join(", ")));
    out.push_str(&format!("Dropped:  {}\n", debug.dropped_artifacts.join(", ")));
    out.push_str(&format!("{}\n", debug.rationale));
    out
}
