//! Minimal language-model program against the environment-configured client.
//!
//! Set `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`, `LMP_VERBOSE=1`)
//! in the environment or a `.env` file, then run `cargo run --example simple_lmp`.

use std::sync::Arc;

use platformed_lmp::{FunctionDef, Lm, MemorySink, Registry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = Registry::from_env();
    let sink = Arc::new(MemorySink::new());
    registry.add_sink(sink.clone(), true);

    let capital = Lm::new("gpt-4o-mini")
        .registry(&registry)
        .param("temperature", 0.2)
        .bind(
            FunctionDef::new("capital", "fn capital(country: String) -> String")
                .doc("You answer geography questions in one sentence."),
            |country: String| format!("What is the capital of {country}?"),
        );

    let answer = capital.call("France".to_string()).await?;
    println!("AI: {answer}");

    for record in sink.invocations() {
        println!("recorded {} for {}", record.id, record.identity_hash);
    }
    Ok(())
}
