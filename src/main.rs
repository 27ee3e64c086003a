use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use draftsmith::kernel::CancelReason;
use draftsmith::services::generation::{EnrichmentBundle, HttpDocumentGenerator};
use draftsmith::{BackgroundGeneration, GenerationConfig};

// One JSON object per stdin line, e.g. {"cmd":"update","snapshot":{...}}
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
enum Command {
    Update { snapshot: Value },
    Enrich { bundle: EnrichmentBundle },
    Start,
    Cancel { reason: CancelReason },
    Status,
    Finish { timeout_ms: Option<u64> },
    Telemetry,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = GenerationConfig::from_env().context("invalid configuration")?;
    let generator = Arc::new(HttpDocumentGenerator::new(&config));
    tracing::info!(endpoint = generator.endpoint(), "draftsmith driver starting");

    let drafts = BackgroundGeneration::new(generator);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command: Command = match serde_json::from_str(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", json!({ "error": format!("bad command: {e}") }));
                continue;
            }
        };

        let reply = match command {
            Command::Update { snapshot } => {
                let fingerprint = drafts.update_inputs(snapshot);
                json!({ "fingerprint": fingerprint.short(), "status": drafts.read().status })
            }
            Command::Enrich { bundle } => {
                let enriched = !bundle.is_empty();
                drafts.set_enrichment(bundle);
                json!({ "enriched": enriched })
            }
            Command::Start => json!({ "start": format!("{:?}", drafts.start()) }),
            Command::Cancel { reason } => {
                drafts.cancel(reason);
                json!({ "status": drafts.read().status })
            }
            Command::Status => serde_json::to_value(drafts.read())?,
            Command::Finish { timeout_ms } => {
                let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(config.await_timeout);
                match drafts.generate_now(timeout).await {
                    Ok(finished) => serde_json::to_value(finished)?,
                    Err(e) => json!({ "error": e.to_string() }),
                }
            }
            Command::Telemetry => serde_json::to_value(drafts.telemetry())?,
        };
        println!("{reply}");
    }

    Ok(())
}
