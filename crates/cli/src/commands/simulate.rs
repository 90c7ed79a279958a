//! `chatbuffer simulate`: Replay a transcript through the engine.
//!
//! Input lines are `chat_id<TAB>text`; blank lines and `#` comments are
//! skipped. Each decision is printed as one JSON line. Conversations still
//! waiting at end of input are resumed with their last revision, as a caller
//! would after the wait window.

use chatbuffer_config::EngineConfig;
use chatbuffer_core::{Decision, InboundMessage};
use chatbuffer_engine::Orchestrator;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use tracing::warn;

pub async fn run(config: &EngineConfig, input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Orchestrator::from_config(config).await?;
    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(std::io::BufReader::new(std::fs::File::open(input)?))
    };

    let mut out = std::io::stdout().lock();
    replay(&engine, reader, &mut out).await
}

async fn replay(
    engine: &Orchestrator,
    reader: impl BufRead,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut waiting: BTreeMap<String, u64> = BTreeMap::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let Some((chat_id, text)) = parse_line(&line) else {
            if !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                warn!(line = number + 1, "Skipping line without a tab separator");
            }
            continue;
        };

        let decision = match engine.handle(InboundMessage::now(chat_id, text)).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(line = number + 1, error = %e, "Message rejected");
                continue;
            }
        };
        match &decision {
            Decision::Wait { revision, .. } => {
                waiting.insert(chat_id.to_string(), *revision);
            }
            _ => {
                waiting.remove(chat_id);
            }
        }
        writeln!(out, "{}", serde_json::to_string(&decision)?)?;
    }

    for (chat_id, revision) in waiting {
        let decision = engine.resume(&chat_id, revision).await?;
        writeln!(out, "{}", serde_json::to_string(&decision)?)?;
    }
    Ok(())
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    if line.trim_start().starts_with('#') {
        return None;
    }
    let (chat_id, text) = line.split_once('\t')?;
    Some((chat_id.trim(), text))
}
