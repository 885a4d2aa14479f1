use std::io::Write as _;

use gollum_client::prelude::*;

mod config;
mod logger;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    config::init();
    logger::init();

    let client = GollumClient::from_env()?;
    let prompt = config::get_env_or("GOLLUM_PROMPT", "Write a 7-word poem about llamas.");

    let models = client.list_models().await?;
    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    println!("Available models: {ids:?}");
    let model = ids.first().copied().unwrap_or("toy-1").to_string();

    // Buffered request/response call.
    let completion = client
        .chat(&model)
        .user(&prompt)
        .max_tokens(50)
        .temperature(0.7)
        .send()
        .await?;
    println!("Response: {}", completion.text);

    // Streaming call, printing deltas as they arrive.
    let mut stream = client
        .chat(&model)
        .user(&prompt)
        .max_tokens(50)
        .temperature(0.7)
        .start_stream()
        .await?;

    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Delta { text, .. } => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            StreamEvent::Completed { .. } | StreamEvent::Failed { .. } => println!(),
            StreamEvent::Started { run_id, .. } => {
                tracing::debug!(%run_id, "stream started");
            }
        }
    }

    let completion = stream.finish().await?;
    match completion.reason {
        Some(TerminationReason::Error(failure)) => {
            // Partial text was already printed; the failure gets its own line.
            eprintln!("stream failed after {} chars: {failure}", completion.text.len());
        }
        Some(TerminationReason::Cancelled) => eprintln!("stream cancelled"),
        _ => {}
    }
    if completion.warnings > 0 {
        tracing::warn!(warnings = completion.warnings, "skipped malformed frames");
    }

    Ok(())
}
