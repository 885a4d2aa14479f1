use std::io::Write as _;

use gollum_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let client = GollumClient::from_env()?;

    let mut stream = client
        .chat("toy-1")
        .user("Write a 7-word poem about llamas.")
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
            StreamEvent::Completed { .. } => println!(),
            StreamEvent::Failed { completion, .. } => {
                println!();
                eprintln!("stream failed: {:?}", completion.reason);
            }
            StreamEvent::Started { .. } => {}
        }
    }

    let _ = stream.finish().await?;
    Ok(())
}
