use gollum_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let client = GollumClient::from_env()?;

    let models = client.list_models().await?;
    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    println!("Available models: {ids:?}");

    let completion = client
        .chat(ids.first().copied().unwrap_or("toy-1"))
        .user("Write a 7-word poem about llamas.")
        .max_tokens(50)
        .temperature(0.7)
        .send()
        .await?;

    println!("Response: {}", completion.text);
    Ok(())
}
