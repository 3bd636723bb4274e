//! Streaming example: async stream, then the blocking iterator.

use std::io::Write;
use std::sync::Arc;

use chofesh::prelude::*;
use futures::StreamExt;

#[tokio::main]
async fn main() -> chofesh::error::Result<()> {
    let settings = Settings::load()?;
    let agent = Arc::new(Agent::from_client_config(settings.client_config())?);
    let mut conversation = Conversation::new(agent.clone());

    let mut stream = conversation
        .stream_send("Write a haiku about ownership.", &CompletionOptions::default())
        .await?;
    while let Some(chunk) = stream.next().await {
        print!("{}", chunk?.content);
        std::io::stdout().flush()?;
    }
    drop(stream);
    println!("\n({} messages in history)", conversation.len());

    // Blocking calls must run off the async runtime.
    tokio::task::spawn_blocking(move || -> chofesh::error::Result<()> {
        let messages = [Message::user("Now one about borrowing.")];
        for chunk in agent.stream_blocking(&messages, &CompletionOptions::default())? {
            print!("{}", chunk?.content);
        }
        println!();
        Ok(())
    })
    .await
    .map_err(|e| ChofeshError::InvalidState(e.to_string()))??;

    Ok(())
}
