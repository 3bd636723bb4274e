//! Concurrent conversations over one shared agent, with caller-side retry.

use std::sync::Arc;

use chofesh::prelude::*;

#[tokio::main]
async fn main() -> chofesh::error::Result<()> {
    let settings = Settings::load()?;
    let agent = Arc::new(Agent::from_client_config(settings.client_config())?);
    let retry = RetryPolicy::default();

    let topics = ["lifetimes", "traits", "async"];
    let tasks = topics.map(|topic| {
        let agent = agent.clone();
        let retry = retry.clone();
        tokio::spawn(async move {
            let messages = [Message::user(format!("Explain Rust {topic} in one sentence."))];
            let options = CompletionOptions::default().with_max_tokens(80);
            let reply = retry.execute(|| agent.process(&messages, &options)).await?;
            Ok::<_, ChofeshError>((topic, reply.content))
        })
    });

    for task in tasks {
        let (topic, answer) = task
            .await
            .map_err(|e| ChofeshError::InvalidState(e.to_string()))??;
        println!("{topic}: {answer}");
    }
    Ok(())
}
