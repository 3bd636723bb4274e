//! Basic chat example (blocking API).

use std::sync::Arc;

use chofesh::prelude::*;

fn main() -> chofesh::error::Result<()> {
    let settings = Settings::load()?;
    let agent = Agent::from_client_config(settings.client_config())?.with_config(settings.agent_config());
    let mut conversation = Conversation::new(Arc::new(agent)).with_system_message("You are a concise assistant.");

    let options = CompletionOptions::default();
    for prompt in ["What is Rust's borrow checker?", "Summarize that in five words."] {
        let reply = conversation.send_blocking(prompt, &options)?;
        println!("> {prompt}\n{}\n", reply.content);
    }

    let usage = conversation.total_usage();
    println!("Tokens: {} prompt / {} completion", usage.prompt_tokens, usage.completion_tokens);
    Ok(())
}
