//! Chofesh: a client for the Chofesh chat API with a tool-calling agent loop.
//!
//! An [`Agent`](agent::Agent) sends a conversation to the endpoint, runs the
//! local tools the model asks for, feeds their results back and repeats until
//! the model answers or the iteration cap is reached. Every operation comes in
//! an async form, a blocking `*_blocking` form and, for replies, a streaming form.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use chofesh::prelude::*;
//!
//! # async fn example() -> chofesh::error::Result<()> {
//! let agent = Agent::from_client_config(ClientConfig::new("sk-..."))?;
//! let mut conversation = Conversation::new(Arc::new(agent)).with_system_message("Be brief.");
//! let reply = conversation.send("Hello!").await?;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod blocking;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod prelude;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
