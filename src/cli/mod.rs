//! CLI for Chofesh.

use std::io::Write;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::Agent;
use crate::config::Settings;
use crate::conversation::Conversation;
use crate::error::Result;
use crate::types::CompletionOptions;

/// Chofesh chat CLI
#[derive(Parser, Debug)]
#[command(name = "chofesh", version, about = "Chat with Chofesh models from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one prompt and print the reply
    Ask(AskArgs),
    /// Interactive chat session
    Chat(SessionArgs),
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Model identifier (overrides CHOFESH_MODEL and the config file)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Max tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

/// Arguments for `chofesh ask`.
#[derive(Args, Debug)]
pub struct AskArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Print the reply as it streams in
    #[arg(long)]
    pub stream: bool,

    /// User prompt
    pub prompt: String,
}

impl SessionArgs {
    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..CompletionOptions::default()
        }
    }

    fn conversation(&self) -> Result<Conversation> {
        let overrides = Settings {
            model: self.model.clone(),
            ..Settings::default()
        };
        let settings = Settings::load()?.merge(overrides);
        let agent = Agent::from_client_config(settings.client_config())?
            .with_config(settings.agent_config());

        let conversation = Conversation::new(Arc::new(agent)).with_generated_id();
        Ok(match &self.system {
            Some(system) => conversation.with_system_message(system.clone()),
            None => conversation,
        })
    }
}

/// One-shot prompt.
pub async fn handle_ask(args: AskArgs) -> Result<()> {
    let mut conversation = args.session.conversation()?;
    let options = args.session.options();

    if args.stream {
        stream_reply(&mut conversation, args.prompt, &options).await
    } else {
        let reply = conversation.send_with(args.prompt, &options).await?;
        println!("{}", reply.content);
        Ok(())
    }
}

/// Interactive loop. Lines starting with `/` are commands.
pub async fn handle_chat(args: SessionArgs) -> Result<()> {
    let mut conversation = args.conversation()?;
    let options = args.options();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Chatting with {}. Commands: /clear, /save <path>, /exit", conversation.agent().model());
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match ChatCommand::parse(line) {
            ChatCommand::Empty => continue,
            ChatCommand::Exit => break,
            ChatCommand::Clear => {
                conversation.clear();
                eprintln!("(history cleared)");
            }
            ChatCommand::Save(path) => match conversation.save(path) {
                Ok(()) => eprintln!("(saved to {path})"),
                Err(e) => eprintln!("Error: {e}"),
            },
            ChatCommand::Unknown(cmd) => eprintln!("Unknown command: {cmd}"),
            ChatCommand::Prompt(prompt) => {
                if let Err(e) = stream_reply(&mut conversation, prompt.to_string(), &options).await {
                    eprintln!("\nError: {e}");
                }
            }
        }
    }
    Ok(())
}

async fn stream_reply(conversation: &mut Conversation, prompt: String, options: &CompletionOptions) -> Result<()> {
    let mut stream = conversation.stream_send(prompt, options).await?;
    while let Some(chunk) = stream.next().await {
        print!("{}", chunk?.content);
        let _ = std::io::stdout().flush();
    }
    println!();
    Ok(())
}

#[derive(Debug, PartialEq)]
enum ChatCommand<'a> {
    Empty,
    Exit,
    Clear,
    Save(&'a str),
    Unknown(&'a str),
    Prompt(&'a str),
}

impl<'a> ChatCommand<'a> {
    fn parse(line: &'a str) -> Self {
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Prompt(line);
        };
        let (cmd, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        match (cmd, arg.trim()) {
            ("exit" | "quit", _) => Self::Exit,
            ("clear", _) => Self::Clear,
            ("save", path) if !path.is_empty() => Self::Save(path),
            _ => Self::Unknown(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ask_with_options() {
        let cli = Cli::try_parse_from([
            "chofesh", "ask", "--stream", "-m", "gpt-oss-20b", "-t", "0.2", "hello there",
        ])
        .unwrap();
        match cli.command {
            Commands::Ask(args) => {
                assert!(args.stream);
                assert_eq!(args.prompt, "hello there");
                assert_eq!(args.session.model.as_deref(), Some("gpt-oss-20b"));
                assert_eq!(args.session.temperature, Some(0.2));
            }
            other => panic!("expected Ask, got {other:?}"),
        }
    }

    #[test]
    fn parse_chat_with_defaults() {
        let cli = Cli::try_parse_from(["chofesh", "chat"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert!(args.model.is_none());
                assert!(args.system.is_none());
                assert!(args.max_tokens.is_none());
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn ask_requires_prompt() {
        assert!(Cli::try_parse_from(["chofesh", "ask"]).is_err());
    }

    #[test]
    fn chat_commands() {
        assert_eq!(ChatCommand::parse(""), ChatCommand::Empty);
        assert_eq!(ChatCommand::parse("/exit"), ChatCommand::Exit);
        assert_eq!(ChatCommand::parse("/clear"), ChatCommand::Clear);
        assert_eq!(ChatCommand::parse("/save chat.json"), ChatCommand::Save("chat.json"));
        assert_eq!(ChatCommand::parse("/save"), ChatCommand::Unknown("/save"));
        assert_eq!(ChatCommand::parse("hi /there"), ChatCommand::Prompt("hi /there"));
    }
}
