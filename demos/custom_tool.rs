//! Tool calling example: a custom trait tool and a closure tool.

use std::sync::Arc;

use async_trait::async_trait;
use chofesh::prelude::*;
use serde_json::{json, Value};

/// Toy calculator over two operands.
struct Calculator {
    parameters: ToolParameters,
}

impl Calculator {
    fn new() -> Self {
        Self {
            parameters: ToolParameters::object()
                .string_enum("op", "Operation", &["add", "sub", "mul", "div"], true)
                .number("a", "Left operand", true)
                .number("b", "Right operand", true)
                .build(),
        }
    }
}

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Apply an arithmetic operation to two numbers"
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments) -> Result<Value> {
        let (a, b) = (args.get_f64("a")?, args.get_f64("b")?);
        let value = match args.get_str("op")? {
            "add" => a + b,
            "sub" => a - b,
            "mul" => a * b,
            "div" if b == 0.0 => return Err(ChofeshError::Validation("division by zero".into())),
            "div" => a / b,
            other => return Err(ChofeshError::Validation(format!("unknown op {other}"))),
        };
        Ok(json!({ "value": value }))
    }
}

#[tokio::main]
async fn main() -> chofesh::error::Result<()> {
    let settings = Settings::load()?;
    let weather = FnTool::try_new(
        "get_weather",
        "Get weather for a city",
        ToolParameters::object().string("city", "City name", true).build(),
        |args| async move {
            let city = args.get_str("city")?;
            Ok(json!({ "city": city, "temperature": 22, "condition": "sunny" }))
        },
    )?;

    let agent = Agent::from_client_config(settings.client_config())?
        .with_config(AgentConfig::builder().validate_tool_arguments(true).build())
        .with_tool(Calculator::new())
        .with_tool(weather);

    let run = agent
        .process_detailed(
            &[Message::user("What's the weather in Tokyo, and what is 21 * 2?")],
            &CompletionOptions::default(),
        )
        .await?;

    for call in run.messages.iter().flat_map(|m| &m.tool_calls) {
        match (&call.result, &call.error) {
            (Some(result), _) => println!("{} -> {result}", call.name),
            (_, Some(error)) => println!("{} failed: {error}", call.name),
            _ => println!("{} not executed", call.name),
        }
    }
    println!("\n{}", run.message.content);
    println!("({} requests, {} tool passes)", run.requests, run.iterations);

    let conversation = Conversation::new(Arc::new(agent)).with_generated_id();
    println!("{}", conversation.to_record()["agent"]);
    Ok(())
}
