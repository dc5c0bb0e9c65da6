//! `codehelper chat`: interactive or single-message chat.
//!
//! Answers are streamed to stdout chunk by chunk as the reconstructor emits them.

use std::io::Write;
use std::sync::Arc;

use codehelper_agent::{Assistant, AssistantStreamEvent, TurnInput};
use codehelper_core::event::EventBus;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(session: String, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    super::require_api_key(&config)?;

    let provider = codehelper_providers::build_from_config(&config)?;
    let tools = codehelper_tools::build_registry(&config).await;
    let event_bus = Arc::new(EventBus::default());
    let assistant = Arc::new(codehelper_agent::build_assistant(&config, provider, tools, event_bus).await?);

    if let Some(msg) = message {
        stream_turn(&assistant, &session, msg).await?;
        return Ok(());
    }

    println!();
    println!("  codehelper: interactive mode");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Session:   {session}");
    println!("  Tools:     {}", assistant.tool_definitions().len());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        print!("  Assistant > ");
        std::io::stdout().flush()?;
        if let Err(e) = stream_turn(&assistant, &session, line.to_string()).await {
            eprintln!("  [Error] {e}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

async fn stream_turn(
    assistant: &Arc<Assistant>,
    session: &str,
    text: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rx = assistant.chat_stream(TurnInput::new(session, text));
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            AssistantStreamEvent::Chunk { content } => {
                write!(stdout, "{content}")?;
                stdout.flush()?;
            }
            AssistantStreamEvent::ToolCall { name, .. } => {
                tracing::debug!(tool = %name, "Calling tool");
            }
            AssistantStreamEvent::ToolResult { name, success, .. } => {
                tracing::debug!(tool = %name, success, "Tool finished");
            }
            AssistantStreamEvent::Done { sources, .. } => {
                writeln!(stdout)?;
                for source in sources {
                    writeln!(stdout, "  [source] {} ({:.2})", source.source, source.score)?;
                }
            }
            AssistantStreamEvent::Error { message } => {
                writeln!(stdout)?;
                return Err(message.into());
            }
        }
    }
    Ok(())
}
