use colored::*;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::conversation::Conversation;
use crate::error::{Result, SupportError};
use crate::service::SupportService;
use crate::summary::format_transcript;

/// A parsed line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Summary,
    History,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }
        if !trimmed.starts_with('/') {
            return Command::Say(trimmed.to_string());
        }
        match trimmed.to_lowercase().as_str() {
            "/summary" | "/summarize" => Command::Summary,
            "/history" => Command::History,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Unknown(trimmed.to_string()),
        }
    }
}

const HELP: &str = "Type a question and press enter.
  /summary   summarize the conversation so far
  /history   print the transcript
  /quit      leave";

/// Interactive loop over stdin/stdout. The conversation lives as long as the loop.
pub async fn run(service: &SupportService) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    run_with(service, stdin, stdout).await
}

pub async fn run_with<R, W>(service: &SupportService, input: R, mut out: W) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut conversation = Conversation::new();
    let mut lines = input.lines();

    write_line(&mut out, &format!("{}", "Customer Support Chatbot".bold())).await?;
    write_line(&mut out, HELP).await?;

    loop {
        write(&mut out, &format!("{} ", ">".cyan())).await?;
        let Some(line) = lines.next_line().await.map_err(io_err)? else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => write_line(&mut out, HELP).await?,
            Command::Unknown(cmd) => {
                write_line(&mut out, &format!("Unknown command {cmd}. Try /help.")).await?
            }
            Command::History => {
                if conversation.is_empty() {
                    write_line(&mut out, "(no messages yet)").await?;
                } else {
                    write_line(&mut out, &format_transcript(conversation.all())).await?;
                }
            }
            Command::Summary => match service.summarize(&conversation).await {
                Ok(summary) => {
                    write_line(&mut out, &format!("{}\n{}", "Summary".bold().blue(), summary))
                        .await?
                }
                Err(SupportError::Session(msg)) => {
                    write_line(&mut out, &format!("Nothing to summarize: {msg}")).await?
                }
                Err(e) => write_line(&mut out, &format!("{} {e}", "error:".red())).await?,
            },
            Command::Say(text) => match service.handle_turn(&mut conversation, &text).await {
                Ok(_) => {
                    if let Some(reply) = conversation.last() {
                        write_line(&mut out, &format!("{}\n{}", "assistant".green(), reply.content()))
                            .await?;
                    }
                }
                Err(e) => write_line(&mut out, &format!("{} {e}", "error:".red())).await?,
            },
        }
    }

    tracing::info!(messages = conversation.len(), "Session closed");
    Ok(())
}

async fn write<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).await.map_err(io_err)?;
    out.flush().await.map_err(io_err)
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> Result<()> {
    write(out, &format!("{text}\n")).await
}

fn io_err(e: std::io::Error) -> SupportError {
    SupportError::Internal(format!("terminal I/O failed: {e}"))
}
