use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::warn;

use crate::chat::ChatFacade;
use crate::gateway::CompletionClient;
use crate::mode::Mode;
use crate::model::Message;

pub async fn run_repl<C: CompletionClient>(chat: &mut ChatFacade<C>) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    run_repl_with(chat, &mut input, &mut output).await
}

/// Asks once for the mode token on stdin.
pub fn prompt_mode() -> Result<String> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    prompt_mode_with(&mut input, &mut output)
}

fn prompt_mode_with(input: &mut impl BufRead, output: &mut impl Write) -> Result<String> {
    read_prompted_line(input, output, "select mode (text/image): ")?
        .context("No mode selected before end of input")
}

fn read_prompted_line(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
) -> Result<Option<String>> {
    write!(output, "{prompt}").context("Failed to write prompt")?;
    output.flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("Failed to read stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

pub async fn run_repl_with<C: CompletionClient>(
    chat: &mut ChatFacade<C>,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<()> {
    writeln!(output, "mistchat")?;
    writeln!(output, "mode: {}", chat.mode())?;
    writeln!(output, "model: {}", chat.model())?;
    writeln!(
        output,
        "type a question, '/history' to inspect memory, '/reset' to clear memory, or 'exit' to quit"
    )?;

    loop {
        let Some(prompt) = read_prompted_line(input, output, "> ")? else {
            break;
        };
        if prompt.is_empty() {
            continue;
        }
        if prompt.eq_ignore_ascii_case("exit") || prompt.eq_ignore_ascii_case("quit") {
            break;
        }
        if prompt.eq_ignore_ascii_case("/reset") {
            chat.reset();
            writeln!(output, "conversation reset\n")?;
            continue;
        }
        if prompt.eq_ignore_ascii_case("/history") {
            print_history(output, chat.history())?;
            continue;
        }

        let image_path = match chat.mode() {
            Mode::Text => None,
            Mode::Image => match read_prompted_line(input, output, "image path> ")? {
                Some(path) if !path.is_empty() => Some(path),
                Some(_) => {
                    writeln!(output, "an image path is required in image mode\n")?;
                    continue;
                }
                None => break,
            },
        };

        match chat
            .ask_question(&prompt, image_path.as_deref().map(Path::new))
            .await
        {
            Ok(reply) => writeln!(output, "{}\n", reply.content.to_string().trim())?,
            Err(err) => {
                warn!(error = %err, "chat turn failed");
                writeln!(output, "error: {err}\n")?;
            }
        }
    }

    Ok(())
}

fn print_history(output: &mut impl Write, history: &[Message]) -> Result<()> {
    if history.is_empty() {
        writeln!(output, "(history is empty)\n")?;
        return Ok(());
    }

    for (idx, msg) in history.iter().enumerate() {
        writeln!(output, "[{}] {}: {}", idx, msg.role.as_str(), msg.content)?;
    }
    writeln!(output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{prompt_mode_with, run_repl_with};
    use crate::chat::{ChatFacade, ChatOptions};
    use crate::config::ImageErrorPolicy;
    use crate::error::UpstreamError;
    use crate::gateway::{CompletionClient, CompletionFuture, CompletionRequest, CompletionResponse};
    use crate::mode::Mode;

    struct EchoClient;

    impl CompletionClient for EchoClient {
        fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
            let last = request
                .messages
                .last()
                .map(|msg| msg.content.caption())
                .unwrap_or_default();
            Box::pin(async move {
                Ok(CompletionResponse {
                    content: format!("echo: {last}"),
                })
            })
        }
    }

    struct DownClient;

    impl CompletionClient for DownClient {
        fn complete<'a>(&'a self, _request: CompletionRequest) -> CompletionFuture<'a> {
            Box::pin(async move {
                Err(UpstreamError::Connect {
                    url: "http://localhost:1/v1/chat/completions".to_string(),
                })
            })
        }
    }

    async fn run_script<C: CompletionClient>(chat: &mut ChatFacade<C>, script: &str) -> String {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        run_repl_with(chat, &mut input, &mut output)
            .await
            .expect("repl should finish");
        String::from_utf8(output).expect("output should be utf-8")
    }

    #[tokio::test]
    async fn answers_questions_and_prints_history() {
        let mut chat = ChatFacade::with_mode(EchoClient, Mode::Text, ChatOptions::default());

        let out = run_script(&mut chat, "hello\n/history\nexit\n").await;

        assert!(out.contains("mode: text"), "unexpected output: {out}");
        assert!(out.contains("echo: hello"), "unexpected output: {out}");
        assert!(out.contains("[0] user: hello"), "unexpected output: {out}");
        assert!(out.contains("[1] assistant: echo: hello"), "unexpected output: {out}");
        assert_eq!(chat.history().len(), 2);
    }

    #[tokio::test]
    async fn reset_clears_memory() {
        let mut chat = ChatFacade::with_mode(EchoClient, Mode::Text, ChatOptions::default());

        let out = run_script(&mut chat, "hello\n/reset\n/history\n").await;

        assert!(out.contains("conversation reset"), "unexpected output: {out}");
        assert!(out.contains("(history is empty)"), "unexpected output: {out}");
        assert!(chat.history().is_empty());
    }

    #[tokio::test]
    async fn image_mode_asks_for_a_path() {
        let options = ChatOptions {
            on_image_error: ImageErrorPolicy::SendEmpty,
            ..ChatOptions::default()
        };
        let mut chat = ChatFacade::with_mode(EchoClient, Mode::Image, options);

        let out = run_script(&mut chat, "what is this?\nmissing.jpg\nquit\n").await;

        assert!(out.contains("image path> "), "unexpected output: {out}");
        assert!(out.contains("echo: what is this?"), "unexpected output: {out}");
        assert!(chat.history()[0].content.has_image());
    }

    #[tokio::test]
    async fn turn_errors_are_reported_and_loop_continues() {
        let mut chat = ChatFacade::with_mode(DownClient, Mode::Text, ChatOptions::default());

        let out = run_script(&mut chat, "hello\nagain\n").await;

        assert_eq!(out.matches("error: Failed to connect").count(), 2, "{out}");
    }

    #[test]
    fn prompt_mode_reads_first_line() {
        let mut input = Cursor::new(b" image \n".to_vec());
        let mut output = Vec::new();
        let token = prompt_mode_with(&mut input, &mut output).expect("mode should be read");
        assert_eq!(token, "image");
        assert!(String::from_utf8_lossy(&output).contains("select mode"));
    }

    #[test]
    fn prompt_mode_fails_on_empty_input() {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        assert!(prompt_mode_with(&mut input, &mut output).is_err());
    }
}
