use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::UpstreamError;
use crate::gateway::{CompletionClient, CompletionFuture, CompletionRequest, CompletionResponse};
use crate::model::{Content, ContentPart, Message};
use crate::providers::http_errors::{request_error, status_error};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: ChatContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ChatContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatContentPart {
    Text { text: String },
    ImageUrl { image_url: String },
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for Mistral's `/chat/completions` endpoint.
pub struct MistralClient {
    http: Client,
    api_key: String,
    base_url: String,
    timeout_secs: u64,
}

impl MistralClient {
    pub fn new(
        http: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout_secs,
        }
    }

    async fn send(&self, request: CompletionRequest) -> Result<CompletionResponse, UpstreamError> {
        let api_url = chat_url(&self.base_url);
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: to_chat_messages(&request.messages),
        };
        debug!(
            api_url = %api_url,
            model = %request.model,
            message_count = request.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .http
            .post(&api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                warn!(
                    api_url = %api_url,
                    model = %request.model,
                    error = %err,
                    "chat completion request failed"
                );
                request_error(err, &api_url, self.timeout_secs)
            })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|err| request_error(err, &api_url, self.timeout_secs))?;

        if !status.is_success() {
            warn!(
                api_url = %api_url,
                model = %request.model,
                status = %status,
                response_body_len = response_body.len(),
                "completion API returned non-success status"
            );
            return Err(status_error(status, &response_body));
        }

        let content = parse_completion_body(&response_body)?;
        debug!(
            model = %request.model,
            response_len = content.len(),
            "received chat completion response"
        );
        Ok(CompletionResponse { content })
    }
}

impl CompletionClient for MistralClient {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(self.send(request))
    }
}

fn chat_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role.as_str(),
            content: match &msg.content {
                Content::Text(text) => ChatContent::Text(text.clone()),
                Content::Parts(parts) => ChatContent::Parts(
                    parts
                        .iter()
                        .map(|part| match part {
                            ContentPart::Text { text } => {
                                ChatContentPart::Text { text: text.clone() }
                            }
                            ContentPart::ImageUrl { url } => ChatContentPart::ImageUrl {
                                image_url: url.clone(),
                            },
                        })
                        .collect(),
                ),
            },
        })
        .collect()
}

fn parse_completion_body(body: &str) -> Result<String, UpstreamError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|err| UpstreamError::Malformed(err.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or(UpstreamError::EmptyChoices)?;
    choice
        .message
        .content
        .ok_or_else(|| UpstreamError::Malformed("first choice has no message content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::{MistralClient, chat_url, parse_completion_body, to_chat_messages};
    use crate::error::UpstreamError;
    use crate::gateway::{CompletionClient, CompletionRequest};
    use crate::model::Message;
    use reqwest::Client;
    use serde_json::{Value, json};
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    fn read_http_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = stream.read(&mut chunk).expect("read should succeed");
            if read == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..read]);

            let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn serve_once(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept should succeed");
            let request = read_http_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .expect("write should succeed");
            request
        });
        (format!("http://{addr}/v1"), handle)
    }

    fn request_body(raw: &str) -> Value {
        let (_, body) = raw
            .split_once("\r\n\r\n")
            .expect("request should have a body");
        serde_json::from_str(body).expect("body should be JSON")
    }

    #[test]
    fn chat_url_trims_trailing_slash() {
        assert_eq!(
            chat_url("https://api.mistral.ai/v1/"),
            "https://api.mistral.ai/v1/chat/completions"
        );
    }

    #[test]
    fn serializes_text_and_image_messages() {
        let messages = vec![
            Message::user("hello"),
            Message::assistant("hi"),
            Message::user_with_image("describe", "data:image/jpeg;base64,AAAA"),
        ];
        let value = serde_json::to_value(to_chat_messages(&messages)).expect("should serialize");

        assert_eq!(
            value,
            json!([
                {"role": "user", "content": "hello"},
                {"role": "assistant", "content": "hi"},
                {"role": "user", "content": [
                    {"type": "text", "text": "describe"},
                    {"type": "image_url", "image_url": "data:image/jpeg;base64,AAAA"}
                ]}
            ])
        );
    }

    #[test]
    fn parse_completion_body_reads_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hi there"}},{"index":1,"message":{"role":"assistant","content":"ignored"}}]}"#;
        assert_eq!(
            parse_completion_body(body).expect("body should parse"),
            "hi there"
        );
    }

    #[test]
    fn parse_completion_body_rejects_bad_shapes() {
        assert!(matches!(
            parse_completion_body("not json"),
            Err(UpstreamError::Malformed(_))
        ));
        assert!(matches!(
            parse_completion_body(r#"{"choices":[]}"#),
            Err(UpstreamError::EmptyChoices)
        ));
        assert!(matches!(
            parse_completion_body(r#"{"choices":[{"message":{"role":"assistant"}}]}"#),
            Err(UpstreamError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn complete_posts_bearer_authenticated_request() {
        let reply = json!({"choices": [{"message": {"role": "assistant", "content": "bonjour"}}]});
        let (base_url, server) = serve_once("200 OK", reply.to_string());
        let client = MistralClient::new(Client::new(), "test-key", base_url, 5);

        let response = client
            .complete(CompletionRequest {
                model: "mistral-large-latest".to_string(),
                messages: vec![Message::user("salut")],
            })
            .await
            .expect("request should succeed");
        assert_eq!(response.content, "bonjour");

        let raw = server.join().expect("server thread should join");
        assert!(
            raw.starts_with("POST /v1/chat/completions "),
            "unexpected request line: {raw}"
        );
        assert!(
            raw.to_ascii_lowercase()
                .contains("authorization: bearer test-key"),
            "missing bearer header: {raw}"
        );
        assert_eq!(
            request_body(&raw),
            json!({
                "model": "mistral-large-latest",
                "messages": [{"role": "user", "content": "salut"}]
            })
        );
    }

    #[tokio::test]
    async fn complete_maps_unauthorized_status() {
        let (base_url, server) = serve_once(
            "401 Unauthorized",
            r#"{"message":"Unauthorized"}"#.to_string(),
        );
        let client = MistralClient::new(Client::new(), "wrong-key", base_url, 5);

        let err = client
            .complete(CompletionRequest {
                model: "mistral-large-latest".to_string(),
                messages: vec![Message::user("hello")],
            })
            .await
            .expect_err("401 should fail");

        assert!(
            matches!(err, UpstreamError::Unauthorized { status: 401, .. }),
            "unexpected error: {err:?}"
        );
        assert!(err.to_string().contains("MISTRAL_API_KEY"));
        server.join().expect("server thread should join");
    }

    #[tokio::test]
    async fn complete_maps_server_errors_as_retryable() {
        let (base_url, server) =
            serve_once("503 Service Unavailable", r#"{"message":"busy"}"#.to_string());
        let client = MistralClient::new(Client::new(), "test-key", base_url, 5);

        let err = client
            .complete(CompletionRequest {
                model: "pixtral-12b-2409".to_string(),
                messages: vec![Message::user("hello")],
            })
            .await
            .expect_err("503 should fail");

        assert!(matches!(err, UpstreamError::Status { status: 503, .. }));
        assert!(err.is_retryable());
        server.join().expect("server thread should join");
    }
}
