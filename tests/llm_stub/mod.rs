use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

pub const STUB_SUBJECT: &str = "Application for Software Engineering Position at Acme";

pub fn stub_email_text() -> String {
    format!(
        "Subject: {STUB_SUBJECT}\n\nDear Hiring Manager,\n\nI am excited to apply for this \
         role. My background in Rust services and data pipelines matches your needs, and my \
         resume is attached for your review.\n\nBest regards,\nJane Doe\n"
    )
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum CompletionBehavior {
    Email,
    TooShort,
    ErrorStatus(u16),
}

enum ProviderKind {
    Gemini,
    OpenAi,
}

/// Serves both provider endpoints on one ephemeral port. Tests point
/// `JOBREACH_GEMINI_BASE_URL` at `{base_url}/v1beta` and
/// `JOBREACH_OPENAI_BASE_URL` at `{base_url}/v1`.
pub struct LlmStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LlmStub {
    pub fn spawn(behavior: CompletionBehavior) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start llm stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                let kind = if path.starts_with("/v1beta/models/") && path.ends_with(":generateContent")
                {
                    ProviderKind::Gemini
                } else if path == "/v1/chat/completions" {
                    ProviderKind::OpenAi
                } else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                };
                if request.method() != &tiny_http::Method::Post {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };

                let prompt = match kind {
                    ProviderKind::Gemini => parsed
                        .pointer("/contents/0/parts/0/text")
                        .and_then(|v| v.as_str()),
                    ProviderKind::OpenAi => parsed
                        .pointer("/messages/1/content")
                        .and_then(|v| v.as_str()),
                };
                if prompt.is_none_or(str::is_empty) {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing prompt").with_status_code(400),
                    );
                    continue;
                }

                if let CompletionBehavior::ErrorStatus(status) = behavior {
                    let error_body = serde_json::json!({
                        "error": { "message": "stub rejected the request" }
                    });
                    let _ = request.respond(
                        json_response(error_body.to_string()).with_status_code(status),
                    );
                    continue;
                }

                let text = match behavior {
                    CompletionBehavior::Email => stub_email_text(),
                    CompletionBehavior::TooShort => "Subject: Hi\nToo short.".to_owned(),
                    CompletionBehavior::ErrorStatus(_) => unreachable!("handled above"),
                };

                let response_body = match kind {
                    ProviderKind::Gemini => serde_json::json!({
                        "candidates": [{
                            "content": { "role": "model", "parts": [{ "text": text }] },
                            "finishReason": "STOP"
                        }]
                    }),
                    ProviderKind::OpenAi => serde_json::json!({
                        "choices": [{
                            "index": 0,
                            "message": { "role": "assistant", "content": text },
                            "finish_reason": "stop"
                        }]
                    }),
                };

                let _ = request.respond(json_response(response_body.to_string()).with_status_code(200));
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

fn json_response(body: String) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body).with_header(header)
}

impl Drop for LlmStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
