#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod contacts;
pub mod dispatch;
pub mod gemini;
pub mod generate;
pub mod llm;
pub mod logging;
pub mod mailer;
pub mod model;
pub mod openai;
pub mod report;
pub mod resume;
pub mod scrape;
pub mod send_log;
