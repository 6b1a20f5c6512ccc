use postdisaster_common::{ErrorDescriptor, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported image: {0}")]
    InvalidImage(String),

    #[error("Unknown city id: {0}. Run `postdisaster cities` to list available cities")]
    UnknownCity(i64),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// 疎通確認に失敗（ワークフローは実行しない）
    #[error("{}", .0.message)]
    Disconnected(ErrorDescriptor),

    /// 後から始まった疎通確認に結果を上書きされた
    #[error("Connectivity check was superseded by a newer check")]
    ProbeSuperseded,

    /// ワークフローが ErrorDescriptor で終了
    #[error("Analysis failed (status {}): {}", .0.status_code, .0.message)]
    Analysis(ErrorDescriptor),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
