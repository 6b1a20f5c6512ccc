//! エラー型定義
//!
//! - ValidationError: ローカルの前提条件違反（ネットワークには到達しない）
//! - ApiFailure: トランスポート層が返す生の失敗
//! - ErrorDescriptor: 表示層が扱う正規化済みエラー（`normalize::describe_failure` のみが生成）

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// 実行コマンドの前提条件違反
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no image selected")]
    NoImageSelected,

    #[error("no image or city selected")]
    NoSelection,

    #[error("already running")]
    AlreadyRunning,
}

/// リモート呼び出しの失敗（トランスポート層の分類）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiFailure {
    /// サーバが非成功ステータスで応答した
    #[error("server responded with status {status}")]
    Status { status: u16, body: Option<Value> },

    /// 応答が返らなかった（接続失敗・タイムアウト）
    #[error("no response: {reason}")]
    NoResponse { reason: String },

    /// リクエストの構築・送信前、またはレスポンス処理中のクライアント側の失敗
    #[error("client fault: {reason}")]
    Client { reason: String },
}

impl ApiFailure {
    pub fn no_response(reason: impl Into<String>) -> Self {
        ApiFailure::NoResponse {
            reason: reason.into(),
        }
    }

    pub fn client(reason: impl Into<String>) -> Self {
        ApiFailure::Client {
            reason: reason.into(),
        }
    }
}

/// エラー分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 疎通確認の失敗（実行エラーとは別のライフサイクル）
    Connectivity,
    /// サーバの非成功ステータス
    Remote,
    /// 応答なし
    Transport,
    /// クライアント側の失敗
    ClientFault,
}

/// 表示層向けの正規化済みエラー
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message}")]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,

    /// 0 = 応答なし, -1 = クライアント側の失敗, それ以外は HTTP ステータス
    pub status_code: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<Value>,
}

impl ErrorDescriptor {
    pub fn is_connectivity(&self) -> bool {
        self.kind == ErrorKind::Connectivity
    }
}
