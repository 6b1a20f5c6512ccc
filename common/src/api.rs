//! 解析サーバとの通信境界
//!
//! `AnalysisApi` はCLI（reqwest）とWeb（XMLHttpRequest）がそれぞれ実装する。
//! エンドポイントのパスとフィールド名はここで一元管理する。

use crate::error::ApiFailure;
use crate::types::{AnalysisResult, City, DisasterAnalysis, SatelliteAnalysis, SelectedImage};
use serde_json::Value;
use std::sync::Arc;

/// 既定のサーバURL
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// 全リクエスト共通のタイムアウト（マルチエージェント解析は数分かかる）
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// マルチパートのファイルフィールド名
pub const UPLOAD_FIELD: &str = "file";

pub const ROOT_PATH: &str = "/";
pub const CITIES_PATH: &str = "/cities/";
pub const ANALYZE_IMAGE_PATH: &str = "/analyze-image/";
pub const COMPLETE_ANALYSIS_PATH: &str = "/complete-analysis/";
pub const TEST_ANALYSIS_PATH: &str = "/test-analysis/";

pub fn analyze_city_path(city_id: i64) -> String {
    format!("/analyze-city/{}", city_id)
}

/// アップロード進捗コールバック（0〜100%）
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// 解析サーバのクライアント
///
/// 各メソッドは1リクエストに対応する。失敗は `ApiFailure` として返し、
/// 正規化はコントローラ側で行う。
#[allow(async_fn_in_trait)]
pub trait AnalysisApi {
    /// 接続先のベースURL（疎通エラーのメッセージに使う）
    fn base_url(&self) -> &str;

    /// `GET /` 疎通確認
    async fn probe(&self) -> Result<(), ApiFailure>;

    /// `GET /cities/`
    async fn cities(&self) -> Result<Vec<City>, ApiFailure>;

    /// `POST /analyze-image/`
    async fn analyze_image(
        &self,
        image: &SelectedImage,
        on_progress: ProgressFn,
    ) -> Result<SatelliteAnalysis, ApiFailure>;

    /// `GET /analyze-city/{id}`
    async fn analyze_city(&self, city_id: i64) -> Result<DisasterAnalysis, ApiFailure>;

    /// `POST /complete-analysis/`
    async fn complete_analysis(
        &self,
        image: &SelectedImage,
        on_progress: ProgressFn,
    ) -> Result<AnalysisResult, ApiFailure>;

    /// `GET /test-analysis/`
    async fn test_analysis(&self) -> Result<AnalysisResult, ApiFailure>;
}

/// ベースURLとパスを連結
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// 送信済みバイト数から進捗率を計算（四捨五入）
pub fn upload_percent(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let loaded = loaded.min(total);
    ((loaded * 100 + total / 2) / total) as u8
}

/// エラーレスポンスの本文を解釈
///
/// JSONならそのまま、それ以外は文字列として保持する。空なら None。
pub fn parse_error_body(body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

/// 成功レスポンスの本文をデコード
pub fn decode_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiFailure> {
    serde_json::from_slice(body)
        .map_err(|e| ApiFailure::client(format!("Invalid response body: {}", e)))
}
