//! 解析結果の表示ラベル
//!
//! CLIのテキストレポートとWebの結果パネルで同じ文言を使う。

use crate::types::{AnalysisResult, AnalysisStatus, SatelliteAnalysis};
use serde_json::Value;

pub const SATELLITE_SECTION_TITLE: &str = "Satellite Image Analysis";
pub const DISASTER_SECTION_TITLE: &str = "CrewAI Disaster Analysis";
pub const RAW_SECTION_TITLE: &str = "Raw Response Data";

/// 結果ヘッダの見出し
pub fn headline(status: AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Success => "Analysis Complete!",
        _ => "Analysis Results",
    }
}

/// 見出しの下の説明文
pub fn summary(status: AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Success => "Your disaster response analysis has been completed successfully.",
        _ => "Analysis completed with some issues.",
    }
}

pub fn detected_city_label(satellite: &SatelliteAnalysis) -> String {
    match satellite.detected_city_name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "Unknown".to_string(),
    }
}

pub fn detected_id_label(satellite: &SatelliteAnalysis) -> String {
    match satellite.detected_city_id {
        Some(id) if id != 0 => id.to_string(),
        _ => "N/A".to_string(),
    }
}

/// 都市判定が成功したか、フォールバック都市か
pub fn satellite_status_label(satellite: &SatelliteAnalysis) -> &'static str {
    if satellite.success {
        "Success"
    } else {
        "Fallback Mode"
    }
}

/// エージェント出力の表示形式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutput {
    /// 文字列・数値・真偽値はそのまま
    Text(String),
    /// オブジェクト・配列・null は整形JSON
    Structured(String),
}

impl AgentOutput {
    pub fn as_str(&self) -> &str {
        match self {
            AgentOutput::Text(s) | AgentOutput::Structured(s) => s,
        }
    }
}

pub fn agent_output(value: &Value) -> AgentOutput {
    match value {
        Value::String(s) => AgentOutput::Text(s.clone()),
        Value::Number(n) => AgentOutput::Text(n.to_string()),
        Value::Bool(b) => AgentOutput::Text(b.to_string()),
        other => AgentOutput::Structured(
            serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        ),
    }
}

/// 結果全体の整形JSON
pub fn raw_json(result: &AnalysisResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_default()
}
