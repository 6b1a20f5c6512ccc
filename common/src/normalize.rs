//! レスポンス正規化
//!
//! ワークフローごとに異なるレスポンス形状を `AnalysisResult` に揃える。
//! 失敗の `ErrorDescriptor` への変換もここに集約する。

use crate::error::{ApiFailure, ErrorDescriptor, ErrorKind};
use crate::types::{AnalysisResult, AnalysisStatus, City, DisasterAnalysis, SatelliteAnalysis};
use serde_json::{Map, Value};

pub const SERVER_ERROR_MESSAGE: &str = "Server error occurred";
pub const NO_RESPONSE_MESSAGE: &str = "No response from server. Please check if the API is running.";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// 失敗の発生元
#[derive(Debug, Clone, Copy)]
pub enum FailureOrigin<'a> {
    /// 解析ワークフローの実行中
    Run,
    /// 疎通確認
    Probe { base_url: &'a str },
}

/// 画像のみ解析: 衛星解析の結果をラップ
pub fn image_only_result(analysis: SatelliteAnalysis) -> AnalysisResult {
    AnalysisResult {
        status: if analysis.success {
            AnalysisStatus::Success
        } else {
            AnalysisStatus::Warning
        },
        satellite_analysis: Some(analysis),
        disaster_analysis: None,
        extra: Map::new(),
    }
}

/// 都市選択での完全解析: 衛星解析部分はローカルで合成する
///
/// 画像分類は実行されていないが、表示層の形状を揃えるため成功扱いとする。
pub fn city_result(city: &City, disaster: DisasterAnalysis) -> AnalysisResult {
    AnalysisResult {
        status: AnalysisStatus::Success,
        satellite_analysis: Some(SatelliteAnalysis {
            detected_city_name: Some(city.name.clone()),
            detected_city_id: Some(city.id),
            success: true,
            message: Some(format!("Analysis for {} (manually selected)", city.name)),
            extra: Map::new(),
        }),
        disaster_analysis: Some(disaster),
        extra: Map::new(),
    }
}

/// 失敗を `ErrorDescriptor` に変換
pub fn describe_failure(failure: &ApiFailure, origin: FailureOrigin<'_>) -> ErrorDescriptor {
    let (kind, message, status_code, raw_body) = match failure {
        ApiFailure::Status { status, body } => (
            ErrorKind::Remote,
            body.as_ref()
                .and_then(body_message)
                .unwrap_or_else(|| SERVER_ERROR_MESSAGE.to_string()),
            i32::from(*status),
            body.clone(),
        ),
        ApiFailure::NoResponse { .. } => (ErrorKind::Transport, NO_RESPONSE_MESSAGE.to_string(), 0, None),
        ApiFailure::Client { reason } => {
            let message = if reason.trim().is_empty() {
                UNEXPECTED_ERROR_MESSAGE.to_string()
            } else {
                reason.clone()
            };
            (ErrorKind::ClientFault, message, -1, None)
        }
    };

    match origin {
        FailureOrigin::Run => ErrorDescriptor {
            kind,
            message,
            status_code,
            raw_body,
        },
        FailureOrigin::Probe { base_url } => ErrorDescriptor {
            kind: ErrorKind::Connectivity,
            message: format!(
                "Cannot connect to API server. Please ensure the server is running on {}",
                base_url
            ),
            status_code,
            raw_body,
        },
    }
}

/// `detail` → `message` の順に本文からメッセージを取り出す
fn body_message(body: &Value) -> Option<String> {
    ["detail", "message"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find(|value| !value.is_null())
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agents(value: Value) -> DisasterAnalysis {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_image_only_result_success() {
        let analysis = SatelliteAnalysis {
            detected_city_name: Some("Baytown City".to_string()),
            detected_city_id: Some(3),
            success: true,
            message: Some("Successfully identified Baytown City".to_string()),
            extra: Map::new(),
        };
        let result = image_only_result(analysis.clone());
        assert_eq!(result.status, AnalysisStatus::Success);
        assert_eq!(result.satellite_analysis, Some(analysis));
        assert!(result.disaster_analysis.is_none());
    }

    #[test]
    fn test_image_only_result_fallback_is_warning() {
        let result = image_only_result(SatelliteAnalysis::default());
        assert_eq!(result.status, AnalysisStatus::Warning);
    }

    #[test]
    fn test_city_result_synthesizes_satellite_half() {
        let city = City::new(3, "Baytown City");
        let result = city_result(&city, agents(json!({"Needs Analyst": "low"})));

        let expected = json!({
            "status": "success",
            "satellite_analysis": {
                "detected_city_name": "Baytown City",
                "detected_city_id": 3,
                "success": true,
                "message": "Analysis for Baytown City (manually selected)"
            },
            "disaster_analysis": {"Needs Analyst": "low"}
        });
        assert_eq!(serde_json::to_value(&result).expect("シリアライズ失敗"), expected);
    }

    #[test]
    fn test_city_result_passes_nested_values_unmodified() {
        let raw = json!({
            "success": true,
            "city_id": 2,
            "disaster_analysis": {"Help Dispatcher Agent": {"helicopters": 4}},
            "score": 0.5
        });
        let result = city_result(&City::new(2, "Highland Park City"), agents(raw.clone()));
        assert_eq!(Value::Object(result.disaster_analysis.expect("なし")), raw);
    }

    #[test]
    fn test_describe_status_with_detail() {
        let failure = ApiFailure::Status {
            status: 429,
            body: Some(json!({"detail": "rate limited"})),
        };
        let descriptor = describe_failure(&failure, FailureOrigin::Run);
        assert_eq!(descriptor.kind, ErrorKind::Remote);
        assert_eq!(descriptor.message, "rate limited");
        assert_eq!(descriptor.status_code, 429);
        assert_eq!(descriptor.raw_body, Some(json!({"detail": "rate limited"})));
    }

    #[test]
    fn test_describe_status_falls_back_to_message_then_default() {
        let failure = ApiFailure::Status {
            status: 500,
            body: Some(json!({"detail": null, "message": "crew failed"})),
        };
        assert_eq!(describe_failure(&failure, FailureOrigin::Run).message, "crew failed");

        let failure = ApiFailure::Status {
            status: 502,
            body: Some(json!("Bad Gateway")),
        };
        let descriptor = describe_failure(&failure, FailureOrigin::Run);
        assert_eq!(descriptor.message, SERVER_ERROR_MESSAGE);
        assert_eq!(descriptor.status_code, 502);

        let failure = ApiFailure::Status { status: 404, body: None };
        assert_eq!(describe_failure(&failure, FailureOrigin::Run).message, SERVER_ERROR_MESSAGE);
    }

    #[test]
    fn test_describe_status_structured_detail() {
        let failure = ApiFailure::Status {
            status: 422,
            body: Some(json!({"detail": [{"loc": ["body", "file"], "msg": "field required"}]})),
        };
        let descriptor = describe_failure(&failure, FailureOrigin::Run);
        assert!(descriptor.message.contains("field required"));
        assert_eq!(descriptor.status_code, 422);
    }

    #[test]
    fn test_describe_no_response() {
        let descriptor = describe_failure(&ApiFailure::no_response("timed out"), FailureOrigin::Run);
        assert_eq!(descriptor.kind, ErrorKind::Transport);
        assert_eq!(descriptor.status_code, 0);
        assert_eq!(descriptor.message, NO_RESPONSE_MESSAGE);
        assert!(descriptor.raw_body.is_none());
    }

    #[test]
    fn test_describe_client_fault() {
        let descriptor = describe_failure(&ApiFailure::client("builder error"), FailureOrigin::Run);
        assert_eq!(descriptor.kind, ErrorKind::ClientFault);
        assert_eq!(descriptor.status_code, -1);
        assert_eq!(descriptor.message, "builder error");

        let descriptor = describe_failure(&ApiFailure::client(""), FailureOrigin::Run);
        assert_eq!(descriptor.message, UNEXPECTED_ERROR_MESSAGE);
    }

    #[test]
    fn test_describe_probe_failure_is_connectivity() {
        let descriptor = describe_failure(
            &ApiFailure::no_response("connection refused"),
            FailureOrigin::Probe { base_url: "http://localhost:8000" },
        );
        assert_eq!(descriptor.kind, ErrorKind::Connectivity);
        assert_eq!(descriptor.status_code, 0);
        assert!(descriptor.message.contains("http://localhost:8000"));
        assert!(descriptor.is_connectivity());
    }
}
