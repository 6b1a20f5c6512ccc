//! 解析結果のテキストレポート

use postdisaster_common::report::{self, AgentOutput};
use postdisaster_common::{AnalysisResult, City, ErrorDescriptor};
use std::fmt::Write;

const RULE: &str = "────────────────────────────────────────";

/// 結果パネルをテキストで描画
pub fn render_result(result: &AnalysisResult, include_raw: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report::headline(result.status));
    let _ = writeln!(out, "{}", report::summary(result.status));

    if let Some(satellite) = &result.satellite_analysis {
        section(&mut out, report::SATELLITE_SECTION_TITLE);
        let _ = writeln!(out, "  Detected City:   {}", report::detected_city_label(satellite));
        let _ = writeln!(out, "  City ID:         {}", report::detected_id_label(satellite));
        let _ = writeln!(out, "  Analysis Status: {}", report::satellite_status_label(satellite));
        if let Some(message) = satellite.message.as_deref().filter(|m| !m.is_empty()) {
            let _ = writeln!(out, "\n  {}", message);
        }
    }

    if let Some(disaster) = &result.disaster_analysis {
        section(&mut out, report::DISASTER_SECTION_TITLE);
        for (agent, value) in disaster {
            let _ = writeln!(out, "▶ {}", agent);
            match report::agent_output(value) {
                AgentOutput::Text(text) => {
                    let _ = writeln!(out, "{}", indent(&text));
                }
                AgentOutput::Structured(json) => {
                    let _ = writeln!(out, "{}", indent(&json));
                }
            }
            out.push('\n');
        }
    }

    if include_raw {
        section(&mut out, report::RAW_SECTION_TITLE);
        let _ = writeln!(out, "{}", report::raw_json(result));
    }

    out
}

/// 正規化済みエラーを描画
pub fn render_error(error: &ErrorDescriptor) -> String {
    let mut out = format!("✖ {}", error.message);
    if error.status_code != 0 && !error.is_connectivity() {
        let _ = write!(out, " (status {})", error.status_code);
    }
    out
}

/// 都市カタログを一覧表示用に描画
pub fn render_cities(cities: &[City]) -> String {
    let mut out = String::new();
    for city in cities {
        let _ = writeln!(out, "  {:>3}  {}", city.id, city.name);
    }
    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}\n{}\n{}", RULE, title, RULE);
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
