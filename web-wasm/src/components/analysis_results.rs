//! 解析結果パネル

use leptos::prelude::*;
use postdisaster_common::report::{self, AgentOutput};
use postdisaster_common::{AnalysisResult, AnalysisStatus};

/// 実行中の表示
#[component]
pub fn AnalysisLoading() -> impl IntoView {
    view! {
        <div class="analysis-results">
            <div class="card loading">
                <div class="spinner" />
                <div>
                    <h3>"Analyzing your request..."</h3>
                    <p>"This may take a few minutes as our AI agents work together"</p>
                </div>
            </div>
        </div>
    }
}

#[component]
pub fn AnalysisResults(result: AnalysisResult) -> impl IntoView {
    let (satellite_open, set_satellite_open) = signal(true);
    let (disaster_open, set_disaster_open) = signal(true);
    let (raw_open, set_raw_open) = signal(false);

    let status_icon = match result.status {
        AnalysisStatus::Success => "✅",
        AnalysisStatus::Warning | AnalysisStatus::Error => "⚠️",
        AnalysisStatus::Unknown => "ℹ️",
    };
    let raw = report::raw_json(&result);

    let satellite = result.satellite_analysis.clone().map(|satellite| {
        let badge_class = if satellite.success {
            "status-badge success"
        } else {
            "status-badge warning"
        };
        view! {
            <div class="card">
                <SectionHeader
                    title=report::SATELLITE_SECTION_TITLE
                    open=satellite_open
                    on_toggle=move |_| set_satellite_open.update(|v| *v = !*v)
                />
                <Show when=move || satellite_open.get()>
                    <div class="section-content satellite-info">
                        <div class="info-grid">
                            <div class="info-item">
                                <strong>"Detected City:"</strong>
                                <span>{report::detected_city_label(&satellite)}</span>
                            </div>
                            <div class="info-item">
                                <strong>"City ID:"</strong>
                                <span>{report::detected_id_label(&satellite)}</span>
                            </div>
                            <div class="info-item">
                                <strong>"Analysis Status:"</strong>
                                <span class=badge_class>{report::satellite_status_label(&satellite)}</span>
                            </div>
                        </div>
                        {satellite.message.clone().filter(|m| !m.is_empty()).map(|message| view! {
                            <div class="analysis-message"><p>{message}</p></div>
                        })}
                    </div>
                </Show>
            </div>
        }
    });

    let disaster = result.disaster_analysis.clone().map(|disaster| {
        let agents: Vec<(String, AgentOutput)> = disaster
            .iter()
            .map(|(name, value)| (name.clone(), report::agent_output(value)))
            .collect();
        view! {
            <div class="card">
                <SectionHeader
                    title=report::DISASTER_SECTION_TITLE
                    open=disaster_open
                    on_toggle=move |_| set_disaster_open.update(|v| *v = !*v)
                />
                <Show when=move || disaster_open.get()>
                    <div class="section-content agents-results">
                        {agents
                            .iter()
                            .map(|(name, output)| {
                                let body = match output {
                                    AgentOutput::Text(text) => view! { <p>{text.clone()}</p> }.into_any(),
                                    AgentOutput::Structured(json) => {
                                        view! { <pre class="raw-object">{json.clone()}</pre> }.into_any()
                                    }
                                };
                                view! {
                                    <div class="agent-result">
                                        <h4 class="agent-name">{format!("{} {}", agent_icon(name), name)}</h4>
                                        <div class="agent-output">{body}</div>
                                    </div>
                                }
                            })
                            .collect_view()}
                    </div>
                </Show>
            </div>
        }
    });

    view! {
        <div class="analysis-results">
            <div class="card result-header">
                <span class="status-icon">{status_icon}</span>
                <div>
                    <h2>{report::headline(result.status)}</h2>
                    <p class="text-muted">{report::summary(result.status)}</p>
                </div>
            </div>

            {satellite}
            {disaster}

            <div class="card">
                <SectionHeader
                    title=report::RAW_SECTION_TITLE
                    open=raw_open
                    on_toggle=move |_| set_raw_open.update(|v| *v = !*v)
                />
                <Show when=move || raw_open.get()>
                    <pre class="raw-data">{raw.clone()}</pre>
                </Show>
            </div>
        </div>
    }
}

#[component]
fn SectionHeader<FT>(title: &'static str, open: ReadSignal<bool>, on_toggle: FT) -> impl IntoView
where
    FT: Fn(()) + 'static + Clone,
{
    view! {
        <div
            class="section-header"
            on:click={
                let on_toggle = on_toggle.clone();
                move |_| on_toggle(())
            }
        >
            <h3>{title}</h3>
            <span>{move || if open.get() { "▲" } else { "▼" }}</span>
        </div>
    }
}

/// エージェント名に応じたアイコン
fn agent_icon(name: &str) -> &'static str {
    if name.contains("Data Collector") || name.contains("Damage Analyser") {
        "🏢"
    } else if name.contains("Needs Analyst") {
        "👥"
    } else if name.contains("Help Dispatcher") {
        "🚚"
    } else if name.contains("Resource Allocator") {
        "🍎"
    } else {
        "🤖"
    }
}
