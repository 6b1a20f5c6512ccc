//! ヘッダーコンポーネント（接続状態の表示）

use leptos::prelude::*;
use postdisaster_common::ConnectivityState;

#[component]
pub fn Header<FR>(connectivity: Signal<ConnectivityState>, api_url: &'static str, on_retry: FR) -> impl IntoView
where
    FR: Fn(()) + 'static + Clone + Send + Sync,
{
    view! {
        <header class="header">
            <div class="title-section">
                <h1>"🚨 PostDisaster AI System"</h1>
                <p class="app-subtitle">"AI-Powered Disaster Response Analysis using Satellite Imagery"</p>
            </div>
            <div class=move || format!("api-status {}", connectivity.get().as_str())>
                <span class="status-dot" />
                {move || match connectivity.get() {
                    ConnectivityState::Checking => "Checking...".to_string(),
                    ConnectivityState::Connected => format!("API Connected ({})", api_url),
                    ConnectivityState::Disconnected => "API Disconnected".to_string(),
                }}
                <Show when=move || connectivity.get() == ConnectivityState::Disconnected>
                    <button
                        class="btn btn-small"
                        on:click={
                            let on_retry = on_retry.clone();
                            move |_| on_retry(())
                        }
                    >
                        "Retry"
                    </button>
                </Show>
            </div>
        </header>
    }
}
