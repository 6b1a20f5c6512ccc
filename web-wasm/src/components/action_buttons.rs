//! ワークフロー実行ボタン

use leptos::prelude::*;
use postdisaster_common::Workflow;

#[component]
pub fn ActionButtons<FI, FC, FT>(
    has_image: Signal<bool>,
    has_selection: Signal<bool>,
    running: Signal<Option<Workflow>>,
    on_analyze_image: FI,
    on_complete: FC,
    on_test: FT,
) -> impl IntoView
where
    FI: Fn(()) + 'static + Clone,
    FC: Fn(()) + 'static + Clone,
    FT: Fn(()) + 'static + Clone,
{
    let is_running = move || running.get().is_some();
    let label = move |workflow: Workflow, idle: &'static str| {
        if running.get() == Some(workflow) {
            "Analyzing..."
        } else {
            idle
        }
    };

    view! {
        <div class="action-buttons">
            <button
                class="btn btn-secondary"
                disabled=move || !has_image.get() || is_running()
                on:click={
                    let on_analyze_image = on_analyze_image.clone();
                    move |_| on_analyze_image(())
                }
            >
                {move || label(Workflow::ImageOnly, "🛰 Analyze Image Only")}
            </button>

            <button
                class="btn btn-primary"
                disabled=move || !has_selection.get() || is_running()
                on:click={
                    let on_complete = on_complete.clone();
                    move |_| on_complete(())
                }
            >
                {move || label(Workflow::Complete, "🤖 Complete Analysis")}
            </button>

            <button
                class="btn btn-secondary"
                disabled=is_running
                on:click={
                    let on_test = on_test.clone();
                    move |_| on_test(())
                }
            >
                {move || label(Workflow::Test, "🧪 Test Analysis")}
            </button>
        </div>
    }
}
