//! エラー表示コンポーネント

use leptos::prelude::*;
use postdisaster_common::ErrorDescriptor;

#[component]
pub fn ErrorBanner<FD>(error: ErrorDescriptor, on_dismiss: FD) -> impl IntoView
where
    FD: Fn(()) + 'static + Clone,
{
    let status = match error.status_code {
        0 => None,
        code => Some(format!("Status: {}", code)),
    };

    view! {
        <div class="error-banner">
            <div class="error-body">
                <strong>"Error"</strong>
                <p>{error.message.clone()}</p>
                {status.map(|s| view! { <p class="text-muted">{s}</p> })}
            </div>
            <button
                class="btn btn-small"
                on:click={
                    let on_dismiss = on_dismiss.clone();
                    move |_| on_dismiss(())
                }
            >
                "Dismiss"
            </button>
        </div>
    }
}
