//! メインアプリケーションコンポーネント
//!
//! 状態はすべてコントローラが持ち、変更通知で受け取ったスナップショットを
//! シグナルに写して描画する。

use crate::api::{api_base_url, XhrApi};
use crate::components::{
    action_buttons::ActionButtons,
    analysis_results::{AnalysisLoading, AnalysisResults},
    city_gallery::CityGallery,
    error_banner::ErrorBanner,
    header::Header,
    progress_bar::ProgressBar,
    upload_area::UploadArea,
};
use leptos::prelude::*;
use leptos::task::spawn_local;
use postdisaster_common::{
    City, ConnectivityState, Controller, SelectedImage, Snapshot, Workflow, DEFAULT_TIMEOUT_SECS,
};

/// メインアプリケーションコンポーネント
#[component]
pub fn App() -> impl IntoView {
    let snapshot = RwSignal::new(Snapshot::default());
    let controller = Controller::new(XhrApi::new(api_base_url(), DEFAULT_TIMEOUT_SECS))
        .with_listener(move |s: &Snapshot| snapshot.set(s.clone()));
    snapshot.set(controller.snapshot());

    // 疎通確認（成功したら都市一覧を取得）
    let connect = {
        let controller = controller.clone();
        move |_: ()| {
            let controller = controller.clone();
            spawn_local(async move {
                if controller.check_connectivity().await {
                    gloo::console::log!("API connected:", api_base_url());
                    controller.load_cities().await;
                } else {
                    gloo::console::warn!("API unreachable:", api_base_url());
                }
            });
        }
    };
    connect(());

    let run = {
        let controller = controller.clone();
        move |workflow: Workflow| {
            let controller = controller.clone();
            spawn_local(async move {
                let accepted = match workflow {
                    Workflow::ImageOnly => controller.run_image_only().await,
                    Workflow::Complete => controller.run_complete().await,
                    Workflow::Test => controller.run_test().await,
                };
                match accepted {
                    Ok(outcome) => {
                        if let Some(error) = outcome.error() {
                            gloo::console::warn!(format!(
                                "{} failed ({}): {}",
                                workflow.label(),
                                error.status_code,
                                error.message
                            ));
                        }
                    }
                    Err(rejected) => gloo::console::warn!(format!("{}: {}", workflow.label(), rejected)),
                }
            });
        }
    };

    let on_image_selected = {
        let controller = controller.clone();
        move |image: SelectedImage| controller.select_image(image)
    };
    let on_clear = {
        let controller = controller.clone();
        move |_: ()| controller.clear_selection()
    };
    let on_city_select = {
        let controller = controller.clone();
        move |city: City| controller.select_city(city)
    };
    let on_dismiss = {
        let controller = controller.clone();
        move |_: ()| controller.dismiss_error()
    };

    let connectivity = Signal::derive(move || snapshot.with(|s| s.connectivity));
    let is_running = Signal::derive(move || snapshot.with(Snapshot::is_running));
    let running = Signal::derive(move || {
        snapshot.with(|s| if s.is_running() { s.active_workflow } else { None })
    });
    let progress = Signal::derive(move || snapshot.with(|s| s.upload_progress));
    let cities = Signal::derive(move || snapshot.with(|s| s.cities.clone()));
    let selected_image = Signal::derive(move || {
        snapshot.with(|s| s.selection.image().map(|i| (i.name.clone(), i.size())))
    });
    let selected_city = Signal::derive(move || snapshot.with(|s| s.selection.city().cloned()));
    let selected_city_id = Signal::derive(move || selected_city.get().map(|c| c.id));
    let has_image = Signal::derive(move || selected_image.get().is_some());
    let has_selection = Signal::derive(move || snapshot.with(|s| !s.selection.is_none()));

    // 進捗更新のたびに結果パネルを作り直さない
    let result = Memo::new(move |_| snapshot.with(|s| s.result().cloned()));
    let error = Memo::new(move |_| snapshot.with(|s| s.error().cloned()));

    let main_content = move || match connectivity.get() {
        ConnectivityState::Connected => {
            let run_image = run.clone();
            let run_complete = run.clone();
            let run_test = run.clone();
            view! {
                <div class="main-content">
                    <div class="card">
                        <div class="section-header">
                            <h2>"Upload Satellite Image"</h2>
                        </div>
                        <UploadArea
                            selected=selected_image
                            disabled=is_running
                            on_image_selected=on_image_selected.clone()
                            on_clear=on_clear.clone()
                        />
                        <Show when=move || { let p = progress.get(); p > 0 && p < 100 }>
                            <ProgressBar progress=progress />
                        </Show>
                    </div>

                    <div class="divider"><span>"OR"</span></div>

                    <div class="card">
                        <CityGallery
                            cities=cities
                            selected_id=selected_city_id
                            disabled=is_running
                            on_city_select=on_city_select.clone()
                        />
                    </div>

                    <div class="actions-section">
                        <ActionButtons
                            has_image=has_image
                            has_selection=has_selection
                            running=running
                            on_analyze_image=move |_| run_image(Workflow::ImageOnly)
                            on_complete=move |_| run_complete(Workflow::Complete)
                            on_test=move |_| run_test(Workflow::Test)
                        />
                        {move || {
                            let image = selected_image.get().map(|(name, _)| {
                                view! { <p>{format!("📸 Selected Image: {}", name)}</p> }
                            });
                            let city = selected_city.get().map(|city| {
                                view! { <p>{format!("🏙️ Selected City: {}", city.name)}</p> }
                            });
                            view! { <div class="selection-info">{image}{city}</div> }
                        }}
                    </div>

                    {move || {
                        if is_running.get() {
                            view! { <AnalysisLoading /> }.into_any()
                        } else {
                            result
                                .get()
                                .map(|result| view! { <AnalysisResults result=result /> })
                                .into_any()
                        }
                    }}
                </div>
            }
            .into_any()
        }
        ConnectivityState::Checking => view! {
            <div class="card loading"><div class="spinner" /><p>"Connecting to the API server..."</p></div>
        }
        .into_any(),
        ConnectivityState::Disconnected => view! {
            <div class="card offline">
                <h2>"API server unavailable"</h2>
                <p>{format!("Start the analysis server at {} and press Retry.", api_base_url())}</p>
            </div>
        }
        .into_any(),
    };

    view! {
        <div class="container">
            <Header connectivity=connectivity api_url=api_base_url() on_retry=connect />

            {move || error.get().map(|error| view! { <ErrorBanner error=error on_dismiss=on_dismiss.clone() /> })}

            {main_content}
        </div>
    }
}
