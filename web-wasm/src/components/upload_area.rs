//! アップロードエリアコンポーネント
//!
//! 画像ファイルのみ、10MBまでを受け付ける。読み込んだバイト列を
//! `SelectedImage` として親へ渡す。

use leptos::prelude::*;
use postdisaster_common::SelectedImage;
use wasm_bindgen::prelude::*;
use web_sys::{DragEvent, File, FileReader, HtmlInputElement, ProgressEvent, Url};

/// アップロード可能な画像サイズの上限（10MB）
const MAX_UPLOAD_BYTES: f64 = 10.0 * 1024.0 * 1024.0;

/// 受け付けるかどうかを判定（拒否時はメッセージ）
fn admit(mime: &str, size: f64) -> Result<(), &'static str> {
    if !mime.starts_with("image/") {
        return Err("Please select an image file");
    }
    if size > MAX_UPLOAD_BYTES {
        return Err("File size must be less than 10MB");
    }
    Ok(())
}

#[component]
pub fn UploadArea<FS, FC>(
    /// 選択中の画像（ファイル名, バイト数）
    selected: Signal<Option<(String, usize)>>,
    disabled: Signal<bool>,
    on_image_selected: FS,
    on_clear: FC,
) -> impl IntoView
where
    FS: Fn(SelectedImage) + 'static + Clone + Send + Sync,
    FC: Fn(()) + 'static + Clone + Send + Sync,
{
    let (is_dragover, set_is_dragover) = signal(false);
    let (preview_url, set_preview_url) = signal(None::<String>);
    let (rejection, set_rejection) = signal(None::<&'static str>);
    let input_ref = NodeRef::<leptos::html::Input>::new();

    let handle_file = move |file: File| {
        if let Err(message) = admit(&file.type_(), file.size()) {
            gloo::console::warn!(format!("rejected {}: {}", file.name(), message));
            set_rejection.set(Some(message));
            return;
        }
        set_rejection.set(None);
        if let Some(old) = preview_url.get_untracked() {
            let _ = Url::revoke_object_url(&old);
        }
        set_preview_url.set(Url::create_object_url_with_blob(&file).ok());
        read_file(file, on_image_selected.clone());
    };

    let on_drop = {
        let handle_file = handle_file.clone();
        move |ev: DragEvent| {
            ev.prevent_default();
            set_is_dragover.set(false);
            if disabled.get_untracked() {
                return;
            }
            if let Some(file) = ev
                .data_transfer()
                .and_then(|dt| dt.files())
                .and_then(|files| files.get(0))
            {
                handle_file(file);
            }
        }
    };

    let on_dragover = move |ev: DragEvent| {
        ev.prevent_default();
        if !disabled.get_untracked() {
            set_is_dragover.set(true);
        }
    };

    let on_dragleave = move |_: DragEvent| {
        set_is_dragover.set(false);
    };

    let on_change = {
        let handle_file = handle_file.clone();
        move |ev: web_sys::Event| {
            let input: HtmlInputElement = event_target(&ev);
            if let Some(file) = input.files().and_then(|files| files.get(0)) {
                handle_file(file);
            }
        }
    };

    let open_dialog = move |_| {
        if disabled.get_untracked() {
            return;
        }
        if let Some(input) = input_ref.get() {
            input.click();
        }
    };

    let clear = move |ev: web_sys::MouseEvent| {
        ev.stop_propagation();
        if disabled.get_untracked() {
            return;
        }
        if let Some(old) = preview_url.get_untracked() {
            let _ = Url::revoke_object_url(&old);
        }
        set_preview_url.set(None);
        if let Some(input) = input_ref.get() {
            input.set_value("");
        }
        on_clear(());
    };

    view! {
        <div class="image-upload">
            <input
                node_ref=input_ref
                type="file"
                accept="image/*"
                style="display: none"
                on:change=on_change
            />
            <Show
                when=move || selected.get().is_some()
                fallback=move || view! {
                    <div
                        class=move || {
                            let mut classes = vec!["upload-area"];
                            if is_dragover.get() {
                                classes.push("dragover");
                            }
                            if disabled.get() {
                                classes.push("disabled");
                            }
                            classes.join(" ")
                        }
                        on:drop=on_drop.clone()
                        on:dragover=on_dragover
                        on:dragleave=on_dragleave
                        on:click=open_dialog
                    >
                        <div class="upload-icon">"🛰"</div>
                        <p>"Drag & drop a satellite image or click to select"</p>
                        <p class="text-muted">"Images up to 10MB"</p>
                    </div>
                }
            >
                <div class="selected-image">
                    <div class="image-preview">
                        {move || preview_url.get().map(|url| view! { <img src=url alt="Selected" /> })}
                        {
                            // 子要素クロージャは何度でも呼ばれる
                            let clear = clear.clone();
                            view! {
                                <Show when=move || !disabled.get()>
                                    <button
                                        class="remove-image-btn"
                                        on:click={
                                            let clear = clear.clone();
                                            move |ev| clear(ev)
                                        }
                                    >
                                        "✕"
                                    </button>
                                </Show>
                            }
                        }
                    </div>
                    <div class="image-info">
                        {move || selected.get().map(|(name, size)| view! {
                            <p><strong>"File: "</strong>{name}</p>
                            <p><strong>"Size: "</strong>{format!("{:.2} MB", size as f64 / (1024.0 * 1024.0))}</p>
                        })}
                    </div>
                </div>
            </Show>
            {move || rejection.get().map(|message| view! { <p class="upload-error">{message}</p> })}
        </div>
    }
}

/// ファイルを読み込んでバイト列として渡す
fn read_file<F>(file: File, on_image_selected: F)
where
    F: Fn(SelectedImage) + 'static,
{
    let reader = match FileReader::new() {
        Ok(reader) => reader,
        Err(e) => {
            gloo::console::error!("FileReader unavailable", e);
            return;
        }
    };

    let name = file.name();
    let mime = file.type_();
    let reader_clone = reader.clone();
    let onload = Closure::once_into_js(move |_: ProgressEvent| {
        if let Ok(result) = reader_clone.result() {
            let bytes = js_sys::Uint8Array::new(&result).to_vec();
            on_image_selected(SelectedImage::new(name, mime, bytes));
        }
    });

    reader.set_onload(Some(onload.unchecked_ref()));
    if let Err(e) = reader.read_as_array_buffer(&file) {
        gloo::console::error!("failed to read file", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit() {
        assert!(admit("image/png", 1024.0).is_ok());
        assert!(admit("image/jpeg", MAX_UPLOAD_BYTES).is_ok());
        assert_eq!(admit("application/pdf", 10.0), Err("Please select an image file"));
        assert_eq!(
            admit("image/tiff", MAX_UPLOAD_BYTES + 1.0),
            Err("File size must be less than 10MB")
        );
    }
}

#[cfg(all(target_arch = "wasm32", test))]
mod wasm_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn wasm_remove_button_clears_selection() {
        let cleared = Arc::new(AtomicUsize::new(0));
        let parent: web_sys::HtmlElement = document()
            .create_element("div")
            .expect("div")
            .unchecked_into();
        document().body().expect("body").append_child(&parent).expect("append");

        let counter = Arc::clone(&cleared);
        let _mounted = leptos::mount::mount_to(parent.clone(), move || {
            view! {
                <UploadArea
                    selected=Signal::derive(|| Some(("coast.png".to_string(), 2048)))
                    disabled=Signal::derive(|| false)
                    on_image_selected=|_: SelectedImage| {}
                    on_clear=move |_: ()| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                />
            }
        });

        let button: web_sys::HtmlElement = parent
            .query_selector(".remove-image-btn")
            .expect("query")
            .expect("remove button rendered")
            .unchecked_into();
        button.click();
        button.click();
        assert_eq!(cleared.load(Ordering::SeqCst), 2);
    }
}
