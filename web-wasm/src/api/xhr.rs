//! XMLHttpRequestによる解析サーバクライアント
//!
//! fetch はアップロード進捗を取れないため、画像送信も含めて XHR を使う。
//! フューチャーが破棄された場合はリクエストを中断する。

use futures::channel::oneshot;
use js_sys::{Array, Uint8Array};
use postdisaster_common::api::{
    analyze_city_path, decode_body, endpoint_url, parse_error_body, upload_percent,
    ANALYZE_IMAGE_PATH, CITIES_PATH, COMPLETE_ANALYSIS_PATH, ROOT_PATH, TEST_ANALYSIS_PATH,
    UPLOAD_FIELD,
};
use postdisaster_common::{
    AnalysisApi, AnalysisResult, ApiFailure, CitiesResponse, City, DisasterAnalysis, ProgressFn,
    SatelliteAnalysis, SelectedImage,
};
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys::{
    Blob, BlobPropertyBag, Event, FormData, ProgressEvent, XmlHttpRequest,
    XmlHttpRequestResponseType,
};

/// XHRの完了状態（DONE）
const READY_STATE_DONE: u16 = 4;

pub struct XhrApi {
    base_url: String,
    timeout_ms: u32,
}

impl XhrApi {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiFailure> {
        let response = self.send("GET", path, None, None).await?;
        response.into_json()
    }

    async fn post_image<T: DeserializeOwned>(
        &self,
        path: &str,
        image: &SelectedImage,
        on_progress: ProgressFn,
    ) -> Result<T, ApiFailure> {
        let form = image_form(image).map_err(js_client_failure)?;
        let response = self.send("POST", path, Some(form), Some(on_progress)).await?;
        response.into_json()
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        form: Option<FormData>,
        on_progress: Option<ProgressFn>,
    ) -> Result<XhrResponse, ApiFailure> {
        let url = endpoint_url(&self.base_url, path);
        let xhr = XmlHttpRequest::new().map_err(js_client_failure)?;
        xhr.open_with_async(method, &url, true)
            .map_err(js_client_failure)?;
        xhr.set_timeout(self.timeout_ms);
        xhr.set_response_type(XmlHttpRequestResponseType::Text);

        let (tx, rx) = oneshot::channel();
        let handlers = Handlers::attach(&xhr, tx, on_progress).map_err(js_client_failure)?;
        let guard = AbortOnDrop { xhr: &xhr };

        let sent = match &form {
            Some(form) => xhr.send_with_opt_form_data(Some(form)),
            None => xhr.send(),
        };
        sent.map_err(|e| match js_message(&e) {
            reason if reason.contains("NetworkError") => ApiFailure::no_response(reason),
            reason => ApiFailure::client(reason),
        })?;

        let settled = rx
            .await
            .unwrap_or_else(|_| Err(ApiFailure::client("request handler dropped")));
        drop(guard);
        drop(handlers);
        settled?;

        let status = xhr.status().map_err(js_client_failure)?;
        let body = xhr.response_text().ok().flatten().unwrap_or_default();
        Ok(XhrResponse { status, body })
    }
}

impl AnalysisApi for XhrApi {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn probe(&self) -> Result<(), ApiFailure> {
        let response = self.send("GET", ROOT_PATH, None, None).await?;
        response.check_status().map(|_| ())
    }

    async fn cities(&self) -> Result<Vec<City>, ApiFailure> {
        let response: CitiesResponse = self.get_json(CITIES_PATH).await?;
        Ok(response.cities)
    }

    async fn analyze_image(
        &self,
        image: &SelectedImage,
        on_progress: ProgressFn,
    ) -> Result<SatelliteAnalysis, ApiFailure> {
        self.post_image(ANALYZE_IMAGE_PATH, image, on_progress).await
    }

    async fn analyze_city(&self, city_id: i64) -> Result<DisasterAnalysis, ApiFailure> {
        self.get_json(&analyze_city_path(city_id)).await
    }

    async fn complete_analysis(
        &self,
        image: &SelectedImage,
        on_progress: ProgressFn,
    ) -> Result<AnalysisResult, ApiFailure> {
        self.post_image(COMPLETE_ANALYSIS_PATH, image, on_progress).await
    }

    async fn test_analysis(&self) -> Result<AnalysisResult, ApiFailure> {
        self.get_json(TEST_ANALYSIS_PATH).await
    }
}

struct XhrResponse {
    status: u16,
    body: String,
}

impl XhrResponse {
    /// 2xx 以外は本文つきのステータスエラー
    fn check_status(self) -> Result<String, ApiFailure> {
        if (200..300).contains(&self.status) {
            Ok(self.body)
        } else {
            Err(ApiFailure::Status {
                status: self.status,
                body: parse_error_body(self.body.as_bytes()),
            })
        }
    }

    fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiFailure> {
        let body = self.check_status()?;
        decode_body(body.as_bytes())
    }
}

type Settle = Rc<RefCell<Option<oneshot::Sender<Result<(), ApiFailure>>>>>;

/// XHRのイベントハンドラ（完了まで保持する）
struct Handlers {
    _load: Closure<dyn FnMut(Event)>,
    _error: Closure<dyn FnMut(Event)>,
    _timeout: Closure<dyn FnMut(Event)>,
    _abort: Closure<dyn FnMut(Event)>,
    _progress: Option<Closure<dyn FnMut(ProgressEvent)>>,
}

impl Handlers {
    fn attach(
        xhr: &XmlHttpRequest,
        tx: oneshot::Sender<Result<(), ApiFailure>>,
        on_progress: Option<ProgressFn>,
    ) -> Result<Self, JsValue> {
        let settle: Settle = Rc::new(RefCell::new(Some(tx)));

        let load = settle_with(&settle, Ok(()));
        let error = settle_with(&settle, Err(ApiFailure::no_response("network error")));
        let timeout = settle_with(&settle, Err(ApiFailure::no_response("request timed out")));
        let abort = settle_with(&settle, Err(ApiFailure::no_response("request aborted")));

        xhr.set_onload(Some(load.as_ref().unchecked_ref()));
        xhr.set_onerror(Some(error.as_ref().unchecked_ref()));
        xhr.set_ontimeout(Some(timeout.as_ref().unchecked_ref()));
        xhr.set_onabort(Some(abort.as_ref().unchecked_ref()));

        let progress = match on_progress {
            Some(on_progress) => {
                let closure = Closure::<dyn FnMut(ProgressEvent)>::new(move |ev: ProgressEvent| {
                    if ev.length_computable() {
                        on_progress(upload_percent(ev.loaded() as u64, ev.total() as u64));
                    }
                });
                xhr.upload()?
                    .set_onprogress(Some(closure.as_ref().unchecked_ref()));
                Some(closure)
            }
            None => None,
        };

        Ok(Self {
            _load: load,
            _error: error,
            _timeout: timeout,
            _abort: abort,
            _progress: progress,
        })
    }
}

/// 最初に発火したイベントだけが結果を確定する
fn settle_with(settle: &Settle, result: Result<(), ApiFailure>) -> Closure<dyn FnMut(Event)> {
    let settle = Rc::clone(settle);
    Closure::<dyn FnMut(Event)>::new(move |_: Event| {
        if let Some(tx) = settle.borrow_mut().take() {
            let _ = tx.send(result.clone());
        }
    })
}

/// 完了前に破棄されたリクエストを中断
struct AbortOnDrop<'a> {
    xhr: &'a XmlHttpRequest,
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        if self.xhr.ready_state() != READY_STATE_DONE {
            let _ = self.xhr.abort();
        }
    }
}

/// 画像1枚の multipart フォーム
fn image_form(image: &SelectedImage) -> Result<FormData, JsValue> {
    let bytes = Uint8Array::from(&image.bytes[..]);
    let parts = Array::of1(&bytes);
    let options = BlobPropertyBag::new();
    options.set_type(&image.mime);
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;

    let form = FormData::new()?;
    form.append_with_blob_and_filename(UPLOAD_FIELD, &blob, &image.name)?;
    Ok(form)
}

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", value))
}

fn js_client_failure(value: JsValue) -> ApiFailure {
    ApiFailure::client(js_message(&value))
}

#[cfg(all(target_arch = "wasm32", test))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn wasm_image_form_has_file_field() {
        let image = SelectedImage::new("city.png", "image/png", vec![1u8, 2, 3]);
        let form = image_form(&image).expect("form");
        assert!(form.has(UPLOAD_FIELD));
    }

    #[wasm_bindgen_test]
    fn wasm_status_error_keeps_body() {
        let response = XhrResponse {
            status: 429,
            body: r#"{"detail": "Rate limited"}"#.to_string(),
        };
        match response.check_status() {
            Err(ApiFailure::Status { status, body }) => {
                assert_eq!(status, 429);
                assert!(body.is_some());
            }
            _ => panic!("expected status failure"),
        }
    }
}
