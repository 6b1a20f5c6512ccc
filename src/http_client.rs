//! reqwestによる解析サーバクライアント
//!
//! 画像アップロードはチャンク単位のストリームとして送り、
//! 送出済みバイト数から進捗を報告する。

use crate::error::Result;
use futures::stream;
use postdisaster_common::api::{
    analyze_city_path, decode_body, endpoint_url, parse_error_body, upload_percent,
    ANALYZE_IMAGE_PATH, CITIES_PATH, COMPLETE_ANALYSIS_PATH, ROOT_PATH, TEST_ANALYSIS_PATH,
    UPLOAD_FIELD,
};
use postdisaster_common::{
    AnalysisApi, AnalysisResult, ApiFailure, CitiesResponse, City, DisasterAnalysis, ProgressFn,
    SatelliteAnalysis, SelectedImage,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// アップロードのチャンクサイズ
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        endpoint_url(&self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, ApiFailure> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await.map_err(transport_failure)?;
        read_json(response).await
    }

    async fn post_image<T: DeserializeOwned>(
        &self,
        path: &str,
        image: &SelectedImage,
        on_progress: ProgressFn,
    ) -> std::result::Result<T, ApiFailure> {
        let url = self.url(path);
        debug!(%url, name = %image.name, size = image.size(), "POST multipart");

        let part = Part::stream_with_length(
            progress_body(Arc::clone(&image.bytes), on_progress),
            image.size() as u64,
        )
        .file_name(image.name.clone())
        .mime_str(&image.mime)
        .map_err(|e| ApiFailure::client(e.to_string()))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_failure)?;
        read_json(response).await
    }
}

impl AnalysisApi for HttpApi {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn probe(&self) -> std::result::Result<(), ApiFailure> {
        let response = self
            .client
            .get(self.url(ROOT_PATH))
            .send()
            .await
            .map_err(transport_failure)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.bytes().await.map_err(transport_failure)?;
            Err(ApiFailure::Status {
                status: status.as_u16(),
                body: parse_error_body(&body),
            })
        }
    }

    async fn cities(&self) -> std::result::Result<Vec<City>, ApiFailure> {
        let response: CitiesResponse = self.get_json(CITIES_PATH).await?;
        Ok(response.cities)
    }

    async fn analyze_image(
        &self,
        image: &SelectedImage,
        on_progress: ProgressFn,
    ) -> std::result::Result<SatelliteAnalysis, ApiFailure> {
        self.post_image(ANALYZE_IMAGE_PATH, image, on_progress).await
    }

    async fn analyze_city(&self, city_id: i64) -> std::result::Result<DisasterAnalysis, ApiFailure> {
        self.get_json(&analyze_city_path(city_id)).await
    }

    async fn complete_analysis(
        &self,
        image: &SelectedImage,
        on_progress: ProgressFn,
    ) -> std::result::Result<AnalysisResult, ApiFailure> {
        self.post_image(COMPLETE_ANALYSIS_PATH, image, on_progress).await
    }

    async fn test_analysis(&self) -> std::result::Result<AnalysisResult, ApiFailure> {
        self.get_json(TEST_ANALYSIS_PATH).await
    }
}

/// 送出したチャンクごとに進捗を報告するリクエストボディ
fn progress_body(data: Arc<[u8]>, on_progress: ProgressFn) -> Body {
    let total = data.len();
    let chunks = (0..total).step_by(UPLOAD_CHUNK_SIZE).map(move |start| {
        let end = (start + UPLOAD_CHUNK_SIZE).min(total);
        let chunk = data[start..end].to_vec();
        on_progress(upload_percent(end as u64, total as u64));
        Ok::<_, std::io::Error>(chunk)
    });
    Body::wrap_stream(stream::iter(chunks))
}

/// ステータスを確認して本文をデコード
async fn read_json<T: DeserializeOwned>(response: Response) -> std::result::Result<T, ApiFailure> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport_failure)?;
    if !status.is_success() {
        return Err(ApiFailure::Status {
            status: status.as_u16(),
            body: parse_error_body(&body),
        });
    }
    decode_body(&body)
}

/// reqwestのエラーを分類
///
/// リクエスト構築前の失敗はクライアント側、それ以外（接続失敗・タイムアウト・切断）は応答なし。
fn transport_failure(err: reqwest::Error) -> ApiFailure {
    if err.is_builder() {
        ApiFailure::client(err.to_string())
    } else {
        ApiFailure::no_response(err.to_string())
    }
}
