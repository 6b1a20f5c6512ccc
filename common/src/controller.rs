//! 解析オーケストレーションのコントローラ
//!
//! `Orchestrator` をミューテックスで共有し、`AnalysisApi` 経由でワークフローを駆動する。
//! ロックは await をまたいで保持しない。状態が変わるたびにリスナーへ
//! スナップショットを通知する（ロック解放後に呼ぶ）。

use crate::api::{AnalysisApi, ProgressFn};
use crate::error::{ApiFailure, ValidationError};
use crate::normalize;
use crate::orchestrator::{Orchestrator, Outcome, RunId, RunRequest, RunTicket, Snapshot};
use crate::types::{City, SelectedImage, Workflow};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// スナップショット変更通知
pub type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

const CANCELLED_MESSAGE: &str = "Request was cancelled before it settled";

/// オーケストレーションコントローラ
pub struct Controller<A> {
    api: Arc<A>,
    state: Arc<Mutex<Orchestrator>>,
    listener: Option<Listener>,
}

impl<A> Clone for Controller<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            state: Arc::clone(&self.state),
            listener: self.listener.clone(),
        }
    }
}

impl<A: AnalysisApi> Controller<A> {
    pub fn new(api: A) -> Self {
        Self {
            api: Arc::new(api),
            state: Arc::new(Mutex::new(Orchestrator::new())),
            listener: None,
        }
    }

    /// 状態変更のたびに呼ばれるリスナーを設定
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    // =============================================
    // 選択コマンド（同期、ネットワークなし）
    // =============================================

    pub fn select_image(&self, image: SelectedImage) {
        debug!(name = %image.name, size = image.size(), "image selected");
        self.update(|o| o.select_image(image));
    }

    pub fn select_city(&self, city: City) {
        debug!(city_id = city.id, name = %city.name, "city selected");
        self.update(|o| o.select_city(city));
    }

    pub fn clear_selection(&self) {
        self.update(Orchestrator::clear_selection);
    }

    pub fn dismiss_error(&self) {
        self.update(Orchestrator::dismiss_error);
    }

    // =============================================
    // 実行コマンド
    // =============================================

    /// 画像のみ解析（都市判定）
    pub async fn run_image_only(&self) -> Result<Outcome, ValidationError> {
        self.run(Workflow::ImageOnly).await
    }

    /// 完全解析（選択画像のアップロード、または選択都市の災害解析）
    pub async fn run_complete(&self) -> Result<Outcome, ValidationError> {
        self.run(Workflow::Complete).await
    }

    /// サーバ既定画像でのテスト解析
    pub async fn run_test(&self) -> Result<Outcome, ValidationError> {
        self.run(Workflow::Test).await
    }

    async fn run(&self, workflow: Workflow) -> Result<Outcome, ValidationError> {
        let plan = self.update(|o| o.begin(workflow)).map_err(|e| {
            debug!(?workflow, "run rejected: {}", e);
            e
        })?;
        info!(?workflow, "run started");

        let request = plan.request;
        let in_flight = InFlight::new(self, plan.ticket);
        let on_progress = self.progress_reporter(in_flight.run_id());

        let response = match request {
            RunRequest::ImageOnly(image) => self
                .api
                .analyze_image(&image, on_progress)
                .await
                .map(normalize::image_only_result),
            RunRequest::CompleteWithImage(image) => {
                self.api.complete_analysis(&image, on_progress).await
            }
            RunRequest::CompleteWithCity(city) => self
                .api
                .analyze_city(city.id)
                .await
                .map(|disaster| normalize::city_result(&city, disaster)),
            RunRequest::Test => self.api.test_analysis().await,
        };

        let outcome = in_flight.settle(response);
        match &outcome {
            Outcome::Completed(result) => info!(?workflow, status = ?result.status, "run completed"),
            Outcome::Failed(error) => warn!(
                ?workflow,
                status_code = error.status_code,
                "run failed: {}",
                error.message
            ),
        }
        Ok(outcome)
    }

    /// 進捗コールバック（終了済みの実行からの報告は状態機械側で捨てる）
    fn progress_reporter(&self, run: RunId) -> ProgressFn {
        let state = Arc::clone(&self.state);
        let listener = self.listener.clone();
        Arc::new(move |percent| {
            let snapshot = {
                let mut o = state.lock().unwrap_or_else(PoisonError::into_inner);
                if !o.report_progress(run, percent) {
                    return;
                }
                o.snapshot()
            };
            if let Some(listener) = &listener {
                listener(&snapshot);
            }
        })
    }

    // =============================================
    // 疎通確認・都市一覧
    // =============================================

    /// 疎通確認。接続できれば true。
    pub async fn check_connectivity(&self) -> bool {
        let probe = self.update(Orchestrator::begin_probe);
        let response = self.api.probe().await;
        let connected = response.is_ok();
        match &response {
            Ok(()) => info!(url = self.api.base_url(), "api connected"),
            Err(failure) => warn!(url = self.api.base_url(), "api unreachable: {}", failure),
        }
        let base_url = self.api.base_url().to_string();
        self.update(|o| o.finish_probe(probe, response, &base_url));
        connected
    }

    /// 都市一覧をサーバの内容で更新。失敗時は既存の一覧を維持してログのみ出す。
    pub async fn load_cities(&self) -> Vec<City> {
        match self.api.cities().await {
            Ok(cities) => {
                debug!(count = cities.len(), "cities loaded");
                self.update(|o| o.merge_cities(cities));
            }
            Err(failure) => warn!("failed to load cities: {}", failure),
        }
        self.snapshot().cities
    }

    // =============================================
    // 内部
    // =============================================

    fn lock(&self) -> MutexGuard<'_, Orchestrator> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 状態を更新してリスナーへ通知
    fn update<R>(&self, f: impl FnOnce(&mut Orchestrator) -> R) -> R {
        let (value, snapshot) = {
            let mut o = self.lock();
            let value = f(&mut o);
            (value, o.snapshot())
        };
        if let Some(listener) = &self.listener {
            listener(&snapshot);
        }
        value
    }
}

/// 実行中の引換券を保持するガード
///
/// 応答前にフューチャーが破棄された場合もクライアント側の失敗として確定し、
/// `Running` のまま残らないようにする。
struct InFlight<'a, A: AnalysisApi> {
    controller: &'a Controller<A>,
    ticket: Option<RunTicket>,
    run_id: RunId,
}

impl<'a, A: AnalysisApi> InFlight<'a, A> {
    fn new(controller: &'a Controller<A>, ticket: RunTicket) -> Self {
        let run_id = ticket.id();
        Self {
            controller,
            ticket: Some(ticket),
            run_id,
        }
    }

    fn run_id(&self) -> RunId {
        self.run_id
    }

    fn settle(mut self, response: Result<crate::types::AnalysisResult, ApiFailure>) -> Outcome {
        match self.ticket.take() {
            Some(ticket) => self.controller.update(|o| o.settle(ticket, response)),
            None => unreachable!("run settled twice"),
        }
    }
}

impl<A: AnalysisApi> Drop for InFlight<'_, A> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            warn!(workflow = ?ticket.workflow(), "run dropped before settling");
            self.controller
                .update(|o| o.settle(ticket, Err(ApiFailure::client(CANCELLED_MESSAGE))));
        }
    }
}
