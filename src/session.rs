//! CLIからのワークフロー実行
//!
//! 疎通確認を通過した場合のみワークフローを実行する。アップロード進捗は
//! コントローラのスナップショットからプログレスバーへ反映する。

use crate::error::{ConsoleError, Result};
use crate::http_client::HttpApi;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use postdisaster_common::{
    AnalysisResult, City, Controller, Outcome, SelectedImage, Snapshot, ValidationError, Workflow,
};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const UPLOAD_TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {pos:>3}%";
const WAIT_TEMPLATE: &str = "{spinner} {msg} ({elapsed})";
const WAIT_MESSAGE: &str = "Analyzing... AI agents are working together, this may take a few minutes";

pub struct Session {
    controller: Controller<HttpApi>,
    bar: ProgressBar,
}

impl Session {
    pub fn new(api: HttpApi) -> Self {
        let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::hidden());
        let listener_bar = bar.clone();
        let controller = Controller::new(api).with_listener(move |snapshot: &Snapshot| {
            show_progress(&listener_bar, snapshot);
        });
        Self { controller, bar }
    }

    pub fn controller(&self) -> &Controller<HttpApi> {
        &self.controller
    }

    /// 疎通確認。接続できなければ正規化済みエラーを返す。
    pub async fn connect(&self) -> Result<()> {
        if self.controller.check_connectivity().await {
            return Ok(());
        }
        match self.controller.snapshot().error().cloned() {
            Some(error) => Err(ConsoleError::Disconnected(error)),
            None => Err(ConsoleError::ProbeSuperseded),
        }
    }

    /// サーバから都市一覧を更新（失敗時は組み込みカタログのまま）
    pub async fn cities(&self) -> Vec<City> {
        self.controller.load_cities().await
    }

    pub async fn analyze_image(&self, image: SelectedImage) -> Result<AnalysisResult> {
        self.controller.select_image(image);
        self.drive(Workflow::ImageOnly, true, self.controller.run_image_only())
            .await
    }

    pub async fn complete_with_image(&self, image: SelectedImage) -> Result<AnalysisResult> {
        self.controller.select_image(image);
        self.drive(Workflow::Complete, true, self.controller.run_complete())
            .await
    }

    pub async fn complete_with_city(&self, city: City) -> Result<AnalysisResult> {
        self.controller.select_city(city);
        self.drive(Workflow::Complete, false, self.controller.run_complete())
            .await
    }

    pub async fn test(&self) -> Result<AnalysisResult> {
        self.drive(Workflow::Test, false, self.controller.run_test())
            .await
    }

    async fn drive(
        &self,
        workflow: Workflow,
        uploads: bool,
        run: impl Future<Output = std::result::Result<Outcome, ValidationError>>,
    ) -> Result<AnalysisResult> {
        self.prepare_bar(uploads);
        eprintln!("{}", workflow.label());
        let outcome = run.await;
        self.bar.finish_and_clear();

        match outcome? {
            Outcome::Completed(result) => {
                debug!(status = ?result.status, "result received");
                Ok(result)
            }
            Outcome::Failed(error) => Err(ConsoleError::Analysis(error)),
        }
    }

    fn prepare_bar(&self, uploads: bool) {
        self.bar.reset();
        if uploads {
            if let Ok(style) = ProgressStyle::with_template(UPLOAD_TEMPLATE) {
                self.bar.set_style(style.progress_chars("=> "));
            }
            self.bar.set_message("Uploading");
        } else {
            if let Ok(style) = ProgressStyle::with_template(WAIT_TEMPLATE) {
                self.bar.set_style(style);
            }
            self.bar.set_message(WAIT_MESSAGE);
            self.bar.enable_steady_tick(Duration::from_millis(120));
        }
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }
}

/// スナップショットの進捗をバーへ反映
///
/// 送信が終わったら応答待ちのスピナーへ切り替える。
fn show_progress(bar: &ProgressBar, snapshot: &Snapshot) {
    if !snapshot.is_running() || snapshot.upload_progress == 0 {
        return;
    }
    bar.set_position(u64::from(snapshot.upload_progress));
    if snapshot.upload_progress >= 100 && bar.message() == "Uploading" {
        if let Ok(style) = ProgressStyle::with_template(WAIT_TEMPLATE) {
            bar.set_style(style);
        }
        bar.set_message(WAIT_MESSAGE);
        bar.enable_steady_tick(Duration::from_millis(120));
    }
}
