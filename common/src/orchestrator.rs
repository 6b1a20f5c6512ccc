//! 解析オーケストレーションの状態機械
//!
//! I/Oを持たない同期の状態遷移のみを扱う。ネットワーク呼び出しは
//! `controller::Controller` が `begin` → (進捗報告) → `settle` の順で駆動する。
//!
//! - 選択状態は `Selection` で排他
//! - 実行中は1件のみ（`begin` で検査と遷移を同時に行う）
//! - 完了・失敗のどちらでも `Idle` / 進捗0に戻る
//! - 進捗は実行IDで照合し、終了済みの実行からの報告は捨てる

use crate::error::{ApiFailure, ErrorDescriptor, ValidationError};
use crate::normalize::{describe_failure, FailureOrigin};
use crate::types::{
    AnalysisResult, City, ConnectivityState, RunState, SelectedImage, Selection, Workflow,
};

/// 実行の識別子（進捗報告の照合に使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

/// 受理された実行の引換券
///
/// `settle` で消費されるため、1つの実行は1回しか確定できない。
#[derive(Debug, PartialEq, Eq)]
pub struct RunTicket {
    id: RunId,
    workflow: Workflow,
}

impl RunTicket {
    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }
}

/// 実行開始時にキャプチャしたリクエスト入力
#[derive(Debug, Clone, PartialEq)]
pub enum RunRequest {
    ImageOnly(SelectedImage),
    CompleteWithImage(SelectedImage),
    CompleteWithCity(City),
    Test,
}

impl RunRequest {
    /// ファイルアップロードを伴うか
    pub fn uploads(&self) -> bool {
        matches!(self, RunRequest::ImageOnly(_) | RunRequest::CompleteWithImage(_))
    }
}

/// 受理された実行
#[derive(Debug)]
pub struct RunPlan {
    pub ticket: RunTicket,
    pub request: RunRequest,
}

/// 疎通確認の世代
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeId(u64);

/// 直近の結果（結果とエラーはどちらか一方のみ保持）
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(AnalysisResult),
    Failed(ErrorDescriptor),
}

impl Outcome {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Outcome::Completed(result) => Some(result),
            Outcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Failed(error) => Some(error),
        }
    }
}

/// 表示層向けの読み取り専用スナップショット
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub selection: Selection,
    pub run_state: RunState,
    pub active_workflow: Option<Workflow>,
    pub upload_progress: u8,
    pub outcome: Option<Outcome>,
    pub connectivity: ConnectivityState,
    pub cities: Vec<City>,
}

impl Snapshot {
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.outcome.as_ref().and_then(Outcome::result)
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        self.outcome.as_ref().and_then(Outcome::error)
    }
}

#[derive(Debug)]
struct ActiveRun {
    id: RunId,
    workflow: Workflow,
    uploads: bool,
}

/// オーケストレーション状態
#[derive(Debug)]
pub struct Orchestrator {
    selection: Selection,
    active: Option<ActiveRun>,
    upload_progress: u8,
    outcome: Option<Outcome>,
    connectivity: ConnectivityState,
    cities: Vec<City>,
    next_run: u64,
    probe_generation: u64,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// 組み込みの都市カタログで初期化
    pub fn new() -> Self {
        Self {
            selection: Selection::None,
            active: None,
            upload_progress: 0,
            outcome: None,
            connectivity: ConnectivityState::Checking,
            cities: City::builtin_catalog(),
            next_run: 0,
            probe_generation: 0,
        }
    }

    pub fn run_state(&self) -> RunState {
        if self.active.is_some() {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            selection: self.selection.clone(),
            run_state: self.run_state(),
            active_workflow: self.active.as_ref().map(|run| run.workflow),
            upload_progress: self.upload_progress,
            outcome: self.outcome.clone(),
            connectivity: self.connectivity,
            cities: self.cities.clone(),
        }
    }

    // =============================================
    // 選択
    // =============================================

    pub fn select_image(&mut self, image: SelectedImage) {
        self.selection = Selection::Image(image);
        self.outcome = None;
    }

    pub fn select_city(&mut self, city: City) {
        self.selection = Selection::City(city);
        self.outcome = None;
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
        self.outcome = None;
    }

    /// エラーのみ消す（結果と選択は保持）
    pub fn dismiss_error(&mut self) {
        if matches!(self.outcome, Some(Outcome::Failed(_))) {
            self.outcome = None;
        }
    }

    // =============================================
    // 実行
    // =============================================

    /// 前提条件を検査し、受理されれば `Running` に遷移
    ///
    /// 拒否された場合は状態を一切変更しない。
    pub fn begin(&mut self, workflow: Workflow) -> Result<RunPlan, ValidationError> {
        if self.active.is_some() {
            return Err(ValidationError::AlreadyRunning);
        }

        let request = match (workflow, &self.selection) {
            (Workflow::ImageOnly, Selection::Image(image)) => RunRequest::ImageOnly(image.clone()),
            (Workflow::ImageOnly, _) => return Err(ValidationError::NoImageSelected),
            (Workflow::Complete, Selection::Image(image)) => {
                RunRequest::CompleteWithImage(image.clone())
            }
            (Workflow::Complete, Selection::City(city)) => RunRequest::CompleteWithCity(city.clone()),
            (Workflow::Complete, Selection::None) => return Err(ValidationError::NoSelection),
            (Workflow::Test, _) => RunRequest::Test,
        };

        self.next_run += 1;
        let id = RunId(self.next_run);
        self.active = Some(ActiveRun {
            id,
            workflow,
            uploads: request.uploads(),
        });
        self.upload_progress = 0;
        self.outcome = None;

        Ok(RunPlan {
            ticket: RunTicket { id, workflow },
            request,
        })
    }

    /// アップロード進捗を反映
    ///
    /// 実行中の同一IDかつ増加方向の値のみ受け付ける。反映した場合 true。
    pub fn report_progress(&mut self, run: RunId, percent: u8) -> bool {
        let accepts = matches!(&self.active, Some(active) if active.id == run && active.uploads);
        let percent = percent.min(100);
        if !accepts || percent <= self.upload_progress {
            return false;
        }
        self.upload_progress = percent;
        true
    }

    /// 実行を確定し `Idle` に戻す
    pub fn settle(
        &mut self,
        ticket: RunTicket,
        response: Result<AnalysisResult, ApiFailure>,
    ) -> Outcome {
        if matches!(&self.active, Some(active) if active.id == ticket.id) {
            self.active = None;
            self.upload_progress = 0;
        }

        let outcome = match response {
            Ok(result) => Outcome::Completed(result),
            Err(failure) => Outcome::Failed(describe_failure(&failure, FailureOrigin::Run)),
        };
        self.outcome = Some(outcome.clone());
        outcome
    }

    // =============================================
    // 疎通確認・都市一覧
    // =============================================

    pub fn begin_probe(&mut self) -> ProbeId {
        self.probe_generation += 1;
        self.connectivity = ConnectivityState::Checking;
        ProbeId(self.probe_generation)
    }

    /// 疎通確認の結果を反映（古い世代の結果は無視）。反映した場合 true。
    pub fn finish_probe(
        &mut self,
        probe: ProbeId,
        response: Result<(), ApiFailure>,
        base_url: &str,
    ) -> bool {
        if probe.0 != self.probe_generation {
            return false;
        }
        match response {
            Ok(()) => self.connectivity = ConnectivityState::Connected,
            Err(failure) => {
                self.connectivity = ConnectivityState::Disconnected;
                self.outcome = Some(Outcome::Failed(describe_failure(
                    &failure,
                    FailureOrigin::Probe { base_url },
                )));
            }
        }
        true
    }

    /// サーバの都市一覧をidで既存一覧へ統合する
    ///
    /// サーバがサムネイルを返さない都市は既存の `image` を残す。空の一覧では何も変えない。
    pub fn merge_cities(&mut self, cities: Vec<City>) {
        for city in cities {
            match self.cities.iter_mut().find(|c| c.id == city.id) {
                Some(known) => {
                    known.name = city.name;
                    if city.image.is_some() {
                        known.image = city.image;
                    }
                }
                None => self.cities.push(city),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{AnalysisStatus, CitiesResponse};
    use serde_json::json;

    fn image() -> SelectedImage {
        SelectedImage::new("baytown.png", "image/png", vec![1u8, 2, 3])
    }

    fn baytown() -> City {
        City::new(3, "Baytown City")
    }

    fn failed(o: &Orchestrator) -> Option<ErrorDescriptor> {
        o.snapshot().error().cloned()
    }

    #[test]
    fn test_initial_state() {
        let o = Orchestrator::new();
        let s = o.snapshot();
        assert!(s.selection.is_none());
        assert_eq!(s.run_state, RunState::Idle);
        assert_eq!(s.upload_progress, 0);
        assert!(s.outcome.is_none());
        assert_eq!(s.connectivity, ConnectivityState::Checking);
        assert_eq!(s.cities.len(), 5);
    }

    #[test]
    fn test_select_image_replaces_city() {
        let mut o = Orchestrator::new();
        o.select_city(baytown());
        o.select_image(image());
        let s = o.snapshot();
        assert!(s.selection.image().is_some());
        assert!(s.selection.city().is_none());
    }

    #[test]
    fn test_select_city_replaces_image() {
        let mut o = Orchestrator::new();
        o.select_image(image());
        o.select_city(baytown());
        assert_eq!(o.snapshot().selection, Selection::City(baytown()));
    }

    #[test]
    fn test_selection_clears_outcome() {
        let mut o = Orchestrator::new();
        let plan = o.begin(Workflow::Test).expect("受理されるはず");
        o.settle(plan.ticket, Ok(AnalysisResult::default()));
        assert!(o.snapshot().result().is_some());

        o.select_image(image());
        assert!(o.snapshot().outcome.is_none());

        let plan = o.begin(Workflow::Test).expect("受理されるはず");
        o.settle(plan.ticket, Err(ApiFailure::no_response("down")));
        assert!(failed(&o).is_some());

        o.select_city(baytown());
        assert!(o.snapshot().outcome.is_none());

        let plan = o.begin(Workflow::Test).expect("受理されるはず");
        o.settle(plan.ticket, Err(ApiFailure::no_response("down")));
        o.clear_selection();
        let s = o.snapshot();
        assert!(s.selection.is_none());
        assert!(s.outcome.is_none());
    }

    #[test]
    fn test_image_only_requires_image() {
        let mut o = Orchestrator::new();
        assert_eq!(o.begin(Workflow::ImageOnly).unwrap_err(), ValidationError::NoImageSelected);

        o.select_city(baytown());
        assert_eq!(o.begin(Workflow::ImageOnly).unwrap_err(), ValidationError::NoImageSelected);
        assert_eq!(o.run_state(), RunState::Idle);
    }

    #[test]
    fn test_complete_requires_selection() {
        let mut o = Orchestrator::new();
        assert_eq!(o.begin(Workflow::Complete).unwrap_err(), ValidationError::NoSelection);
        assert_eq!(o.run_state(), RunState::Idle);
    }

    #[test]
    fn test_rejected_run_keeps_previous_outcome() {
        let mut o = Orchestrator::new();
        let plan = o.begin(Workflow::Test).expect("受理されるはず");
        o.settle(plan.ticket, Ok(AnalysisResult::default()));

        assert!(o.begin(Workflow::ImageOnly).is_err());
        assert!(o.snapshot().result().is_some());
    }

    #[test]
    fn test_begin_captures_request() {
        let mut o = Orchestrator::new();
        o.select_image(image());
        let plan = o.begin(Workflow::Complete).expect("受理されるはず");
        assert_eq!(plan.request, RunRequest::CompleteWithImage(image()));
        assert_eq!(plan.ticket.workflow(), Workflow::Complete);
        o.settle(plan.ticket, Ok(AnalysisResult::default()));

        o.select_city(baytown());
        let plan = o.begin(Workflow::Complete).expect("受理されるはず");
        assert_eq!(plan.request, RunRequest::CompleteWithCity(baytown()));
        o.settle(plan.ticket, Ok(AnalysisResult::default()));

        let plan = o.begin(Workflow::Test).expect("受理されるはず");
        assert_eq!(plan.request, RunRequest::Test);
        assert!(!plan.request.uploads());
    }

    #[test]
    fn test_begin_clears_outcome_and_marks_running() {
        let mut o = Orchestrator::new();
        let plan = o.begin(Workflow::Test).expect("受理されるはず");
        o.settle(plan.ticket, Err(ApiFailure::no_response("down")));
        assert!(failed(&o).is_some());

        let _plan = o.begin(Workflow::Test).expect("受理されるはず");
        let s = o.snapshot();
        assert!(s.outcome.is_none());
        assert!(s.is_running());
        assert_eq!(s.active_workflow, Some(Workflow::Test));
    }

    #[test]
    fn test_second_run_rejected_while_running() {
        let mut o = Orchestrator::new();
        o.select_image(image());
        let plan = o.begin(Workflow::Complete).expect("受理されるはず");
        assert!(o.report_progress(plan.ticket.id(), 40));

        for workflow in [Workflow::ImageOnly, Workflow::Complete, Workflow::Test] {
            assert_eq!(o.begin(workflow).unwrap_err(), ValidationError::AlreadyRunning);
        }
        let s = o.snapshot();
        assert_eq!(s.run_state, RunState::Running);
        assert_eq!(s.upload_progress, 40);
        assert_eq!(s.active_workflow, Some(Workflow::Complete));
    }

    #[test]
    fn test_settle_success_returns_to_idle() {
        let mut o = Orchestrator::new();
        o.select_image(image());
        let plan = o.begin(Workflow::Complete).expect("受理されるはず");
        o.report_progress(plan.ticket.id(), 100);

        let result = AnalysisResult {
            status: AnalysisStatus::Success,
            ..Default::default()
        };
        let outcome = o.settle(plan.ticket, Ok(result.clone()));
        assert_eq!(outcome, Outcome::Completed(result));

        let s = o.snapshot();
        assert_eq!(s.run_state, RunState::Idle);
        assert_eq!(s.upload_progress, 0);
        assert!(s.active_workflow.is_none());
    }

    #[test]
    fn test_settle_failure_returns_to_idle_with_descriptor() {
        let mut o = Orchestrator::new();
        o.select_image(image());
        let plan = o.begin(Workflow::ImageOnly).expect("受理されるはず");
        o.report_progress(plan.ticket.id(), 70);

        let failure = ApiFailure::Status {
            status: 429,
            body: Some(json!({"detail": "rate limited"})),
        };
        o.settle(plan.ticket, Err(failure));

        let s = o.snapshot();
        assert_eq!(s.run_state, RunState::Idle);
        assert_eq!(s.upload_progress, 0);
        let error = s.error().expect("エラーがない");
        assert_eq!(error.message, "rate limited");
        assert_eq!(error.status_code, 429);
        assert_eq!(error.kind, ErrorKind::Remote);
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let mut o = Orchestrator::new();
        o.select_image(image());
        let plan = o.begin(Workflow::Complete).expect("受理されるはず");
        let id = plan.ticket.id();

        assert!(!o.report_progress(id, 0));
        assert!(o.report_progress(id, 10));
        assert!(!o.report_progress(id, 10));
        assert!(!o.report_progress(id, 5));
        assert!(o.report_progress(id, 250));
        assert_eq!(o.snapshot().upload_progress, 100);
    }

    #[test]
    fn test_progress_after_settle_is_ignored() {
        let mut o = Orchestrator::new();
        o.select_image(image());
        let plan = o.begin(Workflow::Complete).expect("受理されるはず");
        let id = plan.ticket.id();
        o.report_progress(id, 30);
        o.settle(plan.ticket, Ok(AnalysisResult::default()));

        assert!(!o.report_progress(id, 90));
        assert_eq!(o.snapshot().upload_progress, 0);
    }

    #[test]
    fn test_progress_from_previous_run_is_ignored() {
        let mut o = Orchestrator::new();
        o.select_image(image());
        let first = o.begin(Workflow::Complete).expect("受理されるはず");
        let stale = first.ticket.id();
        o.settle(first.ticket, Ok(AnalysisResult::default()));

        let second = o.begin(Workflow::Complete).expect("受理されるはず");
        assert!(!o.report_progress(stale, 50));
        assert!(o.report_progress(second.ticket.id(), 20));
        assert_eq!(o.snapshot().upload_progress, 20);
    }

    #[test]
    fn test_progress_ignored_for_non_upload_runs() {
        let mut o = Orchestrator::new();
        o.select_city(baytown());
        let plan = o.begin(Workflow::Complete).expect("受理されるはず");
        assert!(!o.report_progress(plan.ticket.id(), 50));
        assert_eq!(o.snapshot().upload_progress, 0);
    }

    #[test]
    fn test_selection_during_run_does_not_affect_request() {
        let mut o = Orchestrator::new();
        o.select_image(image());
        let plan = o.begin(Workflow::Complete).expect("受理されるはず");
        o.select_city(baytown());

        assert_eq!(plan.request, RunRequest::CompleteWithImage(image()));
        assert!(o.snapshot().is_running());
        o.settle(plan.ticket, Ok(AnalysisResult::default()));
        let s = o.snapshot();
        assert_eq!(s.selection, Selection::City(baytown()));
        assert!(s.result().is_some());
    }

    #[test]
    fn test_dismiss_error_keeps_selection() {
        let mut o = Orchestrator::new();
        o.select_city(baytown());
        let plan = o.begin(Workflow::Complete).expect("受理されるはず");
        o.settle(plan.ticket, Err(ApiFailure::no_response("down")));

        o.dismiss_error();
        let s = o.snapshot();
        assert!(s.outcome.is_none());
        assert_eq!(s.selection, Selection::City(baytown()));
    }

    #[test]
    fn test_dismiss_error_does_not_drop_result() {
        let mut o = Orchestrator::new();
        let plan = o.begin(Workflow::Test).expect("受理されるはず");
        o.settle(plan.ticket, Ok(AnalysisResult::default()));
        o.dismiss_error();
        assert!(o.snapshot().result().is_some());
    }

    #[test]
    fn test_probe_success_and_failure() {
        let mut o = Orchestrator::new();
        let probe = o.begin_probe();
        assert_eq!(o.snapshot().connectivity, ConnectivityState::Checking);
        assert!(o.finish_probe(probe, Ok(()), "http://localhost:8000"));
        assert_eq!(o.snapshot().connectivity, ConnectivityState::Connected);

        let probe = o.begin_probe();
        o.finish_probe(probe, Err(ApiFailure::no_response("refused")), "http://localhost:8000");
        let s = o.snapshot();
        assert_eq!(s.connectivity, ConnectivityState::Disconnected);
        let error = s.error().expect("疎通エラーがない");
        assert_eq!(error.kind, ErrorKind::Connectivity);
        assert_eq!(error.status_code, 0);
    }

    #[test]
    fn test_stale_probe_is_ignored() {
        let mut o = Orchestrator::new();
        let first = o.begin_probe();
        let second = o.begin_probe();

        assert!(!o.finish_probe(first, Err(ApiFailure::no_response("late")), "http://x"));
        assert_eq!(o.snapshot().connectivity, ConnectivityState::Checking);
        assert!(o.snapshot().outcome.is_none());

        assert!(o.finish_probe(second, Ok(()), "http://x"));
        assert_eq!(o.snapshot().connectivity, ConnectivityState::Connected);
    }

    #[test]
    fn test_merge_cities_keeps_thumbnails() {
        let mut o = Orchestrator::new();
        let body = r#"{"cities": {"1": "Seabrook City", "2": "Highland Park City", "9": "Harbor City"}}"#;
        let response: CitiesResponse = serde_json::from_str(body).unwrap();
        o.merge_cities(response.cities);

        let cities = o.snapshot().cities;
        assert_eq!(cities.len(), 6);
        assert_eq!(cities[0].image.as_deref(), Some("/images/Seabrook.png"));
        assert_eq!(cities[1].image.as_deref(), Some("/images/Highland Park.png"));
        assert!(cities[..5].iter().all(|c| c.image.is_some()));
        assert_eq!(cities[5], City::new(9, "Harbor City"));
    }

    #[test]
    fn test_merge_cities_updates_name_and_image() {
        let mut o = Orchestrator::new();
        let renamed = City {
            id: 3,
            name: "New Baytown".to_string(),
            image: Some("/images/new.png".to_string()),
        };
        o.merge_cities(vec![renamed.clone(), City::new(4, "Ridgeview")]);

        let cities = o.snapshot().cities;
        assert_eq!(cities[2], renamed);
        assert_eq!(cities[3].name, "Ridgeview");
        assert_eq!(cities[3].image.as_deref(), Some("/images/Ridgeview.png"));
    }

    #[test]
    fn test_merge_cities_ignores_empty_list() {
        let mut o = Orchestrator::new();
        for body in [r#"{}"#, r#"{"cities": null}"#, r#"{"cities": []}"#] {
            let response: CitiesResponse = serde_json::from_str(body).unwrap();
            o.merge_cities(response.cities);
        }
        assert_eq!(o.snapshot().cities, City::builtin_catalog());
    }
}
