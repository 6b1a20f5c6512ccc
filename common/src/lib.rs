//! PostDisaster Common Library
//!
//! CLIとWeb(WASM)で共有される解析オーケストレーションの中核

pub mod api;
pub mod controller;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod report;
pub mod types;

pub use api::{AnalysisApi, ProgressFn, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
pub use controller::Controller;
pub use error::{ApiFailure, ErrorDescriptor, ErrorKind, ValidationError};
pub use orchestrator::{Orchestrator, Outcome, Snapshot};
pub use types::{
    AnalysisResult, AnalysisStatus, City, CitiesResponse, ConnectivityState, DisasterAnalysis,
    RunState, SatelliteAnalysis, SelectedImage, Selection, Workflow,
};
