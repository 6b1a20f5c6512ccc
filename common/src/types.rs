//! 解析ワークフローの型定義
//!
//! CLIとWeb(WASM)で共有される型:
//! - City / SelectedImage / Selection: 選択状態
//! - SatelliteAnalysis: 衛星画像解析（都市判定）の出力
//! - AnalysisResult: 表示用に正規化された最終出力
//! - RunState / ConnectivityState / Workflow: 状態遷移の列挙

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 災害解析の出力（エージェント名 → 任意形状の値）
///
/// 値は解釈せずそのまま表示層へ渡す。
pub type DisasterAnalysis = Map<String, Value>;

/// 解析対象の都市
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,

    /// サムネイル画像のパス
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl City {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image: None,
        }
    }

    /// 組み込みの都市カタログ（サーバから取得できない場合もこれを使う）
    pub fn builtin_catalog() -> Vec<City> {
        [
            (1, "Seabrook City", "Seabrook"),
            (2, "Highland Park City", "Highland Park"),
            (3, "Baytown City", "Baytown"),
            (4, "Ridgeview City", "Ridgeview"),
            (5, "Shoreline City", "Shoreline"),
        ]
        .into_iter()
        .map(|(id, name, thumb)| City {
            id,
            name: name.to_string(),
            image: Some(format!("/images/{}.png", thumb)),
        })
        .collect()
    }
}

/// `GET /cities/` のレスポンス
#[derive(Debug, Clone, Deserialize)]
pub struct CitiesResponse {
    #[serde(default, deserialize_with = "deserialize_city_list")]
    pub cities: Vec<City>,
}

/// `cities` はレコード配列と `{"<id>": "<name>"}` の両形式を受け付ける
#[derive(Deserialize)]
#[serde(untagged)]
enum CityListWire {
    List(Vec<City>),
    Map(BTreeMap<String, String>),
}

fn deserialize_city_list<'de, D>(deserializer: D) -> Result<Vec<City>, D::Error>
where
    D: Deserializer<'de>,
{
    let wire = Option::<CityListWire>::deserialize(deserializer)?;
    Ok(match wire {
        None => Vec::new(),
        Some(CityListWire::List(cities)) => cities,
        Some(CityListWire::Map(map)) => {
            let mut cities: Vec<City> = map
                .into_iter()
                .filter_map(|(id, name)| id.trim().parse().ok().map(|id| City::new(id, name)))
                .collect();
            cities.sort_by_key(|c| c.id);
            cities
        }
    })
}

/// 選択された画像ファイル
///
/// 本体は `Arc` で共有するため、実行開始時の入力キャプチャは安価。
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl SelectedImage {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// バイト数
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for SelectedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedImage")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.size())
            .finish()
    }
}

/// 選択状態（画像と都市は排他）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Image(SelectedImage),
    City(City),
}

impl Selection {
    pub fn image(&self) -> Option<&SelectedImage> {
        match self {
            Selection::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn city(&self) -> Option<&City> {
        match self {
            Selection::City(city) => Some(city),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }
}

/// 実行状態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

/// サーバ接続状態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    #[default]
    Checking,
    Connected,
    Disconnected,
}

impl ConnectivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityState::Checking => "checking",
            ConnectivityState::Connected => "connected",
            ConnectivityState::Disconnected => "disconnected",
        }
    }
}

/// 解析ワークフロー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// 画像のみ（都市判定）
    ImageOnly,
    /// 都市判定 + 災害解析
    Complete,
    /// サーバ既定画像でのテスト
    Test,
}

impl Workflow {
    pub fn label(&self) -> &'static str {
        match self {
            Workflow::ImageOnly => "Analyze Image Only",
            Workflow::Complete => "Complete Analysis",
            Workflow::Test => "Test Analysis",
        }
    }
}

/// 解析結果ステータス
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Warning,
    Error,
    /// サーバが未知のステータスを返した、または省略した
    #[default]
    #[serde(other)]
    Unknown,
}

/// 衛星画像解析（都市判定）の結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SatelliteAnalysis {
    #[serde(default, alias = "city_name", skip_serializing_if = "Option::is_none")]
    pub detected_city_name: Option<String>,

    #[serde(default, alias = "city_number", skip_serializing_if = "Option::is_none")]
    pub detected_city_id: Option<i64>,

    /// false の場合はサーバ側でフォールバック都市が使われた
    #[serde(default)]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// filename, available_cities など未解釈のフィールド
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 表示用に正規化された解析結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub status: AnalysisStatus,

    #[serde(default)]
    pub satellite_analysis: Option<SatelliteAnalysis>,

    #[serde(default)]
    pub disaster_analysis: Option<DisasterAnalysis>,

    /// test_mode, image_path など未解釈のフィールド
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
