use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "postdisaster")]
#[command(about = "衛星画像による災害対応AI解析クライアント", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 接続先サーバURL（設定ファイルと環境変数より優先）
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// 結果をJSONで出力
    #[arg(long, global = true)]
    pub json: bool,

    /// 結果JSONの保存先
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// サーバへ接続して実行するコマンド
    #[command(flatten)]
    Workflow(WorkflowCommand),

    /// 設定を表示/編集
    Config {
        /// 接続先URLを保存
        #[arg(long)]
        set_api_url: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

/// 疎通確認を通過してから実行するコマンド
#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// サーバへの疎通確認
    Status,

    /// 都市一覧を取得して表示
    Cities,

    /// 画像から都市を判定（画像のみ解析）
    Analyze {
        /// 衛星画像ファイル
        #[arg(required = true)]
        image: PathBuf,

        /// 生のレスポンスJSONも表示
        #[arg(long)]
        raw: bool,
    },

    /// 完全解析（画像アップロード、または都市指定）
    Complete {
        #[command(flatten)]
        target: CompleteTarget,

        /// 生のレスポンスJSONも表示
        #[arg(long)]
        raw: bool,
    },

    /// サーバ既定の画像でテスト解析
    Test {
        /// 生のレスポンスJSONも表示
        #[arg(long)]
        raw: bool,
    },
}

/// 完全解析の対象（いずれか1つ）
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct CompleteTarget {
    /// 衛星画像ファイル
    pub image: Option<PathBuf>,

    /// 都市IDを指定
    #[arg(long)]
    pub city: Option<i64>,

    /// 都市を対話的に選択
    #[arg(long)]
    pub pick: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_with_city() {
        let cli = Cli::try_parse_from(["postdisaster", "complete", "--city", "3", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Workflow(WorkflowCommand::Complete { target, .. }) => {
                assert_eq!(target.city, Some(3));
                assert!(target.image.is_none());
                assert!(!target.pick);
            }
            _ => panic!("expected complete"),
        }
    }

    #[test]
    fn test_complete_requires_single_target() {
        assert!(Cli::try_parse_from(["postdisaster", "complete"]).is_err());
        assert!(Cli::try_parse_from(["postdisaster", "complete", "a.png", "--city", "1"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "postdisaster",
            "analyze",
            "city.png",
            "--api-url",
            "http://10.0.0.2:8000",
            "-o",
            "out.json",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://10.0.0.2:8000"));
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_config_is_separate_from_workflows() {
        let cli = Cli::try_parse_from(["postdisaster", "config", "--set-api-url", "http://h:9"]).unwrap();
        match cli.command {
            Commands::Config { set_api_url, show } => {
                assert_eq!(set_api_url.as_deref(), Some("http://h:9"));
                assert!(!show);
            }
            Commands::Workflow(_) => panic!("expected config"),
        }

        let cli = Cli::try_parse_from(["postdisaster", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Workflow(WorkflowCommand::Status)));
    }
}
