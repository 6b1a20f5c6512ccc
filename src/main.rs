use anyhow::Context;
use clap::Parser;
use postdisaster_console::{city_selector, cli, config, error, http_client, image_file, report, session};
use cli::{Cli, Commands, CompleteTarget, WorkflowCommand};
use config::Config;
use error::ConsoleError;
use postdisaster_common::AnalysisResult;
use session::Session;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = Config::config_path()?;
    let mut config = Config::load_from(&config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;

    let api_url = match &cli.api_url {
        Some(url) => {
            config::validate_api_url(url)?;
            url.trim().to_string()
        }
        None => config.resolved_api_url(),
    };

    let command = match cli.command {
        Commands::Config { set_api_url, show } => {
            return show_config(&mut config, &config_path, set_api_url, show);
        }
        Commands::Workflow(command) => command,
    };

    let api = http_client::HttpApi::new(api_url.clone(), config.timeout())?;
    let session = Session::new(api);

    // 疎通確認を通過しない限りワークフローは実行しない
    if let Err(err) = session.connect().await {
        report_failure(&err);
        std::process::exit(1);
    }

    let outcome = match command {
        WorkflowCommand::Status => {
            println!("✔ API connected: {}", api_url);
            return Ok(());
        }

        WorkflowCommand::Cities => {
            let cities = session.cities().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&cities)?);
            } else {
                println!("Cities ({}):", cities.len());
                print!("{}", report::render_cities(&cities));
            }
            return Ok(());
        }

        WorkflowCommand::Analyze { image, raw } => {
            let image = image_file::load_image(&image, config.max_upload_bytes)?;
            session
                .analyze_image(image)
                .await
                .map(|result| (result, raw))
        }

        WorkflowCommand::Complete { target, raw } => {
            complete(&session, target, config.max_upload_bytes)
                .await
                .map(|result| (result, raw))
        }

        WorkflowCommand::Test { raw } => session.test().await.map(|result| (result, raw)),
    };

    match outcome {
        Ok((result, raw)) => {
            emit_result(&result, cli.json, raw, cli.output.as_deref())?;
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            std::process::exit(1);
        }
    }
}

/// 設定の保存と表示
fn show_config(
    config: &mut Config,
    config_path: &Path,
    set_api_url: Option<String>,
    show: bool,
) -> anyhow::Result<()> {
    if let Some(url) = &set_api_url {
        config.set_api_url(url.clone())?;
        println!("✔ API URLを保存しました: {}", config.api_url);
    }

    if show || set_api_url.is_none() {
        println!("設定 ({}):", config_path.display());
        println!("  API URL: {}", config.api_url);
        println!("  接続先（環境変数適用後）: {}", config.resolved_api_url());
        println!("  タイムアウト: {}秒", config.timeout_seconds);
        println!("  最大アップロードサイズ: {} bytes", config.max_upload_bytes);
    }
    Ok(())
}

/// 完全解析の対象を決めて実行
async fn complete(
    session: &Session,
    target: CompleteTarget,
    max_upload_bytes: u64,
) -> error::Result<AnalysisResult> {
    if let Some(path) = target.image {
        let image = image_file::load_image(&path, max_upload_bytes)?;
        return session.complete_with_image(image).await;
    }

    let cities = session.cities().await;
    let city = match target.city {
        Some(id) => city_selector::find_city(&cities, id)?,
        None => city_selector::select_city_interactive(&cities)?,
    };
    session.complete_with_city(city).await
}

fn emit_result(
    result: &AnalysisResult,
    json: bool,
    raw: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", report::render_result(result, raw));
    }

    if let Some(path) = output {
        let content = serde_json::to_string_pretty(result)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("✔ 結果を保存: {}", path.display());
    }
    Ok(())
}

fn report_failure(err: &ConsoleError) {
    match err {
        ConsoleError::Disconnected(error) | ConsoleError::Analysis(error) => {
            eprintln!("{}", report::render_error(error));
        }
        other => eprintln!("✖ {}", other),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
