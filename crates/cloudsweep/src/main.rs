mod commands;
mod utils;

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sweep")]
#[command(about = "デプロイが残したクラウドリソースを、依存関係の順に片付ける。", long_about = None)]
struct Cli {
    /// 詳細ログを表示 (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// 対象を絞り込む共通オプション
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// プロバイダー (gcp, azure)
    #[arg(short, long, env = "CLOUDSWEEP_PROVIDER")]
    pub provider: Option<String>,

    /// GCP プロジェクト ID または Azure サブスクリプション ID
    #[arg(long, env = "CLOUDSWEEP_SCOPE")]
    pub scope: Option<String>,

    /// リソース名のプレフィックス
    #[arg(long, env = "CLOUDSWEEP_PREFIX")]
    pub prefix: Option<String>,

    /// ラベル (Azure ではタグ) セレクタ。複数指定可
    #[arg(short, long = "label", value_name = "KEY=VALUE")]
    pub labels: Vec<String>,

    /// 対象リージョン。複数指定可
    #[arg(short, long = "region", value_name = "REGION")]
    pub regions: Vec<String>,

    /// 結果を JSON で出力
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 対象リソースを検出して削除計画を表示
    Discover {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// 削除計画を実行
    Delete {
        #[command(flatten)]
        target: TargetArgs,
        /// 削除せずに結果だけを表示
        #[arg(long)]
        dry_run: bool,
        /// バッチ内の最大同時削除数
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// 確認なしで削除を実行
        #[arg(short, long)]
        yes: bool,
    },
    /// デプロイ前チェック: 保護されていない既存リソースがあれば失敗
    Validate {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// リソース種別と削除順位を表示
    Kinds {
        /// プロバイダーで絞り込む (gcp, azure)
        #[arg(short, long)]
        provider: Option<String>,
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout は計画と結果の出力に使うので、ログは stderr へ
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("cloudsweep {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Kinds { provider, json } => commands::kinds::handle(provider.as_deref(), json),
        Commands::Discover { target } => commands::discover::handle(&target).await,
        Commands::Delete {
            target,
            dry_run,
            concurrency,
            yes,
        } => commands::delete::handle(&target, dry_run, concurrency, yes).await,
        Commands::Validate { target } => commands::validate::handle(&target).await,
    }
}
