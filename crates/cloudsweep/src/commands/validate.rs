use crate::TargetArgs;
use crate::utils::{self, PreviewJson, Settings};
use colored::Colorize;
use std::process::ExitCode;

/// 保護されていない既存リソースが 1 件でもあれば失敗する
pub async fn handle(target: &TargetArgs) -> anyhow::Result<ExitCode> {
    let settings = Settings::load(target)?;
    let sweeper = settings.sweeper();

    if !target.json {
        println!("{}", "デプロイ前チェックを実行しています...".blue().bold());
        utils::print_target(&settings);
    }

    let preview = sweeper.preview(&settings.filter).await?;
    let leftovers: Vec<_> = preview
        .plan
        .resources()
        .filter(|d| !sweeper.policy().is_protected(d))
        .collect();

    if target.json {
        utils::print_json(&PreviewJson::new(&settings, &preview))?;
    } else {
        utils::print_warnings(&preview.graph.warnings);
        println!();
        if leftovers.is_empty() {
            println!("{}", "✓ 既存のリソースはありません".green().bold());
        } else {
            println!(
                "{}",
                format!("✗ 既存のリソースが {} 件見つかりました:", leftovers.len())
                    .red()
                    .bold()
            );
            for d in &leftovers {
                println!("  • {} {}", d.kind.to_string().dimmed(), d.display_name);
            }
            println!();
            println!("片付けるには: sweep delete --yes");
        }
    }

    if leftovers.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
