use crate::TargetArgs;
use crate::utils::{self, PreviewJson, Settings};
use colored::Colorize;
use std::process::ExitCode;

pub async fn handle(
    target: &TargetArgs,
    dry_run: bool,
    concurrency: Option<usize>,
    yes: bool,
) -> anyhow::Result<ExitCode> {
    let mut settings = Settings::load(target)?;
    if let Some(concurrency) = concurrency {
        if concurrency == 0 {
            anyhow::bail!("--concurrency は 1 以上を指定してください");
        }
        settings.execution.concurrency = concurrency;
    }
    settings.execution.dry_run = dry_run;

    let sweeper = settings.sweeper();

    if !target.json {
        let title = if dry_run {
            "ドライランを開始します..."
        } else {
            "削除を開始します..."
        };
        println!("{}", title.blue().bold());
        utils::print_target(&settings);
    }

    let preview = sweeper.preview(&settings.filter).await?;
    let summary = preview.plan.summary();
    tracing::info!(
        resources = preview.plan.len(),
        batches = preview.plan.batches.len(),
        warnings = preview.graph.warnings.len(),
        "Deletion plan ready"
    );
    tracing::debug!(plan = ?summary, "Plan summary");

    // 確認（--yes も --dry-run も指定されていない場合）
    if !yes && !dry_run {
        if target.json {
            utils::print_json(&PreviewJson::new(&settings, &preview))?;
            return Ok(ExitCode::SUCCESS);
        }
        utils::print_plan(&preview, sweeper.policy());
        utils::print_warnings(&preview.graph.warnings);
        if !preview.plan.is_empty() {
            println!();
            println!(
                "{}",
                "警告: 上記のリソースを削除します。この操作は元に戻せません。".yellow()
            );
            println!("実行するには --yes オプションを指定してください");
        }
        tracing::info!("Not confirmed, nothing deleted");
        return Ok(ExitCode::SUCCESS);
    }

    if !target.json {
        utils::print_plan(&preview, sweeper.policy());
    }

    let cancel = utils::cancel_on_ctrl_c();
    tracing::info!(dry_run, concurrency = settings.execution.concurrency, "Executing plan");
    let report = sweeper.execute(&preview, &cancel).await;
    tracing::info!(
        summary = %report.summary(),
        duration_ms = report.duration_ms(),
        exit_code = report.exit_code(),
        "Sweep finished"
    );

    if target.json {
        utils::print_json(&report)?;
    } else {
        utils::print_report(&report);
    }

    Ok(ExitCode::from(report.exit_code()))
}
