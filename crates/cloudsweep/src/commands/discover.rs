use crate::TargetArgs;
use crate::utils::{self, PreviewJson, Settings};
use colored::Colorize;
use std::process::ExitCode;

pub async fn handle(target: &TargetArgs) -> anyhow::Result<ExitCode> {
    let settings = Settings::load(target)?;
    let sweeper = settings.sweeper();

    if !target.json {
        println!("{}", "リソースを検出しています...".blue().bold());
        utils::print_target(&settings);
    }

    let preview = sweeper.preview(&settings.filter).await?;

    if target.json {
        utils::print_json(&PreviewJson::new(&settings, &preview))?;
    } else {
        utils::print_plan(&preview, sweeper.policy());
        utils::print_warnings(&preview.graph.warnings);
    }

    Ok(ExitCode::SUCCESS)
}
