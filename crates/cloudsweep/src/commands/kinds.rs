use cloudsweep_cloud::{Provider, ResourceKind};
use colored::Colorize;
use serde::Serialize;
use std::process::ExitCode;

#[derive(Serialize)]
struct KindRow {
    kind: ResourceKind,
    rank: u8,
    provider: Option<Provider>,
}

/// 削除順位の表。順位の高いものから削除される
pub fn handle(provider: Option<&str>, json: bool) -> anyhow::Result<ExitCode> {
    let provider = provider
        .map(str::parse::<Provider>)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let rows: Vec<KindRow> = ResourceKind::ALL
        .iter()
        .filter(|k| match (provider, k.provider()) {
            (Some(p), Some(owner)) => p == owner,
            _ => true,
        })
        .map(|k| KindRow {
            kind: *k,
            rank: k.rank(),
            provider: k.provider(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "リソース種別 (順位の高いものから削除):".bold());
    for row in &rows {
        let owner = row
            .provider
            .map(|p| p.to_string())
            .unwrap_or_else(|| "*".to_string());
        println!(
            "  {:>2}  {:<22} {}",
            row.rank.to_string().cyan(),
            row.kind.to_string(),
            owner.dimmed()
        );
    }

    Ok(ExitCode::SUCCESS)
}
