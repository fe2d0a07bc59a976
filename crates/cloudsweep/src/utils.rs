use crate::TargetArgs;
use cloudsweep_cloud::{
    Batch, CancellationToken, CloudProvider, DeletionStatus, DiscoveryWarning, ExecutionConfig,
    ProtectionPolicy, ProtectionRule, Provider, ResourceDescriptor, ResourceFilter, ResourceKey,
    ResourceKind, RetryConfig, RunReport, SweepPreview, Sweeper,
};
use cloudsweep_cloud_azure::AzureProvider;
use cloudsweep_cloud_gcp::GcpProvider;
use cloudsweep_config::SweepConfig;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// CLI オプション・環境変数・設定ファイルを合成した実行設定
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Provider,
    pub scope: String,
    pub filter: ResourceFilter,
    pub execution: ExecutionConfig,
    pub policy: ProtectionPolicy,
    pub default_region: Option<String>,
    pub config_path: Option<PathBuf>,
}

impl Settings {
    /// 設定ファイルを探して読み込み、オプションと合成する
    pub fn load(target: &TargetArgs) -> anyhow::Result<Self> {
        let (config, path) = cloudsweep_config::load_config()?;
        let mut settings = Self::resolve(target, &config)?;
        tracing::debug!(
            config = ?path,
            provider = %settings.provider,
            scope = %settings.scope,
            concurrency = settings.execution.concurrency,
            "Settings resolved"
        );
        settings.config_path = path;
        Ok(settings)
    }

    /// 優先順位: CLI オプション (環境変数を含む) > 設定ファイル > 既定値
    pub fn resolve(target: &TargetArgs, config: &SweepConfig) -> anyhow::Result<Self> {
        let provider_name = target
            .provider
            .clone()
            .or_else(|| config.provider.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "プロバイダーを指定してください: --provider gcp|azure または CLOUDSWEEP_PROVIDER=<provider>"
                )
            })?;
        let provider: Provider = provider_name.parse().map_err(|e: String| anyhow::anyhow!(e))?;

        let scope = target
            .scope
            .clone()
            .or_else(|| config.scope.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "対象を指定してください: --scope <{}> または CLOUDSWEEP_SCOPE=<id>",
                    scope_label(provider)
                )
            })?;

        let mut filter = ResourceFilter::new();
        filter.name_prefix = target.prefix.clone().or_else(|| config.prefix.clone());
        filter.label_selector = config.labels.clone();
        for term in &target.labels {
            let (key, value) = ResourceFilter::parse_label(term)?;
            filter.label_selector.insert(key, value);
        }
        filter.regions = if target.regions.is_empty() {
            config.regions.clone()
        } else {
            target.regions.clone()
        };
        filter.validate()?;

        Ok(Self {
            provider,
            scope,
            filter,
            execution: execution_config(config),
            policy: protection_policy(provider, config)?,
            default_region: config.default_region.clone(),
            config_path: None,
        })
    }

    /// プロバイダーアダプターを生成
    pub fn build_provider(&self) -> Arc<dyn CloudProvider> {
        match self.provider {
            Provider::Gcp => {
                let mut gcp = GcpProvider::new(&self.scope);
                if let Some(region) = &self.default_region {
                    gcp = gcp.with_default_region(region);
                }
                Arc::new(gcp)
            }
            Provider::Azure => Arc::new(AzureProvider::new(&self.scope)),
        }
    }

    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(self.build_provider())
            .with_policy(self.policy.clone())
            .with_config(self.execution.clone())
    }
}

fn scope_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Gcp => "project",
        Provider::Azure => "subscription",
    }
}

fn execution_config(config: &SweepConfig) -> ExecutionConfig {
    let mut execution = ExecutionConfig::default();
    if let Some(concurrency) = config.concurrency {
        execution.concurrency = concurrency;
    }
    if let Some(secs) = config.call_timeout_secs {
        execution.call_timeout = Duration::from_secs(secs);
    }

    let defaults = RetryConfig::default();
    execution.retry = RetryConfig {
        max_attempts: config.retry.max_attempts.unwrap_or(defaults.max_attempts),
        initial_delay: config
            .retry
            .initial_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_delay),
        max_delay: config
            .retry
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay),
        ..defaults
    };
    execution
}

/// 組み込みルールに設定ファイルのルールを追加する
fn protection_policy(provider: Provider, config: &SweepConfig) -> anyhow::Result<ProtectionPolicy> {
    let mut rules = Vec::new();
    for entry in &config.protection {
        let rule_provider = entry
            .provider
            .as_deref()
            .map(str::parse::<Provider>)
            .transpose()
            .map_err(|e| anyhow::anyhow!("protection: {}", e))?;
        if rule_provider.is_some_and(|p| p != provider) {
            continue;
        }
        let kind = entry
            .kind
            .as_deref()
            .map(str::parse::<ResourceKind>)
            .transpose()
            .map_err(|e| anyhow::anyhow!("protection: {}", e))?;
        let reason = entry
            .reason
            .clone()
            .unwrap_or_else(|| "設定ファイルで保護".to_string());
        rules.push(ProtectionRule::new(rule_provider, kind, &entry.pattern, reason)?);
    }
    Ok(ProtectionPolicy::for_provider(provider).with_rules(rules))
}

/// Ctrl-C で発火するキャンセルトークン
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling remaining waves");
            eprintln!(
                "{}",
                "中断します。実行中の削除が終わるまで待機しています...".yellow()
            );
            child.cancel();
        }
    });
    token
}

/// 対象と設定ファイルの表示
pub fn print_target(settings: &Settings) {
    println!(
        "対象: {} {}",
        settings.provider.to_string().cyan(),
        settings.scope.cyan()
    );
    if let Some(prefix) = &settings.filter.name_prefix {
        println!("  プレフィックス: {}", prefix);
    }
    for (key, value) in &settings.filter.label_selector {
        println!("  ラベル: {}={}", key, value);
    }
    if !settings.filter.regions.is_empty() {
        println!("  リージョン: {}", settings.filter.regions.join(", "));
    }
    if let Some(path) = &settings.config_path {
        println!("📄 設定ファイル: {}", path.display().to_string().cyan());
    }
}

fn location(descriptor: &ResourceDescriptor) -> String {
    descriptor
        .region
        .as_deref()
        .map(|r| format!(" [{}]", r))
        .unwrap_or_default()
}

/// 削除計画をバッチごとに表示。保護対象には印を付ける
pub fn print_plan(preview: &SweepPreview, policy: &ProtectionPolicy) {
    println!();
    if preview.plan.is_empty() {
        println!("{}", "対象リソースはありません".green());
        return;
    }

    println!("{}", format!("削除計画 ({}):", preview.plan.summary()).bold());
    for batch in &preview.plan.batches {
        println!(
            "  {} {}",
            format!("バッチ {}", batch.index + 1).bold(),
            format!("({} 件)", batch.len()).dimmed()
        );
        for descriptor in &batch.resources {
            let line = format!(
                "{} {}{}",
                descriptor.kind.to_string().dimmed(),
                descriptor.display_name,
                location(descriptor)
            );
            match policy.check(descriptor) {
                Some(rule) => println!(
                    "    {} {} {}",
                    "🛡".yellow(),
                    line,
                    format!("(保護: {})", rule.reason).yellow()
                ),
                None => println!("    • {}", line),
            }
        }
    }
}

pub fn print_warnings(warnings: &[DiscoveryWarning]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("{}", "検出時の警告:".yellow().bold());
    for warning in warnings {
        match &warning.resource {
            Some(key) => println!("  ⚠ {} ({}): {}", warning.kind, key, warning.message),
            None => println!("  ⚠ {}: {}", warning.kind, warning.message),
        }
    }
}

/// 実行結果をリソースごとに表示
pub fn print_report(report: &RunReport) {
    println!();
    let title = if report.dry_run {
        "ドライラン結果:"
    } else {
        "実行結果:"
    };
    println!("{}", title.bold());

    for outcome in &report.outcomes {
        let d = &outcome.descriptor;
        let name = format!("{} {}{}", d.kind.to_string().dimmed(), d.display_name, location(d));
        let status = match &outcome.status {
            DeletionStatus::Deleted => "✓ 削除".green().to_string(),
            DeletionStatus::WouldDelete => "→ 削除予定".cyan().to_string(),
            DeletionStatus::Protected(reason) => format!("🛡 保護 ({})", reason).yellow().to_string(),
            DeletionStatus::Skipped(reason) => format!("- スキップ ({})", reason).dimmed().to_string(),
            DeletionStatus::Failed(error) => format!("✗ 失敗: {}", error).red().to_string(),
        };
        println!("  {} {}", status, name);
    }

    print_warnings(&report.discovery_warnings);

    let summary = report.summary();
    println!();
    let line = format!(
        "削除 {} / 削除予定 {} / 保護 {} / スキップ {} / 失敗 {} ({}ms)",
        summary.deleted,
        summary.would_delete,
        summary.protected,
        summary.skipped,
        summary.failed,
        report.duration_ms()
    );
    if report.has_failures() {
        println!("{}", line.red().bold());
    } else {
        println!("{}", line.green().bold());
    }
}

/// discover / validate の JSON 出力
#[derive(Serialize)]
pub struct PreviewJson<'a> {
    pub provider: Provider,
    pub scope: &'a str,
    pub batches: &'a [Batch],
    pub protected: Vec<ResourceKey>,
    pub warnings: &'a [DiscoveryWarning],
}

impl<'a> PreviewJson<'a> {
    pub fn new(settings: &'a Settings, preview: &'a SweepPreview) -> Self {
        Self {
            provider: settings.provider,
            scope: &settings.scope,
            batches: &preview.plan.batches,
            protected: preview
                .plan
                .resources()
                .filter(|d| settings.policy.is_protected(d))
                .map(|d| d.key())
                .collect(),
            warnings: &preview.graph.warnings,
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
