pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 設定ファイルを直接指定する環境変数
pub const CONFIG_ENV: &str = "CLOUDSWEEP_CONFIG";

/// カレントディレクトリと ./.cloudsweep/ で探すファイル名 (優先順)
pub const CANDIDATES: [&str; 4] = [
    "sweep.local.yaml",
    ".sweep.local.yaml",
    "sweep.yaml",
    ".sweep.yaml",
];

/// sweep.yaml の内容
///
/// すべて省略可能。省略された値は CLI 側の既定値が使われる。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// 既定のプロバイダー (gcp / azure)
    pub provider: Option<String>,

    /// プロジェクト ID またはサブスクリプション ID
    pub scope: Option<String>,

    /// リソース名のプレフィックス
    pub prefix: Option<String>,

    /// ラベル (Azure ではタグ) セレクタ
    pub labels: BTreeMap<String, String>,

    /// 対象リージョン (空なら全リージョン)
    pub regions: Vec<String>,

    /// リージョン指定が必要な一覧取得で使うリージョン
    pub default_region: Option<String>,

    /// バッチ内の最大同時削除数
    pub concurrency: Option<usize>,

    /// プロバイダー呼び出し 1 回あたりのタイムアウト (秒)
    pub call_timeout_secs: Option<u64>,

    pub retry: RetrySettings,

    /// 組み込みルールに追加する保護ルール
    pub protection: Vec<ProtectionEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// 保護ルール 1 件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtectionEntry {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    /// リソース名または ID にマッチする正規表現
    pub pattern: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl SweepConfig {
    /// YAML 文字列から読み込む
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        // 空ファイルは既定値として扱う
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SweepConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// ファイルから読み込む
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// 値の範囲チェック
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == Some(0) {
            return Err(ConfigError::Invalid(
                "concurrency は 1 以上を指定してください".to_string(),
            ));
        }
        if self.call_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "call_timeout_secs は 1 以上を指定してください".to_string(),
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "retry.max_attempts は 1 以上を指定してください".to_string(),
            ));
        }
        if let (Some(initial), Some(max)) = (self.retry.initial_delay_ms, self.retry.max_delay_ms)
            && initial > max
        {
            return Err(ConfigError::Invalid(
                "retry.initial_delay_ms が retry.max_delay_ms を超えています".to_string(),
            ));
        }
        if let Some(entry) = self.protection.iter().find(|p| p.pattern.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "protection の pattern が空です (reason: {})",
                entry.reason.as_deref().unwrap_or("-")
            )));
        }
        Ok(())
    }
}

/// グローバル設定ファイルのパス (~/.config/cloudsweep/sweep.yaml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cloudsweep").join("sweep.yaml"))
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索し、見つからなければ `None`:
/// 1. 環境変数 CLOUDSWEEP_CONFIG (直接パス指定)
/// 2. カレントディレクトリ: sweep.local.yaml, .sweep.local.yaml, sweep.yaml, .sweep.yaml
/// 3. ./.cloudsweep/ ディレクトリ内: 同様の順序
/// 4. ~/.config/cloudsweep/sweep.yaml (グローバル設定)
pub fn find_config_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // 3. ./.cloudsweep/ ディレクトリで検索
    let sweep_dir = current_dir.join(".cloudsweep");
    if sweep_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = sweep_dir.join(filename);
            if path.exists() {
                return Ok(Some(path));
            }
        }
    }

    // 4. グローバル設定ファイル
    if let Some(global_config) = global_config_path()
        && global_config.exists()
    {
        return Ok(Some(global_config));
    }

    Ok(None)
}

/// 設定を読み込む。ファイルがなければ既定値。
pub fn load_config() -> Result<(SweepConfig, Option<PathBuf>)> {
    match find_config_file()? {
        Some(path) => {
            let config = SweepConfig::from_file(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((SweepConfig::default(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const SAMPLE: &str = r#"
provider: gcp
scope: dspm-test-project
prefix: dspm
labels:
  env: test
regions: [us-central1]
concurrency: 10
call_timeout_secs: 60
retry:
  max_attempts: 5
  initial_delay_ms: 500
  max_delay_ms: 10000
protection:
  - kind: storage-bucket
    pattern: "-tfstate$"
    reason: terraform state
"#;

    /// 空のカレントディレクトリでクロージャを実行する
    fn in_temp_dir<F: FnOnce(&Path)>(f: F) {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        temp_env::with_var_unset(CONFIG_ENV, || f(temp_dir.path()));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let config = SweepConfig::parse(SAMPLE, Path::new("sweep.yaml")).unwrap();
        assert_eq!(config.provider.as_deref(), Some("gcp"));
        assert_eq!(config.prefix.as_deref(), Some("dspm"));
        assert_eq!(config.labels.get("env").map(String::as_str), Some("test"));
        assert_eq!(config.concurrency, Some(10));
        assert_eq!(config.retry.max_attempts, Some(5));
        assert_eq!(config.protection.len(), 1);
        assert_eq!(config.protection[0].kind.as_deref(), Some("storage-bucket"));
        assert!(config.protection[0].provider.is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = SweepConfig::parse("\n", Path::new("sweep.yaml")).unwrap();
        assert_eq!(config, SweepConfig::default());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = SweepConfig::parse("concurrency: 0", Path::new("sweep.yaml"));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_retry_delays_checked() {
        let yaml = "retry:\n  initial_delay_ms: 5000\n  max_delay_ms: 100\n";
        assert!(SweepConfig::parse(yaml, Path::new("sweep.yaml")).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = SweepConfig::parse("concurency: 3", Path::new("sweep.yaml"));
        match result {
            Err(ConfigError::Parse { path, .. }) => assert!(path.ends_with("sweep.yaml")),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        in_temp_dir(|dir| {
            fs::write(dir.join("sweep.yaml"), "prefix: dspm").unwrap();

            let found = find_config_file().unwrap().unwrap();
            assert!(found.ends_with("sweep.yaml"));
        });
    }

    #[test]
    #[serial]
    fn test_local_file_priority() {
        in_temp_dir(|dir| {
            fs::write(dir.join("sweep.yaml"), "prefix: shared").unwrap();
            fs::write(dir.join(".sweep.local.yaml"), "prefix: mine").unwrap();

            let found = find_config_file().unwrap().unwrap();
            assert!(found.ends_with(".sweep.local.yaml"));
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_sweep_dir() {
        in_temp_dir(|dir| {
            let sweep_dir = dir.join(".cloudsweep");
            fs::create_dir(&sweep_dir).unwrap();
            fs::write(sweep_dir.join("sweep.yaml"), "prefix: dspm").unwrap();

            let found = find_config_file().unwrap().unwrap();
            assert!(found.ends_with(".cloudsweep/sweep.yaml"));
        });
    }

    #[test]
    #[serial]
    fn test_env_var_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, SAMPLE).unwrap();

        temp_env::with_var(CONFIG_ENV, Some(config_path.as_os_str()), || {
            let (config, path) = load_config().unwrap();
            assert_eq!(path.as_deref(), Some(config_path.as_path()));
            assert_eq!(config.scope.as_deref(), Some("dspm-test-project"));
        });
    }

    #[test]
    #[serial]
    fn test_env_var_pointing_nowhere_is_an_error() {
        temp_env::with_var(CONFIG_ENV, Some("/nonexistent/sweep.yaml"), || {
            assert!(matches!(
                find_config_file(),
                Err(ConfigError::ConfigFileNotFound(_))
            ));
        });
    }

    #[test]
    #[serial]
    fn test_missing_file_means_defaults() {
        in_temp_dir(|_| {
            // ~/.config/cloudsweep/sweep.yaml がある環境では検証できない
            if global_config_path().is_some_and(|p| p.exists()) {
                return;
            }
            let (config, path) = load_config().unwrap();
            assert!(path.is_none());
            assert_eq!(config, SweepConfig::default());
        });
    }

    #[test]
    fn test_global_config_path() {
        if let Some(path) = global_config_path() {
            assert!(path.ends_with("cloudsweep/sweep.yaml"));
        }
    }
}
