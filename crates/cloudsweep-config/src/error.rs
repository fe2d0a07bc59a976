use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CLOUDSWEEP_CONFIG で指定された設定ファイルが見つかりません: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("設定ファイルの解析に失敗しました ({path}): {message}")]
    Parse { path: PathBuf, message: String },

    #[error("設定値が不正です: {0}")]
    Invalid(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
