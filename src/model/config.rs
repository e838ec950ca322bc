//! 評価設定管理モジュール
//!
//! 計算デバイス、モデルパス、走査設定などをJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::evaluator::ScanOptions;
use crate::predictor::IndexPolicy;

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    #[default]
    Cpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// 評価設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// 使用するモデルファイル（tar.gz）のパス
    pub model_path: String,
    /// 走査設定
    #[serde(default)]
    pub scan: ScanOptions,
    /// 範囲外インデックスの扱い
    #[serde(default)]
    pub index_policy: IndexPolicy,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::default(),
            model_path: "models/emnist_letters.tar.gz".to_string(),
            scan: ScanOptions::default(),
            index_policy: IndexPolicy::default(),
        }
    }
}

impl EvalConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EvalConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 設定を読み込む、存在しないか読み込めない場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.device_type, DeviceType::Cpu);
        assert_eq!(config.scan.extension, "png");
        assert!(config.scan.case_sensitive);
        assert_eq!(config.index_policy, IndexPolicy::Reject);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut config = EvalConfig::default();
        config.device_type = DeviceType::Wgpu;
        config.index_policy = IndexPolicy::PassThrough;

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: EvalConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.device_type, DeviceType::Wgpu);
        assert_eq!(deserialized.index_policy, IndexPolicy::PassThrough);
        assert_eq!(deserialized.scan, config.scan);
        assert!(json.contains("\"pass-through\""));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: EvalConfig = serde_json::from_str(r#"{"model_path": "m.tar.gz"}"#).unwrap();
        assert_eq!(config.model_path, "m.tar.gz");
        assert_eq!(config.device_type, DeviceType::Cpu);
        assert_eq!(config.scan, ScanOptions::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = EvalConfig::default();
        config.scan.case_sensitive = false;
        config.save(&path).unwrap();

        let loaded = EvalConfig::load(&path).unwrap();
        assert!(!loaded.scan.case_sensitive);
    }

    #[test]
    fn test_load_or_default_on_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = EvalConfig::load_or_default(&path);
        assert_eq!(config.model_path, EvalConfig::default().model_path);
    }

    #[test]
    fn test_device_type_display() {
        assert_eq!(format!("{}", DeviceType::Wgpu), "WGPU (GPU)");
        assert_eq!(format!("{}", DeviceType::Cpu), "CPU (NdArray)");
    }
}
