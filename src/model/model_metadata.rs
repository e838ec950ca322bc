//! モデルメタデータの定義
//!
//! tar.gz形式のモデルアーカイブに `metadata.json` として格納されます。
//!
//! ## 入力規約
//! - 入力: 28x28 単一チャネル、[0, 1] 正規化済み、極性反転済み
//! - 出力: 27クラス（0 は予約、1-26 が A-Z）

#[cfg(feature = "ml")]
use anyhow::{Context, Result};
#[cfg(feature = "ml")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "ml")]
use crate::predictor::NUM_CLASSES;
#[cfg(feature = "ml")]
use crate::preprocess::SAMPLE_SIZE;

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[cfg(feature = "ml")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// アーキテクチャ名（例: "letter_cnn"）
    pub architecture: String,

    /// 出力クラス数（予約クラス0を含む）
    pub num_classes: usize,

    /// モデル入力サイズ（正方形の一辺）
    pub model_input_size: u32,

    /// 学習データセット名
    #[serde(default)]
    pub dataset: String,

    /// 学習エポック数
    #[serde(default)]
    pub num_epochs: u32,

    /// モデルの学習時刻（ISO8601形式）
    pub trained_at: String,
}

#[cfg(feature = "ml")]
impl ModelMetadata {
    /// 新しいメタデータを作成（学習時刻は現在時刻）
    pub fn new(architecture: impl Into<String>, dataset: impl Into<String>, num_epochs: u32) -> Self {
        let trained_at = chrono::Local::now().to_rfc3339();

        Self {
            architecture: architecture.into(),
            num_classes: NUM_CLASSES,
            model_input_size: SAMPLE_SIZE as u32,
            dataset: dataset.into(),
            num_epochs,
            trained_at,
        }
    }

    /// 推論ハーネスの入出力規約と一致しているか検証
    pub fn validate(&self) -> Result<()> {
        if self.num_classes != NUM_CLASSES {
            anyhow::bail!(
                "クラス数が不正です: {} (期待: {})",
                self.num_classes,
                NUM_CLASSES
            );
        }
        if self.model_input_size as usize != SAMPLE_SIZE {
            anyhow::bail!(
                "モデル入力サイズが不正です: {}x{} (期待: {}x{})",
                self.model_input_size,
                self.model_input_size,
                SAMPLE_SIZE,
                SAMPLE_SIZE
            );
        }
        Ok(())
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}

#[cfg(all(test, feature = "ml"))]
mod tests {
    use super::*;

    #[test]
    fn test_new_metadata_is_valid() {
        let metadata = ModelMetadata::new("letter_cnn", "emnist-letters", 10);
        assert_eq!(metadata.num_classes, 27);
        assert_eq!(metadata.model_input_size, 28);
        assert!(metadata.validate().is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&metadata.trained_at).is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatch() {
        let mut metadata = ModelMetadata::new("letter_cnn", "emnist-letters", 10);
        metadata.num_classes = 26;
        assert!(metadata.validate().is_err());

        let mut metadata = ModelMetadata::new("letter_cnn", "emnist-letters", 10);
        metadata.model_input_size = 48;
        assert!(metadata.validate().is_err());
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "architecture": "letter_cnn",
            "num_classes": 27,
            "model_input_size": 28,
            "trained_at": "2024-01-01T00:00:00+00:00"
        }"#;
        let metadata = ModelMetadata::from_json_string(json).unwrap();
        assert_eq!(metadata.dataset, "");
        assert_eq!(metadata.num_epochs, 0);
    }
}
