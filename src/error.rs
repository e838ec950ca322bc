//! 評価処理のエラー型

use std::path::PathBuf;
use thiserror::Error;

/// 前処理・推論・評価で発生するエラー
#[derive(Debug, Error)]
pub enum EvalError {
    /// ファイルまたはディレクトリの読み込み失敗
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 画像として読み込めない
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// ファイル名から正解ラベルを取り出せない
    #[error("malformed file name '{0}': expected '<LETTER>.<...>' with a single A-Z label")]
    MalformedFileName(String),

    /// 予測インデックスが文字範囲 [1, 26] の外
    #[error("predicted class index {0} is outside the letter range [1, 26]")]
    InvalidIndex(usize),

    /// 分類器の出力幅が不正
    #[error("classifier returned {actual} scores (expected {expected})")]
    ScoreWidth { expected: usize, actual: usize },

    /// 分類器が空のスコアを返した
    #[error("classifier returned an empty score vector")]
    EmptyScores,

    /// 推論バックエンドの失敗
    #[error("classifier failure: {0}")]
    Classifier(String),
}

impl EvalError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }

    pub fn classifier(reason: impl Into<String>) -> Self {
        Self::Classifier(reason.into())
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
