//! EMNIST letters 評価ハーネス
//!
//! 画像ディレクトリを走査し、前処理 → 分類 → 正解ラベルとの比較を行って
//! 正解率を集計します。分類器は [`predictor::Classifier`] として注入します。

mod types;
mod error;

pub mod preprocess;
pub mod predictor;
pub mod evaluator;
pub mod model;
#[cfg(feature = "ml")]
pub mod ml;

pub use error::{EvalError, EvalResult};
pub use evaluator::{parse_label, write_csv, BatchEvaluator, ScanOptions};
pub use predictor::{argmax, index_to_letter, letter_to_index, Classifier, IndexPolicy, LabelPredictor};
pub use preprocess::{preprocess_bytes, preprocess_file, preprocess_image, PreprocessedSample};
pub use types::{AccuracyReport, LabeledImage, PredictionResult, SkippedFile};

/// tracing の初期化（RUST_LOG 未指定時は info）
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
