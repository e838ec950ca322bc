//! ディレクトリ単位のバッチ評価
//!
//! `<LABEL>.<任意>.png` 形式のファイルを走査し、ファイル名の先頭文字を
//! 正解として予測結果と比較、正解率を集計します。
//! 1ファイルの失敗はスキップとして記録し、残りの評価を続行します。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{EvalError, EvalResult};
use crate::predictor::{Classifier, LabelPredictor};
use crate::preprocess::preprocess_file;
use crate::types::{AccuracyReport, LabeledImage, PredictionResult};

/// 走査設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// 対象拡張子（先頭の '.' は無くてもよい）
    pub extension: String,
    /// 拡張子の大文字小文字を区別するか
    pub case_sensitive: bool,
    /// ファイル名順に並べ替えるか（OSの列挙順は不定）
    pub sort_entries: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extension: "png".to_string(),
            case_sensitive: true,
            sort_entries: true,
        }
    }
}

impl ScanOptions {
    fn suffix(&self) -> String {
        format!(".{}", self.extension.trim_start_matches('.'))
    }

    /// ファイル名が対象拡張子で終わるか
    pub fn matches(&self, file_name: &str) -> bool {
        let suffix = self.suffix();
        if self.case_sensitive {
            file_name.ends_with(&suffix)
        } else {
            file_name
                .to_lowercase()
                .ends_with(&suffix.to_lowercase())
        }
    }
}

/// ファイル名から正解ラベルを取得
///
/// 最初の '.' より前がちょうど1文字の A-Z であること。
pub fn parse_label(file_name: &str) -> EvalResult<char> {
    let malformed = || EvalError::MalformedFileName(file_name.to_string());

    let (stem, _) = file_name.split_once('.').ok_or_else(malformed)?;
    let mut chars = stem.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Ok(c),
        _ => Err(malformed()),
    }
}

/// 対象ファイルを列挙（非再帰）
///
/// 読み取れないエントリは警告を出して読み飛ばします。
pub fn collect_image_files(dir: &Path, options: &ScanOptions) -> EvalResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| EvalError::io(dir, e))?;
    Ok(select_image_files(
        dir,
        entries.map(|entry| entry.map(|e| e.path())),
        options,
    ))
}

fn select_image_files<I>(dir: &Path, entries: I, options: &ScanOptions) -> Vec<PathBuf>
where
    I: IntoIterator<Item = std::io::Result<PathBuf>>,
{
    let mut files = Vec::new();

    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("エントリを読み取れません: {}: {}", dir.display(), e);
                continue;
            }
        };

        if !path.is_file() {
            continue;
        }

        let matched = path
            .file_name()
            .is_some_and(|name| options.matches(&name.to_string_lossy()));
        if matched {
            files.push(path);
        }
    }

    if options.sort_entries {
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }

    files
}

/// バッチ評価器
pub struct BatchEvaluator<C: Classifier> {
    predictor: LabelPredictor<C>,
    options: ScanOptions,
}

impl<C: Classifier> BatchEvaluator<C> {
    pub fn new(predictor: LabelPredictor<C>, options: ScanOptions) -> Self {
        Self { predictor, options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// 1ファイルを評価
    pub fn evaluate_file(&self, image: &LabeledImage) -> EvalResult<PredictionResult> {
        let sample = preprocess_file(&image.path)?;
        let predicted = self.predictor.predict(&sample)?;
        Ok(PredictionResult::new(image, predicted))
    }

    /// ディレクトリを評価
    pub fn evaluate_dir(&self, dir: &Path) -> EvalResult<AccuracyReport> {
        self.evaluate_dir_with(dir, |_| {})
    }

    /// ディレクトリを評価（1ファイルごとにコールバック）
    pub fn evaluate_dir_with<F>(&self, dir: &Path, mut on_result: F) -> EvalResult<AccuracyReport>
    where
        F: FnMut(&PredictionResult),
    {
        let files = collect_image_files(dir, &self.options)?;
        info!(
            "評価開始: {} ({} 件, 拡張子 {}, 範囲外インデックス {})",
            dir.display(),
            files.len(),
            self.options.suffix(),
            self.predictor.policy()
        );

        let mut report = AccuracyReport::default();

        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let outcome = parse_label(&name).and_then(|label| {
                self.evaluate_file(&LabeledImage {
                    label,
                    path: path.clone(),
                })
            });

            match outcome {
                Ok(result) => {
                    debug!("{}: {}", path.display(), result);
                    on_result(&result);
                    report.record(result);
                }
                Err(e) => {
                    warn!("スキップ: {}: {}", path.display(), e);
                    report.skip(path, e.to_string());
                }
            }
        }

        match report.accuracy() {
            Some(acc) => info!(
                "評価完了: {}/{} 正解 (acc {:.4}), スキップ {} 件",
                report.correct(),
                report.total,
                acc,
                report.skipped.len()
            ),
            None => warn!(
                "評価対象のファイルがありません: {} (スキップ {} 件)",
                dir.display(),
                report.skipped.len()
            ),
        }

        Ok(report)
    }
}

/// 評価結果をCSVに書き出す
///
/// 列: file, label, predicted, correct
pub fn write_csv(report: &AccuracyReport, output_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)
        .context(format!("Failed to create CSV file: {:?}", output_path))?;

    writer.write_record(["file", "label", "predicted", "correct"])?;

    for result in &report.results {
        let file = result
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.write_record([
            file,
            result.label.to_string(),
            result.predicted.to_string(),
            result.correct.to_string(),
        ])?;
    }

    writer.flush().context("Failed to flush CSV file")?;
    Ok(())
}
