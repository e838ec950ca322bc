use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 正解ラベル付きの画像ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledImage {
    pub label: char,
    pub path: PathBuf,
}

/// 1ファイル分の予測結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub path: PathBuf,
    pub label: char,
    pub predicted: char,
    pub correct: bool,
}

impl PredictionResult {
    pub fn new(image: &LabeledImage, predicted: char) -> Self {
        Self {
            path: image.path.clone(),
            label: image.label,
            predicted,
            correct: image.label == predicted,
        }
    }
}

// 出力形式: "<label> -> Predict <predicted>, <True|False>"
impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matched = if self.correct { "True" } else { "False" };
        write!(f, "{} -> Predict {}, {}", self.label, self.predicted, matched)
    }
}

/// 評価をスキップしたファイル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// バッチ評価の集計結果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// 評価できたファイル数
    pub total: usize,
    /// 不正解数
    pub incorrect: usize,
    /// 評価できたファイルごとの結果（ディレクトリ走査順）
    pub results: Vec<PredictionResult>,
    /// スキップしたファイル
    pub skipped: Vec<SkippedFile>,
}

impl AccuracyReport {
    pub fn record(&mut self, result: PredictionResult) {
        self.total += 1;
        if !result.correct {
            self.incorrect += 1;
        }
        self.results.push(result);
    }

    pub fn skip(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.skipped.push(SkippedFile {
            path,
            reason: reason.into(),
        });
    }

    pub fn correct(&self) -> usize {
        self.total - self.incorrect
    }

    /// 正解率。評価対象が0件の場合は `None`
    pub fn accuracy(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(1.0 - self.incorrect as f64 / self.total as f64)
    }
}

impl fmt::Display for AccuracyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.accuracy() {
            // Debug表記で 1.0 を "1" ではなく "1.0" と出す
            Some(acc) => write!(f, "acc: {:?}", acc),
            None => write!(f, "acc: N/A ({} samples)", self.total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: char, predicted: char) -> PredictionResult {
        let image = LabeledImage {
            label,
            path: PathBuf::from(format!("{}.png", label)),
        };
        PredictionResult::new(&image, predicted)
    }

    #[test]
    fn test_empty_report_has_no_accuracy() {
        let report = AccuracyReport::default();
        assert_eq!(report.accuracy(), None);
        assert_eq!(report.to_string(), "acc: N/A (0 samples)");
    }

    #[test]
    fn test_one_mismatch_in_ten() {
        let mut report = AccuracyReport::default();
        for label in "ABCDEFGHI".chars() {
            report.record(result(label, label));
        }
        report.record(result('J', 'I'));

        assert_eq!(report.total, 10);
        assert_eq!(report.incorrect, 1);
        assert_eq!(report.correct(), 9);
        assert_eq!(report.accuracy(), Some(0.9));
    }

    #[test]
    fn test_skipped_files_do_not_count() {
        let mut report = AccuracyReport::default();
        report.record(result('A', 'A'));
        report.skip(PathBuf::from("broken.png"), "not an image");

        assert_eq!(report.total, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.accuracy(), Some(1.0));
        assert_eq!(report.to_string(), "acc: 1.0");
    }

    #[test]
    fn test_prediction_line_format() {
        assert_eq!(result('B', 'B').to_string(), "B -> Predict B, True");
        assert_eq!(result('A', 'E').to_string(), "A -> Predict E, False");
    }

    #[test]
    fn test_case_sensitive_match() {
        assert!(!result('A', 'a').correct);
    }
}
