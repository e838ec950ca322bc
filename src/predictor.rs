//! ラベル予測
//!
//! 分類器のスコアから最大値のインデックスを選び、文字に変換します。
//! クラス 0 は予約済み（未使用）、1 → 'A' ... 26 → 'Z'。

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::preprocess::PreprocessedSample;

/// 出力クラス数（0 は予約、1-26 が A-Z）
pub const NUM_CLASSES: usize = 27;

/// 文字として有効な最小インデックス
pub const FIRST_LETTER_INDEX: usize = 1;

/// 文字として有効な最大インデックス
pub const LAST_LETTER_INDEX: usize = 26;

/// インデックス → 文字コードのオフセット（1 + 64 = 'A'）
const ASCII_OFFSET: u32 = 64;

/// 学習済み分類器
///
/// 前処理済みサンプル [28, 28, 1] を受け取り、27クラス分のスコアを返す。
pub trait Classifier {
    fn scores(&self, sample: &PreprocessedSample) -> EvalResult<Vec<f32>>;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn scores(&self, sample: &PreprocessedSample) -> EvalResult<Vec<f32>> {
        (**self).scores(sample)
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn scores(&self, sample: &PreprocessedSample) -> EvalResult<Vec<f32>> {
        (**self).scores(sample)
    }
}

/// 範囲外インデックスの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexPolicy {
    /// `EvalError::InvalidIndex` を返す
    #[default]
    Reject,
    /// [1, 26] に丸める
    Clamp,
    /// 検証せずに chr(index + 64) を返す
    PassThrough,
}

impl std::fmt::Display for IndexPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexPolicy::Reject => write!(f, "reject"),
            IndexPolicy::Clamp => write!(f, "clamp"),
            IndexPolicy::PassThrough => write!(f, "pass-through"),
        }
    }
}

/// 最大スコアのインデックス（同値の場合は先に現れた方）
///
/// NaN は選ばれない。すべて NaN の場合はインデックス 0。
pub fn argmax(scores: &[f32]) -> Option<usize> {
    if scores.is_empty() {
        return None;
    }

    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        // 厳密に大きい場合のみ更新
        if score > scores[best] || (scores[best].is_nan() && !score.is_nan()) {
            best = i;
        }
    }
    Some(best)
}

/// クラスインデックスを文字に変換（1 → 'A', 26 → 'Z'）
pub fn index_to_letter(index: usize) -> Option<char> {
    if (FIRST_LETTER_INDEX..=LAST_LETTER_INDEX).contains(&index) {
        char::from_u32(index as u32 + ASCII_OFFSET)
    } else {
        None
    }
}

/// 文字をクラスインデックスに変換（'A' → 1, 'Z' → 26）
pub fn letter_to_index(letter: char) -> Option<usize> {
    if letter.is_ascii_uppercase() {
        Some((letter as u32 - ASCII_OFFSET) as usize)
    } else {
        None
    }
}

/// ポリシーに従ってインデックスを文字に変換
pub fn decode_index(index: usize, policy: IndexPolicy) -> EvalResult<char> {
    match policy {
        IndexPolicy::Reject => index_to_letter(index).ok_or(EvalError::InvalidIndex(index)),
        IndexPolicy::Clamp => {
            let clamped = index.clamp(FIRST_LETTER_INDEX, LAST_LETTER_INDEX);
            index_to_letter(clamped).ok_or(EvalError::InvalidIndex(index))
        }
        IndexPolicy::PassThrough => u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(ASCII_OFFSET))
            .and_then(char::from_u32)
            .ok_or(EvalError::InvalidIndex(index)),
    }
}

/// 分類器をラップしてサンプルを1文字に変換する予測器
pub struct LabelPredictor<C: Classifier> {
    classifier: C,
    policy: IndexPolicy,
}

impl<C: Classifier> LabelPredictor<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            policy: IndexPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: IndexPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> IndexPolicy {
        self.policy
    }

    /// 予測クラスインデックス
    pub fn predict_index(&self, sample: &PreprocessedSample) -> EvalResult<usize> {
        let scores = self.classifier.scores(sample)?;
        if scores.len() != NUM_CLASSES {
            return Err(EvalError::ScoreWidth {
                expected: NUM_CLASSES,
                actual: scores.len(),
            });
        }
        argmax(&scores).ok_or(EvalError::EmptyScores)
    }

    /// 予測文字
    pub fn predict(&self, sample: &PreprocessedSample) -> EvalResult<char> {
        let index = self.predict_index(sample)?;
        decode_index(index, self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 指定インデックスに1.0を立てたスコアを返すスタブ
    struct OneHot(usize);

    impl Classifier for OneHot {
        fn scores(&self, _sample: &PreprocessedSample) -> EvalResult<Vec<f32>> {
            let mut scores = vec![0.0; NUM_CLASSES];
            scores[self.0] = 1.0;
            Ok(scores)
        }
    }

    struct Fixed(Vec<f32>);

    impl Classifier for Fixed {
        fn scores(&self, _sample: &PreprocessedSample) -> EvalResult<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn blank() -> PreprocessedSample {
        PreprocessedSample::from_vec(vec![0.0; PreprocessedSample::LEN]).unwrap()
    }

    #[test]
    fn test_letter_mapping_is_bijective() {
        let letters: Vec<char> = (1..=26).map(|i| index_to_letter(i).unwrap()).collect();
        let expected: Vec<char> = ('A'..='Z').collect();
        assert_eq!(letters, expected);

        for i in 1..=26 {
            assert_eq!(index_to_letter(i), char::from_u32(i as u32 + 64));
            assert_eq!(letter_to_index(index_to_letter(i).unwrap()), Some(i));
        }
        assert_eq!(index_to_letter(0), None);
        assert_eq!(index_to_letter(27), None);
        assert_eq!(letter_to_index('a'), None);
    }

    #[test]
    fn test_argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.5, 0.5, 0.2]), Some(1));
        assert_eq!(argmax(&[0.3, 0.3]), Some(0));
        assert_eq!(argmax(&[-1.0, -0.5, -2.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_argmax_ignores_nan() {
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.1]), Some(1));
        assert_eq!(argmax(&[0.2, f32::NAN, 0.9]), Some(2));
    }

    #[test]
    fn test_predict_letters() {
        assert_eq!(LabelPredictor::new(OneHot(1)).predict(&blank()).unwrap(), 'A');
        assert_eq!(LabelPredictor::new(OneHot(5)).predict(&blank()).unwrap(), 'E');
        assert_eq!(LabelPredictor::new(OneHot(26)).predict(&blank()).unwrap(), 'Z');
    }

    #[test]
    fn test_reserved_index_policies() {
        let reject = LabelPredictor::new(OneHot(0));
        assert_eq!(reject.policy(), IndexPolicy::Reject);
        assert!(matches!(
            reject.predict(&blank()),
            Err(EvalError::InvalidIndex(0))
        ));

        let clamp = LabelPredictor::new(OneHot(0)).with_policy(IndexPolicy::Clamp);
        assert_eq!(clamp.policy(), IndexPolicy::Clamp);
        assert_eq!(clamp.predict(&blank()).unwrap(), 'A');

        let pass = LabelPredictor::new(OneHot(0)).with_policy(IndexPolicy::PassThrough);
        assert_eq!(pass.predict(&blank()).unwrap(), '@');
    }

    #[test]
    fn test_decode_index_out_of_range() {
        assert!(matches!(
            decode_index(30, IndexPolicy::Reject),
            Err(EvalError::InvalidIndex(30))
        ));
        assert_eq!(decode_index(30, IndexPolicy::Clamp).unwrap(), 'Z');
        assert_eq!(decode_index(27, IndexPolicy::PassThrough).unwrap(), '[');
    }

    #[test]
    fn test_wrong_score_width_is_rejected() {
        let predictor = LabelPredictor::new(Fixed(vec![0.0; 10]));
        assert!(matches!(
            predictor.predict(&blank()),
            Err(EvalError::ScoreWidth {
                expected: 27,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_borrowed_classifier() {
        let stub = OneHot(3);
        let predictor = LabelPredictor::new(&stub);
        assert_eq!(predictor.predict(&blank()).unwrap(), 'C');
    }
}
