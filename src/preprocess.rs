//! 画像の前処理
//!
//! 任意サイズの画像を、学習データ（EMNIST letters）と同じ向き・極性の
//! 28x28 単一チャネルのサンプルに変換します。
//!
//! 処理順序（学習時の規約と一致させるため変更不可）:
//! 1. 左右反転 → 反時計回りに90度回転（合成すると転置になる）
//! 2. Lanczos3 で 28x28 にリサイズ
//! 3. グレースケール化
//! 4. 255 で割って [0, 1] に正規化
//! 5. 極性反転 (1.0 - v)

use image::{imageops::FilterType, DynamicImage, GrayImage, Luma};
use std::path::Path;

use crate::error::{EvalError, EvalResult};

/// サンプルの一辺のピクセル数
pub const SAMPLE_SIZE: usize = 28;

/// サンプルのチャネル数
pub const SAMPLE_CHANNELS: usize = 1;

/// 前処理済みサンプル [28, 28, 1]（行優先）
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedSample {
    data: Vec<f32>,
}

impl PreprocessedSample {
    /// テンソル形状 [高さ, 幅, チャネル]
    pub const SHAPE: [usize; 3] = [SAMPLE_SIZE, SAMPLE_SIZE, SAMPLE_CHANNELS];

    /// 要素数（784）
    pub const LEN: usize = SAMPLE_SIZE * SAMPLE_SIZE * SAMPLE_CHANNELS;

    /// 生データからサンプルを作成（長さが784でなければ `None`）
    pub fn from_vec(data: Vec<f32>) -> Option<Self> {
        (data.len() == Self::LEN).then_some(Self { data })
    }

    pub fn shape(&self) -> [usize; 3] {
        Self::SHAPE
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// (x, y) の値
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= SAMPLE_SIZE || y >= SAMPLE_SIZE {
            return None;
        }
        self.data.get(y * SAMPLE_SIZE + x).copied()
    }

    /// 確認用に8bitグレースケール画像へ戻す（反転後の値をそのまま描画）
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(SAMPLE_SIZE as u32, SAMPLE_SIZE as u32, |x, y| {
            let v = self.data[y as usize * SAMPLE_SIZE + x as usize];
            Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }
}

/// デコード済み画像を前処理
pub fn preprocess_image(img: &DynamicImage) -> PreprocessedSample {
    let gray = img
        .fliph()
        .rotate270()
        .resize_exact(SAMPLE_SIZE as u32, SAMPLE_SIZE as u32, FilterType::Lanczos3)
        .to_luma8();

    let data = gray
        .pixels()
        .map(|pixel| 1.0 - pixel[0] as f32 / 255.0)
        .collect();

    PreprocessedSample { data }
}

/// エンコード済み画像バイト列を前処理
pub fn preprocess_bytes(bytes: &[u8]) -> Result<PreprocessedSample, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    Ok(preprocess_image(&img))
}

/// 画像ファイルを読み込んで前処理
pub fn preprocess_file(path: &Path) -> EvalResult<PreprocessedSample> {
    let bytes = std::fs::read(path).map_err(|e| EvalError::io(path, e))?;
    preprocess_bytes(&bytes).map_err(|e| EvalError::image(path, e))
}
