//! 文字分類モデルの定義
//!
//! 推論専用。外部で学習された重み（model.bin）を読み込むための
//! モジュール構造と設定を提供します。

#[cfg(feature = "ml")]
use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// メタデータに記録されるアーキテクチャ名
pub const ARCHITECTURE: &str = "letter_cnn";

/// モデル設定
#[cfg(feature = "ml")]
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    #[config(default = 27)]
    pub num_classes: usize,
    /// 入力画像サイズ（正方形）
    #[config(default = 28)]
    pub image_size: usize,
}

#[cfg(feature = "ml")]
impl ModelConfig {
    /// Conv3後の特徴マップの一辺
    ///
    /// Conv (3x3, no padding) で -2、Pool (2x2) で 1/2（切り捨て）:
    /// 28 -> 26 -> 13 -> 11 -> 5 -> 3
    pub fn feature_map_size(&self) -> usize {
        let after_conv1 = self.image_size.saturating_sub(2);
        let after_pool1 = after_conv1 / 2;
        let after_conv2 = after_pool1.saturating_sub(2);
        let after_pool2 = after_conv2 / 2;
        after_pool2.saturating_sub(2)
    }

    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> anyhow::Result<LetterClassifier<B>> {
        let feature_map_size = self.feature_map_size();
        if feature_map_size == 0 {
            anyhow::bail!("入力サイズが小さすぎます: {} (最小18x18が必要)", self.image_size);
        }

        // 特徴次元 d = 128チャネル * feature_map_size * feature_map_size
        let d = 128 * feature_map_size * feature_map_size;
        let d_half = d / 2;

        tracing::debug!(
            "[Model] 入力 {}x{}, Conv3後 128x{}x{}, FC {} -> {} -> {}",
            self.image_size,
            self.image_size,
            feature_map_size,
            feature_map_size,
            d,
            d_half,
            self.num_classes
        );

        Ok(LetterClassifier {
            conv1: Conv2dConfig::new([1, 32], [3, 3])
                .with_stride([1, 1])
                .init(device),
            pool1: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),

            conv2: Conv2dConfig::new([32, 64], [3, 3])
                .with_stride([1, 1])
                .init(device),
            pool2: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),

            conv3: Conv2dConfig::new([64, 128], [3, 3])
                .with_stride([1, 1])
                .init(device),

            fc1: LinearConfig::new(d, d_half).init(device),
            fc2: LinearConfig::new(d_half, self.num_classes).init(device),

            activation: Relu::new(),
        })
    }
}

/// 手書き文字分類用CNNモデル
///
/// # アーキテクチャ
/// - Conv 3x3 + ReLU + MaxPool 2x2 (1 -> 32)
/// - Conv 3x3 + ReLU + MaxPool 2x2 (32 -> 64)
/// - Conv 3x3 + ReLU (64 -> 128)
/// - Flatten
/// - FC: d -> d/2 + ReLU
/// - FC: d/2 -> 27
#[cfg(feature = "ml")]
#[derive(Module, Debug)]
pub struct LetterClassifier<B: Backend> {
    conv1: Conv2d<B>, // 1 -> 32
    pool1: MaxPool2d,
    conv2: Conv2d<B>, // 32 -> 64
    pool2: MaxPool2d,
    conv3: Conv2d<B>, // 64 -> 128

    fc1: Linear<B>, // d -> d/2
    fc2: Linear<B>, // d/2 -> num_classes

    activation: Relu,
}

#[cfg(feature = "ml")]
impl<B: Backend> LetterClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, 1, 28, 28]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        self.fc2.forward(x)
    }
}
