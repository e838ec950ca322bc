//! モデル推論機能

#[cfg(feature = "ml")]
use anyhow::Result;
#[cfg(feature = "ml")]
use std::path::Path;
#[cfg(feature = "ml")]
use burn::{
    backend::Wgpu,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{activation::softmax, backend::Backend, Tensor},
};
#[cfg(feature = "ml")]
use burn_ndarray::{NdArray, NdArrayDevice};
#[cfg(feature = "ml")]
use burn_wgpu::WgpuDevice;
#[cfg(feature = "ml")]
use tracing::info;

#[cfg(feature = "ml")]
use crate::error::{EvalError, EvalResult};
#[cfg(feature = "ml")]
use crate::ml::{LetterClassifier, ModelConfig, ARCHITECTURE};
#[cfg(feature = "ml")]
use crate::model::{load_model_with_metadata, DeviceType, ModelMetadata};
#[cfg(feature = "ml")]
use crate::predictor::Classifier;
#[cfg(feature = "ml")]
use crate::preprocess::{PreprocessedSample, SAMPLE_CHANNELS, SAMPLE_SIZE};

/// モデルの重みをバイト列に変換（model.bin の形式）
#[cfg(feature = "ml")]
pub fn encode_model<B: Backend>(model: LetterClassifier<B>) -> Result<Vec<u8>> {
    BinBytesRecorder::<FullPrecisionSettings>::default()
        .record(model.into_record(), ())
        .map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))
}

/// 特定バックエンド上の学習済み分類器
#[cfg(feature = "ml")]
pub struct BurnClassifier<B: Backend> {
    model: LetterClassifier<B>,
    metadata: ModelMetadata,
    device: B::Device,
}

#[cfg(feature = "ml")]
impl<B: Backend> BurnClassifier<B> {
    /// メタデータと重みバイナリから分類器を構築
    pub fn from_parts(metadata: ModelMetadata, model_binary: Vec<u8>, device: B::Device) -> Result<Self> {
        metadata.validate()?;
        if metadata.architecture != ARCHITECTURE {
            anyhow::bail!(
                "未対応のアーキテクチャです: {} (期待: {})",
                metadata.architecture,
                ARCHITECTURE
            );
        }

        let model_config = ModelConfig::new()
            .with_num_classes(metadata.num_classes)
            .with_image_size(metadata.model_input_size as usize);
        let model = model_config.init::<B>(&device)?;

        // モデルの重みを復元
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, &device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;
        let model = model.load_record(record);

        Ok(Self {
            model,
            metadata,
            device,
        })
    }

    /// tar.gz アーカイブから分類器を読み込む
    pub fn load(model_path: &Path, device: B::Device) -> Result<Self> {
        let (metadata, model_binary) = load_model_with_metadata(model_path)?;
        Self::from_parts(metadata, model_binary, device)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn to_tensor(&self, sample: &PreprocessedSample) -> Tensor<B, 4> {
        // [28, 28, 1] と [1, 28, 28] はチャネル1なのでメモリ配置が同じ
        Tensor::<B, 1>::from_floats(sample.as_slice(), &self.device).reshape([
            1,
            SAMPLE_CHANNELS,
            SAMPLE_SIZE,
            SAMPLE_SIZE,
        ])
    }
}

#[cfg(feature = "ml")]
impl<B: Backend> Classifier for BurnClassifier<B> {
    /// softmax 後のクラス確率
    fn scores(&self, sample: &PreprocessedSample) -> EvalResult<Vec<f32>> {
        let output = self.model.forward(self.to_tensor(sample));
        let probabilities = softmax(output, 1);

        probabilities
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| EvalError::classifier(format!("推論結果の取得エラー: {:?}", e)))
    }
}

/// 推論エンジン（実行時にバックエンドを選択）
#[cfg(feature = "ml")]
pub enum InferenceEngine {
    Wgpu(BurnClassifier<Wgpu>),
    NdArray(BurnClassifier<NdArray>),
}

#[cfg(feature = "ml")]
impl InferenceEngine {
    /// CPU (NdArray) バックエンドでモデルを読み込む
    pub fn load(model_path: &Path) -> Result<Self> {
        Self::load_with_backend(model_path, DeviceType::Cpu)
    }

    /// 指定バックエンドでモデルを読み込む
    pub fn load_with_backend(model_path: &Path, device_type: DeviceType) -> Result<Self> {
        info!(
            "モデルを読み込みます: {} ({})",
            model_path.display(),
            device_type
        );

        let engine = match device_type {
            DeviceType::Wgpu => {
                InferenceEngine::Wgpu(BurnClassifier::load(model_path, WgpuDevice::default())?)
            }
            DeviceType::Cpu => {
                InferenceEngine::NdArray(BurnClassifier::load(model_path, NdArrayDevice::Cpu)?)
            }
        };

        info!(
            "モデル読み込み完了: {} ({} クラス, 学習日時 {})",
            engine.metadata().architecture,
            engine.metadata().num_classes,
            engine.metadata().trained_at
        );
        Ok(engine)
    }

    pub fn device_type(&self) -> DeviceType {
        match self {
            InferenceEngine::Wgpu(_) => DeviceType::Wgpu,
            InferenceEngine::NdArray(_) => DeviceType::Cpu,
        }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        match self {
            InferenceEngine::Wgpu(classifier) => classifier.metadata(),
            InferenceEngine::NdArray(classifier) => classifier.metadata(),
        }
    }
}

#[cfg(feature = "ml")]
impl Classifier for InferenceEngine {
    fn scores(&self, sample: &PreprocessedSample) -> EvalResult<Vec<f32>> {
        match self {
            InferenceEngine::Wgpu(classifier) => classifier.scores(sample),
            InferenceEngine::NdArray(classifier) => classifier.scores(sample),
        }
    }
}
