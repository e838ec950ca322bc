//! モデルとメタデータの永続化
//!
//! Tar.gz形式でモデルとメタデータを1ファイルに統合して保存・読み込みします。
//!
//! ファイル構成（tar.gz内部）:
//! - metadata.json   - メタデータ（クラス数、入力サイズなど）
//! - model.bin       - モデルの重み（BinBytesRecorder, f32）

#[cfg(feature = "ml")]
use anyhow::{Context, Result};
#[cfg(feature = "ml")]
use flate2::read::GzDecoder;
#[cfg(feature = "ml")]
use flate2::write::GzEncoder;
#[cfg(feature = "ml")]
use flate2::Compression;
#[cfg(feature = "ml")]
use std::fs::File;
#[cfg(feature = "ml")]
use std::io::Read;
#[cfg(feature = "ml")]
use std::path::{Path, PathBuf};
#[cfg(feature = "ml")]
use tar::{Archive, Builder};

#[cfg(feature = "ml")]
use crate::model::model_metadata::ModelMetadata;

#[cfg(feature = "ml")]
const METADATA_ENTRY: &str = "metadata.json";
#[cfg(feature = "ml")]
const MODEL_ENTRY: &str = "model.bin";

#[cfg(feature = "ml")]
fn append_entry<W: std::io::Write>(builder: &mut Builder<W>, name: &str, bytes: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .context(format!("Failed to add {} to tar", name))
}

#[cfg(feature = "ml")]
fn open_archive(tar_gz_path: &Path) -> Result<Archive<GzDecoder<File>>> {
    let tar_gz_file = File::open(tar_gz_path)
        .context(format!("Failed to open tar.gz file: {:?}", tar_gz_path))?;
    Ok(Archive::new(GzDecoder::new(tar_gz_file)))
}

/// メタデータと共にモデルをTar.gz形式で保存
///
/// 保存先パスを返す（拡張子が .gz でなければ .tar.gz を付与）。
#[cfg(feature = "ml")]
pub fn save_model_with_metadata(
    output_path: &Path,
    metadata: &ModelMetadata,
    model_binary: &[u8],
) -> Result<PathBuf> {
    let tar_gz_path = if output_path.extension().and_then(|s| s.to_str()) == Some("gz") {
        output_path.to_path_buf()
    } else {
        output_path.with_extension("tar.gz")
    };

    if let Some(parent) = tar_gz_path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create parent directory: {:?}", parent))?;
    }

    let tar_gz_file = File::create(&tar_gz_path)
        .context(format!("Failed to create tar.gz file: {:?}", tar_gz_path))?;

    let encoder = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    let json_str = metadata.to_json_string()?;
    append_entry(&mut tar_builder, METADATA_ENTRY, json_str.as_bytes())?;
    append_entry(&mut tar_builder, MODEL_ENTRY, model_binary)?;

    // gzipストリームまで閉じる
    tar_builder
        .into_inner()
        .context("Failed to finalize tar archive")?
        .finish()
        .context("Failed to finalize tar.gz archive")?;

    Ok(tar_gz_path)
}

/// Tar.gzからモデルメタデータを読み込む
#[cfg(feature = "ml")]
pub fn load_metadata(tar_gz_path: &Path) -> Result<ModelMetadata> {
    let mut archive = open_archive(tar_gz_path)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?;

        if path.to_str() == Some(METADATA_ENTRY) {
            let mut json_str = String::new();
            entry.read_to_string(&mut json_str)?;
            return ModelMetadata::from_json_string(&json_str);
        }
    }

    Err(anyhow::anyhow!("metadata.json not found in tar.gz archive"))
}

/// Tar.gzからモデルバイナリを読み込む
#[cfg(feature = "ml")]
pub fn load_model_binary(tar_gz_path: &Path) -> Result<Vec<u8>> {
    let mut archive = open_archive(tar_gz_path)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?;

        if path.to_str() == Some(MODEL_ENTRY) {
            let mut buffer = Vec::new();
            entry.read_to_end(&mut buffer)?;
            return Ok(buffer);
        }
    }

    Err(anyhow::anyhow!("model.bin not found in tar.gz archive"))
}

/// メタデータとモデルバイナリを共に読み込む
#[cfg(feature = "ml")]
pub fn load_model_with_metadata(tar_gz_path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    let mut archive = open_archive(tar_gz_path)?;

    let mut metadata_opt: Option<ModelMetadata> = None;
    let mut model_binary_opt: Option<Vec<u8>> = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?;

        match path.to_str() {
            Some(METADATA_ENTRY) => {
                let mut json_str = String::new();
                entry.read_to_string(&mut json_str)?;
                metadata_opt = Some(ModelMetadata::from_json_string(&json_str)?);
            }
            Some(MODEL_ENTRY) => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer)?;
                model_binary_opt = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata_opt, model_binary_opt) {
        (Some(metadata), Some(binary)) => Ok((metadata, binary)),
        (None, _) => Err(anyhow::anyhow!("metadata.json not found in tar.gz archive")),
        (_, None) => Err(anyhow::anyhow!("model.bin not found in tar.gz archive")),
    }
}

/// メタデータをコンソールに表示
#[cfg(feature = "ml")]
pub fn print_metadata_info(metadata: &ModelMetadata) {
    println!("\n=== モデルメタデータ ===");
    println!("アーキテクチャ: {}", metadata.architecture);
    println!("データセット: {}", metadata.dataset);
    println!("クラス数: {}", metadata.num_classes);
    println!(
        "モデル入力サイズ: {}x{}",
        metadata.model_input_size, metadata.model_input_size
    );
    println!("学習エポック数: {}", metadata.num_epochs);
    println!("学習日時: {}", metadata.trained_at);
    println!("========================");
}
