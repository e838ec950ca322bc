//! EMNIST letters 評価ツール
//!
//! ```bash
//! emnist_letters eval <DIR> --model models/emnist_letters.tar.gz
//! emnist_letters inspect models/emnist_letters.tar.gz
//! emnist_letters preview A.png A_28x28.png
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use emnist_letters_lib::model::{DeviceType, EvalConfig};
use emnist_letters_lib::{init_tracing, preprocess_file, IndexPolicy};

#[derive(Parser)]
#[command(name = "emnist_letters")]
#[command(about = "EMNIST letters: preprocessing, inference and accuracy evaluation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// ディレクトリ内の `<LABEL>.<...>.png` を評価して正解率を表示
    Eval(EvalArgs),
    /// モデルアーカイブのメタデータを表示
    Inspect {
        /// モデルファイル（tar.gz）
        model: PathBuf,
    },
    /// 前処理後の 28x28 画像を保存
    Preview {
        /// 入力画像
        image: PathBuf,
        /// 出力先（PNG）
        output: PathBuf,
    },
}

#[derive(Args)]
struct EvalArgs {
    /// 評価する画像ディレクトリ（非再帰）
    dir: PathBuf,

    /// モデルファイル（tar.gz）。未指定時は設定ファイルの値
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// 設定ファイル（JSON）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 推論バックエンド
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// 対象拡張子
    #[arg(long)]
    extension: Option<String>,

    /// 拡張子の大文字小文字を区別しない
    #[arg(long)]
    ignore_case: bool,

    /// ファイル名順に並べ替えない（OSの列挙順）
    #[arg(long)]
    no_sort: bool,

    /// 範囲外インデックスの扱い
    #[arg(long, value_enum)]
    index_policy: Option<PolicyArg>,

    /// 結果をCSVに書き出す
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Cpu,
    Wgpu,
}

impl From<BackendArg> for DeviceType {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Cpu => DeviceType::Cpu,
            BackendArg::Wgpu => DeviceType::Wgpu,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Reject,
    Clamp,
    PassThrough,
}

impl From<PolicyArg> for IndexPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Reject => IndexPolicy::Reject,
            PolicyArg::Clamp => IndexPolicy::Clamp,
            PolicyArg::PassThrough => IndexPolicy::PassThrough,
        }
    }
}

/// 設定ファイルを読み込み、コマンドライン引数で上書き
fn resolve_config(args: &EvalArgs) -> Result<EvalConfig> {
    let mut config = match &args.config {
        Some(path) => EvalConfig::load(path)
            .context(format!("Failed to load config: {}", path.display()))?,
        None => EvalConfig::load_or_default(EvalConfig::default_path()),
    };

    if let Some(model) = &args.model {
        config.model_path = model.to_string_lossy().to_string();
    }
    if let Some(backend) = args.backend {
        config.device_type = backend.into();
    }
    if let Some(extension) = &args.extension {
        config.scan.extension = extension.clone();
    }
    if args.ignore_case {
        config.scan.case_sensitive = false;
    }
    if args.no_sort {
        config.scan.sort_entries = false;
    }
    if let Some(policy) = args.index_policy {
        config.index_policy = policy.into();
    }

    Ok(config)
}

#[cfg(feature = "ml")]
fn run_eval(args: EvalArgs) -> Result<()> {
    use emnist_letters_lib::ml::InferenceEngine;
    use emnist_letters_lib::{write_csv, BatchEvaluator, LabelPredictor};
    use std::path::Path;
    use tracing::warn;

    let config = resolve_config(&args)?;

    let engine = InferenceEngine::load_with_backend(Path::new(&config.model_path), config.device_type)
        .context("推論エンジンの初期化エラー")?;

    let evaluator = BatchEvaluator::new(
        LabelPredictor::new(engine).with_policy(config.index_policy),
        config.scan.clone(),
    );
    info!("走査設定: {:?}", evaluator.options());

    let report = evaluator
        .evaluate_dir_with(&args.dir, |result| println!("{}", result))
        .context(format!("評価エラー: {}", args.dir.display()))?;

    if !report.skipped.is_empty() {
        warn!("{} 件のファイルをスキップしました", report.skipped.len());
    }
    println!("{}", report);

    if let Some(csv_path) = &args.csv {
        write_csv(&report, csv_path)?;
        info!("CSVを書き出しました: {}", csv_path.display());
    }

    Ok(())
}

#[cfg(not(feature = "ml"))]
fn run_eval(args: EvalArgs) -> Result<()> {
    // 引数の検証のみ
    let _config = resolve_config(&args)?;
    anyhow::bail!("ML機能が有効化されていません")
}

#[cfg(feature = "ml")]
fn run_inspect(model: PathBuf) -> Result<()> {
    use emnist_letters_lib::model::{load_metadata, print_metadata_info};

    let metadata = load_metadata(&model).context("メタデータ読み込みエラー")?;
    print_metadata_info(&metadata);

    if let Err(e) = metadata.validate() {
        println!("警告: このモデルは評価に使用できません: {}", e);
    }
    Ok(())
}

#[cfg(not(feature = "ml"))]
fn run_inspect(_model: PathBuf) -> Result<()> {
    anyhow::bail!("ML機能が有効化されていません")
}

fn run_preview(image: PathBuf, output: PathBuf) -> Result<()> {
    let sample = preprocess_file(&image)?;
    sample
        .to_gray_image()
        .save(&output)
        .context(format!("Failed to save preview: {}", output.display()))?;

    info!("前処理結果を保存しました: {} -> {}", image.display(), output.display());
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Eval(args) => run_eval(args),
        Command::Inspect { model } => run_inspect(model),
        Command::Preview { image, output } => run_preview(image, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_eval(args: &[&str]) -> EvalArgs {
        let argv = ["emnist_letters", "eval"].iter().chain(args.iter()).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Eval(args) => args,
            _ => panic!("eval subcommand expected"),
        }
    }

    fn saved_config(dir: &std::path::Path) -> PathBuf {
        let mut config = EvalConfig::default();
        config.model_path = "from_file.tar.gz".to_string();
        config.device_type = DeviceType::Wgpu;
        config.scan.extension = "bmp".to_string();
        config.index_policy = IndexPolicy::Clamp;

        let path = dir.join("config.json");
        config.save(&path).unwrap();
        path
    }

    #[test]
    fn test_config_file_values_without_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = saved_config(dir.path());

        let args = parse_eval(&["images", "--config", config_path.to_str().unwrap()]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.model_path, "from_file.tar.gz");
        assert_eq!(config.device_type, DeviceType::Wgpu);
        assert_eq!(config.scan.extension, "bmp");
        assert!(config.scan.case_sensitive);
        assert!(config.scan.sort_entries);
        assert_eq!(config.index_policy, IndexPolicy::Clamp);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = saved_config(dir.path());

        let args = parse_eval(&[
            "images",
            "--config",
            config_path.to_str().unwrap(),
            "--model",
            "from_flag.tar.gz",
            "--backend",
            "cpu",
            "--extension",
            "png",
            "--ignore-case",
            "--no-sort",
            "--index-policy",
            "pass-through",
        ]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.model_path, "from_flag.tar.gz");
        assert_eq!(config.device_type, DeviceType::Cpu);
        assert_eq!(config.scan.extension, "png");
        assert!(!config.scan.case_sensitive);
        assert!(!config.scan.sort_entries);
        assert_eq!(config.index_policy, IndexPolicy::PassThrough);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");

        let args = parse_eval(&["images", "--config", missing.to_str().unwrap()]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_invalid_flag_values_are_rejected() {
        assert!(Cli::try_parse_from(["emnist_letters", "eval", "images", "--backend", "tpu"]).is_err());
        assert!(
            Cli::try_parse_from(["emnist_letters", "eval", "images", "--index-policy", "wrap"]).is_err()
        );
        assert!(Cli::try_parse_from(["emnist_letters", "eval"]).is_err());
    }
}
