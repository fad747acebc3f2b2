use std::path::PathBuf;

use clap::Parser;

use gaze_attention::EstimatorKind;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image files to score. Use `-` to read one encoded image from stdin
    pub images: Vec<PathBuf>,

    /// Estimator used for every input
    #[arg(short, long, value_enum, default_value_t = EstimatorKind::Projection)]
    pub estimator: EstimatorKind,

    /// Face landmark ONNX model (overrides the config file)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long, default_value_t = false)]
    pub print_config: bool,

    /// Base64 image or data URL to score (repeatable)
    #[arg(long)]
    pub base64: Vec<String>,

    /// Write annotated copies of the inputs into this directory
    #[arg(long)]
    pub annotate: Option<PathBuf>,

    /// Worker threads for batch scoring (default: one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}
