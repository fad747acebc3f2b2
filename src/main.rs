use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context};
use clap::Parser;
use rayon::prelude::*;

use gaze_attention::annotate::annotate;
use gaze_attention::face_landmarks::model_mediapipe::MediapipeFaceLandmarksModel;
use gaze_attention::{
    EngineConfig, EstimatorKind, FailureKind, FrameRecord, FrameResult, GazeEngine, ImageSource,
};

mod args;

use args::Args;

fn main() -> anyhow::Result<()> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(model) = &args.model {
        config.detector.model_path = model.clone();
    }

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let sources = collect_sources(&args)?;
    if sources.is_empty() {
        bail!("no input images given (pass file paths, `-` or --base64)");
    }

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("failed to configure worker threads")?;
    }

    if let Some(dir) = &args.annotate {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    // fail early on a missing or broken model; the first worker reuses this instance
    let first_detector = Mutex::new(Some(
        MediapipeFaceLandmarksModel::new(&config.detector)
            .context("failed to load face landmark model")?,
    ));

    let engine = GazeEngine::new(config).context("invalid configuration")?;
    log::info!(
        "Scoring {} input(s) with the {:?} estimator",
        sources.len(),
        args.estimator
    );

    let records: Vec<FrameRecord> = sources
        .par_iter()
        .enumerate()
        .map_init(
            || match first_detector.lock().ok().and_then(|mut first| first.take()) {
                Some(detector) => Ok(detector),
                None => MediapipeFaceLandmarksModel::new(&engine.config().detector),
            },
            |detector, (index, source)| {
                let result = match detector {
                    Ok(detector) => score(
                        &engine,
                        detector,
                        source,
                        args.estimator,
                        args.annotate.as_deref(),
                        index,
                    ),
                    Err(e) => FrameResult::failed(FailureKind::DetectorFailure, e.to_string()),
                };
                result.to_record()
            },
        )
        .collect();

    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }

    Ok(())
}

fn collect_sources(args: &Args) -> anyhow::Result<Vec<ImageSource>> {
    let mut sources = Vec::with_capacity(args.images.len() + args.base64.len());

    for path in &args.images {
        if path.as_os_str() == "-" {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("failed to read image from stdin")?;
            sources.push(ImageSource::Bytes(bytes));
        } else {
            sources.push(ImageSource::Path(path.clone()));
        }
    }

    sources.extend(args.base64.iter().cloned().map(ImageSource::Base64));
    Ok(sources)
}

fn score(
    engine: &GazeEngine,
    detector: &mut MediapipeFaceLandmarksModel,
    source: &ImageSource,
    kind: EstimatorKind,
    annotate_dir: Option<&Path>,
    index: usize,
) -> FrameResult {
    // frames are unrelated, so no crop is carried over between them
    detector.reset();

    let Some(dir) = annotate_dir else {
        return engine.analyze_source(detector, source, kind);
    };

    let image = match source.load() {
        Ok(image) => image,
        Err(e) => {
            log::warn!("could not load {}: {}", source.describe(), e);
            return e.into();
        }
    };

    let (result, landmarks) = engine.analyze_with_landmarks(detector, &image, kind);
    if let Some(landmarks) = landmarks {
        let target = annotation_path(dir, source, index);
        match annotate(&image, &landmarks, engine.config(), kind) {
            Ok(overlay) => {
                if let Err(e) = overlay.save(&target) {
                    log::warn!("could not write {}: {}", target.display(), e);
                }
            }
            Err(e) => log::warn!("could not annotate {}: {}", source.describe(), e),
        }
    }

    result
}

fn annotation_path(dir: &Path, source: &ImageSource, index: usize) -> PathBuf {
    let stem = match source {
        ImageSource::Path(path) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string()),
        _ => "input".to_string(),
    };
    // the index keeps same-named files from different directories apart
    dir.join(format!("{}-{}_annotated.png", stem, index))
}
