use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use webperfect_lib::batch::BatchProcessor;
use webperfect_lib::config::ProcessorConfig;
use webperfect_lib::error::{WebPerfectError, WebPerfectResult};
use webperfect_lib::imaging::{analysis, OptimizationPreset};
use webperfect_lib::pipeline::stages::{AnalyzeStage, EnhanceStage, PlanStage, VerifyStage};
use webperfect_lib::pipeline::{ContextUpdate, Pipeline, PipelineContext, PipelineStage};

/// A noisy gradient so every metric has something to measure
fn photo(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let grain = ((x * 31 + y * 17) % 13) as u8;
        Rgb([
            (x * 255 / width.max(1)) as u8 / 2 + grain,
            (y * 255 / height.max(1)) as u8 / 2 + grain,
            120 + grain,
        ])
    });
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Test the full in-memory optimisation: analyze, plan, enhance, verify
#[tokio::test]
async fn test_complete_optimisation_pipeline() {
    webperfect_lib::logger::init_tracing();

    let pipeline = Pipeline::builder("optimize")
        .add_analysis_stage(AnalyzeStage::new())
        .add_enhancement_stage(PlanStage::new(OptimizationPreset::thumbnail()))
        .add_processing_stage(EnhanceStage::new())
        .add_verification_stage(VerifyStage::new())
        .build()
        .unwrap();

    let source = photo(800, 600, ImageFormat::Jpeg);
    let (context, report) = pipeline
        .run_with_report(PipelineContext::new("photo.jpg", source.clone()))
        .await;

    assert!(context.error().is_none(), "error: {:?}", context.error());
    assert!(report.succeeded());
    assert_eq!(report.executed_stages(), 4);

    // Source is never modified
    assert_eq!(context.source_image(), &source[..]);

    let metadata = context.metadata().unwrap();
    assert_eq!(metadata.resolution(), "800x600");
    assert_eq!(metadata.format, "jpeg");

    let output = context.processed_image().unwrap();
    assert_eq!(image::guess_format(output).unwrap(), ImageFormat::WebP);
    assert_eq!(analysis::dimensions(output).unwrap(), (400, 300));

    let stats = context.stats().unwrap();
    assert_eq!(stats.input_size, source.len() as u64);
    assert!((0.0..=1.0).contains(&stats.quality_score));
}

/// A ratio whose scaled height rounds down still verifies at the planned size
#[tokio::test]
async fn test_uneven_aspect_ratio_matches_plan() {
    let pipeline = Pipeline::builder("optimize")
        .add_analysis_stage(AnalyzeStage::new())
        .add_enhancement_stage(PlanStage::new(OptimizationPreset::thumbnail()))
        .add_processing_stage(EnhanceStage::new())
        .add_verification_stage(VerifyStage::new())
        .build()
        .unwrap();

    let source = photo(3000, 1998, ImageFormat::Png);
    let context = pipeline
        .run(PipelineContext::new("panorama.png", source))
        .await;

    assert!(context.error().is_none(), "error: {:?}", context.error());

    let planned = context.plan().unwrap().resize_target();
    assert_eq!(planned, Some((400, 266)));

    let output = context.processed_image().unwrap();
    assert_eq!(analysis::dimensions(output).ok(), planned);
}

/// A pipeline started on bytes that are not an image stops at analysis
#[tokio::test]
async fn test_pipeline_records_decode_failure() {
    let pipeline = Pipeline::builder("optimize")
        .add_analysis_stage(AnalyzeStage::new())
        .add_enhancement_stage(PlanStage::new(OptimizationPreset::web_standard()))
        .build()
        .unwrap();

    let context = pipeline
        .run(PipelineContext::new("notes.png", b"plain text".to_vec()))
        .await;

    assert!(matches!(
        context.error(),
        Some(WebPerfectError::UnsupportedFormat(_))
    ));
    assert!(context.metadata().is_none());
    assert!(context.plan().is_none());
}

struct Recorder {
    name: &'static str,
    calls: Arc<Mutex<Vec<String>>>,
    accept: bool,
}

#[async_trait]
impl PipelineStage for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn validate(&self, _context: &PipelineContext) -> WebPerfectResult<bool> {
        Ok(self.accept)
    }

    async fn execute(&self, _context: &PipelineContext) -> WebPerfectResult<ContextUpdate> {
        self.calls.lock().unwrap().push(format!("execute {}", self.name));
        Ok(ContextUpdate::new())
    }

    async fn cleanup(&self) -> WebPerfectResult<()> {
        self.calls.lock().unwrap().push(format!("cleanup {}", self.name));
        Ok(())
    }
}

/// Custom stages mixed with categories: validation stops the run, cleanup
/// still reaches every stage
#[tokio::test]
async fn test_custom_stages_cleanup_after_validation_failure() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorder = |name, accept| Recorder {
        name,
        calls: calls.clone(),
        accept,
    };

    let pipeline = Pipeline::builder("recorders")
        .add_analysis_stage(recorder("first", true))
        .add_verification_stage(recorder("second", false))
        .add_stage(recorder("third", true))
        .build()
        .unwrap();

    let context = pipeline.run(PipelineContext::new("x", vec![1])).await;

    assert_eq!(
        context.error().unwrap().to_string(),
        "Validation failed for stage: verification:second"
    );
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            "execute first",
            "cleanup first",
            "cleanup second",
            "cleanup third",
        ]
    );
}

/// Process a directory with good and bad files and check the written log
#[tokio::test]
async fn test_batch_processes_directory() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    std::fs::write(input.path().join("b_scan.png"), photo(64, 32, ImageFormat::Png)).unwrap();
    std::fs::write(input.path().join("a_photo.jpg"), photo(2000, 1000, ImageFormat::Jpeg)).unwrap();
    std::fs::write(input.path().join("c_broken.jpeg"), b"not really a jpeg").unwrap();
    std::fs::write(input.path().join("notes.txt"), b"ignored").unwrap();

    let processor = BatchProcessor::new(ProcessorConfig::default()).unwrap();
    let summary = processor
        .process_directory(input.path(), output.path())
        .await
        .unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.details[0].file, "a_photo.webp");
    assert_eq!(summary.details[0].original_format, "jpg");
    assert_eq!(summary.details[0].resolution, "1920x960");
    assert_eq!(summary.details[1].file, "b_scan.webp");
    assert_eq!(summary.details[1].resolution, "64x32");
    let labels = &summary.details[0].enhancements;
    assert!(labels.contains(&"resolution_optimization".to_string()));
    assert!(!labels.iter().any(|l| l == "resize" || l == "format_conversion"));
    assert!(!summary.details[1]
        .enhancements
        .contains(&"resolution_optimization".to_string()));

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].file, "c_broken.jpeg");

    assert!(output.path().join("a_photo.webp").exists());
    assert!(output.path().join("b_scan.webp").exists());
    assert!(!output.path().join("c_broken.webp").exists());

    let log = std::fs::read_to_string(output.path().join("processing-log.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&log).unwrap();
    assert_eq!(json["totalFiles"], 2);
    assert!(json["totalOriginalSize"].as_str().unwrap().ends_with("MB"));
    assert!(json["details"][1]["optimizedSize"]
        .as_str()
        .unwrap()
        .ends_with("KB"));
}

/// An empty directory still writes a summary
#[tokio::test]
async fn test_batch_empty_directory() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let processor = BatchProcessor::new(ProcessorConfig::default().with_output_format("png")).unwrap();

    let summary = processor
        .process_directory(input.path(), output.path())
        .await
        .unwrap();

    assert_eq!(summary.total_files, 0);
    assert!(output.path().join("processing-log.json").exists());
}

#[tokio::test]
async fn test_batch_missing_input_directory() {
    let output = TempDir::new().unwrap();
    let processor = BatchProcessor::new(ProcessorConfig::default()).unwrap();

    let result = processor
        .process_directory(output.path().join("missing"), output.path())
        .await;

    assert!(matches!(
        result,
        Err(WebPerfectError::InputDirectoryNotFound(_))
    ));
}
