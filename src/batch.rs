//! Directory-level front end: runs the optimisation pipeline over every
//! supported image in a folder and writes a JSON summary next to the output.

use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};

use crate::config::ProcessorConfig;
use crate::error::{WebPerfectError, WebPerfectResult};
use crate::imaging::{analysis, OptimizationPreset};
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::stages::{AnalyzeStage, EnhanceStage, PersistStage, PlanStage, VerifyStage};
use crate::pipeline::{Pipeline, PipelineContext};

fn as_kilobytes<S: Serializer>(bytes: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}KB", *bytes as f64 / 1024.0))
}

fn as_megabytes<S: Serializer>(bytes: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}MB", *bytes as f64 / 1024.0 / 1024.0))
}

/// One successfully optimised file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    /// Output file name
    pub file: String,
    /// Input extension, lowercase
    pub original_format: String,
    pub new_format: String,
    #[serde(serialize_with = "as_kilobytes")]
    pub original_size: u64,
    #[serde(serialize_with = "as_kilobytes")]
    pub optimized_size: u64,
    /// Output dimensions as `WxH`
    pub resolution: String,
    /// Applied operations by their log label, in plan order
    pub enhancements: Vec<String>,
}

/// A file the pipeline could not optimise
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

/// Written to the processing log after a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Number of files optimised successfully
    pub total_files: usize,
    #[serde(serialize_with = "as_megabytes")]
    pub total_original_size: u64,
    #[serde(serialize_with = "as_megabytes")]
    pub total_optimized_size: u64,
    pub details: Vec<FileReport>,
    pub failures: Vec<FailedFile>,
}

impl BatchSummary {
    pub fn new(details: Vec<FileReport>, failures: Vec<FailedFile>) -> Self {
        Self {
            total_files: details.len(),
            total_original_size: details.iter().map(|d| d.original_size).sum(),
            total_optimized_size: details.iter().map(|d| d.optimized_size).sum(),
            details,
            failures,
        }
    }
}

/// Runs one pipeline per image in a directory
pub struct BatchProcessor {
    config: ProcessorConfig,
    preset: OptimizationPreset,
}

impl BatchProcessor {
    /// Create a processor, rejecting invalid configuration up front
    pub fn new(config: ProcessorConfig) -> WebPerfectResult<Self> {
        config.validate()?;
        let preset = config.active_preset()?;
        Ok(Self { config, preset })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The standard five-stage pipeline writing into `output_dir`
    pub fn build_pipeline(&self, output_dir: &Path) -> WebPerfectResult<Pipeline> {
        Pipeline::builder(format!("optimize:{}", self.preset.name))
            .add_analysis_stage(AnalyzeStage::new())
            .add_enhancement_stage(PlanStage::new(self.preset.clone()))
            .add_processing_stage(EnhanceStage::new())
            .add_verification_stage(VerifyStage::new())
            .add_processing_stage(PersistStage::new(output_dir))
            .build()
    }

    /// Optimise every supported image in `input_dir` into `output_dir`
    ///
    /// Files are processed one at a time in name order. A failing file is
    /// recorded in the summary and does not stop the batch.
    ///
    /// # Errors
    /// Returns [`WebPerfectError::InputDirectoryNotFound`] when `input_dir`
    /// is not a directory, or an IO error when listing it or writing the
    /// processing log fails.
    pub async fn process_directory(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> WebPerfectResult<BatchSummary> {
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();

        let is_dir = tokio::fs::metadata(input_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(WebPerfectError::InputDirectoryNotFound(
                input_dir.display().to_string(),
            ));
        }
        tokio::fs::create_dir_all(output_dir).await?;

        let files = self.scan(input_dir).await?;
        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Found {} image(s) to process in {} with preset '{}'",
                files.len(),
                input_dir.display(),
                self.preset.name
            ),
            "batch",
        );

        let mut details = Vec::new();
        let mut failures = Vec::new();
        for path in files {
            let file = file_name(&path);
            match self.process_file(&path, output_dir).await {
                Ok(report) => details.push(report),
                Err(e) => {
                    LOGGER.log(
                        LogLevel::Error,
                        &format!("Error processing {}: {}", file, e),
                        "batch",
                    );
                    failures.push(FailedFile {
                        file,
                        error: e.to_string(),
                    });
                }
            }
        }

        let summary = BatchSummary::new(details, failures);
        let log_path = output_dir.join(&self.config.log_file_name);
        tokio::fs::write(&log_path, serde_json::to_string_pretty(&summary)?).await?;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Batch finished: {} optimised, {} failed, log written to {}",
                summary.total_files,
                summary.failures.len(),
                log_path.display()
            ),
            "batch",
        );

        Ok(summary)
    }

    /// Supported files directly inside `dir`, sorted by name
    async fn scan(&self, dir: &Path) -> WebPerfectResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && self.config.is_supported(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Run the pipeline for one file
    pub async fn process_file(&self, path: &Path, output_dir: &Path) -> WebPerfectResult<FileReport> {
        let file = file_name(path);
        LOGGER.log(LogLevel::Info, &format!("Processing {}...", file), "batch");

        let source = tokio::fs::read(path).await?;
        let pipeline = self.build_pipeline(output_dir)?;
        let context = pipeline
            .run(PipelineContext::new(file.clone(), source))
            .await
            .into_result()?;

        let output = context
            .processed_image()
            .ok_or(WebPerfectError::MissingContextField("processed_image"))?;
        let stats = context
            .stats()
            .ok_or(WebPerfectError::MissingContextField("stats"))?;
        let plan = context
            .plan()
            .ok_or(WebPerfectError::MissingContextField("plan"))?;
        let (width, height) = analysis::dimensions(output)?;
        let output_path = PersistStage::output_path(output_dir, &file, &self.preset.format)?;

        LOGGER.log(LogLevel::Info, &format!("Completed {}", file), "batch");

        Ok(FileReport {
            file: file_name(&output_path),
            original_format: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase(),
            new_format: self.preset.format.clone(),
            original_size: stats.input_size,
            optimized_size: stats.output_size,
            resolution: format!("{}x{}", width, height),
            enhancements: plan
                .operations
                .iter()
                .filter_map(|op| op.kind.log_label())
                .map(str::to_string)
                .collect(),
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
