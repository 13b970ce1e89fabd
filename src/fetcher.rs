//! Sequential, resumable batch generation.
//!
//! Each request maps to exactly one file in the output directory. A file that
//! is already present is left alone, so an interrupted batch can simply be run
//! again. Items are processed one at a time and a failure only affects the
//! item it happened on.

use anyhow::{anyhow, Context};
use std::fmt;
use std::path::{Path, PathBuf};
use tempdir::TempDir;

use crate::generator::ImageGenerator;
use crate::request::{validate_identifier, GenerationRequest};
use crate::transfer::ArtifactTransfer;

const STAGING_PREFIX: &str = ".partial";

/// The step an item was on when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validate,
    Generate,
    Download,
    Save,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Validate => "validate",
            Step::Generate => "generate",
            Step::Download => "download",
            Step::Save => "save",
        };
        f.write_str(name)
    }
}

/// Terminal state of a single request.
#[derive(Debug)]
pub enum ItemOutcome {
    SkippedExisting,
    Created { bytes: usize },
    Failed { step: Step, error: anyhow::Error },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ItemOutcome::Failed { .. })
    }
}

#[derive(Debug)]
pub struct ItemReport {
    pub identifier: String,
    pub outcome: ItemOutcome,
}

#[derive(Debug, Default)]
pub struct RunResult {
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<ItemReport>,
}

impl RunResult {
    fn record(&mut self, identifier: &str, outcome: ItemOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.items.push(ItemReport {
            identifier: identifier.to_string(),
            outcome,
        });
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn skipped(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::SkippedExisting))
            .count()
    }

    pub fn outcome(&self, identifier: &str) -> Option<&ItemOutcome> {
        self.items
            .iter()
            .find(|item| item.identifier == identifier)
            .map(|item| &item.outcome)
    }
}

/// Progress notifications emitted while a batch runs. `index` is 1-based.
#[derive(Debug)]
pub enum Progress<'a> {
    Generating {
        index: usize,
        total: usize,
        request: &'a GenerationRequest,
    },
    Finished {
        index: usize,
        total: usize,
        request: &'a GenerationRequest,
        outcome: &'a ItemOutcome,
    },
}

struct ItemFailure {
    step: Step,
    error: anyhow::Error,
}

fn failed_at(step: Step) -> impl FnOnce(anyhow::Error) -> ItemFailure {
    move |error| ItemFailure { step, error }
}

pub struct BatchFetcher<G, T> {
    generator: G,
    transfer: T,
    output_dir: PathBuf,
}

impl<G, T> BatchFetcher<G, T>
where
    G: ImageGenerator,
    T: ArtifactTransfer,
{
    pub fn new(generator: G, transfer: T, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            generator,
            transfer,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn run(&self, requests: &[GenerationRequest]) -> anyhow::Result<RunResult> {
        self.run_with_progress(requests, |_| {}).await
    }

    /// Processes every request in order. Only failing to create the output
    /// directory aborts the run; per-item failures are recorded in the result.
    pub async fn run_with_progress<F>(
        &self,
        requests: &[GenerationRequest],
        mut on_progress: F,
    ) -> anyhow::Result<RunResult>
    where
        F: FnMut(Progress<'_>),
    {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create output directory {}",
                    self.output_dir.display()
                )
            })?;
        self.remove_stale_staging().await;

        let total = requests.len();
        let mut result = RunResult::default();

        for (i, request) in requests.iter().enumerate() {
            let index = i + 1;
            let outcome = match self
                .process(request, || {
                    on_progress(Progress::Generating {
                        index,
                        total,
                        request,
                    })
                })
                .await
            {
                Ok(outcome) => outcome,
                Err(ItemFailure { step, error }) => {
                    log::error!(
                        "{}: {} failed: {:#}",
                        request.identifier(),
                        step,
                        error
                    );
                    ItemOutcome::Failed { step, error }
                }
            };

            on_progress(Progress::Finished {
                index,
                total,
                request,
                outcome: &outcome,
            });
            result.record(request.identifier(), outcome);
        }

        log::info!(
            "Batch finished: {} succeeded ({} already present), {} failed",
            result.succeeded,
            result.skipped(),
            result.failed
        );
        Ok(result)
    }

    async fn process(
        &self,
        request: &GenerationRequest,
        on_generate: impl FnOnce(),
    ) -> Result<ItemOutcome, ItemFailure> {
        let identifier = request.identifier();
        validate_identifier(identifier).map_err(failed_at(Step::Validate))?;
        let target = self.output_dir.join(identifier);

        if is_file(&target).await {
            log::info!("Skipping {} (already exists)", identifier);
            return Ok(ItemOutcome::SkippedExisting);
        }

        on_generate();
        log::debug!("Generating {} from prompt {:?}", identifier, request.prompt());
        let reference = self
            .generator
            .generate(request.prompt())
            .await
            .map_err(failed_at(Step::Generate))?;
        if let Some(ref revised) = reference.revised_prompt {
            log::debug!("{}: revised prompt {:?}", identifier, revised);
        }

        let data = self
            .transfer
            .fetch(&reference)
            .await
            .map_err(failed_at(Step::Download))?;
        if data.is_empty() {
            return Err(ItemFailure {
                step: Step::Download,
                error: anyhow!("downloaded image is empty"),
            });
        }

        self.save(&target, identifier, &data)
            .await
            .map_err(failed_at(Step::Save))?;
        log::info!("Saved {} ({} bytes)", target.display(), data.len());

        Ok(ItemOutcome::Created { bytes: data.len() })
    }

    /// Writes into a private staging directory first and renames into place,
    /// so the target path only ever holds a complete file.
    async fn save(&self, target: &Path, identifier: &str, data: &[u8]) -> anyhow::Result<()> {
        let staging = TempDir::new_in(&self.output_dir, STAGING_PREFIX)
            .context("failed to create staging directory")?;
        let staged = staging.path().join(identifier);

        tokio::fs::write(&staged, data)
            .await
            .with_context(|| format!("failed to write {}", staged.display()))?;
        tokio::fs::rename(&staged, target)
            .await
            .with_context(|| format!("failed to move image to {}", target.display()))?;

        if let Err(e) = staging.close() {
            log::warn!("failed to remove staging directory: {}", e);
        }
        Ok(())
    }

    /// Staging directories left by a run that was killed mid-write.
    async fn remove_stale_staging(&self) {
        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("failed to list {}: {}", self.output_dir.display(), e);
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            if !is_staging_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let is_dir = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => log::info!("Removed stale staging directory {}", path.display()),
                Err(e) => log::warn!("failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

fn is_staging_name(name: &str) -> bool {
    name.strip_prefix(STAGING_PREFIX)
        .map_or(false, |rest| rest.starts_with('.'))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}
