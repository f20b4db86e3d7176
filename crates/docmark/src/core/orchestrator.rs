//! Conversion orchestration.
//!
//! [`DocumentConverter`] drives one document through
//! `PENDING → SNIFFING → TRYING(candidate, converter) → SUCCESS | EXHAUSTED`:
//!
//! 1. The sniffer produces candidate formats, most confident first.
//! 2. For every candidate the registry yields matching converters in priority order.
//! 3. Each converter runs in its own task with a fresh [`ConversionContext`], bounded by
//!    the attempt timeout. Errors, panics, timeouts and empty output become
//!    [`AttemptRecord`]s and the next converter is tried.
//! 4. The first non-empty output is normalized into a [`ConversionResult`].
//!
//! A converter id is attempted at most once per document, even when it matches several
//! candidates.

use crate::core::config::ConversionConfig;
use crate::core::context::{ConversionContext, sanitize_file_name};
use crate::core::sniff::FormatSniffer;
use crate::normalize;
use crate::plugins::loader::panic_message;
use crate::plugins::{ConverterDescriptor, ConverterRegistry};
use crate::tools::ExternalTools;
use crate::types::{
    AttemptFailure, AttemptOutcome, AttemptRecord, ConversionResult, InputDocument, Intermediate, Metadata,
};
use crate::{DocmarkError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Content type assumed by [`DocumentConverter::convert_text`].
pub const DEFAULT_TEXT_CONTENT_TYPE: &str = "text/plain";

/// Entry point of the pipeline.
///
/// Cheap to clone: the registry, configuration and tool set are shared.
///
/// # Example
///
/// ```rust,no_run
/// use docmark::{ConversionConfig, DocumentConverter, InputDocument};
///
/// # async fn example() -> docmark::Result<()> {
/// let converter = DocumentConverter::with_builtins(ConversionConfig::default())?;
/// let result = converter.convert(InputDocument::new(b"# Hello".to_vec(), "hello.md")).await?;
/// println!("{}", result.markdown);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DocumentConverter {
    registry: Arc<ConverterRegistry>,
    config: Arc<ConversionConfig>,
    tools: Arc<ExternalTools>,
    sniffer: FormatSniffer,
}

enum Race {
    Finished(std::result::Result<Result<Intermediate>, JoinError>),
    TimedOut,
    Cancelled,
}

impl DocumentConverter {
    /// Build a converter over an already loaded registry.
    ///
    /// External tools are configured from `config.tools` as given; call
    /// [`ToolsConfig::apply_env_overrides`](crate::ToolsConfig::apply_env_overrides) first
    /// to honour the `DOCMARK_*_PATH` variables.
    ///
    /// # Errors
    ///
    /// Returns `DocmarkError::Validation` when `config` fails
    /// [`ConversionConfig::validate`].
    pub fn new(registry: Arc<ConverterRegistry>, config: ConversionConfig) -> Result<Self> {
        let tools = Arc::new(ExternalTools::from_config(&config.tools));
        Self::with_tools(registry, config, tools)
    }

    /// Like [`new`](Self::new) with an explicit tool set.
    pub fn with_tools(
        registry: Arc<ConverterRegistry>,
        config: ConversionConfig,
        tools: Arc<ExternalTools>,
    ) -> Result<Self> {
        config.validate()?;
        let sniffer = FormatSniffer::new(config.sniff_window_bytes);
        Ok(Self {
            registry,
            config: Arc::new(config),
            tools,
            sniffer,
        })
    }

    /// Validate `config` and load only the built-in converters.
    pub fn with_builtins(config: ConversionConfig) -> Result<Self> {
        config.validate()?;
        let report = crate::plugins::PluginLoader::new()
            .with_builtins(crate::converters::builtin_descriptors(&config))
            .with_config(&config.plugins)
            .load();
        Self::new(report.registry, config)
    }

    pub fn registry(&self) -> &Arc<ConverterRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn sniffer(&self) -> &FormatSniffer {
        &self.sniffer
    }

    /// Convert one document.
    ///
    /// # Errors
    ///
    /// - `DocmarkError::UnsupportedFormat` when no converter matches any candidate
    /// - `DocmarkError::ExhaustedCandidates` when every matching converter failed
    /// - `DocmarkError::Io` when an attempt workspace cannot be created
    pub async fn convert(&self, document: InputDocument) -> Result<ConversionResult> {
        self.convert_with_cancellation(document, CancellationToken::new()).await
    }

    /// Convert one document, giving up with `DocmarkError::Cancelled` once `cancel` fires.
    ///
    /// Cancelling aborts the running attempt, which kills any external tool it spawned and
    /// removes its workspace before this returns.
    #[tracing::instrument(skip_all, fields(filename = %document.filename(), bytes = document.len()))]
    pub async fn convert_with_cancellation(
        &self,
        document: InputDocument,
        cancel: CancellationToken,
    ) -> Result<ConversionResult> {
        let started = Instant::now();
        tracing::debug!("Conversion pending");

        if cancel.is_cancelled() {
            return Err(DocmarkError::Cancelled);
        }

        let candidates = self.sniffer.sniff_document(&document);
        tracing::debug!(
            candidates = ?candidates.iter().map(|c| c.format).collect::<Vec<_>>(),
            "Sniffing complete"
        );

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut tried: HashSet<String> = HashSet::new();

        for candidate in &candidates {
            let format = candidate.format;
            let descriptors = self.registry.lookup(format);
            if descriptors.is_empty() {
                tracing::debug!(format, "No converter matches candidate");
                continue;
            }

            for descriptor in descriptors {
                if !tried.insert(descriptor.id().to_string()) {
                    tracing::debug!(format, converter = descriptor.id(), "Converter already attempted, skipping");
                    continue;
                }

                tracing::debug!(format, converter = descriptor.id(), "Trying converter");
                let attempt_started = Instant::now();
                let outcome = self.attempt(&descriptor, &document, &cancel).await?;
                let elapsed_ms = attempt_started.elapsed().as_millis() as u64;

                match outcome {
                    Ok(intermediate) => {
                        let result = self.assemble(&descriptor, format, intermediate, &attempts);
                        tracing::info!(
                            format,
                            converter = descriptor.id(),
                            failed_attempts = attempts.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Conversion succeeded"
                        );
                        return Ok(result);
                    }
                    Err(failure) => {
                        tracing::warn!(
                            format,
                            converter = descriptor.id(),
                            elapsed_ms,
                            "Converter attempt failed: {}",
                            failure
                        );
                        attempts.push(AttemptRecord {
                            format: format.to_string(),
                            converter_id: descriptor.id().to_string(),
                            outcome: AttemptOutcome::Failed(failure),
                            elapsed_ms,
                        });
                    }
                }
            }
        }

        if attempts.is_empty() {
            let candidates: Vec<String> = candidates.iter().map(|c| c.format.to_string()).collect();
            tracing::debug!(?candidates, "Conversion exhausted without a matching converter");
            Err(DocmarkError::UnsupportedFormat { candidates })
        } else {
            tracing::debug!(attempts = attempts.len(), "Conversion exhausted all candidates");
            Err(DocmarkError::ExhaustedCandidates { attempts })
        }
    }

    /// Read a file and convert it. The sanitized file name is the filename hint.
    ///
    /// # Errors
    ///
    /// Returns `DocmarkError::Validation` if the path is not a file and
    /// `DocmarkError::Io` if it cannot be read, besides the conversion errors of
    /// [`convert`](Self::convert).
    pub async fn convert_file(&self, path: impl AsRef<Path>, content_type: Option<&str>) -> Result<ConversionResult> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DocmarkError::validation(format!("File does not exist: {}", path.display())));
        }

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut document = InputDocument::new(bytes, sanitize_file_name(&file_name));
        if let Some(content_type) = content_type {
            document = document.with_content_type(content_type);
        }
        self.convert(document).await
    }

    /// Convert a string. Without a content type it is treated as `text/plain`.
    pub async fn convert_text(&self, text: &str, content_type: Option<&str>) -> Result<ConversionResult> {
        let document = InputDocument::new(text.as_bytes().to_vec(), "")
            .with_content_type(content_type.unwrap_or(DEFAULT_TEXT_CONTENT_TYPE));
        self.convert(document).await
    }

    /// Convert many documents concurrently.
    ///
    /// Concurrency is bounded by `max_concurrent_conversions` (default `num_cpus * 2`).
    /// Results come back in input order, one per document.
    pub async fn batch_convert(&self, documents: Vec<InputDocument>) -> Vec<Result<ConversionResult>> {
        use tokio::sync::Semaphore;
        use tokio::task::JoinSet;

        if documents.is_empty() {
            return Vec::new();
        }

        let max_concurrent = self
            .config
            .max_concurrent_conversions
            .unwrap_or_else(|| num_cpus::get() * 2)
            .max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let total = documents.len();
        tracing::debug!(total, max_concurrent, "Starting batch conversion");

        let mut tasks = JoinSet::new();
        for (index, document) in documents.into_iter().enumerate() {
            let converter = self.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => converter.convert(document).await,
                    Err(e) => Err(DocmarkError::Other(format!("Batch semaphore closed: {}", e))),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<ConversionResult>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::warn!("Batch conversion task failed: {}", e),
            }
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(DocmarkError::Other("Conversion task did not complete".to_string()))))
            .collect()
    }

    /// Run one converter under its own task, timeout and workspace.
    ///
    /// The outer `Result` carries errors that end the whole conversion (cancellation,
    /// workspace creation); the inner one is the attempt outcome.
    async fn attempt(
        &self,
        descriptor: &Arc<ConverterDescriptor>,
        document: &InputDocument,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<Intermediate, AttemptFailure>> {
        let attempt_cancel = cancel.child_token();
        let context = ConversionContext::new(
            Arc::clone(&self.config),
            Arc::clone(&self.tools),
            attempt_cancel.clone(),
        )?;

        let converter = Arc::clone(descriptor.converter());
        let task_document = document.clone();
        let mut handle = tokio::spawn(async move {
            let mut outcome = converter.convert(&task_document, &context).await;
            if let Err(e) = context.close()
                && let Ok(intermediate) = &mut outcome
            {
                intermediate.warn(format!("Workspace cleanup failed: {}", e));
            }
            outcome
        });

        let timeout = self.config.attempt_timeout();
        let race = tokio::select! {
            joined = &mut handle => Race::Finished(joined),
            _ = tokio::time::sleep(timeout) => Race::TimedOut,
            _ = cancel.cancelled() => Race::Cancelled,
        };

        let joined = match race {
            Race::Finished(joined) => joined,
            Race::TimedOut => {
                attempt_cancel.cancel();
                handle.abort();
                let _ = handle.await;
                return Ok(Err(AttemptFailure::TimedOut {
                    after_ms: timeout.as_millis() as u64,
                }));
            }
            Race::Cancelled => {
                handle.abort();
                let _ = handle.await;
                tracing::debug!(converter = descriptor.id(), "Attempt aborted by cancellation");
                return Err(DocmarkError::Cancelled);
            }
        };

        let failure = match joined {
            Ok(Ok(intermediate)) if intermediate.is_empty() => AttemptFailure::EmptyContent,
            Ok(Ok(intermediate)) => return Ok(Ok(intermediate)),
            Ok(Err(_)) if cancel.is_cancelled() => return Err(DocmarkError::Cancelled),
            Ok(Err(DocmarkError::ExternalToolUnavailable { tool, reason })) => AttemptFailure::ExternalTool { tool, reason },
            Ok(Err(e)) => AttemptFailure::Converter { message: e.to_string() },
            Err(e) if e.is_panic() => AttemptFailure::Panicked {
                message: panic_message(e.into_panic().as_ref()),
            },
            Err(e) => AttemptFailure::Converter {
                message: format!("attempt task ended unexpectedly: {}", e),
            },
        };
        Ok(Err(failure))
    }

    fn assemble(
        &self,
        descriptor: &ConverterDescriptor,
        format: &str,
        intermediate: Intermediate,
        failed: &[AttemptRecord],
    ) -> ConversionResult {
        let id = descriptor.id();
        let markdown = normalize::finalize(&intermediate, &self.config, id);

        let metadata: Metadata = intermediate
            .metadata
            .into_iter()
            .map(|(key, value)| (format!("{}.{}", id, key), value))
            .collect();

        let mut warnings: Vec<String> = failed
            .iter()
            .map(|attempt| format!("{}@{} failed: {}", attempt.converter_id, attempt.format, attempt.outcome))
            .collect();
        warnings.extend(intermediate.warnings);

        let title = intermediate
            .title
            .map(|title| title.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|title| !title.is_empty());

        ConversionResult {
            markdown,
            title,
            metadata,
            warnings,
            format: format.to_string(),
            converter_id: id.to_string(),
        }
    }
}
