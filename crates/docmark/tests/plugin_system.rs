//! Plugin loading and converter selection through the public API.

use async_trait::async_trait;
use docmark::core::formats;
use docmark::plugins::{Converter, ConverterDescriptor, FormatMatcher, Plugin, PluginLoadFailure};
use docmark::{
    AttemptFailure, AttemptOutcome, Block, ConversionConfig, ConversionContext, DocmarkError, DocumentConverter,
    InputDocument, Intermediate, PluginLoader, PluginManifest, Result,
};
use std::sync::Arc;

struct FailingConverter;

impl Plugin for FailingConverter {
    fn name(&self) -> &str {
        "always-fails"
    }
    fn version(&self) -> String {
        "1.0.0".to_string()
    }
}

#[async_trait]
impl Converter for FailingConverter {
    async fn convert(&self, _: &InputDocument, _: &ConversionContext) -> Result<Intermediate> {
        Err(DocmarkError::parsing("corrupt input"))
    }
}

struct ShoutingConverter;

impl Plugin for ShoutingConverter {
    fn name(&self) -> &str {
        "shouting-text"
    }
    fn version(&self) -> String {
        "2.0.0".to_string()
    }
}

#[async_trait]
impl Converter for ShoutingConverter {
    async fn convert(&self, document: &InputDocument, _: &ConversionContext) -> Result<Intermediate> {
        let text = String::from_utf8_lossy(document.bytes()).to_uppercase();
        let mut output = Intermediate::new();
        output.push(Block::paragraph(text));
        output.insert_metadata("shouted", true);
        Ok(output)
    }
}

fn failing_plugin() -> Vec<ConverterDescriptor> {
    vec![ConverterDescriptor::new(Arc::new(FailingConverter), FormatMatcher::formats([formats::TEXT])).with_priority(90)]
}

fn shouting_plugin() -> Vec<ConverterDescriptor> {
    vec![ConverterDescriptor::new(Arc::new(ShoutingConverter), FormatMatcher::formats([formats::TEXT])).with_priority(80)]
}

fn panicking_plugin() -> Vec<ConverterDescriptor> {
    panic!("plugin registration exploded")
}

fn empty_plugin() -> Vec<ConverterDescriptor> {
    Vec::new()
}

fn converter_with(manifests: Vec<PluginManifest>, config: ConversionConfig) -> DocumentConverter {
    let report = PluginLoader::new()
        .with_builtins(docmark::converters::builtin_descriptors(&config))
        .with_plugins(manifests)
        .with_config(&config.plugins)
        .load();
    DocumentConverter::new(report.registry, config).unwrap()
}

#[test]
fn test_broken_plugins_do_not_stop_loading() {
    let report = PluginLoader::new()
        .with_builtins(docmark::converters::builtin_descriptors(&ConversionConfig::default()))
        .with_plugins([
            PluginManifest::new("boom", "0.1.0", panicking_plugin),
            PluginManifest::without_entry_point("hollow", "0.1.0"),
            PluginManifest::new("nothing", "0.1.0", empty_plugin),
            PluginManifest::new("shout", "2.0.0", shouting_plugin),
        ])
        .load();

    assert_eq!(report.loaded, vec!["shout".to_string()]);
    assert_eq!(report.errors.len(), 3);
    assert!(matches!(report.errors[0].failure, PluginLoadFailure::Panicked { ref message } if message.contains("exploded")));
    assert_eq!(report.errors[1].failure, PluginLoadFailure::MissingEntryPoint);
    assert_eq!(report.errors[2].failure, PluginLoadFailure::EmptyRegistration);
    assert!(report.registry.get("shouting-text").is_some());
    assert!(report.registry.get("plain-text").is_some());
}

#[test]
fn test_plugin_colliding_with_builtin_is_rejected() {
    fn duplicate() -> Vec<ConverterDescriptor> {
        docmark::converters::builtin_descriptors(&ConversionConfig::default())
            .into_iter()
            .filter(|descriptor| descriptor.id() == "csv")
            .collect()
    }

    let report = PluginLoader::new()
        .with_builtins(docmark::converters::builtin_descriptors(&ConversionConfig::default()))
        .with_plugin(PluginManifest::new("dup", "1.0.0", duplicate))
        .load();

    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0].failure, PluginLoadFailure::InvalidDescriptor { .. }));
}

#[tokio::test]
async fn test_higher_priority_plugin_wins() {
    let converter = converter_with(
        vec![PluginManifest::new("shout", "2.0.0", shouting_plugin)],
        ConversionConfig::default(),
    );

    let result = converter.convert_text("quiet words", None).await.unwrap();
    assert_eq!(result.converter_id, "shouting-text");
    assert!(result.markdown.starts_with("QUIET WORDS\n"));
    assert_eq!(result.metadata["shouting-text.shouted"], true);
}

#[tokio::test]
async fn test_failure_falls_back_in_priority_order() {
    let converter = converter_with(
        vec![
            PluginManifest::new("fails", "1.0.0", failing_plugin),
            PluginManifest::new("shout", "2.0.0", shouting_plugin),
        ],
        ConversionConfig::default(),
    );

    let result = converter.convert_text("hello", None).await.unwrap();
    assert_eq!(result.converter_id, "shouting-text");
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].starts_with("always-fails@text failed"));
}

#[tokio::test]
async fn test_disabled_plugin_is_skipped() {
    let mut config = ConversionConfig::default();
    config.plugins.disabled = vec!["shout".to_string()];
    let converter = converter_with(vec![PluginManifest::new("shout", "2.0.0", shouting_plugin)], config);

    let result = converter.convert_text("hello", None).await.unwrap();
    assert_eq!(result.converter_id, "plain-text");
}

#[tokio::test]
async fn test_exhausted_candidates_lists_every_attempt() {
    let report = PluginLoader::new()
        .with_plugin(PluginManifest::new("fails", "1.0.0", failing_plugin))
        .load();
    let converter = DocumentConverter::new(report.registry, ConversionConfig::default()).unwrap();

    let error = converter.convert_text("hello", None).await.unwrap_err();
    let DocmarkError::ExhaustedCandidates { attempts } = error else {
        panic!("expected exhausted candidates, got {:?}", error);
    };
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].converter_id, "always-fails");
    assert_eq!(
        attempts[0].outcome,
        AttemptOutcome::Failed(AttemptFailure::Converter {
            message: "Parsing error: corrupt input".to_string()
        })
    );
}

#[tokio::test]
async fn test_unsupported_format_names_candidates() {
    let converter = DocumentConverter::with_builtins(ConversionConfig::default()).unwrap();
    let document = InputDocument::new(vec![0x00, 0x9A, 0x4F, 0x11], "blob");

    match converter.convert(document).await {
        Err(DocmarkError::UnsupportedFormat { candidates }) => assert_eq!(candidates, vec!["unknown".to_string()]),
        other => panic!("expected unsupported format, got {:?}", other),
    }
}
