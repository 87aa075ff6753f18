//! Integration tests for provider lookup and model resolution

mod common;

use common::{MockProvider, PROVIDER};
use std::sync::Arc;
use unimodel_core::model::{CallOptions, CapabilityKind, Model};
use unimodel_core::protocol::LanguageInput;
use unimodel_core::registry::{resolve, LookupError, Provider, ProviderRegistry};

#[test]
fn test_language_lookup_returns_matching_model() {
    let model = MockProvider.language_model("gpt-4o").unwrap();
    assert_eq!(model.model_id(), "gpt-4o");
    assert_eq!(model.provider(), PROVIDER);
    assert_eq!(model.descriptor().capability(), CapabilityKind::Language);
}

#[test]
fn test_speech_lookup_on_text_only_provider_is_not_supported() {
    let err = MockProvider.speech_model("tts-1").err().unwrap();
    assert_eq!(
        err,
        LookupError::NotSupported {
            provider: PROVIDER.to_string(),
            capability: CapabilityKind::Speech,
        }
    );
    assert_eq!(err.to_string(), "Provider 'mock' does not support speech models");
}

#[test]
fn test_unknown_model_is_no_such_model() {
    let err = MockProvider.language_model("gpt-2").err().unwrap();
    assert!(matches!(err, LookupError::NoSuchModel { ref model_id, .. } if model_id == "gpt-2"));
}

#[test]
fn test_generic_resolve() {
    let handle = resolve(&MockProvider, CapabilityKind::Language, "gpt-4o-mini").unwrap();
    assert_eq!(handle.kind(), CapabilityKind::Language);
    assert_eq!(handle.descriptor().model_id(), "gpt-4o-mini");
    assert!(handle.as_language().is_some());

    for kind in CapabilityKind::ALL {
        if kind == CapabilityKind::Language {
            continue;
        }
        let err = resolve(&MockProvider, kind, "gpt-4o").unwrap_err();
        assert!(matches!(err, LookupError::NotSupported { capability, .. } if capability == kind));
    }
}

#[test]
fn test_registry_routes_by_prefix() {
    let mut registry = ProviderRegistry::new();
    assert!(registry.register(Arc::new(MockProvider)).is_none());
    assert!(registry.register(Arc::new(MockProvider)).is_some());

    let model = registry.language_model("mock:gpt-4o").unwrap();
    assert_eq!(model.model_id(), "gpt-4o");

    let handle = registry.resolve(CapabilityKind::Language, "mock:gpt-4o").unwrap();
    assert_eq!(handle.descriptor().provider(), PROVIDER);

    assert!(matches!(
        registry.language_model("other:gpt-4o").err(),
        Some(LookupError::NoSuchProvider { .. })
    ));
    assert!(matches!(
        registry.language_model("gpt-4o").err(),
        Some(LookupError::InvalidModelId { separator: ':', .. })
    ));
    assert!(matches!(
        registry.transcription_model("mock:whisper-1").err(),
        Some(LookupError::NotSupported { .. })
    ));
}

#[test]
fn test_lookup_error_converts_to_core_error() {
    let err: unimodel_core::CoreError = MockProvider.image_model("x").err().unwrap().into();
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("image"));
}

#[tokio::test]
async fn test_resolved_model_is_callable() {
    let registry = ProviderRegistry::new().with_provider(Arc::new(MockProvider));
    let model = registry.language_model("mock:gpt-4o").unwrap();
    let generation = model
        .generate(CallOptions::new(LanguageInput::prompt("hello")))
        .await
        .unwrap();
    assert_eq!(generation.content.text, "ok");
}
