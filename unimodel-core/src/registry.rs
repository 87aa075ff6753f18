//! Capability registry
//!
//! A [`Provider`] is a named factory of model handles, one lookup per
//! capability. Resolution is pure construction: no network I/O and no remote
//! validation of model ids. [`ProviderRegistry`] is an explicit set of
//! providers built by the application and addressed with `"provider:model"`
//! ids.

use crate::model::{
    CapabilityKind, EmbeddingModel, ImageModel, LanguageModel, Model, ModelDescriptor,
    SpeechModel, TranscriptionModel,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Default separator between provider name and model id
pub const DEFAULT_SEPARATOR: char = ':';

/// Lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("Model '{model_id}' not found for provider '{provider}'")]
    NoSuchModel { provider: String, model_id: String },

    #[error("Provider '{provider}' does not support {capability} models")]
    NotSupported {
        provider: String,
        capability: CapabilityKind,
    },

    #[error("No provider registered under '{provider}'")]
    NoSuchProvider { provider: String },

    #[error("Invalid model id '{id}': expected provider{separator}model")]
    InvalidModelId { id: String, separator: char },
}

impl LookupError {
    pub fn no_such_model(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::NoSuchModel {
            provider: provider.into(),
            model_id: model_id.into(),
        }
    }

    pub fn not_supported(provider: impl Into<String>, capability: CapabilityKind) -> Self {
        Self::NotSupported {
            provider: provider.into(),
            capability,
        }
    }
}

/// A vendor's factory of model handles.
///
/// Every lookup defaults to [`LookupError::NotSupported`]; a provider
/// overrides the ones it implements and lists them in `capabilities`.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Capabilities this provider can resolve
    fn capabilities(&self) -> &[CapabilityKind];

    fn supports(&self, capability: CapabilityKind) -> bool {
        self.capabilities().contains(&capability)
    }

    fn language_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>, LookupError> {
        let _ = model_id;
        Err(LookupError::not_supported(self.name(), CapabilityKind::Language))
    }

    fn embedding_model(&self, model_id: &str) -> Result<Arc<dyn EmbeddingModel>, LookupError> {
        let _ = model_id;
        Err(LookupError::not_supported(self.name(), CapabilityKind::Embedding))
    }

    fn image_model(&self, model_id: &str) -> Result<Arc<dyn ImageModel>, LookupError> {
        let _ = model_id;
        Err(LookupError::not_supported(self.name(), CapabilityKind::Image))
    }

    fn speech_model(&self, model_id: &str) -> Result<Arc<dyn SpeechModel>, LookupError> {
        let _ = model_id;
        Err(LookupError::not_supported(self.name(), CapabilityKind::Speech))
    }

    fn transcription_model(
        &self,
        model_id: &str,
    ) -> Result<Arc<dyn TranscriptionModel>, LookupError> {
        let _ = model_id;
        Err(LookupError::not_supported(
            self.name(),
            CapabilityKind::Transcription,
        ))
    }
}

/// A resolved model of any capability
#[derive(Clone)]
pub enum ModelHandle {
    Language(Arc<dyn LanguageModel>),
    Embedding(Arc<dyn EmbeddingModel>),
    Image(Arc<dyn ImageModel>),
    Speech(Arc<dyn SpeechModel>),
    Transcription(Arc<dyn TranscriptionModel>),
}

impl ModelHandle {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Language(_) => CapabilityKind::Language,
            Self::Embedding(_) => CapabilityKind::Embedding,
            Self::Image(_) => CapabilityKind::Image,
            Self::Speech(_) => CapabilityKind::Speech,
            Self::Transcription(_) => CapabilityKind::Transcription,
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        match self {
            Self::Language(model) => model.descriptor(),
            Self::Embedding(model) => model.descriptor(),
            Self::Image(model) => model.descriptor(),
            Self::Speech(model) => model.descriptor(),
            Self::Transcription(model) => model.descriptor(),
        }
    }

    pub fn as_language(&self) -> Option<Arc<dyn LanguageModel>> {
        match self {
            Self::Language(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    pub fn as_embedding(&self) -> Option<Arc<dyn EmbeddingModel>> {
        match self {
            Self::Embedding(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<Arc<dyn ImageModel>> {
        match self {
            Self::Image(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    pub fn as_speech(&self) -> Option<Arc<dyn SpeechModel>> {
        match self {
            Self::Speech(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    pub fn as_transcription(&self) -> Option<Arc<dyn TranscriptionModel>> {
        match self {
            Self::Transcription(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelHandle").field(self.descriptor()).finish()
    }
}

/// Resolve `model_id` on `provider` for any capability
pub fn resolve(
    provider: &dyn Provider,
    kind: CapabilityKind,
    model_id: &str,
) -> Result<ModelHandle, LookupError> {
    if model_id.is_empty() {
        return Err(LookupError::no_such_model(provider.name(), model_id));
    }
    let handle = match kind {
        CapabilityKind::Language => ModelHandle::Language(provider.language_model(model_id)?),
        CapabilityKind::Embedding => ModelHandle::Embedding(provider.embedding_model(model_id)?),
        CapabilityKind::Image => ModelHandle::Image(provider.image_model(model_id)?),
        CapabilityKind::Speech => ModelHandle::Speech(provider.speech_model(model_id)?),
        CapabilityKind::Transcription => {
            ModelHandle::Transcription(provider.transcription_model(model_id)?)
        }
    };
    debug!(model = %handle.descriptor(), "resolved model");
    Ok(handle)
}

/// Providers keyed by name, built once at the application root
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    separator: char,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            separator: DEFAULT_SEPARATOR,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    /// Add a provider, returning the one it replaced
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Option<Arc<dyn Provider>> {
        let name = provider.name().to_string();
        debug!(provider = %name, "registering provider");
        self.providers.insert(name, provider)
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn provider(&self, name: &str) -> Result<&Arc<dyn Provider>, LookupError> {
        self.providers
            .get(name)
            .ok_or_else(|| LookupError::NoSuchProvider {
                provider: name.to_string(),
            })
    }

    /// Registered provider names, sorted
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Split `"provider:model"` at the first separator. The model part may
    /// itself contain the separator.
    pub fn split_id<'i>(&self, id: &'i str) -> Result<(&'i str, &'i str), LookupError> {
        match id.split_once(self.separator) {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Ok((provider, model))
            }
            _ => Err(LookupError::InvalidModelId {
                id: id.to_string(),
                separator: self.separator,
            }),
        }
    }

    pub fn resolve(&self, kind: CapabilityKind, id: &str) -> Result<ModelHandle, LookupError> {
        let (name, model_id) = self.split_id(id)?;
        resolve(&**self.provider(name)?, kind, model_id)
    }

    pub fn language_model(&self, id: &str) -> Result<Arc<dyn LanguageModel>, LookupError> {
        let (name, model_id) = self.split_id(id)?;
        self.provider(name)?.language_model(model_id)
    }

    pub fn embedding_model(&self, id: &str) -> Result<Arc<dyn EmbeddingModel>, LookupError> {
        let (name, model_id) = self.split_id(id)?;
        self.provider(name)?.embedding_model(model_id)
    }

    pub fn image_model(&self, id: &str) -> Result<Arc<dyn ImageModel>, LookupError> {
        let (name, model_id) = self.split_id(id)?;
        self.provider(name)?.image_model(model_id)
    }

    pub fn speech_model(&self, id: &str) -> Result<Arc<dyn SpeechModel>, LookupError> {
        let (name, model_id) = self.split_id(id)?;
        self.provider(name)?.speech_model(model_id)
    }

    pub fn transcription_model(
        &self,
        id: &str,
    ) -> Result<Arc<dyn TranscriptionModel>, LookupError> {
        let (name, model_id) = self.split_id(id)?;
        self.provider(name)?.transcription_model(model_id)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_names())
            .field("separator", &self.separator)
            .finish()
    }
}
