//! Unimodel Core Library
//!
//! Shared execution infrastructure for calling many AI model vendors through
//! one contract: the capability registry, the model traits and call driver,
//! the streaming event pipeline, request contexts, retries, error
//! classification and secret redaction. Vendor bindings plug into these; the
//! crate itself defines no wire formats.

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod protocol;
pub mod redact;
pub mod registry;
pub mod retry;
pub mod streaming;

pub use config::{load_from_json, load_from_yaml, ConfigError, CoreConfig};
pub use context::RequestContext;
pub use diagnostics::{Classifier, ErrorDiagnostic, ErrorKind};
pub use error::{CoreError, CoreResult};
pub use model::{
    embed_many, CallDriver, CallOptions, CapabilityKind, DiagnosticSink, EmbeddingModel,
    GenerateResult, Generation, ImageModel, LanguageModel, Model, ModelDescriptor, SpeechModel,
    TranscriptionModel,
};
pub use redact::{Redactor, SecretString};
pub use registry::{resolve, LookupError, ModelHandle, Provider, ProviderRegistry};
pub use retry::{RetryExecutor, RetryPolicy, RetryResult};
pub use streaming::{Accumulator, EventPipeline, StreamEvent, StreamSink};

/// Returns the version of the Unimodel Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
