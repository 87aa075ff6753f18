//! Vendor-neutral data shapes for the five model capabilities
//!
//! Bindings translate their wire formats into these types; the core never
//! looks at vendor payloads directly.

pub mod types;

pub use types::{
    EmbeddingInput, EmbeddingOutput, FinishReason, GeneratedImage, ImageInput, ImageOutput,
    LanguageInput, LanguageOutput, Message, MessageRole, ResponseMetadata, SpeechInput,
    SpeechOutput, ToolCall, ToolDefinition, TranscriptSegment, TranscriptionInput,
    TranscriptionOutput, Usage, ValidateInput, Warning,
};
