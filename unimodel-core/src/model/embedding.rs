use super::{CallDriver, CallOptions, EmbeddingModel, GenerateResult, Generation, Model};
use crate::error::CoreError;
use crate::protocol::{EmbeddingInput, EmbeddingOutput, Usage};
use tracing::debug;

/// Embed any number of values, splitting them into sub-batches the model
/// accepts.
///
/// Sub-batches run in order on the calling task. The context is checked
/// before each one and the first failure aborts the whole call: no partial
/// output is returned. Embeddings come back in input order with usage summed.
pub async fn embed_many(
    model: &dyn EmbeddingModel,
    options: CallOptions<EmbeddingInput>,
) -> GenerateResult<EmbeddingOutput> {
    let driver = CallDriver::new(model.descriptor());
    if let Err(err) = driver.preflight(&options) {
        options.record_failure(model.provider(), &err);
        return Err(err);
    }

    let values = &options.input.values;
    let chunk_size = model
        .max_values_per_call()
        .filter(|&n| n > 0)
        .unwrap_or(values.len());

    let mut embeddings = Vec::with_capacity(values.len());
    let mut usage = Usage::default();
    let mut warnings = Vec::new();
    let mut response = Default::default();

    for (index, chunk) in values.chunks(chunk_size).enumerate() {
        if let Some(ctx) = options.context() {
            if let Err(err) = ctx.check() {
                options.record_failure(model.provider(), &err);
                return Err(err);
            }
        }
        debug!(
            model = model.model_id(),
            batch = index,
            size = chunk.len(),
            "embedding sub-batch"
        );

        let batch = options.with_input(EmbeddingInput {
            values: chunk.to_vec(),
        });
        let generation = model.generate(batch).await?;

        if generation.content.embeddings.len() != chunk.len() {
            let err = CoreError::Parse(format!(
                "expected {} embeddings, got {}",
                chunk.len(),
                generation.content.embeddings.len()
            ));
            options.record_failure(model.provider(), &err);
            return Err(err);
        }

        embeddings.extend(generation.content.embeddings);
        usage = usage.add(&generation.usage);
        warnings.extend(generation.warnings);
        response = generation.response;
    }

    Ok(Generation {
        content: EmbeddingOutput { embeddings },
        usage,
        warnings,
        response,
    })
}
