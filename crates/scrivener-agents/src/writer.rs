use futures::stream::BoxStream;
use futures::StreamExt;
use scrivener_errors::StageError;
use scrivener_types::{OutlineSection, Plan};

/// A lazy, finite, non-restartable sequence of markdown fragments. The
/// writer streams a section rather than returning it whole so a long
/// section can be buffered incrementally under a token cap without
/// waiting on the full LLM response.
pub type SectionFragmentStream = BoxStream<'static, Result<String, StageError>>;

/// Drafts one outline section's prose. Not `async_trait`: the call
/// itself is synchronous (it only builds the stream), all the async work
/// happens when the caller polls the returned stream.
pub trait WriterAgent: Send + Sync {
    fn write_section(
        &self,
        plan: &Plan,
        section: &OutlineSection,
        dep_context: &str,
        extra_guidance: Option<&str>,
    ) -> SectionFragmentStream;
}

/// Best-effort token estimate for a fragment, used to stop buffering once
/// `max_section_tokens` is reached. A byte-pair tokenizer would be more
/// accurate; `len / 3` is the fallback the source pipeline uses when one
/// isn't available, which is what this reimplementation always uses.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 3
}

/// Drain a writer's fragment stream into a single string, stopping once
/// the accumulated estimated token count reaches `max_tokens`. The
/// stream is not restartable, so a caller that needs the rest of the
/// section must re-invoke `write_section`.
pub async fn materialize_section(mut stream: SectionFragmentStream, max_tokens: u32) -> Result<String, StageError> {
    let mut buffer = String::new();
    let mut tokens = 0usize;
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        tokens += estimate_tokens(&fragment);
        buffer.push_str(&fragment);
        if tokens >= max_tokens as usize {
            break;
        }
    }
    Ok(buffer)
}
