use crate::model::{ModelError, ModelProvider};
use crate::text::chunker;
use crate::types::SummaryLength;
use tracing::{debug, info, warn};

/// Upper bound on requested FAQ entries; mirrors the range offered to users.
const MAX_QUESTIONS: usize = 10;
/// Floor applied to the per-chunk question count for long inputs.
const MIN_QUESTIONS_PER_CHUNK: usize = 2;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub default_model: String,
    /// Inputs at or below this many characters get a single FAQ call.
    pub faq_single_call_limit: usize,
    /// Target chunk size when a long input is split for FAQ generation.
    pub faq_chunk_size: usize,
    /// Cap on the combined FAQ output, in characters.
    pub max_output_chars: usize,
    /// Read responses incrementally instead of as one blocking body.
    pub streaming: bool,
}

impl GeneratorConfig {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            faq_single_call_limit: 3000,
            faq_chunk_size: 2500,
            max_output_chars: 10_000,
            streaming: false,
        }
    }

    pub fn with_limits(
        mut self,
        faq_single_call_limit: usize,
        faq_chunk_size: usize,
        max_output_chars: usize,
    ) -> Self {
        self.faq_single_call_limit = faq_single_call_limit;
        self.faq_chunk_size = faq_chunk_size;
        self.max_output_chars = max_output_chars;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// Observer notified before each generation step begins. Absence of a sink
/// changes observability only, never outcomes.
pub trait ProgressSink: Send + Sync {
    fn begin_step(&self, current: usize, total: usize);
}

/// Orchestrates summary and FAQ generation over a [`ModelProvider`].
///
/// Calls are strictly sequential; a multi-chunk FAQ run issues one call per
/// chunk and stops at the first failure.
pub struct Generator<P: ModelProvider> {
    provider: P,
    config: GeneratorConfig,
}

impl<P: ModelProvider> Generator<P> {
    pub fn new(provider: P, config: GeneratorConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Produces a summary in one model call, regardless of input length.
    pub async fn summarize(
        &self,
        text: &str,
        length: SummaryLength,
        model: Option<&str>,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<String, ModelError> {
        let model = model.unwrap_or(&self.config.default_model);
        info!(
            model,
            length = ?length,
            chars = text.chars().count(),
            "Generating summary"
        );
        if let Some(sink) = progress {
            sink.begin_step(1, 1);
        }
        let prompt = summary_prompt(text, length);
        self.call(&prompt, model).await
    }

    /// Produces a FAQ list. Long inputs are chunked and answered per chunk;
    /// the combined output is capped at `max_output_chars`.
    pub async fn generate_faq(
        &self,
        text: &str,
        num_questions: usize,
        model: Option<&str>,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<String, ModelError> {
        let model = model.unwrap_or(&self.config.default_model);
        let num_questions = num_questions.clamp(1, MAX_QUESTIONS);

        if text.chars().count() <= self.config.faq_single_call_limit {
            info!(model, num_questions, "Generating FAQ in a single call");
            if let Some(sink) = progress {
                sink.begin_step(1, 1);
            }
            let prompt = faq_prompt(text, num_questions, false);
            return self.call(&prompt, model).await;
        }

        let chunks = chunker::chunk(text, self.config.faq_chunk_size);
        let questions_per_chunk =
            MIN_QUESTIONS_PER_CHUNK.max(num_questions / chunks.len());
        if questions_per_chunk * chunks.len() < num_questions {
            // Integer division leaves the remainder unassigned; every chunk
            // gets the same count, so the total can fall short of the request.
            warn!(
                requested = num_questions,
                planned = questions_per_chunk * chunks.len(),
                chunks = chunks.len(),
                "Uniform per-chunk question count falls short of requested total"
            );
        }
        info!(
            model,
            chunks = chunks.len(),
            questions_per_chunk,
            "Generating FAQ across chunks"
        );

        let mut sections = Vec::with_capacity(chunks.len());
        for (index, piece) in chunks.iter().enumerate() {
            if let Some(sink) = progress {
                sink.begin_step(index + 1, chunks.len());
            }
            debug!(section = index + 1, total = chunks.len(), "Processing section");
            let prompt = faq_prompt(piece, questions_per_chunk, true);
            // First failure aborts the whole run; earlier sections are
            // discarded rather than returned partially.
            let answer = self.call(&prompt, model).await?;
            sections.push(answer);
        }

        let combined = sections.join("\n\n");
        Ok(truncate_chars(combined, self.config.max_output_chars))
    }

    async fn call(&self, prompt: &str, model: &str) -> Result<String, ModelError> {
        if self.config.streaming {
            self.provider.generate_streaming(prompt, model).await
        } else {
            self.provider.generate(prompt, model).await
        }
    }
}

fn summary_prompt(text: &str, length: SummaryLength) -> String {
    format!(
        "Please provide a clear and concise summary of the following text {}:\n\n\
         Text: {text}\n\n\
         Summary:",
        length.instruction()
    )
}

fn faq_prompt(text: &str, num_questions: usize, section: bool) -> String {
    let source = if section {
        "the following text section"
    } else {
        "the following text"
    };
    format!(
        "Based on {source}, generate {num_questions} frequently asked questions (FAQ) \
         with their answers. Format each FAQ as:\n\n\
         Q: [Question]\n\
         A: [Answer]\n\n\
         Text: {text}\n\n\
         FAQ:"
    )
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            text.truncate(byte_index);
            text
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingProvider {
        prompts: Arc<Mutex<Vec<String>>>,
        reply: Arc<Mutex<String>>,
        fail_at: Option<usize>,
    }

    impl RecordingProvider {
        fn replying(reply: &str) -> Self {
            let provider = Self::default();
            *provider.reply.lock().expect("lock") = reply.to_string();
            provider
        }

        fn failing_at(call: usize) -> Self {
            Self {
                fail_at: Some(call),
                ..Self::default()
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl ModelProvider for RecordingProvider {
        async fn generate(&self, prompt: &str, _model: &str) -> Result<String, ModelError> {
            let mut prompts = self.prompts.lock().expect("lock");
            prompts.push(prompt.to_string());
            if self.fail_at == Some(prompts.len()) {
                return Err(ModelError::ServerUnreachable);
            }
            Ok(self.reply.lock().expect("lock").clone())
        }
    }

    struct CountingSink {
        steps: AtomicUsize,
    }

    impl ProgressSink for CountingSink {
        fn begin_step(&self, _current: usize, _total: usize) {
            self.steps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn long_text(chars: usize) -> String {
        // Sentences of 100 characters so chunk boundaries are predictable.
        let sentence = "s".repeat(99);
        let count = chars / 100;
        std::iter::repeat(sentence.as_str())
            .take(count)
            .collect::<Vec<_>>()
            .join(".")
    }

    #[tokio::test]
    async fn summarize_embeds_directive_and_text() {
        let provider = RecordingProvider::replying("a summary");
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        let input = "The quick brown fox jumps over the lazy dog.";
        let result = generator
            .summarize(input, SummaryLength::Short, None, None)
            .await
            .expect("summarize");
        assert_eq!(result, "a summary");

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("in 2-3 sentences"));
        assert!(prompts[0].contains(input));
    }

    #[tokio::test]
    async fn summarize_never_chunks_long_input() {
        let provider = RecordingProvider::replying("a summary");
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        generator
            .summarize(&long_text(8000), SummaryLength::Long, None, None)
            .await
            .expect("summarize");
        assert_eq!(provider.prompts().len(), 1);
    }

    #[tokio::test]
    async fn short_faq_is_a_single_call() {
        let provider = RecordingProvider::replying("Q: q\nA: a");
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        let text = "t".repeat(3000);
        generator
            .generate_faq(&text, 5, None, None)
            .await
            .expect("faq");

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("generate 5 frequently asked questions"));
    }

    #[tokio::test]
    async fn long_faq_issues_one_call_per_chunk() {
        let provider = RecordingProvider::replying("Q: q\nA: a");
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        // ~6000 characters over 2500-char chunks: three sections, and
        // max(2, 6 / 3) questions for each.
        let result = generator
            .generate_faq(&long_text(6000), 6, None, None)
            .await
            .expect("faq");

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 3);
        for prompt in &prompts {
            assert!(prompt.contains("generate 2 frequently asked questions"));
            assert!(prompt.contains("text section"));
        }
        assert_eq!(result, "Q: q\nA: a\n\nQ: q\nA: a\n\nQ: q\nA: a");
    }

    #[tokio::test]
    async fn per_chunk_count_never_drops_below_two() {
        let provider = RecordingProvider::replying("Q: q\nA: a");
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        generator
            .generate_faq(&long_text(6000), 3, None, None)
            .await
            .expect("faq");

        for prompt in provider.prompts() {
            assert!(prompt.contains("generate 2 frequently asked questions"));
        }
    }

    #[tokio::test]
    async fn punctuation_only_long_input_is_answered_in_one_call() {
        let provider = RecordingProvider::replying("Q: q\nA: a");
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        // Longer than the single-call limit but with no packable sentences;
        // the whole input must flow through as one chunk.
        let text = ".".repeat(3001);
        let result = generator
            .generate_faq(&text, 6, None, None)
            .await
            .expect("faq");
        assert_eq!(result, "Q: q\nA: a");

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("generate 6 frequently asked questions"));
    }

    #[tokio::test]
    async fn chunk_failure_aborts_and_surfaces_the_error() {
        let provider = RecordingProvider::failing_at(2);
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        let error = generator
            .generate_faq(&long_text(6000), 6, None, None)
            .await
            .expect_err("must fail");
        assert!(matches!(error, ModelError::ServerUnreachable));
        // No call after the failing one.
        assert_eq!(provider.prompts().len(), 2);
    }

    #[tokio::test]
    async fn combined_output_is_capped() {
        let provider = RecordingProvider::replying(&"x".repeat(6000));
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        let result = generator
            .generate_faq(&long_text(6000), 6, None, None)
            .await
            .expect("faq");
        assert_eq!(result.chars().count(), 10_000);
    }

    #[tokio::test]
    async fn progress_sink_sees_every_section() {
        let provider = RecordingProvider::replying("Q: q\nA: a");
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));
        let sink = CountingSink {
            steps: AtomicUsize::new(0),
        };

        let with_sink = generator
            .generate_faq(&long_text(6000), 6, None, Some(&sink))
            .await
            .expect("faq");
        assert_eq!(sink.steps.load(Ordering::SeqCst), 3);

        let without_sink = generator
            .generate_faq(&long_text(6000), 6, None, None)
            .await
            .expect("faq");
        assert_eq!(with_sink, without_sink);
    }

    #[tokio::test]
    async fn question_count_is_clamped() {
        let provider = RecordingProvider::replying("Q: q\nA: a");
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        generator
            .generate_faq("short text", 50, None, None)
            .await
            .expect("faq");
        assert!(provider.prompts()[0].contains("generate 10 frequently asked questions"));
    }

    #[tokio::test]
    async fn model_override_reaches_nothing_else() {
        let provider = RecordingProvider::replying("ok");
        let generator = Generator::new(provider.clone(), GeneratorConfig::new("llama3"));

        let result = generator
            .summarize("text", SummaryLength::Medium, Some("mistral"), None)
            .await
            .expect("summarize");
        assert_eq!(result, "ok");
    }

    #[test]
    fn truncation_is_char_boundary_safe() {
        let text = "héllo wörld".repeat(3);
        let capped = truncate_chars(text.clone(), 5);
        assert_eq!(capped, "héllo");
        assert_eq!(truncate_chars(text.clone(), 1000), text);
    }
}
