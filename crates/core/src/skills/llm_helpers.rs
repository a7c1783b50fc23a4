//! # LLM Helpers
//!
//! Provider dispatch for structured LLM calls. Every
//! [`ModelConfig`](crate::models::ModelConfig) provider resolves to one
//! `LlmFunction` run; the output type is the schema the model must fill.

/// Run a structured `LlmFunction` against the provider named in a
/// `&ModelConfig`. Expands inside an `async fn` returning `anyhow::Result`;
/// missing credentials surface through `?`.
#[macro_export]
macro_rules! run_llm_function {
    (@call $llm:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {
        radkit::agent::LlmFunction::<$output_type>::new_with_system_instructions(
            $llm,
            $system_prompt,
        )
        .run($input)
        .await
        .map_err(Into::into)
    };
    ($config:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {{
        use radkit::models::providers::{
            AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
        };
        use $crate::models::LlmProvider;

        let model: &$crate::models::ModelConfig = $config;
        tracing::debug!(provider = ?model.provider, model = %model.model, "Structured LLM call");

        let result: anyhow::Result<$output_type> = match model.provider {
            LlmProvider::Anthropic => $crate::run_llm_function!(
                @call AnthropicLlm::from_env(&model.model)?, $output_type, $system_prompt, $input
            ),
            LlmProvider::OpenAI => {
                let llm = OpenAILlm::from_env(&model.model)?;
                let llm = match &model.base_url {
                    Some(base_url) => llm.with_base_url(base_url),
                    None => llm,
                };
                $crate::run_llm_function!(@call llm, $output_type, $system_prompt, $input)
            }
            LlmProvider::Gemini => $crate::run_llm_function!(
                @call GeminiLlm::from_env(&model.model)?, $output_type, $system_prompt, $input
            ),
            LlmProvider::OpenRouter => $crate::run_llm_function!(
                @call OpenRouterLlm::from_env(&model.model)?, $output_type, $system_prompt, $input
            ),
            LlmProvider::Grok => $crate::run_llm_function!(
                @call GrokLlm::from_env(&model.model)?, $output_type, $system_prompt, $input
            ),
            LlmProvider::DeepSeek => $crate::run_llm_function!(
                @call DeepSeekLlm::from_env(&model.model)?, $output_type, $system_prompt, $input
            ),
        };
        result
    }};
}

pub use run_llm_function;
