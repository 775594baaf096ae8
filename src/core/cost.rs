//! Cost estimation for translation calls

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

use crate::core::backend::Backend;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TextInput;
use crate::core::settings::DEFAULT_INSTRUCTIONS;

/// Cost estimate for one translate call
#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    /// Tokens for the LLM backends, characters for the MT services
    pub unit_count: usize,
    /// Estimated cost in USD
    pub cost: f64,
    /// Model the estimate applies to; the service name for the MT backends
    pub model: String,
}

/// USD per million characters
const CHARACTER_PRICES: &[(Backend, f64)] = &[
    (Backend::DeepL, 25.0),
    (Backend::GoogleTranslate, 20.0),
    (Backend::Azure, 10.0),
];

/// USD per million input tokens
const TOKEN_PRICES: &[(&str, f64)] = &[
    ("gpt-3.5-turbo", 0.5),
    ("gpt-4", 30.0),
    ("gpt-4-turbo", 10.0),
    ("gpt-4o", 5.0),
    ("gemini-pro", 0.5),
    ("gemini-1.5-pro-latest", 3.5),
    ("gemini-1.5-flash-latest", 0.35),
    ("claude-3-haiku-20240307", 0.25),
    ("claude-3-sonnet-20240229", 3.0),
    ("claude-3-opus-20240229", 15.0),
];

fn cl100k() -> Result<&'static CoreBPE> {
    static BPE: OnceLock<CoreBPE> = OnceLock::new();
    if let Some(bpe) = BPE.get() {
        return Ok(bpe);
    }
    let bpe = tiktoken_rs::cl100k_base()
        .map_err(|e| TranslationError::InternalError(format!("tokenizer init failed: {e}")))?;
    Ok(BPE.get_or_init(|| bpe))
}

fn o200k() -> Result<&'static CoreBPE> {
    static BPE: OnceLock<CoreBPE> = OnceLock::new();
    if let Some(bpe) = BPE.get() {
        return Ok(bpe);
    }
    let bpe = tiktoken_rs::o200k_base()
        .map_err(|e| TranslationError::InternalError(format!("tokenizer init failed: {e}")))?;
    Ok(BPE.get_or_init(|| bpe))
}

/// Token count for a text under the model's encoding.
/// Non-OpenAI models are counted with cl100k; close enough for estimates.
pub(crate) fn count_tokens(model: &str, text: &str) -> Result<usize> {
    let bpe = if model.contains("gpt-4o") {
        o200k()?
    } else {
        cl100k()?
    };
    Ok(bpe.encode_with_special_tokens(text).len())
}

fn price_per_million_tokens(model: &str) -> Result<f64> {
    TOKEN_PRICES
        .iter()
        .find(|(m, _)| *m == model)
        .map(|(_, price)| *price)
        .ok_or_else(|| TranslationError::InvalidSettings {
            message: format!("no pricing known for model: {model}"),
        })
}

fn price_per_million_chars(backend: Backend) -> f64 {
    CHARACTER_PRICES
        .iter()
        .find(|(b, _)| *b == backend)
        .map(|(_, price)| *price)
        .unwrap_or(0.0)
}

/// Estimate the cost of translating `input` with `backend`.
///
/// For the LLM backends the instructions are replicated once per batch
/// element before counting, since every unit of the real request carries its
/// own copy; the replicated instructions and the joined text are counted
/// together. The MT services count characters and ignore model and
/// instructions.
pub(crate) fn estimate(
    backend: Backend,
    input: &TextInput,
    model: Option<&str>,
    instructions: Option<&str>,
) -> Result<CostEstimate> {
    if backend.is_llm() {
        let model = match model {
            Some(m) => m,
            None => backend.default_model().unwrap_or("gpt-4"),
        };
        let price = price_per_million_tokens(model)?;
        let instructions = instructions.unwrap_or(DEFAULT_INSTRUCTIONS);
        let texts = input.texts();
        let replicated = instructions.repeat(texts.len());
        let combined = format!("{}\n{}", replicated, texts.join("\n"));
        let unit_count = count_tokens(model, &combined)?;
        Ok(CostEstimate {
            unit_count,
            cost: unit_count as f64 / 1_000_000.0 * price,
            model: model.to_string(),
        })
    } else {
        let unit_count: usize = input.texts().iter().map(|t| t.chars().count()).sum();
        Ok(CostEstimate {
            unit_count,
            cost: unit_count as f64 / 1_000_000.0 * price_per_million_chars(backend),
            model: backend.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_metered_backends_count_chars() {
        let estimate = estimate(
            Backend::DeepL,
            &TextInput::from("hello"),
            None,
            None,
        )
        .unwrap();
        assert_eq!(estimate.unit_count, 5);
        assert!((estimate.cost - 5.0 / 1_000_000.0 * 25.0).abs() < 1e-12);
        assert_eq!(estimate.model, "deepl");

        let batch = estimate_batch_chars();
        assert_eq!(batch.unit_count, 5);
        assert_eq!(batch.model, "google translate");
    }

    fn estimate_batch_chars() -> CostEstimate {
        estimate(
            Backend::GoogleTranslate,
            &TextInput::from(vec!["ab", "cde"]),
            Some("ignored"),
            Some("also ignored"),
        )
        .unwrap()
    }

    #[test]
    fn test_instructions_replicated_once_per_batch_element() {
        let instructions = "Translate to German.";
        let batch = TextInput::from(vec!["hello", "world"]);
        let result = estimate(Backend::OpenAi, &batch, Some("gpt-4"), Some(instructions)).unwrap();

        let expected_text = format!(
            "{}{}\n{}",
            instructions, instructions, "hello\nworld"
        );
        let expected = count_tokens("gpt-4", &expected_text).unwrap();
        assert_eq!(result.unit_count, expected);

        // a scalar carries the instructions exactly once
        let scalar = estimate(
            Backend::OpenAi,
            &TextInput::from("hello"),
            Some("gpt-4"),
            Some(instructions),
        )
        .unwrap();
        let expected_scalar =
            count_tokens("gpt-4", &format!("{instructions}\nhello")).unwrap();
        assert_eq!(scalar.unit_count, expected_scalar);
        assert!(result.unit_count > scalar.unit_count);
    }

    #[test]
    fn test_default_model_fills_in() {
        let result = estimate(Backend::Anthropic, &TextInput::from("hi"), None, None).unwrap();
        assert_eq!(result.model, "claude-3-haiku-20240307");
        assert!(result.unit_count > 0);
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let result = estimate(
            Backend::OpenAi,
            &TextInput::from("hi"),
            Some("gpt-99"),
            None,
        );
        assert!(matches!(
            result,
            Err(TranslationError::InvalidSettings { .. })
        ));
    }
}
