//! CLI command definitions and handlers

use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use crate::core::backend::{Backend, ResponseMode};

/// Commands for the polytrans CLI
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate text with a chosen backend
    Translate(TranslateArgs),

    /// Estimate the cost of a translation without sending it
    Cost(CostArgs),

    /// Verify stored credentials against the live services
    Check {
        /// Backend to probe; all configured backends when omitted
        backend: Option<Backend>,
    },
}

/// Arguments for the translate command
#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Backend to use (deepl, openai, gemini, anthropic, google, azure)
    #[arg(short, long)]
    pub backend: Backend,

    /// Text to translate; repeat for a batch
    pub text: Vec<String>,

    /// Read input lines from a file instead
    #[arg(short, long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Target language for the machine translation backends
    #[arg(short, long)]
    pub target_lang: Option<String>,

    /// Source language hint (auto-detect if not specified)
    #[arg(long)]
    pub source_lang: Option<String>,

    /// Model for the LLM backends
    #[arg(short, long)]
    pub model: Option<String>,

    /// System instructions for the LLM backends
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Response mode: text, raw, json or raw_json
    #[arg(long, default_value = "text")]
    pub mode: ResponseMode,

    /// Send batch elements concurrently instead of one at a time
    #[arg(short, long)]
    pub concurrent: bool,

    /// In-flight request limit for concurrent batches
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Delay between requests, in seconds
    #[arg(long)]
    pub delay: Option<f64>,

    /// Retry each failed request up to N more times
    #[arg(long)]
    pub retries: Option<u32>,

    /// Directory for the translation log
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// Arguments for the cost command
#[derive(Args, Debug)]
pub struct CostArgs {
    /// Backend to price (deepl, openai, gemini, anthropic, google, azure)
    #[arg(short, long)]
    pub backend: Backend,

    /// Text to price; repeat for a batch
    pub text: Vec<String>,

    /// Read input lines from a file instead
    #[arg(short, long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Model to price against (defaults to the backend's default model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Instructions that would be sent along with each batch element
    #[arg(short, long)]
    pub instructions: Option<String>,
}

/// Handle the translate command
pub async fn handle_translate(args: TranslateArgs) -> anyhow::Result<()> {
    use crate::core::input::TextInput;
    use crate::core::retry::RetryPolicy;
    use crate::core::settings::TranslateOptions;
    use crate::translator::Translator;
    use std::time::{Duration, Instant};
    use tracing::{info, warn};

    let mut texts = gather_input(args.text.clone(), args.file.as_deref()).await?;

    if args.model.is_some() && !args.backend.is_llm() {
        warn!("--model is ignored by {}", args.backend);
    }
    if args.target_lang.is_some() && args.backend.is_llm() {
        warn!("--target-lang is ignored by {}", args.backend);
    }

    let mut options = TranslateOptions::new(provider_options(&args)).with_response_mode(args.mode);
    if let Some(instructions) = args.instructions {
        options = options.with_instructions(instructions);
    }
    if let Some(limit) = args.concurrency {
        options = options.with_concurrency(limit);
    }
    if let Some(seconds) = args.delay {
        options = options.with_delay(Duration::from_secs_f64(seconds));
    }
    if let Some(retries) = args.retries {
        options = options.with_retry(RetryPolicy::new(retries.saturating_add(1)));
    }
    if let Some(dir) = args.log_dir {
        options = options.with_log_directory(dir);
    }

    // A lone input takes the scalar path; everything else is a batch
    let input: TextInput = if texts.len() == 1 {
        texts.remove(0).into()
    } else {
        texts.into()
    };

    info!("Backend: {}", args.backend);
    info!("Units: {}", input.len());
    info!(
        "Dispatch: {}",
        if args.concurrent { "concurrent" } else { "serial" }
    );

    let mut translator = Translator::from_env()?;
    let start_time = Instant::now();

    let output = if args.concurrent {
        translator.translate_async(input, options).await?
    } else {
        translator.translate(input, options).await?
    };

    let duration = start_time.elapsed();
    let unit_count = output.len();
    print_output(output)?;
    info!("Completed {} unit(s) in {:?}", unit_count, duration);

    Ok(())
}

/// Handle the cost command
pub async fn handle_cost(args: CostArgs) -> anyhow::Result<()> {
    use crate::translator::Translator;

    let texts = gather_input(args.text, args.file.as_deref()).await?;

    // Estimates are offline; no credentials involved
    let translator = Translator::new()?;
    let estimate = translator.calculate_cost(
        texts,
        args.backend,
        args.model.as_deref(),
        args.instructions.as_deref(),
    )?;

    let unit_label = if args.backend.is_llm() {
        "Tokens"
    } else {
        "Characters"
    };
    println!("Backend: {}", args.backend);
    println!("Model: {}", estimate.model);
    println!("{}: {}", unit_label, estimate.unit_count);
    println!("Estimated cost: ${:.6}", estimate.cost);

    Ok(())
}

/// Handle the check command
pub async fn handle_check(backend: Option<Backend>) -> anyhow::Result<()> {
    use crate::translator::Translator;
    use tracing::info;

    let translator = Translator::from_env()?;
    let explicit = backend.is_some();
    let backends: Vec<Backend> = match backend {
        Some(backend) => vec![backend],
        None => Backend::ALL.to_vec(),
    };

    let mut failures = 0;
    for backend in backends {
        if !explicit && !translator.has_credentials(backend) {
            println!("-  {}: no credentials configured", backend);
            continue;
        }

        info!("Probing {}", backend);
        let check = translator.test_credentials(backend).await?;
        if check.valid {
            println!("✅ {}: credentials accepted", backend);
        } else {
            failures += 1;
            match check.error {
                Some(error) => println!("❌ {}: {}", backend, error),
                None => println!("❌ {}: rejected", backend),
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} backend(s) failed credential verification", failures);
    }

    Ok(())
}

/// Build provider options for the chosen backend from the shared flag set
fn provider_options(args: &TranslateArgs) -> crate::core::settings::ProviderOptions {
    use crate::core::settings::{
        AnthropicOptions, AzureOptions, DeepLOptions, GeminiOptions, GoogleOptions, OpenAiOptions,
    };

    match args.backend {
        Backend::DeepL => {
            let mut options = match args.target_lang.as_deref() {
                Some(lang) => DeepLOptions::new(lang),
                None => DeepLOptions::default(),
            };
            options.source_lang = args.source_lang.clone();
            options.into()
        }
        Backend::GoogleTranslate => {
            let mut options = match args.target_lang.as_deref() {
                Some(lang) => GoogleOptions::new(lang),
                None => GoogleOptions::default(),
            };
            options.source_lang = args.source_lang.clone();
            options.into()
        }
        Backend::Azure => {
            let mut options = match args.target_lang.as_deref() {
                Some(lang) => AzureOptions::new(lang),
                None => AzureOptions::default(),
            };
            options.source_lang = args.source_lang.clone();
            options.into()
        }
        Backend::OpenAi => match args.model.as_deref() {
            Some(model) => OpenAiOptions::new(model).into(),
            None => OpenAiOptions::default().into(),
        },
        Backend::Gemini => match args.model.as_deref() {
            Some(model) => GeminiOptions::new(model).into(),
            None => GeminiOptions::default().into(),
        },
        Backend::Anthropic => match args.model.as_deref() {
            Some(model) => AnthropicOptions::new(model).into(),
            None => AnthropicOptions::default().into(),
        },
    }
}

/// Collect input texts from positional arguments or a file of lines
async fn gather_input(text: Vec<String>, file: Option<&Path>) -> anyhow::Result<Vec<String>> {
    use anyhow::Context;

    let texts: Vec<String> = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect(),
        None => text,
    };

    if texts.is_empty() {
        anyhow::bail!("no input text; pass TEXT arguments or --file");
    }
    Ok(texts)
}

/// Print each result: plain text as-is, raw objects as pretty JSON
fn print_output(output: crate::core::response::TranslationOutput) -> anyhow::Result<()> {
    use crate::core::response::{TranslationOutput, TranslationResult};

    fn print_result(result: TranslationResult) -> anyhow::Result<()> {
        match result {
            TranslationResult::Text(text) => println!("{}", text),
            TranslationResult::Raw(raw) => println!("{}", serde_json::to_string_pretty(&raw)?),
        }
        Ok(())
    }

    match output {
        TranslationOutput::Single(result) => print_result(result)?,
        TranslationOutput::Batch(results) => {
            for result in results {
                print_result(result)?;
            }
        }
    }
    Ok(())
}
