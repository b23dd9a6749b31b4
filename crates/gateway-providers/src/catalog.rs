//! Static model reference data: capabilities, model lists and the built-in
//! sampling defaults of the direct-vendor adapters.

use crate::parameters::ModelParameters;
use gateway_config::{ANTHROPIC, DEEPSEEK, OPENROUTER};
use gateway_core::{ModelCapabilities, ModelPricing};
use once_cell::sync::Lazy;
use std::collections::HashMap;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn entry(
    context_window: u32,
    max_output_tokens: Option<u32>,
    pricing: ModelPricing,
    strengths: &[&str],
    use_cases: &[&str],
    multimodal: bool,
) -> ModelCapabilities {
    ModelCapabilities {
        context_window,
        max_output_tokens,
        pricing,
        strengths: strings(strengths),
        use_cases: strings(use_cases),
        multimodal,
    }
}

fn price(input: f64, output: f64) -> ModelPricing {
    ModelPricing {
        input,
        output,
        images: None,
    }
}

static CAPABILITIES: Lazy<HashMap<&'static str, ModelCapabilities>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "anthropic/claude-3.5-sonnet",
        entry(
            200_000,
            Some(8_000),
            price(1.50, 5.50),
            &[
                "Strong at bridging statements, summary layers, multi-step reasoning",
                "Excellent at big-picture analysis and data unification",
                "Great for advanced data science or code reasoning",
            ],
            &["Architectural planning", "Summaries of large corpora", "High-level design reviews"],
            false,
        ),
    );
    m.insert(
        "openai/o1",
        entry(
            200_000,
            Some(100_000),
            ModelPricing {
                input: 15.00,
                output: 60.00,
                images: Some(21.68),
            },
            &[
                "Extreme STEM performance",
                "Multi-path reasoning with advanced backtracking",
                "PhD-level physics, math, HPC-like analysis",
            ],
            &["High-stakes correctness", "HPC code validations", "Large-scale problem solving"],
            false,
        ),
    );
    m.insert(
        "google/gemini-pro",
        entry(
            2_000_000,
            None,
            ModelPricing {
                input: 1.25,
                output: 5.00,
                images: Some(0.6575),
            },
            &[
                "Enormous context window",
                "Multimodal capabilities",
                "Good for code gen and complex data extraction",
            ],
            &["Huge document sets", "Multimedia tasks", "Large-scale text ingestion"],
            true,
        ),
    );
    m.insert(
        "deepseek/deepseek-v3",
        entry(
            128_000,
            None,
            price(0.14, 0.28),
            &[
                "Open-source orientation",
                "Strong code analysis",
                "Good performance across multiple domains",
            ],
            &["Self-hosted deployments", "Large codebase analysis", "General domain tasks"],
            false,
        ),
    );
    m.insert(
        "minimax/minimax-01",
        entry(
            1_000_000,
            None,
            price(0.20, 1.10),
            &[
                "Large context at budget-friendly rate",
                "Hybrid architecture",
                "Decent multimodal capabilities",
            ],
            &["Massive text ingestion", "Large data transformations", "Cost-effective processing"],
            true,
        ),
    );
    m.insert(
        "mistral/mistral-7b",
        entry(
            32_000,
            None,
            price(0.03, 0.055),
            &[
                "Very cheap input and output cost",
                "Good for simpler tasks and high volumes",
                "Strong for quick queries",
            ],
            &["High-volume tasks", "Basic QA or summaries", "Budget-constrained operations"],
            false,
        ),
    );
    m.insert(
        "mistral/ministral-8b",
        entry(
            128_000,
            None,
            price(0.10, 0.10),
            &[
                "Solid edge performance in a smaller param model",
                "Large context for its size",
            ],
            &["Edge deployments", "Low-latency assistants"],
            false,
        ),
    );
    m
});

/// Direct-vendor model ids that share a catalog entry
static ALIASES: &[(&str, &str)] = &[
    ("deepseek-chat", "deepseek/deepseek-v3"),
    ("claude-3-5-sonnet-latest", "anthropic/claude-3.5-sonnet"),
];

/// Capabilities of a model.
///
/// Accepts catalog ids (`anthropic/claude-3.5-sonnet`), the bare model part
/// (`claude-3.5-sonnet`) and known vendor aliases.
#[must_use]
pub fn capabilities(model: &str) -> Option<ModelCapabilities> {
    if let Some(caps) = CAPABILITIES.get(model) {
        return Some(caps.clone());
    }
    if let Some((_, target)) = ALIASES.iter().find(|(alias, _)| *alias == model) {
        return CAPABILITIES.get(target).cloned();
    }
    CAPABILITIES
        .iter()
        .find(|(id, _)| id.split_once('/').is_some_and(|(_, bare)| bare == model))
        .map(|(_, caps)| caps.clone())
}

/// Catalogued model ids
#[must_use]
pub fn catalogued_models() -> Vec<&'static str> {
    let mut ids: Vec<_> = CAPABILITIES.keys().copied().collect();
    ids.sort_unstable();
    ids
}

const OPENROUTER_MODELS: &[&str] = &[
    "anthropic/claude-3.5-sonnet",
    "openai/o1",
    "google/gemini-pro",
    "mistral/codestral-2501",
    "openai/gpt-4o",
    "deepseek/deepseek-v3",
    "minimax/minimax-01",
    "mistral/mistral-7b",
    "mistral/ministral-8b",
];

const DEEPSEEK_MODELS: &[&str] = &["deepseek-v3", "deepseek-coder", "deepseek-chat", "deepseek-math"];

const ANTHROPIC_MODELS: &[&str] = &[
    "claude-3-5-sonnet-latest",
    "claude-3-5-haiku-latest",
    "claude-3-opus-latest",
];

/// Built-in model list of a provider
#[must_use]
pub fn default_models(provider: &str) -> Option<&'static [&'static str]> {
    match provider {
        OPENROUTER => Some(OPENROUTER_MODELS),
        DEEPSEEK => Some(DEEPSEEK_MODELS),
        ANTHROPIC => Some(ANTHROPIC_MODELS),
        _ => None,
    }
}

/// Built-in sampling defaults for DeepSeek models
#[must_use]
pub fn deepseek_parameters(model: &str) -> ModelParameters {
    let base = ModelParameters::fallback()
        .with_top_p(1.0)
        .with_penalties(0.0, 0.0);
    match model {
        "deepseek-coder" | "deepseek-math" => base.with_temperature(0.0),
        _ => base.with_temperature(0.7),
    }
}

/// Built-in sampling defaults for Anthropic models
#[must_use]
pub fn anthropic_parameters(model: &str) -> ModelParameters {
    let base = ModelParameters::fallback()
        .with_top_p(1.0)
        .with_penalties(0.0, 0.0);
    if model.contains("haiku") {
        base.with_temperature(0.5)
    } else {
        base.with_temperature(0.7)
    }
}
