//! Model tariff table — cost computation for token-bearing events.
//!
//! Used when an assistant payload carries `tokenUsage` but no explicit
//! `cost`. Tiers are per-million tokens with cache multipliers. Unknown
//! models yield no implicit cost.

use crate::types::TokenUsage;

/// Pricing tier per million tokens.
struct PricingTier {
    input_per_million: f64,
    output_per_million: f64,
    cache_write_multiplier: f64,
    cache_read_multiplier: f64,
}

const OPUS: PricingTier = PricingTier {
    input_per_million: 5.0,
    output_per_million: 25.0,
    cache_write_multiplier: 1.25,
    cache_read_multiplier: 0.1,
};

const SONNET: PricingTier = PricingTier {
    input_per_million: 3.0,
    output_per_million: 15.0,
    cache_write_multiplier: 1.25,
    cache_read_multiplier: 0.1,
};

const HAIKU: PricingTier = PricingTier {
    input_per_million: 1.0,
    output_per_million: 5.0,
    cache_write_multiplier: 1.25,
    cache_read_multiplier: 0.1,
};

const GPT: PricingTier = PricingTier {
    input_per_million: 2.5,
    output_per_million: 10.0,
    cache_write_multiplier: 1.0,
    cache_read_multiplier: 0.5,
};

const GEMINI_PRO: PricingTier = PricingTier {
    input_per_million: 1.25,
    output_per_million: 5.0,
    cache_write_multiplier: 1.0,
    cache_read_multiplier: 0.25,
};

const GEMINI_FLASH: PricingTier = PricingTier {
    input_per_million: 0.075,
    output_per_million: 0.3,
    cache_write_multiplier: 1.0,
    cache_read_multiplier: 0.25,
};

/// Look up the pricing tier for a model by family substring.
fn get_pricing_tier(model: &str) -> Option<&'static PricingTier> {
    let lower = model.to_lowercase();

    if lower.contains("opus") {
        return Some(&OPUS);
    }
    if lower.contains("sonnet") {
        return Some(&SONNET);
    }
    if lower.contains("haiku") {
        return Some(&HAIKU);
    }
    if lower.starts_with("gpt-") || lower.starts_with("o1-") || lower.starts_with("o3-") {
        return Some(&GPT);
    }
    if lower.contains("gemini") {
        if lower.contains("flash") {
            return Some(&GEMINI_FLASH);
        }
        return Some(&GEMINI_PRO);
    }

    None
}

/// Estimate the USD cost of a request from its token usage.
///
/// Returns `None` for unknown models — callers fall back to zero rather
/// than inventing a price.
pub fn estimate_cost(model: &str, usage: &TokenUsage) -> Option<f64> {
    let tier = get_pricing_tier(model)?;

    let input = usage.input_tokens as f64 / 1_000_000.0 * tier.input_per_million;
    let output = usage.output_tokens as f64 / 1_000_000.0 * tier.output_per_million;
    let cache_read = usage.cache_read_tokens.unwrap_or(0) as f64 / 1_000_000.0
        * tier.input_per_million
        * tier.cache_read_multiplier;
    let cache_write = usage.cache_creation_tokens.unwrap_or(0) as f64 / 1_000_000.0
        * tier.input_per_million
        * tier.cache_write_multiplier;

    Some(input + output + cache_read + cache_write)
}
