//! Reasoning-budget mapping between Anthropic's `budget_tokens` and
//! OpenAI's coarse `reasoning_effort` labels (spec.md §4.1.3, §4.5).
//!
//! Env overrides follow the teacher's small-env-driven-config-struct
//! pattern (`ProviderConfig`): `LLM_PROXY_REASONING_{LOW,MEDIUM,HIGH}_TOKENS`
//! set the token caps an effort label maps to; `LLM_PROXY_REASONING_{LOW,HIGH}_THRESHOLD`
//! set the token-count boundaries used when deriving an effort label
//! from a budget. Absent overrides fall back to spec.md's documented
//! defaults.

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Effort::Low),
            "medium" => Some(Effort::Medium),
            "high" => Some(Effort::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReasoningBudgetConfig {
    pub low_tokens: u32,
    pub medium_tokens: u32,
    pub high_tokens: u32,
    pub low_threshold: u32,
    pub high_threshold: u32,
}

impl Default for ReasoningBudgetConfig {
    fn default() -> Self {
        Self {
            low_tokens: 4096,
            medium_tokens: 8192,
            high_tokens: 16384,
            low_threshold: 4096,
            high_threshold: 16384,
        }
    }
}

impl ReasoningBudgetConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            low_tokens: env_u32("LLM_PROXY_REASONING_LOW_TOKENS").unwrap_or(defaults.low_tokens),
            medium_tokens: env_u32("LLM_PROXY_REASONING_MEDIUM_TOKENS")
                .unwrap_or(defaults.medium_tokens),
            high_tokens: env_u32("LLM_PROXY_REASONING_HIGH_TOKENS").unwrap_or(defaults.high_tokens),
            low_threshold: env_u32("LLM_PROXY_REASONING_LOW_THRESHOLD")
                .unwrap_or(defaults.low_threshold),
            high_threshold: env_u32("LLM_PROXY_REASONING_HIGH_THRESHOLD")
                .unwrap_or(defaults.high_threshold),
        }
    }

    /// Anthropic `budget_tokens` → a coarse OpenAI effort label.
    /// `≤low_threshold → low`, `≤high_threshold → medium`, else `high`.
    pub fn budget_to_effort(&self, budget_tokens: u32) -> Effort {
        if budget_tokens <= self.low_threshold {
            Effort::Low
        } else if budget_tokens <= self.high_threshold {
            Effort::Medium
        } else {
            Effort::High
        }
    }

    /// Inverse direction: an OpenAI effort label → an Anthropic
    /// `budget_tokens` value, via the same threshold table (SPEC_FULL
    /// supplement — the table is symmetric, see SPEC_FULL.md §10).
    pub fn effort_to_budget(&self, effort: Effort) -> u32 {
        match effort {
            Effort::Low => self.low_tokens,
            Effort::Medium => self.medium_tokens,
            Effort::High => self.high_tokens,
        }
    }
}

fn env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ReasoningBudgetConfig::default();
        assert_eq!(cfg.low_tokens, 4096);
        assert_eq!(cfg.medium_tokens, 8192);
        assert_eq!(cfg.high_tokens, 16384);
        assert_eq!(cfg.low_threshold, 4096);
        assert_eq!(cfg.high_threshold, 16384);
    }

    #[test]
    fn budget_to_effort_boundaries() {
        let cfg = ReasoningBudgetConfig::default();
        assert_eq!(cfg.budget_to_effort(4000), Effort::Low);
        assert_eq!(cfg.budget_to_effort(5000), Effort::Medium);
        assert_eq!(cfg.budget_to_effort(20000), Effort::High);
    }

    #[test]
    fn effort_to_budget_uses_token_table() {
        let cfg = ReasoningBudgetConfig::default();
        assert_eq!(cfg.effort_to_budget(Effort::Low), 4096);
        assert_eq!(cfg.effort_to_budget(Effort::High), 16384);
    }
}
