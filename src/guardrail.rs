//! Safety guardrail applied to every composed answer
//!
//! Deterministic text matching; no state.

use lazy_static::lazy_static;
use regex::Regex;

pub const DISCLAIMER: &str = "⚠️ **Important:** I can provide educational information, not personalized financial advice. \
For decisions, consider consulting a qualified financial professional.\n";

pub const CLARIFYING_REDIRECT: &str = "If you want, tell me your **goal + time horizon + risk tolerance**, \
and I can explain the **factors** people evaluate (risk, diversification, fees, liquidity).";

const ADVICE_PATTERNS: &[&str] = &[
    r"\bshould i buy\b",
    r"\bshould i sell\b",
    r"\bwhat should i invest in\b",
    r"\btell me the best stock\b",
    r"\bguaranteed returns?\b",
];

lazy_static! {
    static ref ADVICE_REGEXES: Vec<Regex> = ADVICE_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();
}

/// Whether the user is asking for personalized advice
pub fn seeks_advice(user_message: &str) -> bool {
    let text = user_message.to_lowercase();
    ADVICE_REGEXES.iter().any(|re| re.is_match(&text))
}

/// Wrap an answer: always prefix the disclaimer, and append a redirect to
/// clarifying questions when the message asks for advice.
pub fn guard(user_message: &str, answer: &str) -> String {
    let mut out = String::with_capacity(DISCLAIMER.len() + answer.len() + CLARIFYING_REDIRECT.len() + 2);
    out.push_str(DISCLAIMER);
    out.push_str(answer);

    if seeks_advice(user_message) {
        out.push_str("\n\n");
        out.push_str(CLARIFYING_REDIRECT);
    }

    out
}
