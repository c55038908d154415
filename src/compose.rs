//! Answer compositor
//!
//! Every section is checked in a fixed order (education, tax, market,
//! portfolio, goals, news) and rendered independently from its slice of the
//! session state. Rendering is a pure function of the state.

use crate::handlers::format_money;
use crate::models::{
    Citation, GoalProjection, KnowledgeAnswer, MarketData, NewsSummary, Outcome, PortfolioMetrics,
    Quote,
};
use crate::state::SessionState;

pub const FALLBACK_ANSWER: &str = "I can help with finance education, portfolio basics, market quotes, goals, and news. What would you like to do?";

pub const COLLABORATIVE_PREAMBLE: &str = "Several specialists worked on this request. \
Everything below is general education drawn from each of them, not a recommendation.";

pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

fn failure_line(error: &str) -> String {
    format!("❌ {}", error)
}

fn sources_line(label: &str, citations: &[Citation]) -> Option<String> {
    if citations.is_empty() {
        return None;
    }
    let refs = citations
        .iter()
        .map(|c| format!("[{}] {}", c.id, c.source))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("**{}:** {}", label, refs))
}

fn knowledge_section(heading: &str, sources_label: &str, outcome: &Outcome<KnowledgeAnswer>) -> String {
    match outcome {
        Outcome::Ready(answer) => {
            let mut block = format!("{}\n{}", heading, answer.answer);
            if let Some(sources) = sources_line(sources_label, &answer.citations) {
                block.push_str("\n\n");
                block.push_str(&sources);
            }
            block
        }
        Outcome::Failed { error } => format!("{}\n{}", heading, failure_line(error)),
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}", v))
}

fn quote_line(symbol: &str, quote: &Quote) -> String {
    if let Some(error) = &quote.error {
        return format!("- **{}**: {}", symbol, failure_line(error));
    }

    let change = quote
        .pct_change
        .map_or_else(|| "N/A".to_string(), |p| format!("{:+.2}%", p));
    let cached = if quote.cache_hit { ", cached" } else { "" };

    format!(
        "- **{}**: last=${} | prev_close=${} | change={} (source={}{})",
        symbol,
        fmt_opt(quote.last_price),
        fmt_opt(quote.previous_close),
        change,
        quote.source,
        cached
    )
}

fn market_section(data: &MarketData) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let mut lines = vec!["### 📈 Market Data".to_string()];
    lines.extend(data.iter().map(|(symbol, quote)| quote_line(symbol, quote)));
    Some(lines.join("\n"))
}

fn portfolio_section(outcome: &Outcome<PortfolioMetrics>, narrative: Option<&str>) -> String {
    let heading = "### 🧾 Portfolio Summary";
    let metrics = match outcome {
        Outcome::Ready(metrics) => metrics,
        Outcome::Failed { error } => return format!("{}\n{}", heading, failure_line(error)),
    };

    let mut block = format!(
        "{}\n- Total value: **${}**\n- Effective holdings: **{:.2}**\n- Concentration risk: **{}**\n- Diversification grade: **{}**",
        heading,
        format_money(metrics.total_value),
        metrics.effective_holdings,
        metrics.concentration_risk,
        metrics.diversification_grade
    );

    for position in &metrics.positions {
        let price = position
            .price
            .map_or_else(|| "price unavailable".to_string(), |p| format!("${}", format_money(p)));
        block.push_str(&format!(
            "\n  - {}: {} @ {} = ${} ({:.2}%)",
            position.symbol,
            position.quantity,
            price,
            format_money(position.value),
            position.allocation_pct
        ));
    }

    if let Some(text) = narrative {
        block.push_str("\n\n");
        block.push_str(text);
    }

    if !metrics.recommendations.is_empty() {
        block.push_str("\n\n**Things to consider (education-only):**");
        for rec in &metrics.recommendations {
            block.push_str(&format!("\n- {}", rec));
        }
    }

    block
}

fn goals_section(outcome: &Outcome<GoalProjection>) -> String {
    let heading = "### 🎯 Goal Projection";
    let projection = match outcome {
        Outcome::Ready(projection) => projection,
        Outcome::Failed { error } => return format!("{}\n{}", heading, failure_line(error)),
    };

    let mut block = format!("{}\n{}", heading, projection.summary);
    if !projection.scenarios.is_empty() {
        block.push('\n');
    }
    for scenario in &projection.scenarios {
        let reached = match scenario.reached_month {
            Some(0) => "already at target".to_string(),
            Some(month) => format!("reached in ~{} months", month),
            None => "not reached within horizon".to_string(),
        };
        block.push_str(&format!(
            "\n- {} ({:.1}%/yr): {}",
            scenario.name,
            scenario.annual_return * 100.0,
            reached
        ));
    }
    block
}

fn news_section(outcome: &Outcome<NewsSummary>) -> String {
    let heading = "### 📰 News Summary";
    let summary = match outcome {
        Outcome::Ready(summary) => summary,
        Outcome::Failed { error } => return format!("{}\n{}", heading, failure_line(error)),
    };

    let mut block = format!("{}\n{}", heading, summary.summary);
    if !summary.citations.is_empty() {
        block.push_str("\n\n**Headlines:**");
        for c in &summary.citations {
            match &c.url {
                Some(url) => block.push_str(&format!("\n[{}] {} ({}) {}", c.id, c.title, c.source, url)),
                None => block.push_str(&format!("\n[{}] {} ({})", c.id, c.title, c.source)),
            }
        }
    }
    block
}

/// Rendered sections in display order; absent slices are skipped
pub fn sections(state: &SessionState) -> Vec<String> {
    let mut parts = Vec::new();

    if let Some(outcome) = &state.rag_answer {
        parts.push(knowledge_section("### 📚 Explanation", "Sources used (KB)", outcome));
    }
    if let Some(outcome) = &state.tax_answer {
        parts.push(knowledge_section("### 🧾 Tax Education", "Tax sources used (KB)", outcome));
    }
    if let Some(section) = state.market_data.as_ref().and_then(market_section) {
        parts.push(section);
    }
    if let Some(outcome) = &state.portfolio_metrics {
        parts.push(portfolio_section(outcome, state.debug.portfolio_narrative.as_deref()));
    }
    if let Some(outcome) = &state.goals_projection {
        parts.push(goals_section(outcome));
    }
    if let Some(outcome) = &state.news_summary {
        parts.push(news_section(outcome));
    }

    parts
}

/// Single-intent answer
pub fn compose(state: &SessionState) -> String {
    let parts = sections(state);
    if parts.is_empty() {
        return FALLBACK_ANSWER.to_string();
    }
    parts.join("\n\n").trim().to_string()
}

/// Mixed-intent answer: preamble, then every section behind a separator
pub fn compose_collaborative(state: &SessionState) -> String {
    let parts = sections(state);
    if parts.is_empty() {
        return FALLBACK_ANSWER.to_string();
    }

    let mut out = String::from(COLLABORATIVE_PREAMBLE);
    for part in parts {
        out.push_str(SECTION_SEPARATOR);
        out.push_str(part.trim());
    }
    out
}
