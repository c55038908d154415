//! Portfolio analytics handler
//!
//! Values holdings with the quotes fetched earlier in the same turn and scores
//! concentration with the Herfindahl index on value weights.

use crate::handlers::format_money;
use crate::models::{
    AllocationShare, ConcentrationFlags, ConcentrationRisk, Holding, MarketData, Outcome,
    PortfolioMetrics, Position,
};
use crate::state::SessionState;
use tracing::{info, warn};

const TOP_POSITIONS: usize = 5;

/// Letter grade for an HHI on 0..=1 weights
pub fn diversification_grade(hhi: f64) -> &'static str {
    if hhi <= 0.06 {
        "A (Highly diversified)"
    } else if hhi <= 0.10 {
        "B (Well diversified)"
    } else if hhi <= 0.18 {
        "C (Moderate concentration)"
    } else if hhi <= 0.30 {
        "D (High concentration)"
    } else {
        "F (Very high concentration)"
    }
}

pub fn concentration_risk(effective_holdings: f64) -> ConcentrationRisk {
    if effective_holdings >= 10.0 {
        ConcentrationRisk::Low
    } else if effective_holdings >= 5.0 {
        ConcentrationRisk::Moderate
    } else {
        ConcentrationRisk::High
    }
}

fn concentration_flags(positions: &[Position]) -> ConcentrationFlags {
    let share = |p: &Position| AllocationShare {
        symbol: p.symbol.clone(),
        allocation_pct: p.allocation_pct,
    };

    let mut top_positions: Vec<AllocationShare> = positions.iter().map(share).collect();
    top_positions.sort_by(|a, b| b.allocation_pct.total_cmp(&a.allocation_pct));
    top_positions.truncate(TOP_POSITIONS);

    ConcentrationFlags {
        over_25: positions
            .iter()
            .filter(|p| p.allocation_pct >= 25.0)
            .map(share)
            .collect(),
        over_10_count: positions.iter().filter(|p| p.allocation_pct >= 10.0).count(),
        top_positions,
    }
}

fn recommendations(grade: &str, flags: &ConcentrationFlags) -> Vec<String> {
    let mut recs = Vec::new();

    if grade.starts_with('D') || grade.starts_with('F') {
        recs.push("Your portfolio is highly concentrated. Consider spreading exposure across more holdings or diversified funds (education-only).".to_string());
    }
    if !flags.over_25.is_empty() {
        recs.push("One or more holdings exceed ~25% allocation. Many diversified portfolios cap single-stock exposure lower (education-only).".to_string());
    }
    if flags.over_10_count >= 4 {
        recs.push("Multiple holdings are each >10%. Consider whether sector overlap is increasing risk (education-only).".to_string());
    }
    if recs.is_empty() {
        recs.push("Diversification looks reasonable based on allocation concentration metrics (education-only).".to_string());
    }

    recs
}

/// Value holdings against `quotes`. A holding without a usable price is kept
/// with zero value. Fails only on invalid quantities.
pub fn compute_portfolio_metrics(
    holdings: &[Holding],
    quotes: &MarketData,
) -> Result<PortfolioMetrics, String> {
    let mut positions = Vec::with_capacity(holdings.len());
    let mut total_value = 0.0;

    for holding in holdings {
        let symbol = holding.symbol.trim().to_uppercase();
        if !holding.quantity.is_finite() || holding.quantity < 0.0 {
            return Err(format!("Invalid quantity {} for {}", holding.quantity, symbol));
        }

        let price = quotes.get(&symbol).and_then(|q| q.last_price);
        let value = price.map_or(0.0, |p| p * holding.quantity);
        total_value += value;

        positions.push(Position {
            symbol,
            quantity: holding.quantity,
            price,
            value,
            allocation_pct: 0.0,
        });
    }

    for position in &mut positions {
        position.allocation_pct = if total_value > 0.0 {
            position.value / total_value * 100.0
        } else {
            0.0
        };
    }

    let hhi = if total_value > 0.0 {
        positions
            .iter()
            .filter(|p| p.value > 0.0)
            .map(|p| (p.value / total_value).powi(2))
            .sum::<f64>()
    } else {
        1.0
    };
    let effective_holdings = if hhi > 0.0 { 1.0 / hhi } else { 1.0 };

    let grade = diversification_grade(hhi);
    let flags = concentration_flags(&positions);
    let recommendations = recommendations(grade, &flags);

    Ok(PortfolioMetrics {
        total_value,
        positions,
        hhi,
        effective_holdings,
        concentration_risk: concentration_risk(effective_holdings),
        diversification_grade: grade.to_string(),
        concentration_flags: flags,
        recommendations,
    })
}

pub fn narrative(metrics: &PortfolioMetrics) -> String {
    if metrics.positions.is_empty() {
        return "No holdings were provided. Add symbols and quantities to analyze your portfolio.".to_string();
    }

    format!(
        "Your portfolio value (based on available prices) is **${}**.\n\
         Estimated diversification (effective holdings): **{:.2}**.\n\
         Concentration risk looks **{}** (heuristic based on weights).\n",
        format_money(metrics.total_value),
        metrics.effective_holdings,
        metrics.concentration_risk
    )
}

/// Reads `state.market_data`, which the market stage must have populated.
pub fn run(state: &mut SessionState) {
    let holdings = state.portfolio_input.clone().unwrap_or_default();

    let empty = MarketData::new();
    let quotes = match &state.market_data {
        Some(data) => data,
        None => {
            warn!("Portfolio handler ran without market data");
            &empty
        }
    };

    match compute_portfolio_metrics(&holdings, quotes) {
        Ok(metrics) => {
            info!(
                positions = metrics.positions.len(),
                total_value = metrics.total_value,
                risk = %metrics.concentration_risk,
                "Portfolio analyzed"
            );
            state.debug.portfolio_narrative = Some(narrative(&metrics));
            state.portfolio_metrics = Some(Outcome::Ready(metrics));
        }
        Err(error) => {
            warn!(%error, "Portfolio analysis rejected input");
            state.portfolio_metrics = Some(Outcome::failed(error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quote;
    use crate::state::TurnRequest;

    fn priced(symbol: &str, price: f64) -> (String, Quote) {
        let mut quote = Quote::failed(symbol, "unused");
        quote.error = None;
        quote.last_price = Some(price);
        (symbol.to_string(), quote)
    }

    fn holding(symbol: &str, quantity: f64) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_two_position_portfolio_is_highly_concentrated() {
        let quotes: MarketData = [priced("AAPL", 150.0), priced("MSFT", 300.0)].into_iter().collect();
        let metrics =
            compute_portfolio_metrics(&[holding("AAPL", 10.0), holding("MSFT", 1.0)], &quotes).unwrap();

        assert_eq!(metrics.total_value, 1800.0);
        assert!((metrics.positions[0].allocation_pct - 83.333).abs() < 0.01);
        assert!(metrics.effective_holdings < 2.0);
        assert_eq!(metrics.concentration_risk, ConcentrationRisk::High);
        assert!(metrics.diversification_grade.starts_with('F'));
        assert_eq!(metrics.concentration_flags.over_25.len(), 1);
        assert_eq!(metrics.concentration_flags.top_positions[0].symbol, "AAPL");
    }

    #[test]
    fn test_unpriced_position_kept_with_zero_value() {
        let quotes: MarketData = [priced("AAPL", 100.0)].into_iter().collect();
        let metrics =
            compute_portfolio_metrics(&[holding("aapl", 1.0), holding("XYZ", 5.0)], &quotes).unwrap();

        assert_eq!(metrics.positions.len(), 2);
        assert_eq!(metrics.positions[1].value, 0.0);
        assert_eq!(metrics.positions[1].price, None);
        assert_eq!(metrics.positions[1].allocation_pct, 0.0);
    }

    #[test]
    fn test_equal_weights_are_low_risk() {
        let symbols: Vec<String> = (0..20).map(|i| format!("S{}", i)).collect();
        let quotes: MarketData = symbols.iter().map(|s| priced(s, 10.0)).collect();
        let holdings: Vec<Holding> = symbols.iter().map(|s| holding(s, 1.0)).collect();

        let metrics = compute_portfolio_metrics(&holdings, &quotes).unwrap();
        assert!((metrics.effective_holdings - 20.0).abs() < 1e-9);
        assert_eq!(metrics.concentration_risk, ConcentrationRisk::Low);
        assert!(metrics.diversification_grade.starts_with('A'));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        assert!(compute_portfolio_metrics(&[holding("AAPL", -1.0)], &MarketData::new()).is_err());
    }

    #[test]
    fn test_run_records_narrative() {
        let request = TurnRequest {
            portfolio_input: Some(vec![holding("AAPL", 10.0), holding("MSFT", 1.0)]),
            ..Default::default()
        };
        let mut state = SessionState::new("s", "analyze my portfolio", None, request);
        state.market_data = Some([priced("AAPL", 150.0), priced("MSFT", 300.0)].into_iter().collect());

        run(&mut state);

        let metrics = state.portfolio_metrics.as_ref().unwrap().ready().unwrap();
        assert_eq!(metrics.total_value, 1800.0);
        assert!(state
            .debug
            .portfolio_narrative
            .as_deref()
            .unwrap()
            .contains("$1,800.00"));
    }
}
