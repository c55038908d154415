//! Savings goal projection
//!
//! Annual compounding for the lump sum and inflation, a monthly annuity for
//! the contribution, and a month-by-month simulation for the scenarios.

use crate::error::FinBriefError;
use crate::handlers::format_money;
use crate::models::{GoalProjection, GoalScenario, GoalStatus, GoalsRequest, Outcome};
use crate::state::SessionState;
use tracing::{info, warn};

/// Return shift applied to the conservative and optimistic scenarios
const SCENARIO_SPREAD: f64 = 0.02;

/// Balances within half a cent of the target count as reaching it
const REACHED_TOLERANCE: f64 = 0.005;

/// Longest horizon accepted; also bounds the month-by-month simulation
pub const MAX_YEARS: f64 = 100.0;

pub fn inflation_adjust(value: f64, inflation: f64, years: f64) -> f64 {
    value * (1.0 + inflation).powf(years)
}

pub fn future_value_lump_sum(present_value: f64, rate: f64, years: f64) -> f64 {
    present_value * (1.0 + rate).powf(years)
}

/// Monthly contribution that grows `current` to `target`, never negative.
/// A zero rate amortizes linearly.
pub fn required_monthly_contribution(target: f64, current: f64, annual_rate: f64, years: f64) -> f64 {
    let r = annual_rate / 12.0;
    let n = years * 12.0;

    if r == 0.0 {
        return ((target - current) / n).max(0.0);
    }

    let growth = (1.0 + r).powf(n);
    let denominator = (growth - 1.0) / r;
    if denominator <= 0.0 {
        return 0.0;
    }

    ((target - current * growth) / denominator).max(0.0)
}

fn simulate(
    name: &str,
    annual_return: f64,
    current: f64,
    monthly: f64,
    target: f64,
    months: u32,
) -> GoalScenario {
    let r = annual_return / 12.0;
    let mut balance = current;
    let mut reached_month = (balance + REACHED_TOLERANCE >= target).then_some(0);

    for month in 1..=months {
        balance = balance * (1.0 + r) + monthly;
        if reached_month.is_none() && balance + REACHED_TOLERANCE >= target {
            reached_month = Some(month);
        }
    }

    GoalScenario {
        name: name.to_string(),
        annual_return,
        reached_month,
        ending_balance: balance,
    }
}

fn invalid(message: impl Into<String>) -> FinBriefError {
    FinBriefError::InvalidInput(message.into())
}

fn validate(request: &GoalsRequest) -> Result<(), FinBriefError> {
    let finite = [
        request.goal_amount,
        request.current_savings,
        request.years,
        request.expected_return,
        request.inflation_rate,
    ]
    .iter()
    .all(|v| v.is_finite());

    if !finite {
        return Err(invalid("Goal inputs must be finite numbers"));
    }
    if request.years <= 0.0 || request.years > MAX_YEARS {
        return Err(invalid(format!(
            "Years must be between 0 and {}, got {}",
            MAX_YEARS, request.years
        )));
    }
    if request.goal_amount < 0.0 || request.current_savings < 0.0 {
        return Err(invalid("Goal amount and current savings cannot be negative"));
    }
    if request.monthly_contribution.is_some_and(|m| !m.is_finite() || m < 0.0) {
        return Err(invalid("Monthly contribution cannot be negative"));
    }
    if request.expected_return <= -1.0 || request.inflation_rate <= -1.0 {
        return Err(invalid("Rates must be greater than -100%"));
    }
    Ok(())
}

pub fn project_goal(request: &GoalsRequest) -> crate::Result<GoalProjection> {
    validate(request)?;

    let target = inflation_adjust(request.goal_amount, request.inflation_rate, request.years);
    let future_value_current =
        future_value_lump_sum(request.current_savings, request.expected_return, request.years);
    let required = required_monthly_contribution(
        target,
        request.current_savings,
        request.expected_return,
        request.years,
    );
    if !(target.is_finite() && future_value_current.is_finite() && required.is_finite()) {
        return Err(invalid("Goal projection overflows; use smaller amounts or rates"));
    }

    let gap = target - future_value_current;
    let status = if gap > 0.0 {
        GoalStatus::Short
    } else {
        GoalStatus::OnTrack
    };

    let monthly = request.monthly_contribution.unwrap_or(required);
    let months = (request.years * 12.0).round() as u32;
    let base = request.expected_return;

    let scenarios = vec![
        simulate(
            "conservative",
            (base - SCENARIO_SPREAD).max(0.0),
            request.current_savings,
            monthly,
            target,
            months,
        ),
        simulate("base", base, request.current_savings, monthly, target, months),
        simulate(
            "optimistic",
            base + SCENARIO_SPREAD,
            request.current_savings,
            monthly,
            target,
            months,
        ),
    ];

    let mut summary = format!(
        "Your inflation-adjusted goal is **${}**.\n\
         If you invest your current savings, it may grow to **${}**.\n\
         To reach your goal, you would need to contribute approximately **${} per month** (education-only estimate).\n",
        format_money(target),
        format_money(future_value_current),
        format_money(required),
    );
    match status {
        GoalStatus::Short => summary.push_str(&format!(
            "You are currently **below** your projected target by about **${}**.",
            format_money(gap)
        )),
        GoalStatus::OnTrack => summary.push_str("You are on track based on current assumptions."),
    }

    Ok(GoalProjection {
        inflation_adjusted_target: target,
        future_value_current,
        required_monthly_contribution: required,
        gap,
        status,
        monthly_contribution: monthly,
        scenarios,
        summary,
    })
}

pub fn run(state: &mut SessionState) {
    let request = state.goals_request.clone().unwrap_or_default();

    match project_goal(&request) {
        Ok(projection) => {
            info!(
                target = projection.inflation_adjusted_target,
                gap = projection.gap,
                "Goal projected"
            );
            state.debug.goals_narrative = Some(projection.summary.clone());
            state.goals_projection = Some(Outcome::Ready(projection));
        }
        Err(error) => {
            warn!(%error, "Goal projection rejected input");
            state.goals_projection = Some(Outcome::failed(error.to_string()));
        }
    }

    state.goals_request = Some(request);
}
