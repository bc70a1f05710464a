//! Revenue split between the team, an optional agent, and the company.
//!
//! Shares are computed from the invoice total at full precision. Company
//! profit is nominally a fixed percentage of the total, but when the team
//! and agent shares leave less room than that it becomes the residual
//! `total - team - commission`, which is negative when team and agent alone
//! exceed the total. A negative residual is returned as-is so callers can
//! see and reject the over-allocation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::{AgentEntry, SplitShares, TeamMemberEntry};
use crate::money::{percent_of, round_currency, AMOUNT_TOO_LARGE};
use crate::types::ContributionType;
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub role: String,
    pub contribution_type: ContributionType,
    pub contribution: Decimal,
}

impl Contribution {
    pub fn percentage(role: &str, percent: Decimal) -> Self {
        Self {
            role: role.to_string(),
            contribution_type: ContributionType::Percentage,
            contribution: percent,
        }
    }

    pub fn fixed(role: &str, amount: Decimal) -> Self {
        Self {
            role: role.to_string(),
            contribution_type: ContributionType::Fixed,
            contribution: amount,
        }
    }

    /// `None` when a percentage share of `total_amount` overflows.
    pub fn share_of(&self, total_amount: Decimal) -> Option<Decimal> {
        match self.contribution_type {
            ContributionType::Percentage => percent_of(total_amount, self.contribution),
            ContributionType::Fixed => Some(self.contribution),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCommission {
    pub agent_name: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitInput {
    pub total_amount: Decimal,
    pub team_members: Vec<Contribution>,
    pub agent: Option<AgentCommission>,
    pub company_profit_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOutcome {
    pub total_amount: Decimal,
    pub team_total: Decimal,
    pub commission: Decimal,
    pub company_profit: Decimal,
    /// `total * company_profit_percentage / 100`, before any adjustment.
    pub company_profit_nominal: Decimal,
    /// Each team member's share, in input order.
    pub member_shares: Vec<Decimal>,
}

impl SplitOutcome {
    fn zero(member_count: usize) -> Self {
        Self {
            total_amount: Decimal::ZERO,
            team_total: Decimal::ZERO,
            commission: Decimal::ZERO,
            company_profit: Decimal::ZERO,
            company_profit_nominal: Decimal::ZERO,
            member_shares: vec![Decimal::ZERO; member_count],
        }
    }

    pub fn allocated(&self) -> Decimal {
        self.team_total + self.commission + self.company_profit
    }

    /// Part of the total no share claims. Zero once company profit has been
    /// adjusted down to the residual.
    pub fn unallocated(&self) -> Decimal {
        self.total_amount - self.allocated()
    }

    pub fn is_adjusted(&self) -> bool {
        self.company_profit != self.company_profit_nominal
    }

    pub fn is_over_allocated(&self) -> bool {
        self.company_profit < Decimal::ZERO
    }

    pub fn shares(&self) -> SplitShares {
        SplitShares {
            team_total: self.team_total,
            commission: self.commission,
            company_profit: self.company_profit,
        }
    }

    pub fn rounded(&self) -> SplitOutcome {
        SplitOutcome {
            total_amount: round_currency(self.total_amount),
            team_total: round_currency(self.team_total),
            commission: round_currency(self.commission),
            company_profit: round_currency(self.company_profit),
            company_profit_nominal: round_currency(self.company_profit_nominal),
            member_shares: self.member_shares.iter().copied().map(round_currency).collect(),
        }
    }
}

pub fn validate(input: &SplitInput) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.require_non_negative("total_amount", input.total_amount);
    for (index, member) in input.team_members.iter().enumerate() {
        check_contribution(
            &mut errors,
            &format!("team_members[{index}].contribution"),
            Some(member.contribution_type),
            member.contribution,
        );
    }
    if let Some(agent) = &input.agent {
        errors.require_percentage("agent.rate", agent.rate);
    }
    errors.require_percentage("company_profit_percentage", input.company_profit_percentage);
    errors
}

/// Validates `input` and computes the split. Every invalid field is reported
/// in the returned error, not just the first. Figures that would not fit in a
/// `Decimal` are reported the same way.
pub fn compute(input: &SplitInput) -> Result<SplitOutcome, ValidationErrors> {
    validate(input).into_result(())?;

    let total = input.total_amount;
    if total.is_zero() {
        return Ok(SplitOutcome::zero(input.team_members.len()));
    }

    let mut errors = ValidationErrors::new();
    let mut member_shares = Vec::with_capacity(input.team_members.len());
    for (index, member) in input.team_members.iter().enumerate() {
        match member.share_of(total) {
            Some(share) => member_shares.push(share),
            None => errors.push(format!("team_members[{index}].contribution"), AMOUNT_TOO_LARGE),
        }
    }

    let commission = match &input.agent {
        Some(agent) => percent_of(total, agent.rate),
        None => Some(Decimal::ZERO),
    };
    let company_profit_nominal = percent_of(total, input.company_profit_percentage);
    let (Some(commission), Some(company_profit_nominal)) = (commission, company_profit_nominal)
    else {
        errors.push("total_amount", AMOUNT_TOO_LARGE);
        return Err(errors);
    };
    errors.into_result(())?;

    // Team and commission together must fit for the residual to exist.
    let team_total = member_shares
        .iter()
        .try_fold(Decimal::ZERO, |sum, share| sum.checked_add(*share));
    let claimed = team_total.and_then(|team| team.checked_add(commission));
    let (Some(team_total), Some(claimed)) = (team_total, claimed) else {
        return Err(ValidationErrors::single("team_members", AMOUNT_TOO_LARGE));
    };

    let company_profit = match claimed.checked_add(company_profit_nominal) {
        Some(sum) if sum <= total => company_profit_nominal,
        // An overflowing sum is larger than any total.
        _ => total - claimed,
    };

    Ok(SplitOutcome {
        total_amount: total,
        team_total,
        commission,
        company_profit,
        company_profit_nominal,
        member_shares,
    })
}

/// Builds a calculator input from form entries, where the contribution type
/// is still free text. Unknown types are reported together with range
/// violations.
pub fn input_from_entries(
    total_amount: Decimal,
    entries: &[TeamMemberEntry],
    agent: Option<&AgentEntry>,
    company_profit_percentage: Decimal,
) -> Result<SplitInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.require_non_negative("total_amount", total_amount);

    let mut team_members = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let contribution_type = ContributionType::parse(&entry.contribution_type);
        if contribution_type.is_none() {
            errors.push(
                format!("team_members[{index}].contribution_type"),
                format!(
                    "must be one of {}, got {:?}",
                    ContributionType::expected(),
                    entry.contribution_type
                ),
            );
        }
        check_contribution(
            &mut errors,
            &format!("team_members[{index}].contribution"),
            contribution_type,
            entry.contribution,
        );

        if let Some(contribution_type) = contribution_type {
            team_members.push(Contribution {
                role: entry.role.clone().unwrap_or_default(),
                contribution_type,
                contribution: entry.contribution,
            });
        }
    }

    if let Some(agent) = agent {
        errors.require_non_blank("agent.agent_name", &agent.agent_name);
        errors.require_percentage("agent.rate", agent.rate);
    }
    errors.require_percentage("company_profit_percentage", company_profit_percentage);

    errors.into_result(SplitInput {
        total_amount,
        team_members,
        agent: agent.map(|a| AgentCommission {
            agent_name: a.agent_name.clone(),
            rate: a.rate,
        }),
        company_profit_percentage,
    })
}

/// Range rules for one team member's contribution. `contribution_type` is
/// `None` when it could not be parsed; only the sign is checked then.
pub fn check_contribution(
    errors: &mut ValidationErrors,
    field: &str,
    contribution_type: Option<ContributionType>,
    contribution: Decimal,
) {
    match contribution_type {
        Some(ContributionType::Percentage) => errors.require_percentage(field, contribution),
        _ => errors.require_non_negative(field, contribution),
    }
}
