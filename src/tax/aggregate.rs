use super::ledger::SurtaxReconciliation;
use crate::core::{
    Alert, AssetAcquisition, AssetMovement, ItemAssessment, LineItem, Operation,
    OperationAssessment, RuleId, Totals,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Conditions that move the confidence score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFactor {
    NoRuleMatched,
    RateFallback,
    NegativeNetSurtax,
    AssetOverflow,
    AssetCreditRecognized,
}

/// Point table, applied top to bottom
pub const CONFIDENCE_TABLE: &[(ScoreFactor, i32)] = &[
    (ScoreFactor::NoRuleMatched, -20),
    (ScoreFactor::RateFallback, -10),
    (ScoreFactor::NegativeNetSurtax, -15),
    (ScoreFactor::AssetOverflow, -5),
    (ScoreFactor::AssetCreditRecognized, 5),
];

const MAX_SCORE: i32 = 100;

/// Score starting at 100, clamped to [0, 100] after applying every present factor
pub fn confidence_score(present: &[ScoreFactor]) -> u8 {
    let score = CONFIDENCE_TABLE
        .iter()
        .filter(|(factor, _)| present.contains(factor))
        .fold(MAX_SCORE, |score, (_, points)| score + points);
    score.clamp(0, MAX_SCORE) as u8
}

/// Factors present in a finished run
pub fn score_factors(
    items: &[ItemAssessment],
    alerts: &[Alert],
    totals: &Totals,
) -> Vec<ScoreFactor> {
    let mut factors = Vec::new();
    if items.iter().any(|i| !i.matched_any_rule()) {
        factors.push(ScoreFactor::NoRuleMatched);
    }
    if alerts.iter().any(Alert::is_rate_fallback) {
        factors.push(ScoreFactor::RateFallback);
    }
    if totals.net_surtax < Decimal::ZERO {
        factors.push(ScoreFactor::NegativeNetSurtax);
    }
    if alerts
        .iter()
        .any(|a| matches!(a, Alert::AssetScheduleOverflow { .. }))
    {
        factors.push(ScoreFactor::AssetOverflow);
    }
    if totals.asset_credit_recognized > Decimal::ZERO {
        factors.push(ScoreFactor::AssetCreditRecognized);
    }
    factors
}

/// Period totals from item, operation, ledger and asset results
pub fn totals(
    items: &[ItemAssessment],
    operations: &[OperationAssessment],
    surtax: &SurtaxReconciliation,
    movements: &[AssetMovement],
) -> Totals {
    let item_tax: Decimal = items.iter().map(|i| i.tax_due).sum();
    let differential: Decimal = operations.iter().map(|o| o.differential).sum();
    Totals {
        base: items.iter().map(|i| i.adjusted_base).sum::<Decimal>().round_dp(2),
        tax_due: (item_tax + differential).round_dp(2),
        surtax_payable: surtax.current_payable.round_dp(2),
        surtax_credited: surtax.prior_credit.round_dp(2),
        net_surtax: surtax.net.round_dp(2),
        differential: differential.round_dp(2),
        asset_credit_recognized: movements.iter().map(|m| m.recognized).sum::<Decimal>().round_dp(2),
    }
}

#[derive(Serialize)]
struct DigestInput<'a> {
    items: &'a [LineItem],
    operations: &'a [Operation],
    candidates: &'a [AssetAcquisition],
    rules: &'a [RuleId],
}

/// SHA-256 (hex) over the canonical JSON of a run's inputs
pub fn input_digest(
    items: &[LineItem],
    operations: &[Operation],
    candidates: &[AssetAcquisition],
    rules: &[RuleId],
) -> String {
    let input = DigestInput {
        items,
        operations,
        candidates,
        rules,
    };
    // plain structs and strings, serialization cannot fail
    let bytes = serde_json::to_vec(&input).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}
