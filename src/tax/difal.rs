use super::benefits::pct;
use super::config::EngineConfig;
use super::rates::RateTable;
use crate::core::{Alert, Cst, Direction, ItemAssessment, Operation, OperationAssessment};
use rust_decimal::Decimal;

/// Rate differential owed on a base: never negative
pub fn differential(base: Decimal, dest_internal_rate: Decimal, origin_interstate_rate: Decimal) -> Decimal {
    let spread = (dest_internal_rate - origin_interstate_rate).max(Decimal::ZERO);
    pct(base, spread)
}

#[derive(Debug, Clone)]
pub struct DifferentialOutcome {
    pub assessment: OperationAssessment,
    pub alerts: Vec<Alert>,
    /// A configured fallback stood in for a missing rate
    pub fallback_rate: bool,
}

/// Computes DIFAL for outbound interstate operations, aggregating their items
pub struct DifferentialCalculator<'a> {
    rates: &'a dyn RateTable,
    config: &'a EngineConfig,
}

impl<'a> DifferentialCalculator<'a> {
    pub fn new(rates: &'a dyn RateTable, config: &'a EngineConfig) -> Self {
        DifferentialCalculator { rates, config }
    }

    pub fn assess(&self, operation: &Operation, items: &[&ItemAssessment]) -> DifferentialOutcome {
        let adjusted_base: Decimal = items.iter().map(|i| i.adjusted_base).sum();
        let items_tax: Decimal = items.iter().map(|i| i.tax_due).sum();
        let mut alerts = Vec::new();
        let mut fallback_rate = false;

        let differential = if operation.direction == Direction::Outbound && operation.is_interstate() {
            // untaxed items carry no differential
            let base: Decimal = items
                .iter()
                .filter(|i| i.rate > Decimal::ZERO)
                .map(|i| i.adjusted_base)
                .sum();

            let dest_rate = match self.rates.internal_rate(&operation.destination, &Cst::taxed()) {
                Some(rate) => rate,
                None => {
                    let rate = self.config.fallback_internal_rate;
                    log::warn!(
                        "No internal rate for {} (operation {}), using fallback {}%",
                        operation.destination,
                        operation.id,
                        rate
                    );
                    alerts.push(Alert::FallbackDestinationRate {
                        operation: operation.id.clone(),
                        jurisdiction: operation.destination.to_string(),
                        rate,
                    });
                    fallback_rate = true;
                    rate
                }
            };
            let origin_rate = match self
                .rates
                .interstate_rate(&operation.origin, &operation.destination)
            {
                Some(rate) => rate,
                None => {
                    let rate = self.config.fallback_interstate_rate;
                    log::warn!(
                        "No interstate rate {}->{} (operation {}), using fallback {}%",
                        operation.origin,
                        operation.destination,
                        operation.id,
                        rate
                    );
                    alerts.push(Alert::FallbackInterstateRate {
                        operation: operation.id.clone(),
                        origin: operation.origin.to_string(),
                        destination: operation.destination.to_string(),
                        rate,
                    });
                    fallback_rate = true;
                    rate
                }
            };

            let amount = differential(base, dest_rate, origin_rate).round_dp(2);
            log::debug!(
                "Operation {} {}->{}: DIFAL base {}, {}% - {}% = {}",
                operation.id,
                operation.origin,
                operation.destination,
                base,
                dest_rate,
                origin_rate,
                amount
            );
            amount
        } else {
            Decimal::ZERO
        };

        DifferentialOutcome {
            assessment: OperationAssessment {
                operation: operation.id.clone(),
                adjusted_base,
                items_tax,
                differential,
                tax_due: items_tax + differential,
            },
            alerts,
            fallback_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LineItem;
    use crate::tax::rates::StaticRateTable;
    use rust_decimal_macros::dec;

    fn assessed(code: &str, base: Decimal, rate: Decimal) -> ItemAssessment {
        ItemAssessment {
            item: LineItem {
                code: code.to_string(),
                description: String::new(),
                ncm: "84713012".to_string(),
                cfop: "6102".to_string(),
                cst: "00".to_string(),
                quantity: dec!(1),
                unit_value: base,
                total_value: base,
                discount: None,
                declared_base: Some(base),
                declared_tax: None,
            },
            original_base: base,
            adjusted_base: base,
            rate,
            tax_due: pct(base, rate),
            surtax: Decimal::ZERO,
            applied_benefits: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn op(direction: Direction, origin: &str, destination: &str) -> Operation {
        Operation {
            id: "NF-1".to_string(),
            direction,
            origin: origin.parse().unwrap(),
            destination: destination.parse().unwrap(),
            item_codes: vec!["A".to_string()],
        }
    }

    #[test]
    fn formula() {
        assert_eq!(differential(dec!(1000), dec!(18), dec!(7)), dec!(110));
        assert_eq!(differential(dec!(1000), dec!(4), dec!(7)), Decimal::ZERO);
    }

    #[test]
    fn outbound_interstate_adds_differential() {
        let rates = StaticRateTable::empty()
            .with_internal("BA", dec!(18))
            .with_interstate("SP", "BA", dec!(7));
        let config = EngineConfig::default();
        let calc = DifferentialCalculator::new(&rates, &config);
        let items = [assessed("A", dec!(600), dec!(7)), assessed("B", dec!(400), dec!(7))];
        let refs: Vec<_> = items.iter().collect();
        let out = calc.assess(&op(Direction::Outbound, "SP", "BA"), &refs);
        assert_eq!(out.assessment.differential, dec!(110));
        assert_eq!(out.assessment.items_tax, dec!(70));
        assert_eq!(out.assessment.tax_due, dec!(180));
        assert!(out.alerts.is_empty());
    }

    #[test]
    fn inbound_and_intrastate_have_none() {
        let rates = StaticRateTable::default();
        let config = EngineConfig::default();
        let calc = DifferentialCalculator::new(&rates, &config);
        let items = [assessed("A", dec!(1000), dec!(18))];
        let refs: Vec<_> = items.iter().collect();
        assert_eq!(
            calc.assess(&op(Direction::Inbound, "BA", "SP"), &refs).assessment.differential,
            Decimal::ZERO
        );
        assert_eq!(
            calc.assess(&op(Direction::Outbound, "SP", "SP"), &refs).assessment.differential,
            Decimal::ZERO
        );
    }

    #[test]
    fn missing_destination_uses_fallback() {
        let rates = StaticRateTable::empty().with_interstate("SP", "ZZ", dec!(12));
        let config = EngineConfig {
            fallback_internal_rate: dec!(20),
            ..EngineConfig::default()
        };
        let calc = DifferentialCalculator::new(&rates, &config);
        let items = [assessed("A", dec!(1000), dec!(12))];
        let refs: Vec<_> = items.iter().collect();
        let out = calc.assess(&op(Direction::Outbound, "SP", "ZZ"), &refs);
        assert_eq!(out.assessment.differential, dec!(80));
        assert!(out.fallback_rate);
        assert!(matches!(out.alerts[0], Alert::FallbackDestinationRate { .. }));
    }

    #[test]
    fn untaxed_items_excluded_from_base() {
        let rates = StaticRateTable::default();
        let config = EngineConfig::default();
        let calc = DifferentialCalculator::new(&rates, &config);
        let items = [assessed("A", dec!(1000), dec!(7)), assessed("B", dec!(500), Decimal::ZERO)];
        let refs: Vec<_> = items.iter().collect();
        // BA 20.5% - 7%
        let out = calc.assess(&op(Direction::Outbound, "SP", "BA"), &refs);
        assert_eq!(out.assessment.differential, dec!(135));
    }
}
