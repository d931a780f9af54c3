use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Denom;

/// Per denom-pair taker fees.
///
/// Fees are direction independent and stored under the lexicographically
/// ordered pair. Pairs without an explicit entry fall back to the default
/// fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakerFeeMap {
    fees: HashMap<(Denom, Denom), Decimal>,
    default_fee: Decimal,
}

impl TakerFeeMap {
    pub fn new(default_fee: Decimal) -> Self {
        Self { fees: HashMap::new(), default_fee }
    }

    pub fn insert(&mut self, denom_a: impl Into<Denom>, denom_b: impl Into<Denom>, fee: Decimal) {
        self.fees.insert(ordered(denom_a.into(), denom_b.into()), fee);
    }

    pub fn fee(&self, denom_a: &str, denom_b: &str) -> Decimal {
        self.fees
            .get(&ordered(denom_a.to_string(), denom_b.to_string()))
            .copied()
            .unwrap_or(self.default_fee)
    }

    pub fn default_fee(&self) -> Decimal {
        self.default_fee
    }

    pub fn len(&self) -> usize {
        self.fees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fees.is_empty()
    }
}

impl Default for TakerFeeMap {
    fn default() -> Self {
        // 0.1%, the network-wide default taker fee.
        Self::new(Decimal::new(1, 3))
    }
}

fn ordered(a: Denom, b: Denom) -> (Denom, Denom) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn lookup_is_direction_independent() {
        let mut fees = TakerFeeMap::default();
        fees.insert("uosmo", "uatom", dec!(0.002));
        assert_eq!(fees.fee("uatom", "uosmo"), dec!(0.002));
        assert_eq!(fees.fee("uosmo", "uatom"), dec!(0.002));
    }

    #[test]
    fn missing_pair_falls_back_to_default() {
        let fees = TakerFeeMap::new(dec!(0.0015));
        assert_eq!(fees.fee("uosmo", "uusdc"), dec!(0.0015));
    }
}
