//! Cost model — proportional commission on both sides plus a sell-side tax.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub commission_buy: f64,
    pub commission_sell: f64,
    pub tax_sell: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            commission_buy: 0.001,
            commission_sell: 0.001,
            tax_sell: 0.001,
        }
    }
}

impl CostModel {
    pub fn frictionless() -> Self {
        Self {
            commission_buy: 0.0,
            commission_sell: 0.0,
            tax_sell: 0.0,
        }
    }

    /// Cash needed to buy `shares` at `price`, commission included.
    pub fn buy_cost(&self, shares: u64, price: f64) -> f64 {
        shares as f64 * price * (1.0 + self.commission_buy)
    }

    /// Cash received for selling `shares` at `price`, after commission and tax.
    pub fn net_proceeds(&self, shares: u64, price: f64) -> f64 {
        shares as f64 * price * (1.0 - self.commission_sell - self.tax_sell)
    }

    /// Realized profit of a sale against an average cost.
    pub fn realized_profit(&self, shares: u64, exit_price: f64, avg_cost: f64) -> f64 {
        self.net_proceeds(shares, exit_price) - self.buy_cost(shares, avg_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_costs() {
        let c = CostModel::default();
        assert!((c.buy_cost(100, 50.0) - 5_005.0).abs() < 1e-9);
        assert!((c.net_proceeds(100, 50.0) - 4_990.0).abs() < 1e-9);
    }

    #[test]
    fn realized_profit_includes_both_sides() {
        let c = CostModel::default();
        // 1000 @ 100 → 90: net 89_820, cost 100_100
        let p = c.realized_profit(1000, 90.0, 100.0);
        assert!((p - (89_820.0 - 100_100.0)).abs() < 1e-6);
        assert_eq!(CostModel::frictionless().realized_profit(10, 12.0, 10.0), 20.0);
    }
}
