//! Greedy whole-share discretization.
//!
//! First pass buys `floor(w * capital / price)` shares per instrument, largest
//! weight first. Second pass spends the leftover one share at a time on the
//! affordable instrument furthest below its target weight.

use crate::domain::error::RebalanceError;
use crate::domain::weights::{AllocationShares, WeightVector};
use crate::ports::discretization_port::DiscretizationPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyAllocator;

impl GreedyAllocator {
    pub fn new() -> Self {
        GreedyAllocator
    }
}

fn discretization(reason: impl Into<String>) -> RebalanceError {
    RebalanceError::Discretization {
        reason: reason.into(),
    }
}

impl DiscretizationPort for GreedyAllocator {
    fn allocate(
        &self,
        weights: &WeightVector,
        latest_prices: &[(String, f64)],
        capital: f64,
    ) -> Result<AllocationShares, RebalanceError> {
        if !(capital.is_finite() && capital > 0.0) {
            return Err(discretization(format!("capital must be positive, got {}", capital)));
        }

        // (instrument, target weight, price), positive weights only
        let mut targets = Vec::new();
        for (id, w) in weights.entries() {
            if *w <= 0.0 {
                continue;
            }
            let price = latest_prices
                .iter()
                .find(|(p, _)| p == id)
                .map(|(_, price)| *price)
                .ok_or_else(|| discretization(format!("no latest price for {}", id)))?;
            if !(price.is_finite() && price > 0.0) {
                return Err(discretization(format!("non-positive price {} for {}", price, id)));
            }
            targets.push((id.clone(), *w, price));
        }
        if targets.is_empty() {
            return Err(discretization("no instrument has a positive weight"));
        }
        targets.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut held = vec![0u64; targets.len()];
        let mut cash = capital;
        for (i, (_, w, price)) in targets.iter().enumerate() {
            let n = (w * capital / price).floor().max(0.0);
            let cost = n * price;
            if cost <= cash {
                held[i] = n as u64;
                cash -= cost;
            }
        }

        loop {
            let invested: f64 = targets
                .iter()
                .zip(&held)
                .map(|((_, _, price), n)| *n as f64 * price)
                .sum();
            let best = targets
                .iter()
                .enumerate()
                .filter(|(_, (_, _, price))| *price <= cash)
                .map(|(i, (_, w, price))| {
                    let current = if invested > 0.0 {
                        held[i] as f64 * price / invested
                    } else {
                        0.0
                    };
                    (i, w - current)
                })
                .filter(|(_, deficit)| *deficit > 0.0)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            match best {
                Some((i, _)) => {
                    held[i] += 1;
                    cash -= targets[i].2;
                }
                None => break,
            }
        }

        if held.iter().all(|n| *n == 0) {
            return Err(discretization(format!(
                "capital {:.2} buys no whole share of any weighted instrument",
                capital
            )));
        }

        let shares = weights
            .entries()
            .iter()
            .filter_map(|(id, _)| {
                targets
                    .iter()
                    .position(|(t, _, _)| t == id)
                    .map(|i| (id.clone(), held[i]))
            })
            .filter(|(_, n)| *n > 0)
            .collect();
        Ok(AllocationShares {
            shares,
            leftover: cash.max(0.0),
        })
    }
}
