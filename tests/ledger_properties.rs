//! Property tests: random deposit/buy/sell sequences keep the ledger
//! consistent with an independently replayed cash and share model.

mod common;

use common::*;
use proptest::prelude::*;
use ratiotrader::domain::portfolio::{round3, Portfolio, EPSILON};
use std::collections::BTreeMap;

static TICKERS: [&str; 3] = ["A", "B", "C"];
static PRICES: [f64; 3] = [12.5, 101.0, 0.37];

#[derive(Debug, Clone)]
enum Op {
    Deposit(f64),
    Buy(usize, f64),
    Sell(usize, f64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1.0f64..50_000.0).prop_map(Op::Deposit),
        (0usize..3, 0.01f64..=1.0).prop_map(|(t, f)| Op::Buy(t, f)),
        (0usize..3, 0.01f64..=1.0).prop_map(|(t, f)| Op::Sell(t, f)),
    ]
}

fn portfolio() -> Portfolio {
    let columns: Vec<(&str, &[f64])> = TICKERS
        .iter()
        .zip(PRICES.iter())
        .map(|(t, p)| (*t, std::slice::from_ref(p)))
        .collect();
    Portfolio::new("prop", make_table(days("2024-01-02", 1), &columns))
}

proptest! {
    #[test]
    fn ledger_matches_replayed_model(ops in prop::collection::vec(op(), 1..60)) {
        let d = date("2024-01-02");
        let mut portfolio = portfolio();
        let mut cash = 0.0f64;
        let mut shares: BTreeMap<usize, f64> = BTreeMap::new();
        let mut committed = 0usize;

        for op in ops {
            match op {
                Op::Deposit(amount) => {
                    portfolio.deposit(amount, d).unwrap();
                    cash += amount;
                }
                Op::Buy(t, fraction) => {
                    let cost = cash * fraction;
                    if cost <= 0.0 {
                        continue;
                    }
                    let bought = cost / PRICES[t];
                    portfolio.buy(TICKERS[t], bought, cost, d).unwrap();
                    cash = (cash - cost).max(0.0);
                    *shares.entry(t).or_insert(0.0) += bought;
                }
                Op::Sell(t, fraction) => {
                    let Some(held) = shares.get(&t).copied() else {
                        continue;
                    };
                    let sold = held * fraction;
                    let proceeds = sold * PRICES[t];
                    portfolio.sell(TICKERS[t], sold, proceeds, d).unwrap();
                    cash += proceeds;
                    if held - sold <= EPSILON {
                        shares.remove(&t);
                    } else {
                        shares.insert(t, held - sold);
                    }
                }
            }
            committed += 1;

            prop_assert!(portfolio.cash() >= 0.0);
            prop_assert!(portfolio.holdings().all(|lot| lot.num_shares > EPSILON));
        }

        let expected = cash
            + shares
                .iter()
                .map(|(t, n)| n * PRICES[*t])
                .sum::<f64>();
        let total = portfolio.total_value().unwrap();
        prop_assert!((total - expected).abs() <= 1e-6 * expected.max(1.0));
        prop_assert_eq!(portfolio.current_value().unwrap(), round3(total));
        prop_assert_eq!(portfolio.history().len(), committed);
        prop_assert_eq!(portfolio.holdings().count(), shares.len());
    }

    #[test]
    fn rejected_buys_leave_no_trace(amount in 1.0f64..10_000.0, excess in 0.01f64..1_000.0) {
        let d = date("2024-01-02");
        let mut portfolio = portfolio();
        portfolio.deposit(amount, d).unwrap();

        let cost = amount + excess;
        prop_assert!(portfolio.buy("A", cost / PRICES[0], cost, d).is_err());
        prop_assert_eq!(portfolio.cash(), amount);
        prop_assert_eq!(portfolio.history().len(), 1);
        prop_assert_eq!(portfolio.holdings().count(), 0);
    }
}
