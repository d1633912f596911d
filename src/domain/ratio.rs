//! Benchmark-relative price ratios.

use chrono::NaiveDate;

use super::error::RatioTraderError;
use super::price_table::PriceTable;

/// Prices divided by the benchmark on the same day, rescaled by the
/// benchmark's latest price so values stay on the order of real prices.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioTable {
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

impl RatioTable {
    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// `ratio(t, x) = price(t, x) / price(t, benchmark) * price(latest, benchmark)`.
///
/// A zero or missing benchmark price yields NaN for that row.
pub fn normalize(prices: &PriceTable, benchmark: &str) -> Result<RatioTable, RatioTraderError> {
    let bench = prices.require_column(benchmark)?;
    let scale = bench
        .iter()
        .rev()
        .copied()
        .find(|p| p.is_finite())
        .unwrap_or(f64::NAN);

    let columns = prices
        .tickers()
        .iter()
        .map(|ticker| {
            let column = prices.require_column(ticker)?;
            Ok(column
                .iter()
                .zip(bench)
                .map(|(&price, &base)| {
                    if base == 0.0 || !base.is_finite() {
                        f64::NAN
                    } else {
                        price / base * scale
                    }
                })
                .collect())
        })
        .collect::<Result<Vec<Vec<f64>>, RatioTraderError>>()?;

    Ok(RatioTable {
        dates: prices.dates().to_vec(),
        tickers: prices.tickers().to_vec(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn normalizes_against_latest_benchmark() {
        let prices = PriceTable::new(
            vec![d(1), d(4), d(5)],
            vec![
                ("A".into(), vec![10.0, 20.0, 30.0]),
                ("IDX".into(), vec![100.0, 200.0, 300.0]),
            ],
        )
        .unwrap();

        let ratios = normalize(&prices, "IDX").unwrap();
        let a = ratios.column("A").unwrap();
        for value in a {
            assert_relative_eq!(*value, 30.0, epsilon = 1e-12);
        }
        let idx = ratios.column("IDX").unwrap();
        for value in idx {
            assert_relative_eq!(*value, 300.0, epsilon = 1e-12);
        }
        assert_eq!(ratios.dates, vec![d(1), d(4), d(5)]);
    }

    #[test]
    fn missing_benchmark_column() {
        let prices = PriceTable::new(vec![d(1)], vec![("A".into(), vec![1.0])]).unwrap();
        let err = normalize(&prices, "IDX").unwrap_err();
        assert!(matches!(err, RatioTraderError::MissingColumn { column } if column == "IDX"));
    }

    #[test]
    fn zero_benchmark_price_gives_nan() {
        let prices = PriceTable::new(
            vec![d(1), d(4)],
            vec![
                ("A".into(), vec![10.0, 20.0]),
                ("IDX".into(), vec![0.0, 50.0]),
            ],
        )
        .unwrap();
        let ratios = normalize(&prices, "IDX").unwrap();
        let a = ratios.column("A").unwrap();
        assert!(a[0].is_nan());
        assert_relative_eq!(a[1], 20.0, epsilon = 1e-12);
    }

    #[test]
    fn view_uses_its_own_latest_benchmark() {
        let prices = PriceTable::new(
            vec![d(1), d(4), d(5)],
            vec![
                ("A".into(), vec![10.0, 10.0, 10.0]),
                ("IDX".into(), vec![100.0, 200.0, 400.0]),
            ],
        )
        .unwrap();
        let ratios = normalize(&prices.view_through(d(4)), "IDX").unwrap();
        assert_eq!(ratios.len(), 2);
        let a = ratios.column("A").unwrap();
        assert_relative_eq!(a[0], 20.0, epsilon = 1e-12);
        assert_relative_eq!(a[1], 10.0, epsilon = 1e-12);
    }
}
