//! Relative-strength signal engine.
//!
//! For every ticker in a [`RatioTable`] the engine looks at two trailing
//! calendar windows (a near one and a far one) ending at the analysis date:
//!
//! - `range_w = (latest - low_w) / (high_w - low_w)` places the latest ratio
//!   inside each window's band;
//! - `stochastic_difference = range_far - range_near` is the momentum term;
//! - the equilibrium is where the line through the two lows meets the line
//!   through the two highs, `potential = equilibrium / latest - 1` is the
//!   mean-reversion term;
//! - `metric = stochastic_difference + potential * multiplier`, where the
//!   multiplier is fitted across the whole cross-section of the call so the
//!   two terms have comparable magnitude.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use super::error::RatioTraderError;
use super::ratio::RatioTable;

pub const THREE_WEEKS: i64 = 21;
pub const THREE_MONTHS: i64 = 91;
pub const ONE_YEAR: i64 = 365;

/// Near and far trailing windows, in calendar days, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPair {
    pub near_days: i64,
    pub far_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizon {
    Short,
    Medium,
    Long,
}

impl Horizon {
    pub fn windows(self) -> WindowPair {
        match self {
            Horizon::Short => WindowPair {
                near_days: THREE_WEEKS,
                far_days: THREE_MONTHS,
            },
            Horizon::Medium => WindowPair {
                near_days: THREE_WEEKS,
                far_days: ONE_YEAR,
            },
            Horizon::Long => WindowPair {
                near_days: THREE_MONTHS,
                far_days: ONE_YEAR,
            },
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Horizon::Short => "short",
            Horizon::Medium => "medium",
            Horizon::Long => "long",
        };
        f.write_str(name)
    }
}

impl FromStr for Horizon {
    type Err = RatioTraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(Horizon::Short),
            "medium" => Ok(Horizon::Medium),
            "long" => Ok(Horizon::Long),
            other => Err(RatioTraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "horizon".into(),
                reason: format!("unknown horizon '{other}' (expected short, medium or long)"),
            }),
        }
    }
}

/// High/low of the finite ratios inside one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub high: f64,
    pub low: f64,
}

impl Band {
    fn over(dates: &[NaiveDate], values: &[f64], as_of: NaiveDate, days: i64) -> Option<Band> {
        dates
            .iter()
            .zip(values)
            .filter(|(date, value)| (as_of - **date).num_days() <= days && value.is_finite())
            .map(|(_, value)| *value)
            .fold(None, |band, value| match band {
                None => Some(Band {
                    high: value,
                    low: value,
                }),
                Some(b) => Some(Band {
                    high: b.high.max(value),
                    low: b.low.min(value),
                }),
            })
    }

    fn is_flat(&self) -> bool {
        self.high == self.low
    }

    /// Position of `value` inside the band, 0 at the low and 1 at the high.
    pub fn range(&self, value: f64) -> f64 {
        (value - self.low) / (self.high - self.low)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub ticker: String,
    pub latest: f64,
    pub near: Band,
    pub far: Band,
    pub near_range: f64,
    pub far_range: f64,
    pub stochastic_difference: f64,
    pub equilibrium: f64,
    pub potential: f64,
    pub metric: f64,
}

/// Per-ticker outcome of one [`SignalEngine::evaluate`] call.
#[derive(Debug)]
pub struct SignalReport {
    as_of: NaiveDate,
    windows: WindowPair,
    multiplier: f64,
    rows: Vec<(String, Result<SignalRow, RatioTraderError>)>,
}

impl SignalReport {
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn windows(&self) -> WindowPair {
        self.windows
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn rows(&self) -> &[(String, Result<SignalRow, RatioTraderError>)] {
        &self.rows
    }

    pub fn row(&self, ticker: &str) -> Option<&Result<SignalRow, RatioTraderError>> {
        self.rows.iter().find(|(t, _)| t == ticker).map(|(_, r)| r)
    }

    /// Metric for `ticker`, `None` if it is absent or indeterminate.
    pub fn metric(&self, ticker: &str) -> Option<f64> {
        match self.row(ticker) {
            Some(Ok(row)) => Some(row.metric),
            _ => None,
        }
    }

    pub fn determinate(&self) -> impl Iterator<Item = &SignalRow> {
        self.rows.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn indeterminate(&self) -> impl Iterator<Item = (&str, &RatioTraderError)> {
        self.rows
            .iter()
            .filter_map(|(t, r)| r.as_ref().err().map(|e| (t.as_str(), e)))
    }

    /// Determinate rows by metric, best first. Equal metrics sort by ticker.
    pub fn ranked(&self) -> Vec<&SignalRow> {
        let mut rows: Vec<&SignalRow> = self.determinate().collect();
        rows.sort_by(|a, b| {
            b.metric
                .total_cmp(&a.metric)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalEngine {
    windows: WindowPair,
}

impl SignalEngine {
    pub fn new(windows: WindowPair) -> Self {
        Self { windows }
    }

    pub fn for_horizon(horizon: Horizon) -> Self {
        Self::new(horizon.windows())
    }

    pub fn windows(&self) -> WindowPair {
        self.windows
    }

    pub fn evaluate(
        &self,
        ratios: &RatioTable,
        as_of: NaiveDate,
    ) -> Result<SignalReport, RatioTraderError> {
        let visible = ratios.dates.partition_point(|d| *d <= as_of);
        let dates = &ratios.dates[..visible];

        let partial: Vec<(String, Result<SignalRow, RatioTraderError>)> = ratios
            .tickers
            .iter()
            .zip(&ratios.columns)
            .map(|(ticker, column)| {
                let row = self.analyze(ticker, dates, &column[..visible], as_of);
                (ticker.clone(), row)
            })
            .collect();

        let multiplier = cross_sectional_multiplier(&partial)?;

        let rows = partial
            .into_iter()
            .map(|(ticker, row)| {
                let row = row.map(|mut r| {
                    r.metric = r.stochastic_difference + r.potential * multiplier;
                    r
                });
                (ticker, row)
            })
            .collect();

        Ok(SignalReport {
            as_of,
            windows: self.windows,
            multiplier,
            rows,
        })
    }

    /// Everything but the metric, which needs the whole cross-section.
    fn analyze(
        &self,
        ticker: &str,
        dates: &[NaiveDate],
        values: &[f64],
        as_of: NaiveDate,
    ) -> Result<SignalRow, RatioTraderError> {
        let indeterminate = |reason: &str| RatioTraderError::IndeterminateSignal {
            ticker: ticker.to_string(),
            reason: reason.to_string(),
        };

        let latest = values
            .iter()
            .rev()
            .copied()
            .find(|v| v.is_finite())
            .ok_or_else(|| indeterminate("no observations"))?;

        let near = Band::over(dates, values, as_of, self.windows.near_days)
            .ok_or_else(|| indeterminate("no observations in near window"))?;
        let far = Band::over(dates, values, as_of, self.windows.far_days)
            .ok_or_else(|| indeterminate("no observations in far window"))?;

        if near.is_flat() {
            return Err(indeterminate("flat near window"));
        }
        if far.is_flat() {
            return Err(indeterminate("flat far window"));
        }

        let near_range = near.range(latest);
        let far_range = far.range(latest);
        let stochastic_difference = far_range - near_range;

        let denominator = far.high - near.high + near.low - far.low;
        if denominator == 0.0 {
            return Err(indeterminate("coincident window bands"));
        }
        let equilibrium = (near.low * far.high - far.low * near.high) / denominator;
        let potential = equilibrium / latest - 1.0;
        if !potential.is_finite() {
            return Err(indeterminate("non-finite potential"));
        }

        Ok(SignalRow {
            ticker: ticker.to_string(),
            latest,
            near,
            far,
            near_range,
            far_range,
            stochastic_difference,
            equilibrium,
            potential,
            metric: f64::NAN,
        })
    }
}

/// `min |(1 - stochastic_difference) / potential|` over the determinate rows.
///
/// Zero potential contributes +inf. Fails when no finite candidate is left.
fn cross_sectional_multiplier(
    rows: &[(String, Result<SignalRow, RatioTraderError>)],
) -> Result<f64, RatioTraderError> {
    let best = rows
        .iter()
        .filter_map(|(_, r)| r.as_ref().ok())
        .map(|row| {
            let candidate = if row.potential == 0.0 {
                f64::INFINITY
            } else {
                ((1.0 - row.stochastic_difference) / row.potential).abs()
            };
            (row.ticker.as_str(), candidate)
        })
        .filter(|(_, c)| !c.is_nan())
        .min_by(|a, b| a.1.total_cmp(&b.1));

    match best {
        Some((_, multiplier)) if multiplier.is_finite() => Ok(multiplier),
        Some((ticker, _)) => Err(RatioTraderError::IndeterminateSignal {
            ticker: ticker.to_string(),
            reason: "zero potential leaves the metric multiplier undefined".into(),
        }),
        None => Err(RatioTraderError::IndeterminateSignal {
            ticker: "*".into(),
            reason: "no ticker has a determinate signal".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn ratios(columns: Vec<(&str, Vec<f64>)>) -> RatioTable {
        let len = columns[0].1.len();
        RatioTable {
            dates: (1..=len as u32).map(d).collect(),
            tickers: columns.iter().map(|(t, _)| t.to_string()).collect(),
            columns: columns.into_iter().map(|(_, c)| c).collect(),
        }
    }

    fn small_windows() -> SignalEngine {
        SignalEngine::new(WindowPair {
            near_days: 3,
            far_days: 10,
        })
    }

    // days 7..=10 form the near window, days 1..=10 the far one
    fn x_series() -> Vec<f64> {
        vec![80.0, 100.0, 120.0, 100.0, 100.0, 100.0, 95.0, 100.0, 110.0, 105.0]
    }

    #[test]
    fn horizons_pair_expected_windows() {
        assert_eq!(
            Horizon::Short.windows(),
            WindowPair {
                near_days: 21,
                far_days: 91
            }
        );
        assert_eq!(
            Horizon::Medium.windows(),
            WindowPair {
                near_days: 21,
                far_days: 365
            }
        );
        assert_eq!(
            Horizon::Long.windows(),
            WindowPair {
                near_days: 91,
                far_days: 365
            }
        );
    }

    #[test]
    fn horizon_parses_case_insensitively() {
        assert_eq!("Long".parse::<Horizon>().unwrap(), Horizon::Long);
        assert_eq!(" short ".parse::<Horizon>().unwrap(), Horizon::Short);
        assert!("weekly".parse::<Horizon>().is_err());
        assert_eq!(Horizon::Medium.to_string(), "medium");
    }

    #[test]
    fn single_ticker_closed_form() {
        let table = ratios(vec![("X", x_series())]);
        let report = small_windows().evaluate(&table, d(10)).unwrap();
        let row = report.row("X").unwrap().as_ref().unwrap();

        assert_relative_eq!(row.latest, 105.0);
        assert_eq!(row.near, Band { high: 110.0, low: 95.0 });
        assert_eq!(row.far, Band { high: 120.0, low: 80.0 });
        assert_relative_eq!(row.near_range, 10.0 / 15.0, epsilon = 1e-12);
        assert_relative_eq!(row.far_range, 25.0 / 40.0, epsilon = 1e-12);
        assert_relative_eq!(row.stochastic_difference, -1.0 / 24.0, epsilon = 1e-12);
        assert_relative_eq!(row.equilibrium, 104.0, epsilon = 1e-12);
        assert_relative_eq!(row.potential, -1.0 / 105.0, epsilon = 1e-12);
        assert_relative_eq!(report.multiplier(), 109.375, epsilon = 1e-9);
        assert_relative_eq!(row.metric, -26.0 / 24.0, epsilon = 1e-9);
    }

    #[test]
    fn multiplier_is_cross_sectional_minimum() {
        let y: Vec<f64> = x_series().iter().map(|v| 200.0 - v).collect();
        let table = ratios(vec![("X", x_series()), ("Y", y)]);
        let report = small_windows().evaluate(&table, d(10)).unwrap();

        let candidates: Vec<f64> = report
            .determinate()
            .map(|r| ((1.0 - r.stochastic_difference) / r.potential).abs())
            .collect();
        assert_eq!(candidates.len(), 2);
        let min = candidates.iter().copied().fold(f64::INFINITY, f64::min);
        assert_relative_eq!(report.multiplier(), min, epsilon = 1e-12);

        for row in report.determinate() {
            assert_relative_eq!(
                row.metric,
                row.stochastic_difference + row.potential * min,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn flat_series_is_indeterminate_and_excluded() {
        let table = ratios(vec![("X", x_series()), ("FLAT", vec![50.0; 10])]);
        let report = small_windows().evaluate(&table, d(10)).unwrap();

        let flat = report.row("FLAT").unwrap();
        assert!(matches!(
            flat,
            Err(RatioTraderError::IndeterminateSignal { ticker, .. }) if ticker == "FLAT"
        ));
        // the multiplier is the one X alone would produce
        assert_relative_eq!(report.multiplier(), 109.375, epsilon = 1e-9);
        assert_eq!(report.ranked().len(), 1);
        assert_eq!(report.indeterminate().count(), 1);
        assert_eq!(report.metric("FLAT"), None);
    }

    #[test]
    fn no_determinate_rows_is_an_error() {
        let table = ratios(vec![("A", vec![1.0; 10]), ("B", vec![2.0; 10])]);
        let err = small_windows().evaluate(&table, d(10)).unwrap_err();
        assert!(matches!(err, RatioTraderError::IndeterminateSignal { .. }));
    }

    #[test]
    fn zero_potential_everywhere_is_an_error() {
        // latest sits exactly on the equilibrium: near 95..110, far 80..120 -> E = 104
        let mut series = x_series();
        series[9] = 104.0;
        let table = ratios(vec![("X", series)]);
        let err = small_windows().evaluate(&table, d(10)).unwrap_err();
        assert!(matches!(
            err,
            RatioTraderError::IndeterminateSignal { ticker, .. } if ticker == "X"
        ));
    }

    #[test]
    fn zero_potential_row_keeps_its_momentum_metric() {
        let mut on_equilibrium = x_series();
        on_equilibrium[9] = 104.0;
        let table = ratios(vec![("X", x_series()), ("Z", on_equilibrium)]);
        let report = small_windows().evaluate(&table, d(10)).unwrap();
        let z = report.row("Z").unwrap().as_ref().unwrap();
        assert_relative_eq!(z.potential, 0.0, epsilon = 1e-12);
        assert_relative_eq!(z.metric, z.stochastic_difference, epsilon = 1e-12);
        assert_relative_eq!(report.multiplier(), 109.375, epsilon = 1e-9);
    }

    #[test]
    fn rows_after_as_of_are_ignored() {
        let mut series = x_series();
        series.push(500.0);
        series.push(1.0);
        let table = ratios(vec![("X", series)]);
        let report = small_windows().evaluate(&table, d(10)).unwrap();
        let row = report.row("X").unwrap().as_ref().unwrap();
        assert_relative_eq!(row.latest, 105.0);
        assert_eq!(row.far, Band { high: 120.0, low: 80.0 });
    }

    #[test]
    fn missing_values_are_skipped() {
        let mut series = x_series();
        series[9] = f64::NAN;
        series[0] = f64::NAN;
        let table = ratios(vec![("X", series)]);
        let report = small_windows().evaluate(&table, d(10)).unwrap();
        let row = report.row("X").unwrap().as_ref().unwrap();
        assert_relative_eq!(row.latest, 110.0);
        assert_eq!(row.far, Band { high: 120.0, low: 95.0 });
    }

    #[test]
    fn window_boundary_is_inclusive() {
        // day 7 is exactly 3 days before day 10 and carries the near low
        let table = ratios(vec![("X", x_series())]);
        let report = small_windows().evaluate(&table, d(10)).unwrap();
        let row = report.row("X").unwrap().as_ref().unwrap();
        assert_eq!(row.near.low, 95.0);
    }

    #[test]
    fn ranked_orders_by_metric_descending() {
        let y: Vec<f64> = x_series().iter().map(|v| 200.0 - v).collect();
        let table = ratios(vec![("X", x_series()), ("Y", y)]);
        let report = small_windows().evaluate(&table, d(10)).unwrap();
        let ranked = report.ranked();
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].metric >= ranked[1].metric);
    }
}
