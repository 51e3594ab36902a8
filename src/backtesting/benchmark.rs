//! Buy-and-hold benchmark and date alignment helpers

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::types::{PricePoint, TradeRecord};

/// Closing price of the benchmark index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub date: NaiveDateTime,
    pub close: f64,
}

/// Anything positioned on the timeline
pub trait Dated {
    fn date(&self) -> NaiveDateTime;
}

impl Dated for PricePoint {
    fn date(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for TradeRecord {
    fn date(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for BenchmarkPoint {
    fn date(&self) -> NaiveDateTime {
        self.date
    }
}

/// Cumulative return of holding the benchmark from its first close
pub fn benchmark_curve(prices: &[BenchmarkPoint]) -> EvalResult<Vec<(NaiveDateTime, f64)>> {
    let first = prices
        .first()
        .ok_or_else(|| EvalError::input("benchmark series is empty"))?;
    if first.close == 0.0 {
        return Err(EvalError::DivisionByZero { index: 0 });
    }

    Ok(prices
        .iter()
        .map(|p| (p.date, p.close / first.close - 1.0))
        .collect())
}

/// Buy-and-hold outcome of the benchmark over a date range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReturn {
    pub total_return: f64,
    /// `(1 + total)^(365 / days) - 1`, `NaN` for a zero-day range
    pub annual_return: f64,
}

/// Benchmark return over `range`, measured from the first close inside it
pub fn benchmark_return(
    prices: &[BenchmarkPoint],
    range: (NaiveDateTime, NaiveDateTime),
) -> EvalResult<BenchmarkReturn> {
    let clipped = clip_to_range(prices, range);
    let total_return = benchmark_curve(&clipped)?
        .last()
        .map(|(_, r)| *r)
        .unwrap_or(f64::NAN);

    let days = (range.1 - range.0).num_days();
    let annual_return = if days > 0 {
        (1.0 + total_return).powf(365.0 / days as f64) - 1.0
    } else {
        f64::NAN
    };

    Ok(BenchmarkReturn {
        total_return,
        annual_return,
    })
}

/// Intersection of the date spans of several series.
///
/// `None` when any series is empty or the spans do not overlap.
pub fn common_range<T: Dated>(series: &[&[T]]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let mut range: Option<(NaiveDateTime, NaiveDateTime)> = None;
    for s in series {
        let start = s.iter().map(Dated::date).min()?;
        let end = s.iter().map(Dated::date).max()?;
        range = Some(match range {
            None => (start, end),
            Some((lo, hi)) => (lo.max(start), hi.min(end)),
        });
    }
    range.filter(|(lo, hi)| lo <= hi)
}

/// Items whose date falls inside `[start, end]`
pub fn clip_to_range<T: Dated + Clone>(
    items: &[T],
    (start, end): (NaiveDateTime, NaiveDateTime),
) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.date() >= start && item.date() <= end)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn bench(days: &[u32], closes: &[f64]) -> Vec<BenchmarkPoint> {
        days.iter()
            .zip(closes)
            .map(|(d, c)| BenchmarkPoint {
                date: day(*d),
                close: *c,
            })
            .collect()
    }

    #[test]
    fn test_benchmark_curve_relative_to_first() {
        let curve = benchmark_curve(&bench(&[1, 2, 3], &[200.0, 210.0, 190.0])).unwrap();
        assert_eq!(curve[0].1, 0.0);
        assert!((curve[1].1 - 0.05).abs() < 1e-12);
        assert!((curve[2].1 + 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_benchmark_errors() {
        assert!(benchmark_curve(&[]).is_err());
        assert!(matches!(
            benchmark_curve(&bench(&[1], &[0.0])),
            Err(EvalError::DivisionByZero { index: 0 })
        ));
    }

    #[test]
    fn test_common_range_and_clip() {
        let a = bench(&[1, 2, 3, 4, 5], &[1.0; 5]);
        let b = bench(&[3, 4, 5, 6], &[1.0; 4]);
        let range = common_range(&[&a[..], &b[..]]).unwrap();
        assert_eq!(range, (day(3), day(5)));

        let clipped = clip_to_range(&a, range);
        assert_eq!(clipped.len(), 3);
        assert_eq!(clipped[0].date, day(3));
    }

    #[test]
    fn test_benchmark_return_over_range() {
        let prices = bench(&[1, 2, 3, 4, 5], &[90.0, 100.0, 105.0, 110.0, 80.0]);
        let r = benchmark_return(&prices, (day(2), day(4))).unwrap();
        assert!((r.total_return - 0.1).abs() < 1e-12);
        let expected = 1.1f64.powf(365.0 / 2.0) - 1.0;
        assert!((r.annual_return - expected).abs() / expected < 1e-12);

        let same_day = benchmark_return(&prices, (day(3), day(3))).unwrap();
        assert_eq!(same_day.total_return, 0.0);
        assert!(same_day.annual_return.is_nan());

        assert!(benchmark_return(&prices, (day(10), day(12))).is_err());
    }

    #[test]
    fn test_disjoint_ranges() {
        let a = bench(&[1, 2], &[1.0; 2]);
        let b = bench(&[5, 6], &[1.0; 2]);
        assert!(common_range(&[&a[..], &b[..]]).is_none());
        let empty: Vec<BenchmarkPoint> = Vec::new();
        assert!(common_range(&[&empty[..]]).is_none());
    }
}
