use analysis_core::CorrelationMatrix;
use chrono::NaiveDate;
use futures_util::future::join_all;
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};

use crate::pricing::PriceSource;
use crate::shared_math::round_to;

/// Overlapping closes a pair needs before a coefficient is reported.
pub const MIN_OVERLAP: usize = 20;

/// Pearson coefficient over the common prefix, clamped to [-1, 1].
/// Zero when either side has no variance.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);

    let denom = xs.std_dev() * ys.std_dev();
    if !(denom > 1e-15) {
        return 0.0;
    }
    let r = xs.covariance(ys) / denom;
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Pearson correlation of daily returns over the dates both series share.
/// Zero when fewer than [`MIN_OVERLAP`] closes line up.
pub fn pair_correlation(a: &BTreeMap<NaiveDate, f64>, b: &BTreeMap<NaiveDate, f64>) -> f64 {
    let aligned: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|(date, ca)| b.get(date).map(|cb| (*ca, *cb)))
        .collect();

    if aligned.len() < MIN_OVERLAP {
        return 0.0;
    }

    let mut ra = Vec::with_capacity(aligned.len() - 1);
    let mut rb = Vec::with_capacity(aligned.len() - 1);
    for w in aligned.windows(2) {
        let (pa, pb) = w[0];
        let (na, nb) = w[1];
        if pa > 0.0 && pb > 0.0 {
            ra.push((na - pa) / pa);
            rb.push((nb - pb) / pb);
        }
    }

    round_to(pearson_correlation(&ra, &rb), 3)
}

/// Square matrix in `symbols` order with an exact 1.0 diagonal.
pub fn correlation_matrix(
    symbols: &[String],
    closes: &HashMap<String, BTreeMap<NaiveDate, f64>>,
) -> CorrelationMatrix {
    let empty = BTreeMap::new();
    let n = symbols.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..n {
            matrix[i][j] = if i == j {
                1.0
            } else {
                let a = closes.get(&symbols[i]).unwrap_or(&empty);
                let b = closes.get(&symbols[j]).unwrap_or(&empty);
                pair_correlation(a, b)
            };
        }
    }

    CorrelationMatrix {
        symbols: symbols.to_vec(),
        matrix,
    }
}

/// Fetches each symbol's trailing closes once, concurrently, then builds the
/// matrix. `None` for fewer than two symbols.
pub async fn compute_correlation_matrix(
    prices: &dyn PriceSource,
    symbols: &[String],
    window_days: i64,
) -> Option<CorrelationMatrix> {
    if symbols.len() < 2 {
        return None;
    }

    let fetched = join_all(symbols.iter().map(|symbol| async move {
        (symbol.clone(), prices.daily_closes(symbol, window_days).await)
    }))
    .await;
    let closes: HashMap<String, BTreeMap<NaiveDate, f64>> = fetched.into_iter().collect();

    Some(correlation_matrix(symbols, &closes))
}
