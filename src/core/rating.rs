//! Annotator trust scoring.
//!
//! A lightweight, explainable metric needing no ground truth: an
//! annotator who is internally consistent across repeated exposures to
//! the same control blobs (self score) and aligned with the consensus of
//! the other annotators (inter score) is trusted highly.
//!
//! All correlation is Spearman rank correlation, computed as Pearson over
//! average-tie ranks. Degenerate correlations (a rating sequence with
//! zero variance) are normalized to a neutral 1.0 instead of failing.

use crate::store::RatingTable;

/// Arithmetic mean. NaN on empty input, which the correlation guards catch.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// 1-based ranks with tied values assigned their average rank
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| {
        values[i]
            .partial_cmp(&values[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // average of the 1-based ranks i+1 ..= j+1
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            out[k] = rank;
        }
        i = j + 1;
    }
    out
}

/// Pearson correlation; None when either side has no variance
fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }

    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }

    let r = cov / (var_a.sqrt() * var_b.sqrt());
    r.is_finite().then_some(r)
}

/// Spearman rank correlation; None when degenerate
pub fn spearman(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    pearson(&ranks(a), &ranks(b))
}

/// Compute the trust score for one annotator, as a rounded percentage.
///
/// Returns None until the annotator has rated every control item they
/// have seen at least twice (self-consistency needs repeated exposures).
/// Pure function of the table snapshot; mutates nothing.
pub fn compute(table: &RatingTable, annotator: &str) -> Option<i64> {
    let series = table.annotators.get(annotator)?;

    // Control items the target has rated at least once, with their indices
    let rated: Vec<(usize, &Vec<f64>)> = series
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_empty())
        .collect();
    if rated.is_empty() {
        return None;
    }

    // Common exposure count across the rated items
    let common = rated.iter().map(|(_, s)| s.len()).min()?;
    if common <= 1 {
        return None;
    }

    let rows: Vec<&[f64]> = rated.iter().map(|(_, s)| &s[..common]).collect();
    let self_r = self_consistency(&rows);

    let target_means: Vec<f64> = rows.iter().map(|r| mean(r)).collect();
    let consensus = consensus_means(table, &rated);
    let inter_r = spearman(&target_means, &consensus).unwrap_or(1.0);

    Some(((self_r + inter_r) / 2.0 * 100.0).round() as i64)
}

/// Mean of the lower triangle (diagonal included) of the item-by-item
/// rank-correlation matrix. Any degenerate pair collapses the whole
/// score to the neutral 1.0.
fn self_consistency(rows: &[&[f64]]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..rows.len() {
        for j in 0..=i {
            match spearman(rows[i], rows[j]) {
                Some(r) => {
                    sum += r;
                    count += 1;
                }
                None => return 1.0,
            }
        }
    }
    if count == 0 {
        1.0
    } else {
        sum / count as f64
    }
}

/// Per-item consensus: for each control item the target rated, the mean
/// over every annotator (target included) of their own per-item mean,
/// each taken over that annotator's common exposure count.
fn consensus_means(table: &RatingTable, target_items: &[(usize, &Vec<f64>)]) -> Vec<f64> {
    target_items
        .iter()
        .map(|&(item, _)| {
            let mut per_annotator = Vec::new();
            for series in table.annotators.values() {
                let own_common = series
                    .iter()
                    .filter(|s| !s.is_empty())
                    .map(|s| s.len())
                    .min()
                    .unwrap_or(0);
                if own_common == 0 {
                    continue;
                }
                if let Some(ratings) = series.get(item) {
                    if !ratings.is_empty() {
                        let take = own_common.min(ratings.len());
                        per_annotator.push(mean(&ratings[..take]));
                    }
                }
            }
            mean(&per_annotator)
        })
        .collect()
}
