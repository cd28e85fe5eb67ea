//! Segment selection before the final surrogate refit
//!
//! Provides:
//! - Selection by coefficient magnitude of a full fit
//! - Greedy forward selection on weighted residual reduction

use crate::error::{LimeError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which segments enter the final surrogate fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentSelection {
    /// Keep every segment
    All,
    /// Fit on all segments, keep the `num_segments` largest |coefficient|
    ByWeight { num_segments: usize },
    /// Greedily add the segment that most reduces weighted residuals
    ForwardSelection { num_segments: usize },
}

impl Default for SegmentSelection {
    fn default() -> Self {
        SegmentSelection::All
    }
}

impl SegmentSelection {
    pub fn validate(&self) -> Result<()> {
        match self {
            SegmentSelection::ByWeight { num_segments }
            | SegmentSelection::ForwardSelection { num_segments }
                if *num_segments == 0 =>
            {
                Err(LimeError::invalid_parameter(
                    "selection.num_segments",
                    num_segments,
                    "must be >= 1",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Number of segments kept out of `total`
    pub fn target_size(&self, total: usize) -> usize {
        match self {
            SegmentSelection::All => total,
            SegmentSelection::ByWeight { num_segments }
            | SegmentSelection::ForwardSelection { num_segments } => (*num_segments).min(total),
        }
    }
}

/// Segment ids ordered by |value| descending, ties by lower id first
pub fn rank_by_magnitude(values: &[f64]) -> Vec<usize> {
    let mut ids: Vec<usize> = (0..values.len()).collect();
    ids.sort_by(|&a, &b| {
        values[b]
            .abs()
            .partial_cmp(&values[a].abs())
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    ids
}

/// Greedy forward selection
///
/// `residual_ss(subset)` returns the weighted residual sum of squares of a
/// fit restricted to `subset`, or `None` when that fit is singular. Each
/// step adds the candidate with the smallest residual (ties by lower id).
pub(crate) fn forward_select<F>(num_features: usize, target: usize, residual_ss: F) -> Result<Vec<usize>>
where
    F: Fn(&[usize]) -> Result<Option<f64>>,
{
    let mut selected: Vec<usize> = Vec::with_capacity(target);

    while selected.len() < target {
        let mut best: Option<(usize, f64)> = None;

        for candidate in (0..num_features).filter(|c| !selected.contains(c)) {
            let mut trial = selected.clone();
            trial.push(candidate);
            trial.sort_unstable();

            if let Some(rss) = residual_ss(&trial)? {
                let better = match best {
                    None => true,
                    Some((_, best_rss)) => rss < best_rss,
                };
                if better {
                    best = Some((candidate, rss));
                }
            }
        }

        match best {
            Some((candidate, _)) => selected.push(candidate),
            None if selected.is_empty() => {
                return Err(LimeError::SingularFit(
                    "forward selection found no segment with a non-singular fit".to_string(),
                ))
            }
            None => break,
        }
    }

    selected.sort_unstable();
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_by_magnitude_breaks_ties_by_id() {
        let ranked = rank_by_magnitude(&[1.0, -3.0, 2.0, -1.0, 3.0]);
        assert_eq!(ranked, vec![1, 4, 2, 0, 3]);
    }

    #[test]
    fn test_forward_select_picks_best_candidates() {
        // each feature reduces the residual by a fixed amount
        let gains = [0.1, 5.0, 0.3, 2.0];
        let picked = forward_select(4, 2, |subset| {
            let gain: f64 = subset.iter().map(|&j| gains[j]).sum();
            Ok(Some(10.0 - gain))
        })
        .unwrap();
        assert_eq!(picked, vec![1, 3]);
    }

    #[test]
    fn test_forward_select_skips_singular_candidates() {
        let picked = forward_select(3, 2, |subset| {
            if subset.contains(&0) {
                Ok(None)
            } else {
                Ok(Some(1.0 / subset.len() as f64))
            }
        })
        .unwrap();
        assert_eq!(picked, vec![1, 2]);
    }

    #[test]
    fn test_forward_select_all_singular() {
        let err = forward_select(2, 1, |_| Ok(None)).unwrap_err();
        assert!(matches!(err, LimeError::SingularFit(_)));
    }

    #[test]
    fn test_selection_validation() {
        assert!(SegmentSelection::ByWeight { num_segments: 0 }.validate().is_err());
        assert!(SegmentSelection::ForwardSelection { num_segments: 2 }.validate().is_ok());
        assert_eq!(SegmentSelection::ByWeight { num_segments: 9 }.target_size(4), 4);
    }
}
