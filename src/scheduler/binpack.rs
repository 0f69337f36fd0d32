//! Offline bin packing of weighted states.
//!
//! First-fit-decreasing: a deterministic O(n log n + n * bins) heuristic
//! that stays within a constant factor of the optimal group count. The
//! group count is not guaranteed minimal.

use tracing::debug;

/// Partition item indices into groups whose weight sums stay within
/// `ceiling`.
///
/// Items are placed in descending weight order into the first group with
/// room; ties are broken by original index, so the output is deterministic.
/// An item heavier than `ceiling` itself gets its own singleton group
/// rather than being dropped; the caller decides whether that is tolerable.
pub fn pack_bins(weights: &[f64], ceiling: f64) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        weights[b]
            .partial_cmp(&weights[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut sums: Vec<f64> = Vec::new();

    for idx in order {
        let weight = weights[idx];
        match sums.iter().position(|&sum| sum + weight <= ceiling) {
            Some(group) => {
                groups[group].push(idx);
                sums[group] += weight;
            }
            None => {
                groups.push(vec![idx]);
                sums.push(weight);
            }
        }
    }

    debug!(
        n_items = weights.len(),
        n_groups = groups.len(),
        ceiling,
        "packed states into groups"
    );
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(pack_bins(&[], 10.0).is_empty());
    }

    #[test]
    fn test_all_fit_in_one_group() {
        let groups = pack_bins(&[3.0, 2.0, 4.0], 10.0);
        assert_eq!(groups.len(), 1);
        // descending weight order within the group
        assert_eq!(groups[0], vec![2, 0, 1]);
    }

    #[test]
    fn test_pair_exceeding_ceiling_splits() {
        let groups = pack_bins(&[130.0, 152.0], 260.0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![1]);
        assert_eq!(groups[1], vec![0]);
    }

    #[test]
    fn test_group_sums_bounded() {
        let weights = [7.0, 3.0, 5.0, 2.0, 6.0, 1.0, 4.0];
        let ceiling = 10.0;
        let groups = pack_bins(&weights, ceiling);

        let mut seen = vec![false; weights.len()];
        for group in &groups {
            let sum: f64 = group.iter().map(|&i| weights[i]).sum();
            assert!(sum <= ceiling);
            for &i in group {
                assert!(!seen[i]);
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_oversized_item_is_singleton() {
        let groups = pack_bins(&[12.0, 3.0, 3.0], 10.0);
        assert!(groups.contains(&vec![0]));
        // the small items still pack together
        assert!(groups.iter().any(|g| g.len() == 2));
    }

    #[test]
    fn test_deterministic_on_ties() {
        let weights = [5.0, 5.0, 5.0, 5.0];
        assert_eq!(pack_bins(&weights, 10.0), pack_bins(&weights, 10.0));
        assert_eq!(pack_bins(&weights, 10.0), vec![vec![0, 1], vec![2, 3]]);
    }
}
