//! Bounded top-K selection
//!
//! A min-heap of at most K entries: push until full, then pop-and-push
//! whenever a candidate beats the current minimum. O(n log k) time,
//! O(k) space, fully deterministic ordering.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::domain::CatalogItem;

/// Exposes the deterministic tie-break keys: rating descending, then id
/// ascending. Applied after the primary score for every strategy.
pub trait Rankable {
    fn rank_rating(&self) -> f64;
    fn rank_id(&self) -> u64;
}

impl Rankable for CatalogItem {
    fn rank_rating(&self) -> f64 {
        self.rating
    }

    fn rank_id(&self) -> u64 {
        self.id.0
    }
}

#[derive(Debug, Clone, Copy)]
struct HeapItem {
    score: f64,
    rating: f64,
    id: u64,
    idx: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    /// Greater = more preferable: higher score, then higher rating, then
    /// smaller id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.rating.total_cmp(&other.rating))
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Select the top `k` candidates by `score_fn`, best first.
///
/// When `k >= candidates.len()` the full set is returned, sorted by the
/// same comparator. `k == 0` yields an empty list. Limits arrive as
/// `usize`, so the negative-k case is unrepresentable at this boundary;
/// the service rejects zero limits before ranking.
pub fn top_k<T, F>(candidates: &[T], k: usize, score_fn: F) -> Vec<T>
where
    T: Rankable + Clone,
    F: Fn(&T) -> f64,
{
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<HeapItem>> = BinaryHeap::with_capacity(k + 1);
    for (idx, candidate) in candidates.iter().enumerate() {
        let item = HeapItem {
            score: score_fn(candidate),
            rating: candidate.rank_rating(),
            id: candidate.rank_id(),
            idx,
        };
        if heap.len() < k {
            heap.push(Reverse(item));
        } else if item > heap.peek().expect("non-empty heap").0 {
            heap.pop();
            heap.push(Reverse(item));
        }
    }

    let mut selected: Vec<HeapItem> = heap.into_iter().map(|r| r.0).collect();
    selected.sort_by(|a, b| b.cmp(a));
    selected
        .into_iter()
        .map(|h| candidates[h.idx].clone())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemId;
    use proptest::prelude::*;

    fn book(id: u64, rating: f64) -> CatalogItem {
        CatalogItem {
            id: ItemId::new(id),
            title: format!("Book {id}"),
            author: "Author".to_string(),
            genre: "genre".to_string(),
            rating,
            ratings_count: 0,
            price: 10.0,
            published_year: 2020,
        }
    }

    #[test]
    fn test_top_k_selects_highest_scores() {
        // topK([{id:1,rating:3},{id:2,rating:5},{id:3,rating:4}], 2) => [2, 3]
        let items = vec![book(1, 3.0), book(2, 5.0), book(3, 4.0)];
        let top = top_k(&items, 2, |b| b.rating);
        let ids: Vec<u64> = top.iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_k_larger_than_input_returns_all_sorted() {
        let items = vec![book(1, 3.0), book(2, 5.0), book(3, 4.0)];
        let top = top_k(&items, 10, |b| b.rating);
        let ids: Vec<u64> = top.iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_k_zero_returns_empty() {
        let items = vec![book(1, 3.0)];
        assert!(top_k(&items, 0, |b| b.rating).is_empty());
    }

    #[test]
    fn test_ties_broken_by_rating_then_id() {
        // Same primary score everywhere: order must be rating desc, id asc
        let items = vec![book(3, 4.0), book(1, 4.0), book(2, 5.0)];
        let top = top_k(&items, 3, |_| 1.0);
        let ids: Vec<u64> = top.iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let items: Vec<_> = (0..50).map(|i| book(i, (i % 7) as f64 / 2.0)).collect();
        let a = top_k(&items, 10, |b| b.rating);
        let b = top_k(&items, 10, |b| b.rating);
        assert_eq!(
            a.iter().map(|x| x.id).collect::<Vec<_>>(),
            b.iter().map(|x| x.id).collect::<Vec<_>>()
        );
    }

    proptest! {
        /// Exactly min(k, n) items come back, and every selected score is
        /// >= every unselected score.
        #[test]
        fn prop_top_k_dominates_unselected(
            ratings in proptest::collection::vec(0.0f64..5.0, 0..60),
            k in 0usize..20,
        ) {
            let items: Vec<_> = ratings
                .iter()
                .enumerate()
                .map(|(i, r)| book(i as u64, *r))
                .collect();
            let top = top_k(&items, k, |b| b.rating);

            prop_assert_eq!(top.len(), k.min(items.len()));

            if let Some(worst) = top.last() {
                let selected: std::collections::HashSet<u64> =
                    top.iter().map(|b| b.id.0).collect();
                for item in &items {
                    if !selected.contains(&item.id.0) {
                        prop_assert!(item.rating <= worst.rating + 1e-9);
                    }
                }
            }
        }

        /// Output is sorted best-first by (score, rating, id) with the heap
        /// and by a plain sort: both must agree.
        #[test]
        fn prop_matches_full_sort(
            ratings in proptest::collection::vec(0.0f64..5.0, 1..40),
            k in 1usize..15,
        ) {
            let items: Vec<_> = ratings
                .iter()
                .enumerate()
                .map(|(i, r)| book(i as u64, *r))
                .collect();

            let mut sorted = items.clone();
            sorted.sort_by(|a, b| {
                b.rating
                    .total_cmp(&a.rating)
                    .then_with(|| a.id.0.cmp(&b.id.0))
            });
            sorted.truncate(k);

            let top = top_k(&items, k, |b| b.rating);
            prop_assert_eq!(
                top.iter().map(|b| b.id.0).collect::<Vec<_>>(),
                sorted.iter().map(|b| b.id.0).collect::<Vec<_>>()
            );
        }
    }
}
