use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use thiserror::Error;

use crate::model::{ContentItem, Difficulty, SessionKind};
use crate::policy::{SessionPolicy, Strata};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("quiz pool is empty")]
    EmptyPool,

    #[error("quiz pool has {available} {difficulty} items, {required} required")]
    InsufficientPool {
        difficulty: Difficulty,
        required: usize,
        available: usize,
    },
}

//
// ─── SELECTOR ──────────────────────────────────────────────────────────────────
//

/// Draws the quiz for one session instance.
///
/// - First pass: a stratified draw per difficulty, presented easy → medium → hard.
/// - Review: a flat uniform draw from the whole pool.
///
/// In both cases each item's choices are reshuffled so that answer position
/// carries no information across attempts. Nothing is cached: call again for
/// every new instance.
#[derive(Debug, Clone)]
pub struct ContentSelector {
    strata: Strata,
    review_size: usize,
}

impl ContentSelector {
    #[must_use]
    pub fn new(strata: Strata, review_size: usize) -> Self {
        Self {
            strata,
            review_size,
        }
    }

    #[must_use]
    pub fn from_policy(policy: &SessionPolicy) -> Self {
        Self::new(policy.first_pass_strata, policy.review_quiz_size)
    }

    /// Select for the given flow.
    ///
    /// # Errors
    ///
    /// See [`ContentSelector::select_first_pass`] and [`ContentSelector::select_review`].
    pub fn select<R: Rng + ?Sized>(
        &self,
        kind: SessionKind,
        pool: &[ContentItem],
        rng: &mut R,
    ) -> Result<Vec<ContentItem>, SelectionError> {
        match kind {
            SessionKind::NewTopic => self.select_first_pass(pool, rng),
            SessionKind::Review => self.select_review(pool, rng),
        }
    }

    /// Stratified draw without replacement.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::InsufficientPool` if a difficulty tier has
    /// fewer items than the strata require.
    pub fn select_first_pass<R: Rng + ?Sized>(
        &self,
        pool: &[ContentItem],
        rng: &mut R,
    ) -> Result<Vec<ContentItem>, SelectionError> {
        if pool.is_empty() {
            return Err(SelectionError::EmptyPool);
        }

        let mut selected = Vec::with_capacity(self.strata.total());
        for difficulty in Difficulty::ALL {
            let required = self.strata.count(difficulty);
            if required == 0 {
                continue;
            }
            let tier: Vec<&ContentItem> = pool
                .iter()
                .filter(|item| item.difficulty() == difficulty)
                .collect();
            if tier.len() < required {
                return Err(SelectionError::InsufficientPool {
                    difficulty,
                    required,
                    available: tier.len(),
                });
            }
            selected.extend(
                tier.choose_multiple(rng, required)
                    .map(|item| item.with_shuffled_choices(rng)),
            );
        }
        Ok(selected)
    }

    /// Flat uniform draw ignoring difficulty. A pool smaller than the review
    /// size is used whole, in random order.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::EmptyPool` when there is nothing to draw.
    pub fn select_review<R: Rng + ?Sized>(
        &self,
        pool: &[ContentItem],
        rng: &mut R,
    ) -> Result<Vec<ContentItem>, SelectionError> {
        if pool.is_empty() {
            return Err(SelectionError::EmptyPool);
        }
        let take = self.review_size.min(pool.len());
        let mut picked: Vec<&ContentItem> = pool.choose_multiple(rng, take).collect();
        picked.shuffle(rng);
        Ok(picked
            .into_iter()
            .map(|item| item.with_shuffled_choices(rng))
            .collect())
    }
}

impl Default for ContentSelector {
    fn default() -> Self {
        Self::from_policy(&SessionPolicy::default())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::{HashMap, HashSet};

    fn item(id: u64, difficulty: Difficulty) -> ContentItem {
        ContentItem::new(
            ItemId::new(id),
            format!("Question {id}"),
            vec![
                format!("right {id}"),
                format!("wrong a {id}"),
                format!("wrong b {id}"),
                format!("wrong c {id}"),
            ],
            0,
            difficulty,
        )
        .unwrap()
    }

    /// 15 easy, 15 medium, 10 hard.
    fn generated_pool() -> Vec<ContentItem> {
        let mut pool = Vec::new();
        let mut id = 0;
        for (difficulty, n) in [
            (Difficulty::Easy, 15),
            (Difficulty::Medium, 15),
            (Difficulty::Hard, 10),
        ] {
            for _ in 0..n {
                id += 1;
                pool.push(item(id, difficulty));
            }
        }
        pool
    }

    #[test]
    fn first_pass_matches_strata_exactly() {
        let pool = generated_pool();
        let selector = ContentSelector::default();
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let quiz = selector.select_first_pass(&pool, &mut rng).unwrap();
            assert_eq!(quiz.len(), 10);

            let mut counts: HashMap<Difficulty, usize> = HashMap::new();
            for q in &quiz {
                *counts.entry(q.difficulty()).or_default() += 1;
            }
            assert_eq!(counts[&Difficulty::Easy], 4);
            assert_eq!(counts[&Difficulty::Medium], 4);
            assert_eq!(counts[&Difficulty::Hard], 2);

            let ids: HashSet<_> = quiz.iter().map(ContentItem::id).collect();
            assert_eq!(ids.len(), quiz.len(), "drawn without replacement");
        }
    }

    #[test]
    fn first_pass_is_ordered_by_difficulty() {
        let pool = generated_pool();
        let mut rng = StdRng::seed_from_u64(7);
        let quiz = ContentSelector::default()
            .select_first_pass(&pool, &mut rng)
            .unwrap();
        let tiers: Vec<_> = quiz.iter().map(ContentItem::difficulty).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
    }

    #[test]
    fn first_pass_reports_short_tier() {
        let pool: Vec<_> = generated_pool()
            .into_iter()
            .filter(|i| i.difficulty() != Difficulty::Hard || i.id().value() < 32)
            .collect();
        let mut rng = StdRng::seed_from_u64(1);
        let err = ContentSelector::default()
            .select_first_pass(&pool, &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            SelectionError::InsufficientPool {
                difficulty: Difficulty::Hard,
                required: 2,
                available: 1,
            }
        );
    }

    #[test]
    fn review_draws_flat_fixed_size() {
        let pool = generated_pool();
        let mut rng = StdRng::seed_from_u64(3);
        let quiz = ContentSelector::default()
            .select_review(&pool, &mut rng)
            .unwrap();
        assert_eq!(quiz.len(), 10);
        let ids: HashSet<_> = quiz.iter().map(ContentItem::id).collect();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn review_uses_small_pool_whole() {
        let pool = vec![item(1, Difficulty::Easy), item(2, Difficulty::Hard)];
        let mut rng = StdRng::seed_from_u64(3);
        let quiz = ContentSelector::default()
            .select_review(&pool, &mut rng)
            .unwrap();
        assert_eq!(quiz.len(), 2);
    }

    #[test]
    fn empty_pool_is_an_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let selector = ContentSelector::default();
        assert_eq!(
            selector.select(SessionKind::Review, &[], &mut rng),
            Err(SelectionError::EmptyPool)
        );
        assert_eq!(
            selector.select(SessionKind::NewTopic, &[], &mut rng),
            Err(SelectionError::EmptyPool)
        );
    }

    #[test]
    fn selected_items_keep_correct_answer_text() {
        let pool = generated_pool();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let quiz = ContentSelector::default()
                .select(SessionKind::NewTopic, &pool, &mut rng)
                .unwrap();
            for q in quiz {
                assert_eq!(
                    q.choices().correct_text(),
                    format!("right {}", q.id().value())
                );
            }
        }
    }

    #[test]
    fn redraws_differ_between_instances() {
        let pool = generated_pool();
        let selector = ContentSelector::default();
        let mut rng = StdRng::seed_from_u64(11);
        let a: Vec<_> = selector
            .select_review(&pool, &mut rng)
            .unwrap()
            .iter()
            .map(ContentItem::id)
            .collect();
        let b: Vec<_> = selector
            .select_review(&pool, &mut rng)
            .unwrap()
            .iter()
            .map(ContentItem::id)
            .collect();
        assert_ne!(a, b);
    }
}
