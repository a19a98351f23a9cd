use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChoiceError {
    #[error("a question needs at least two choices, got {count}")]
    TooFewChoices { count: usize },

    #[error("choice {index} is blank")]
    BlankChoice { index: usize },

    #[error("correct choice {index} is out of range for {len} choices")]
    CorrectIndexOutOfRange { index: usize, len: usize },
}

/// Ordered answer options with the index of the correct one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceSet {
    choices: Vec<String>,
    correct: usize,
}

impl ChoiceSet {
    /// # Errors
    ///
    /// Returns `ChoiceError` if fewer than two choices are given, any choice is
    /// blank, or `correct` does not point at a choice.
    pub fn new(choices: Vec<String>, correct: usize) -> Result<Self, ChoiceError> {
        if choices.len() < 2 {
            return Err(ChoiceError::TooFewChoices {
                count: choices.len(),
            });
        }
        if let Some(index) = choices.iter().position(|c| c.trim().is_empty()) {
            return Err(ChoiceError::BlankChoice { index });
        }
        if correct >= choices.len() {
            return Err(ChoiceError::CorrectIndexOutOfRange {
                index: correct,
                len: choices.len(),
            });
        }
        Ok(Self { choices, correct })
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct
    }

    #[must_use]
    pub fn correct_text(&self) -> &str {
        &self.choices[self.correct]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// `false` for out-of-range selections as well as wrong ones.
    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        selected == self.correct
    }

    /// Returns a copy with the choices permuted and the correct index
    /// remapped so it still points at the same text.
    #[must_use]
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..self.choices.len()).collect();
        order.shuffle(rng);

        let mut correct = self.correct;
        let choices = order
            .iter()
            .enumerate()
            .map(|(new_index, &old_index)| {
                if old_index == self.correct {
                    correct = new_index;
                }
                self.choices[old_index].clone()
            })
            .collect();

        Self { choices, correct }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn four() -> ChoiceSet {
        ChoiceSet::new(
            vec!["alpha".into(), "beta".into(), "gamma".into(), "delta".into()],
            2,
        )
        .unwrap()
    }

    #[test]
    fn rejects_single_choice() {
        let err = ChoiceSet::new(vec!["only".into()], 0).unwrap_err();
        assert_eq!(err, ChoiceError::TooFewChoices { count: 1 });
    }

    #[test]
    fn rejects_blank_choice() {
        let err = ChoiceSet::new(vec!["a".into(), "  ".into()], 0).unwrap_err();
        assert_eq!(err, ChoiceError::BlankChoice { index: 1 });
    }

    #[test]
    fn rejects_out_of_range_correct_index() {
        let err = ChoiceSet::new(vec!["a".into(), "b".into()], 2).unwrap_err();
        assert!(matches!(err, ChoiceError::CorrectIndexOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn shuffle_keeps_correct_text() {
        let original = four();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = original.shuffled(&mut rng);
            assert_eq!(shuffled.correct_text(), "gamma");
            assert_eq!(shuffled.len(), original.len());

            let mut sorted = shuffled.choices().to_vec();
            sorted.sort();
            let mut expected = original.choices().to_vec();
            expected.sort();
            assert_eq!(sorted, expected);
        }
    }

    #[test]
    fn shuffle_moves_correct_position_across_seeds() {
        let original = four();
        let positions: std::collections::HashSet<usize> = (0..64)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                original.shuffled(&mut rng).correct_index()
            })
            .collect();
        assert!(positions.len() > 1);
    }
}
