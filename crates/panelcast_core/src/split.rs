//! Data split tags for train/validation/test.

use serde::{Deserialize, Serialize};

/// The split a dataset, loader or mask belongs to.
///
/// The three splits partition a panel: every row carries a positive
/// sample flag in exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Split {
    /// Training split, sampled with shuffling.
    #[default]
    Train,
    /// Validation split, used for early stopping and tuning.
    Valid,
    /// Test split, used for final scoring.
    Test,
}

impl Split {
    /// Check if this is the training split.
    #[must_use]
    pub const fn is_train(&self) -> bool {
        matches!(self, Split::Train)
    }

    /// Check if this is an evaluation split (valid or test).
    #[must_use]
    pub const fn is_eval(&self) -> bool {
        matches!(self, Split::Valid | Split::Test)
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Valid => write!(f, "valid"),
            Split::Test => write!(f, "test"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_checks() {
        assert!(Split::Train.is_train());
        assert!(!Split::Train.is_eval());
        assert!(Split::Valid.is_eval());
        assert!(Split::Test.is_eval());
    }

    #[test]
    fn test_split_display() {
        assert_eq!(format!("{}", Split::Train), "train");
        assert_eq!(format!("{}", Split::Test), "test");
    }
}
