//! Lifecycle states

use std::fmt;

/// Why the lifecycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Early stopping fired during validation; testing is still allowed
    EarlyStopped,
    /// The test stage completed
    Tested,
}

/// Where the controller is
///
/// `Idle → Prepared → Training(k) → Validating(k) → Training(k+1) → ... →
/// Testing → Finished`. `Validating` is entered as soon as training of the
/// epoch completes; `validated` flips once the validation pass has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Prepared,
    Training { epoch: usize },
    Validating { epoch: usize, validated: bool },
    Testing,
    Finished { reason: FinishReason },
}

impl LifecycleState {
    pub fn is_finished(&self) -> bool {
        matches!(self, LifecycleState::Finished { .. })
    }

    /// Whether the test stage may start from here
    pub fn can_test(&self) -> bool {
        matches!(
            self,
            LifecycleState::Prepared
                | LifecycleState::Training { .. }
                | LifecycleState::Validating { .. }
                | LifecycleState::Finished { reason: FinishReason::EarlyStopped }
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Idle => f.write_str("Idle"),
            LifecycleState::Prepared => f.write_str("Prepared"),
            LifecycleState::Training { epoch } => write!(f, "Training({epoch})"),
            LifecycleState::Validating { epoch, validated: false } => {
                write!(f, "Validating({epoch}, pending)")
            }
            LifecycleState::Validating { epoch, validated: true } => write!(f, "Validating({epoch})"),
            LifecycleState::Testing => f.write_str("Testing"),
            LifecycleState::Finished { reason } => write!(f, "Finished({reason:?})"),
        }
    }
}
