use serde::{Deserialize, Serialize};

/// The terminal outcome of a PMG run (C12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Blocked,
    UserCancelled,
    DryRun,
    Error,
    InsecureBypass,
}

impl Outcome {
    /// Map to a process exit status. `child_exit_code` is used verbatim for `Success`
    /// when the wrapped package manager completed and nothing was blocked.
    pub fn exit_code(self, child_exit_code: Option<i32>) -> i32 {
        match self {
            Outcome::Success | Outcome::DryRun | Outcome::InsecureBypass => {
                if self == Outcome::Success {
                    child_exit_code.unwrap_or(0)
                } else {
                    0
                }
            }
            Outcome::Blocked | Outcome::UserCancelled | Outcome::Error => 1,
        }
    }
}

/// Pure inputs to the outcome reduction (§4.12). Equal inputs always yield an equal
/// `Outcome` — this function must never read ambient state.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeInputs {
    pub insecure_mode: bool,
    pub dry_run: bool,
    pub blocked_count: usize,
    pub user_cancelled_count: usize,
    pub has_error: bool,
}

/// Reduce `(insecure_mode, dry_run, blocked_count, user_cancelled_count, err)` to a single
/// terminal [`Outcome`]. Precedence, highest first:
/// 1. an error with no blocks,
/// 2. insecure bypass,
/// 3. dry run,
/// 4. user cancellation,
/// 5. a block,
/// 6. success.
///
/// Blocks preempt errors (I6): a run that both hit a network error analyzing one package
/// and found another malicious still reports `Blocked`, not `Error`.
pub fn infer_outcome(inputs: OutcomeInputs) -> Outcome {
    if inputs.has_error && inputs.blocked_count == 0 {
        return Outcome::Error;
    }
    if inputs.insecure_mode {
        return Outcome::InsecureBypass;
    }
    if inputs.dry_run {
        return Outcome::DryRun;
    }
    if inputs.user_cancelled_count > 0 {
        return Outcome::UserCancelled;
    }
    if inputs.blocked_count > 0 {
        return Outcome::Blocked;
    }
    Outcome::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> OutcomeInputs {
        OutcomeInputs {
            insecure_mode: false,
            dry_run: false,
            blocked_count: 0,
            user_cancelled_count: 0,
            has_error: false,
        }
    }

    #[test]
    fn default_is_success() {
        assert_eq!(infer_outcome(base()), Outcome::Success);
    }

    #[test]
    fn error_without_blocks_is_error() {
        let inputs = OutcomeInputs {
            has_error: true,
            ..base()
        };
        assert_eq!(infer_outcome(inputs), Outcome::Error);
    }

    #[test]
    fn blocks_preempt_errors() {
        let inputs = OutcomeInputs {
            has_error: true,
            blocked_count: 1,
            ..base()
        };
        assert_eq!(infer_outcome(inputs), Outcome::Blocked);
    }

    #[test]
    fn insecure_bypass_wins_over_blocks() {
        let inputs = OutcomeInputs {
            insecure_mode: true,
            blocked_count: 3,
            ..base()
        };
        assert_eq!(infer_outcome(inputs), Outcome::InsecureBypass);
    }

    #[test]
    fn dry_run_beats_blocks_but_not_insecure() {
        let inputs = OutcomeInputs {
            dry_run: true,
            blocked_count: 1,
            ..base()
        };
        assert_eq!(infer_outcome(inputs), Outcome::DryRun);
    }

    #[test]
    fn user_cancelled_beats_blocked() {
        let inputs = OutcomeInputs {
            user_cancelled_count: 1,
            blocked_count: 1,
            ..base()
        };
        assert_eq!(infer_outcome(inputs), Outcome::UserCancelled);
    }

    #[test]
    fn is_pure() {
        let a = OutcomeInputs {
            blocked_count: 2,
            ..base()
        };
        let b = a;
        assert_eq!(infer_outcome(a), infer_outcome(b));
    }

    #[test]
    fn exit_codes_match_spec() {
        assert_eq!(Outcome::Success.exit_code(Some(0)), 0);
        assert_eq!(Outcome::Success.exit_code(Some(7)), 7);
        assert_eq!(Outcome::DryRun.exit_code(None), 0);
        assert_eq!(Outcome::InsecureBypass.exit_code(None), 0);
        assert_eq!(Outcome::Blocked.exit_code(None), 1);
        assert_eq!(Outcome::UserCancelled.exit_code(None), 1);
        assert_eq!(Outcome::Error.exit_code(None), 1);
    }
}
