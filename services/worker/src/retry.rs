use crate::model::ReportStatus;

pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Bounded retries, no back-off beyond the poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back to `pending`, eligible on a later poll.
    Retry { retry_count: i32 },
    /// Terminal `failed`.
    GiveUp { retry_count: i32 },
}

impl RetryDecision {
    pub fn retry_count(self) -> i32 {
        match self {
            RetryDecision::Retry { retry_count } | RetryDecision::GiveUp { retry_count } => retry_count,
        }
    }

    pub fn status(self) -> ReportStatus {
        match self {
            RetryDecision::Retry { .. } => ReportStatus::Pending,
            RetryDecision::GiveUp { .. } => ReportStatus::Failed,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: i32) -> Self {
        Self { max_retries }
    }

    /// `current` is the retry count stored before this failure.
    pub fn on_failure(&self, current: i32) -> RetryDecision {
        let retry_count = current.max(0) + 1;
        if retry_count >= self.max_retries {
            RetryDecision::GiveUp { retry_count }
        } else {
            RetryDecision::Retry { retry_count }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gives_up_at_max() {
        let p = RetryPolicy::default();
        assert_eq!(p.on_failure(0), RetryDecision::Retry { retry_count: 1 });
        assert_eq!(p.on_failure(1), RetryDecision::Retry { retry_count: 2 });
        assert_eq!(p.on_failure(2), RetryDecision::GiveUp { retry_count: 3 });
        assert_eq!(p.on_failure(2).status(), ReportStatus::Failed);
    }

    #[test]
    fn exactly_max_minus_one_retries_before_failing() {
        for max in 1..=6 {
            let p = RetryPolicy::new(max);
            let mut count = 0;
            let mut back_to_pending = 0;
            loop {
                let d = p.on_failure(count);
                count = d.retry_count();
                if d.status() == ReportStatus::Failed {
                    break;
                }
                back_to_pending += 1;
            }
            assert_eq!(count, max);
            assert_eq!(back_to_pending, max - 1);
        }
    }
}
