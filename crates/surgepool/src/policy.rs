use core::num::NonZeroUsize;

/// Heuristic deciding when the pool adds a worker.
///
/// The policy is consulted once after every accepted submission, while the
/// pool's control lock is held. It only ever answers "grow by one" or "stay";
/// the pool never scales down.
///
/// Every variant is additionally capped by the configured maximum worker
/// count, so a policy can never push the pool past `max_workers`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScalePolicy {
    /// Grow by one worker whenever the number of queued tasks exceeds the
    /// number of workers.
    ///
    /// Under a burst this adds a worker on nearly every submission until the
    /// maximum is reached.
    #[default]
    Backlog,

    /// Grow by one worker whenever the number of queued tasks exceeds
    /// `workers * n`.
    ///
    /// Larger values tolerate a deeper backlog per worker before spawning,
    /// which dampens the reaction to short bursts.
    BacklogPerWorker(NonZeroUsize),

    /// Never grow past the initial worker count.
    Fixed,
}

impl ScalePolicy {
    /// Returns `true` if the pool should spawn one more worker given the
    /// current queue depth and worker count.
    #[must_use]
    pub fn should_grow(&self, queued: usize, workers: usize, max_workers: usize) -> bool {
        if workers >= max_workers {
            return false;
        }

        match self {
            Self::Backlog => queued > workers,
            Self::BacklogPerWorker(per_worker) => {
                queued > workers.saturating_mul(per_worker.get())
            }
            Self::Fixed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlog_grows_only_when_queue_exceeds_workers() {
        let policy = ScalePolicy::Backlog;
        assert!(!policy.should_grow(0, 2, 5));
        assert!(!policy.should_grow(2, 2, 5));
        assert!(policy.should_grow(3, 2, 5));
    }

    #[test]
    fn backlog_per_worker_scales_threshold() {
        let policy = ScalePolicy::BacklogPerWorker(NonZeroUsize::new(3).unwrap());
        assert!(!policy.should_grow(6, 2, 5));
        assert!(policy.should_grow(7, 2, 5));
    }

    #[test]
    fn backlog_per_worker_of_one_matches_backlog() {
        let damped = ScalePolicy::BacklogPerWorker(NonZeroUsize::MIN);
        for queued in 0..12 {
            for workers in 1..6 {
                assert_eq!(
                    damped.should_grow(queued, workers, 6),
                    ScalePolicy::Backlog.should_grow(queued, workers, 6),
                    "queued={queued} workers={workers}"
                );
            }
        }
    }

    #[test]
    fn never_grows_at_maximum() {
        for policy in [
            ScalePolicy::Backlog,
            ScalePolicy::BacklogPerWorker(NonZeroUsize::MIN),
            ScalePolicy::Fixed,
        ] {
            assert!(!policy.should_grow(usize::MAX, 5, 5), "{policy:?}");
            assert!(!policy.should_grow(usize::MAX, 6, 5), "{policy:?}");
        }
    }

    #[test]
    fn fixed_never_grows() {
        assert!(!ScalePolicy::Fixed.should_grow(100, 1, 10));
    }
}
