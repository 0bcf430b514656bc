use crate::{Error, Result, ScalePolicy};

/// Queue capacity used when none is configured explicitly.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Construction parameters for a [`WorkerPool`](crate::WorkerPool).
///
/// A config is validated when it is created and again when a pool is built
/// from it, so an invalid config can never produce a partially constructed
/// pool.
///
/// ```
/// use surgepool::{PoolConfig, ScalePolicy};
///
/// let config = PoolConfig::new(2, 5)
///     .unwrap()
///     .with_queue_capacity(32)
///     .with_scale_policy(ScalePolicy::Fixed);
///
/// assert_eq!(config.initial_workers(), 2);
/// assert_eq!(config.max_workers(), 5);
/// assert_eq!(config.queue_capacity(), 32);
/// assert!(config.validate().is_ok());
///
/// assert!(PoolConfig::new(0, 5).is_err());
/// assert!(PoolConfig::new(6, 5).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    initial_workers: usize,
    max_workers: usize,
    queue_capacity: usize,
    scale_policy: ScalePolicy,
}

impl PoolConfig {
    /// Creates a config with the [default queue
    /// capacity](DEFAULT_QUEUE_CAPACITY) and the default [`ScalePolicy`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] unless
    /// `0 < initial_workers <= max_workers`.
    pub fn new(initial_workers: usize, max_workers: usize) -> Result<Self> {
        let config = Self {
            initial_workers,
            max_workers,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            scale_policy: ScalePolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the capacity of the bounded task queue.
    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the heuristic used to decide when to add workers.
    #[must_use]
    pub const fn with_scale_policy(mut self, scale_policy: ScalePolicy) -> Self {
        self.scale_policy = scale_policy;
        self
    }

    /// Checks every invariant of the config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `initial_workers` is zero,
    /// exceeds `max_workers`, or if the queue capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.initial_workers == 0 {
            return Err(Error::invalid_configuration(
                "initial_workers must be greater than 0",
            ));
        }

        if self.initial_workers > self.max_workers {
            return Err(Error::invalid_configuration(format!(
                "initial_workers ({}) exceeds max_workers ({})",
                self.initial_workers, self.max_workers
            )));
        }

        if self.queue_capacity == 0 {
            return Err(Error::invalid_configuration(
                "queue_capacity must be greater than 0",
            ));
        }

        Ok(())
    }

    pub const fn initial_workers(&self) -> usize {
        self.initial_workers
    }

    pub const fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub const fn scale_policy(&self) -> ScalePolicy {
        self.scale_policy
    }
}
