//! Rate based cooperative task dispatch.
//!
//! A fixed table of tasks is walked once per [`Scheduler::run`] call. A task
//! fires when at least its period has elapsed since it last fired. Tasks run
//! to completion in table order; there is no preemption and no priority.

/// Millisecond tick timestamp.
pub type Instant = fugit::TimerInstantU32<1000>;

/// Millisecond period.
pub type Duration = fugit::MillisDurationU32;

/// A periodic task operating on a context `C`.
pub struct Task<C> {
    name: &'static str,
    run: fn(&mut C),
    period: Duration,
    last_run: Instant,
}

impl<C> Task<C> {
    pub const fn new(
        name: &'static str,
        period: Duration,
        run: fn(&mut C),
    ) -> Self {
        Self {
            name,
            run,
            period,
            last_run: Instant::from_ticks(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn last_run(&self) -> Instant {
        self.last_run
    }

    fn is_due(&self, now: Instant) -> bool {
        // Elapsed ticks modulo 2^32.
        let elapsed = now.ticks().wrapping_sub(self.last_run.ticks());
        elapsed >= self.period.ticks()
    }
}

/// Static task table.
pub struct Scheduler<C, const N: usize> {
    tasks: [Task<C>; N],
}

impl<C, const N: usize> Scheduler<C, N> {
    pub fn new(tasks: [Task<C>; N]) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task<C>; N] {
        &self.tasks
    }

    /// Walk the table once.
    ///
    /// # Args
    /// * `now` - Current time.
    /// * `context` - Context passed to every task that fires.
    ///
    /// # Returns
    /// The number of tasks that ran.
    pub fn run(&mut self, now: Instant, context: &mut C) -> usize {
        let mut ran = 0;
        for task in self.tasks.iter_mut() {
            if task.is_due(now) {
                task.last_run = now;
                (task.run)(context);
                ran += 1;
            }
        }
        ran
    }
}
