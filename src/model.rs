/// Point-in-time snapshot of pool activity.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub idle_workers: usize,
    pub queued_tasks: usize,
    pub total_submitted: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub cancelled_tasks: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        // A retiring worker can still be counted idle after it left the
        // owned set, so clamp instead of subtracting blindly.
        self.workers.saturating_sub(self.idle_workers) as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let finished = self.completed_tasks + self.failed_tasks;
        if finished == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / finished as f64
    }

    /// Tasks whose channel has been resolved, by any outcome.
    pub fn settled(&self) -> usize {
        self.completed_tasks + self.failed_tasks + self.cancelled_tasks
    }
}
