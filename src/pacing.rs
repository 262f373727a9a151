use std::time::{Duration, Instant};

/// Fixed-interval time gate: a tick may run once `interval` has elapsed
/// since the previous one.
#[derive(Debug, Clone)]
pub struct TickGate {
    interval: Duration,
    last_update: Option<Instant>,
}

impl TickGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_update: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_unpaced(&self) -> bool {
        self.interval.is_zero()
    }

    /// Poll: true (and the gate re-arms) when a tick is due.
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    fn ready_at(&mut self, now: Instant) -> bool {
        match self.last_update {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_update = Some(now);
                true
            }
        }
    }

    /// Block until the next tick is due.
    pub fn wait(&mut self) {
        if let Some(last) = self.last_update {
            let due = last + self.interval;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.last_update = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_opens_after_interval() {
        let mut gate = TickGate::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(gate.ready_at(t0));
        assert!(!gate.ready_at(t0 + Duration::from_millis(40)));
        assert!(!gate.ready_at(t0 + Duration::from_millis(99)));
        assert!(gate.ready_at(t0 + Duration::from_millis(100)));
        assert!(!gate.ready_at(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn test_unpaced_always_ready() {
        let mut gate = TickGate::new(Duration::ZERO);
        assert!(gate.is_unpaced());
        assert!(gate.ready());
        assert!(gate.ready());
    }

    #[test]
    fn test_wait_spaces_ticks() {
        let mut gate = TickGate::new(Duration::from_millis(20));
        gate.wait();
        let t = Instant::now();
        gate.wait();
        assert!(t.elapsed() >= Duration::from_millis(10));
    }
}
