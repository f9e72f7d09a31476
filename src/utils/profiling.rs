use std::time::Duration;

/// Per-phase timings and counters of the most recent step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProfile {
    pub broad_phase_time: Duration,
    pub collide_time: Duration,
    pub solve_time: Duration,
    pub solve_toi_time: Duration,
    pub total_step_time: Duration,

    pub body_count: usize,
    pub contact_count: usize,
    pub island_count: usize,
    pub toi_events: usize,
    /// Set when the step ran past [`crate::config::SimulationConfig::step_budget_ms`].
    pub over_budget: bool,
}

impl StepProfile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Writes a one-line breakdown to the `debug` log.
    pub fn report(&self) {
        let total_us = self.total_step_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }
        let share = |d: Duration| d.as_micros() as f32 / total_us * 100.0;
        log::debug!(
            "step {:.2} ms | bodies {} contacts {} islands {} toi {} | broad {:.1}% collide {:.1}% solve {:.1}% toi {:.1}%",
            self.total_step_time.as_secs_f32() * 1000.0,
            self.body_count,
            self.contact_count,
            self.island_count,
            self.toi_events,
            share(self.broad_phase_time),
            share(self.collide_time),
            share(self.solve_time),
            share(self.solve_toi_time),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_timings_and_counters() {
        let mut profile = StepProfile {
            solve_time: Duration::from_millis(3),
            toi_events: 2,
            over_budget: true,
            ..Default::default()
        };
        profile.reset();
        assert_eq!(profile.solve_time, Duration::ZERO);
        assert_eq!(profile.toi_events, 0);
        assert!(!profile.over_budget);
    }
}
