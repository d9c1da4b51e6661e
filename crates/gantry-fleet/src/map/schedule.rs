use std::time::Duration;

use gantry_model::{AutoscalerPolicy, seconds_or_default};

use crate::Schedule;

/// Preemptive mode defaults to on whenever idle instances are kept.
pub fn to_schedule(p: &AutoscalerPolicy) -> Schedule {
    Schedule {
        periods: p.periods.clone(),
        timezone: p.timezone.clone(),
        idle_count: p.idle_count,
        idle_time: seconds_or_default(p.idle_time, Duration::ZERO),
        scale_factor: p.scale_factor.max(0.0),
        scale_factor_limit: p.scale_factor_limit,
        preemptive_mode: p.preemptive_mode.unwrap_or(p.idle_count > 0),
    }
}

pub fn to_schedules(policies: &[AutoscalerPolicy]) -> Vec<Schedule> {
    policies.iter().map(to_schedule).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preemptive_follows_idle_count_unless_set() {
        let idle = AutoscalerPolicy {
            idle_count: 2,
            idle_time: Some(300),
            ..Default::default()
        };
        let s = to_schedule(&idle);
        assert!(s.preemptive_mode);
        assert_eq!(s.idle_time, Duration::from_secs(300));

        let explicit = AutoscalerPolicy {
            preemptive_mode: Some(false),
            ..idle
        };
        assert!(!to_schedule(&explicit).preemptive_mode);
        assert!(!to_schedule(&AutoscalerPolicy::default()).preemptive_mode);
    }

    #[test]
    fn negative_values_are_clamped() {
        let s = to_schedule(&AutoscalerPolicy {
            idle_time: Some(-5),
            scale_factor: -1.0,
            ..Default::default()
        });
        assert_eq!(s.idle_time, Duration::ZERO);
        assert_eq!(s.scale_factor, 0.0);
    }
}
