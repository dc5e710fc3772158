// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::rnd::Rnd;

/// Lower bound of the jitter window, as a fraction of the base delay.
const JITTER_FLOOR: f64 = 0.5;

/// Exponential backoff schedule.
///
/// The first base delay is `initial_delay`. After each step the base is multiplied by
/// `multiplier` and capped at `max_delay`. With jitter, each yielded delay is drawn uniformly
/// from `[0.5 * base, 1.5 * base)`, so a jittered delay may exceed `max_delay` by up to half.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    base: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    rnd: Rnd,
}

impl Backoff {
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64, jitter: bool, rnd: Rnd) -> Self {
        Self {
            base: initial_delay.min(max_delay),
            max_delay,
            multiplier,
            jitter,
            rnd,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let base = self.base;
        self.base = secs_to_duration_saturating(base.as_secs_f64() * self.multiplier).min(self.max_delay);

        if self.jitter {
            Some(apply_jitter(base, &self.rnd))
        } else {
            Some(base)
        }
    }
}

fn apply_jitter(delay: Duration, rnd: &Rnd) -> Duration {
    secs_to_duration_saturating(delay.as_secs_f64() * (JITTER_FLOOR + rnd.next_f64()))
}

fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs <= 0.0 || secs.is_nan() {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
