//! Scalar parameters with scheduled automation.
//!
//! An [`AudioParam`] holds an immediate value plus a time-sorted list of
//! [`AutomationEvent`]s. The renderer samples it at frame-accurate times with
//! [`AudioParam::value_at`].

/// Maximum number of scheduled events kept per parameter.
pub const MAX_EVENTS: usize = 64;

/// Floor applied to exponential ramp endpoints that are zero or negative.
const EXP_RAMP_EPSILON: f32 = 1e-6;

/// Floor applied to non-positive `set_target_at_time` time constants (seconds).
const MIN_TIME_CONSTANT: f64 = 0.001;

/// The shape an automation event describes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    /// Jump to the value at the event time.
    SetValue,
    /// Ramp linearly from the previous event to this one.
    LinearRamp,
    /// Ramp exponentially from the previous event to this one.
    ExponentialRamp,
    /// Approach the value exponentially, starting at the event time.
    SetTarget { time_constant: f64 },
}

/// One scheduled change of an [`AudioParam`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutomationEvent {
    pub kind: EventKind,
    /// Event time in seconds of transport time.
    pub time: f64,
    pub value: f32,
}

impl AutomationEvent {
    #[inline]
    fn is_ramp(&self) -> bool {
        matches!(self.kind, EventKind::LinearRamp | EventKind::ExponentialRamp)
    }
}

/// A time-varying scalar value.
///
/// `set_value` only touches the immediate value. The four scheduling methods
/// only append events. Neither ever fails: events are kept sorted by time,
/// and once [`MAX_EVENTS`] are scheduled the earliest one is evicted to make
/// room.
#[derive(Clone, Debug)]
pub struct AudioParam {
    default_value: f32,
    value: f32,
    events: Vec<AutomationEvent>,
}

impl AudioParam {
    /// A parameter whose immediate value starts at `default_value`.
    ///
    /// ```
    /// use tonwerk::AudioParam;
    ///
    /// let mut gain = AudioParam::new(1.0);
    /// gain.set_value_at_time(0.0, 0.0);
    /// gain.linear_ramp_to_value_at_time(1.0, 2.0);
    /// assert_eq!(gain.value_at(1.0), 0.5);
    /// ```
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            value: default_value,
            events: Vec::with_capacity(MAX_EVENTS),
        }
    }

    /// The value the parameter was created with.
    #[inline]
    pub fn default_value(&self) -> f32 {
        self.default_value
    }

    /// The immediate value, ignoring any scheduled events.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Scheduled events, sorted by time.
    #[inline]
    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    /// Overwrite the immediate value. The event list is left untouched.
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    /// Jump to `value` at `time` seconds.
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.schedule(AutomationEvent {
            kind: EventKind::SetValue,
            time,
            value,
        });
    }

    /// Ramp linearly from the previous event (or the immediate value at
    /// time zero) to reach `value` at `time`.
    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.schedule(AutomationEvent {
            kind: EventKind::LinearRamp,
            time,
            value,
        });
    }

    /// Ramp exponentially to reach `value` at `time`. Endpoints at or below
    /// zero are floored to a small positive value.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.schedule(AutomationEvent {
            kind: EventKind::ExponentialRamp,
            time,
            value,
        });
    }

    /// From `start_time` on, approach `target` with the given time constant
    /// in seconds.
    pub fn set_target_at_time(&mut self, target: f32, start_time: f64, time_constant: f64) {
        self.schedule(AutomationEvent {
            kind: EventKind::SetTarget { time_constant },
            time: start_time,
            value: target,
        });
    }

    /// Drop every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        let keep = self.events.partition_point(|e| e.time < time);
        self.events.truncate(keep);
    }

    fn schedule(&mut self, event: AutomationEvent) {
        // Unorderable times are dropped so the list stays sorted.
        if !event.time.is_finite() {
            return;
        }
        if self.events.len() >= MAX_EVENTS {
            self.events.remove(0);
        }
        // Insert after every event with an equal or earlier time so that
        // events sharing a timestamp keep their scheduling order.
        let at = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(at, event);
    }

    /// Evaluate the parameter at `time` seconds.
    pub fn value_at(&self, time: f64) -> f32 {
        if self.events.is_empty() || !time.is_finite() {
            return self.value;
        }

        let split = self.events.partition_point(|e| e.time <= time);
        let prev = split.checked_sub(1).map(|i| &self.events[i]);
        let next = self.events.get(split);

        let prev_value = match prev {
            None => self.value,
            Some(AutomationEvent {
                kind: EventKind::SetTarget { time_constant },
                time: start,
                value: target,
            }) => {
                let dt = time - start;
                if dt <= 0.0 {
                    self.value
                } else {
                    let tau = if *time_constant > 0.0 {
                        *time_constant
                    } else {
                        MIN_TIME_CONSTANT
                    };
                    let decay = (-dt / tau).exp() as f32;
                    let v = target + (self.value - target) * decay;
                    return if v.is_finite() { v } else { self.value };
                }
            }
            Some(e) => e.value,
        };

        let next = match next {
            Some(e) if e.is_ramp() => e,
            _ => return prev_value,
        };

        let t0 = prev.map_or(0.0, |e| e.time);
        let t1 = next.time;
        let u = if t1 > t0 {
            ((time - t0) / (t1 - t0)).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };

        let v = match next.kind {
            EventKind::LinearRamp => prev_value + (next.value - prev_value) * u,
            _ => {
                let v0 = if prev_value > 0.0 { prev_value } else { EXP_RAMP_EPSILON };
                let v1 = if next.value > 0.0 { next.value } else { EXP_RAMP_EPSILON };
                v0 * (v1 / v0).powf(u)
            }
        };

        if v.is_finite() {
            v
        } else {
            self.value
        }
    }
}
