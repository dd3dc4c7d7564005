//! Parameter Automation
//!
//! Parameter changes are declarative schedules against the host clock: set a
//! value at a time, ramp linearly or exponentially to a value by a time, or
//! approach a target with an exponential time constant. [`ParamTimeline`]
//! evaluates such a schedule at any instant, which is what a host does on its
//! render thread and what the offline host does on demand.

use libm::Libm;
use serde::{Deserialize, Serialize};

/// A single scheduled change of an automatable parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AutomationEvent {
    /// Jump to `value` at `time`
    SetValue { value: f64, time: f64 },

    /// Reach `value` at `end_time`, interpolating linearly from the previous event
    LinearRamp { value: f64, end_time: f64 },

    /// Reach `value` at `end_time`, interpolating geometrically from the previous event
    ExponentialRamp { value: f64, end_time: f64 },

    /// From `start_time`, approach `target` with time constant `time_constant`
    SetTarget {
        target: f64,
        start_time: f64,
        time_constant: f64,
    },
}

impl AutomationEvent {
    /// The instant at which this event is ordered on the timeline
    pub fn time(&self) -> f64 {
        match *self {
            AutomationEvent::SetValue { time, .. } => time,
            AutomationEvent::LinearRamp { end_time, .. } => end_time,
            AutomationEvent::ExponentialRamp { end_time, .. } => end_time,
            AutomationEvent::SetTarget { start_time, .. } => start_time,
        }
    }
}

/// Ordered automation schedule for one parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTimeline {
    intrinsic: f64,
    events: Vec<AutomationEvent>,
}

impl ParamTimeline {
    pub fn new(value: f64) -> Self {
        Self {
            intrinsic: value,
            events: Vec::new(),
        }
    }

    /// Value used before the first event
    pub fn intrinsic(&self) -> f64 {
        self.intrinsic
    }

    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    /// Insert an event, keeping time order. Events at equal times keep
    /// insertion order.
    pub fn push(&mut self, event: AutomationEvent) {
        let at = event.time();
        let index = self.events.partition_point(|e| e.time() <= at);
        self.events.insert(index, event);
    }

    /// Remove every event ordered at or after `from_time`
    pub fn cancel_from(&mut self, from_time: f64) {
        self.events.retain(|e| e.time() < from_time);
    }

    /// Collapse events that finished before `time` into the intrinsic value
    ///
    /// A target approach that is still running stays on the timeline,
    /// anchored by a `SetValue` holding the value it started from.
    pub fn settle(&mut self, time: f64) {
        let keep_from = self.events.partition_point(|e| e.time() <= time);
        if keep_from == 0 {
            return;
        }
        let last = keep_from - 1;
        if let AutomationEvent::SetTarget { start_time, .. } = self.events[last] {
            let start = self.value_at(start_time);
            self.events.drain(..last);
            self.intrinsic = start;
            self.events.insert(
                0,
                AutomationEvent::SetValue {
                    value: start,
                    time: start_time,
                },
            );
            return;
        }
        let settled = self.value_at(time);
        self.events.drain(..keep_from);
        self.intrinsic = settled;
        if !self.events.is_empty() {
            // Pending ramps interpolate from the settled point.
            self.events.insert(
                0,
                AutomationEvent::SetValue {
                    value: settled,
                    time,
                },
            );
        }
    }

    /// Evaluate the schedule at `time`
    pub fn value_at(&self, time: f64) -> f64 {
        let mut value = self.intrinsic;
        let mut prev_time = f64::NEG_INFINITY;

        for (index, event) in self.events.iter().enumerate() {
            match *event {
                AutomationEvent::SetValue { value: v, time: at } => {
                    if at > time {
                        break;
                    }
                    value = v;
                    prev_time = at;
                }
                AutomationEvent::LinearRamp { value: v, end_time } => {
                    if end_time <= time {
                        value = v;
                        prev_time = end_time;
                        continue;
                    }
                    let span = end_time - prev_time;
                    if !span.is_finite() || span <= 0.0 {
                        return value;
                    }
                    let frac = ((time - prev_time) / span).clamp(0.0, 1.0);
                    return value + (v - value) * frac;
                }
                AutomationEvent::ExponentialRamp { value: v, end_time } => {
                    if end_time <= time {
                        value = v;
                        prev_time = end_time;
                        continue;
                    }
                    let span = end_time - prev_time;
                    // Geometric interpolation is undefined across zero or a sign change.
                    if !span.is_finite() || span <= 0.0 || value * v <= 0.0 {
                        return value;
                    }
                    let frac = ((time - prev_time) / span).clamp(0.0, 1.0);
                    return value * Libm::<f64>::pow(v / value, frac);
                }
                AutomationEvent::SetTarget {
                    target,
                    start_time,
                    time_constant,
                } => {
                    if start_time > time {
                        break;
                    }
                    let next = self
                        .events
                        .get(index + 1)
                        .map(|next| next.time())
                        .filter(|&next| next <= time);
                    match next {
                        Some(next_time) => {
                            value =
                                approach(value, target, next_time - start_time, time_constant);
                            prev_time = next_time;
                        }
                        None => {
                            return approach(value, target, time - start_time, time_constant)
                        }
                    }
                }
            }
        }

        value
    }
}

fn approach(from: f64, target: f64, elapsed: f64, time_constant: f64) -> f64 {
    if time_constant <= 0.0 {
        return target;
    }
    target + (from - target) * Libm::<f64>::exp(-elapsed.max(0.0) / time_constant)
}

/// Parameter range mapping between a normalized position (0–1) and a value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ParamRange {
    /// Linear mapping from normalized (0–1) to (min, max)
    Linear { min: f64, max: f64 },

    /// Exponential mapping, useful for frequency/time controls
    Exponential { min: f64, max: f64 },
}

impl ParamRange {
    pub fn apply(&self, normalized: f64) -> f64 {
        let clamped = normalized.clamp(0.0, 1.0);
        match *self {
            ParamRange::Linear { min, max } => min + clamped * (max - min),
            ParamRange::Exponential { min, max } => {
                if min <= 0.0 {
                    clamped * max
                } else {
                    min * Libm::<f64>::pow(max / min, clamped)
                }
            }
        }
    }

    /// Inverse of [`apply`](Self::apply), clamped to 0–1
    pub fn normalize(&self, value: f64) -> f64 {
        let position = match *self {
            ParamRange::Linear { min, max } => {
                if max == min {
                    0.0
                } else {
                    (value - min) / (max - min)
                }
            }
            ParamRange::Exponential { min, max } => {
                if min <= 0.0 || max <= min {
                    if max > 0.0 {
                        value / max
                    } else {
                        0.0
                    }
                } else if value <= min {
                    0.0
                } else {
                    Libm::<f64>::log(value / min) / Libm::<f64>::log(max / min)
                }
            }
        };
        position.clamp(0.0, 1.0)
    }
}
