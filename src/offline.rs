//! Offline Host
//!
//! An in-memory [`AudioHost`] that records the primitive graph instead of
//! rendering it. The clock only moves when [`OfflineHost::advance`] is
//! called, and parameter values are computed from their automation
//! timelines. Useful for tests, headless tooling and for validating a patch
//! before handing it to a real-time host.

use crate::error::HostError;
use crate::host::{
    AudioHost, AudioParamKind, Endpoint, HostLauncher, ParamHandle, PrimitiveId, PrimitiveSpec,
};
use crate::param::{AutomationEvent, ParamTimeline};
use slotmap::SlotMap;
use std::collections::BTreeMap;
use std::sync::Arc;

struct Primitive {
    spec: PrimitiveSpec,
    params: BTreeMap<AudioParamKind, ParamTimeline>,
    curve: Option<Arc<[f32]>>,
    started_at: Option<f64>,
    stopped_at: Option<f64>,
    dispose_at: Option<f64>,
}

impl Primitive {
    fn new(spec: PrimitiveSpec) -> Self {
        let params = spec
            .params()
            .into_iter()
            .map(|(kind, value)| (kind, ParamTimeline::new(value)))
            .collect();
        let curve = match &spec {
            PrimitiveSpec::WaveShaper { curve } => Some(Arc::clone(curve)),
            _ => None,
        };
        Self {
            spec,
            params,
            curve,
            started_at: None,
            stopped_at: None,
            dispose_at: None,
        }
    }
}

/// Recording host with a manually advanced clock
pub struct OfflineHost {
    sample_rate: f64,
    time: f64,
    running: bool,
    primitives: SlotMap<PrimitiveId, Primitive>,
    wires: Vec<(PrimitiveId, Endpoint)>,
    destination: PrimitiveId,
}

impl OfflineHost {
    /// Create a suspended host at time zero
    pub fn new(sample_rate: f64) -> Self {
        let mut primitives = SlotMap::with_key();
        let destination = primitives.insert(Primitive::new(PrimitiveSpec::Gain { gain: 1.0 }));
        Self {
            sample_rate,
            time: 0.0,
            running: false,
            primitives,
            wires: Vec::new(),
            destination,
        }
    }

    /// Launcher that always succeeds
    pub fn launcher() -> HostLauncher<OfflineHost> {
        Box::new(|sample_rate| Ok(OfflineHost::new(sample_rate)))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Move the clock forward, reclaiming primitives whose disposal time passed
    pub fn advance(&mut self, seconds: f64) {
        self.time += seconds.max(0.0);
        let now = self.time;
        let expired: Vec<PrimitiveId> = self
            .primitives
            .iter()
            .filter(|(_, p)| p.dispose_at.is_some_and(|at| at <= now))
            .map(|(id, _)| id)
            .collect();
        for id in expired {
            self.remove_primitive(id);
        }
        for primitive in self.primitives.values_mut() {
            for timeline in primitive.params.values_mut() {
                timeline.settle(now);
            }
        }
    }

    /// Number of live primitives, including the destination
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    pub fn contains(&self, id: PrimitiveId) -> bool {
        self.primitives.contains_key(id)
    }

    pub fn type_name(&self, id: PrimitiveId) -> Option<&'static str> {
        self.primitives.get(id).map(|p| p.spec.type_name())
    }

    pub fn spec(&self, id: PrimitiveId) -> Option<&PrimitiveSpec> {
        self.primitives.get(id).map(|p| &p.spec)
    }

    pub fn is_wired(&self, from: PrimitiveId, to: Endpoint) -> bool {
        self.wires.iter().any(|&(f, t)| f == from && t == to)
    }

    /// Primitives wired into `to`
    pub fn wires_into(&self, to: Endpoint) -> Vec<PrimitiveId> {
        self.wires
            .iter()
            .filter(|&&(_, t)| t == to)
            .map(|&(f, _)| f)
            .collect()
    }

    /// Endpoints fed by `from`
    pub fn wires_from(&self, from: PrimitiveId) -> Vec<Endpoint> {
        self.wires
            .iter()
            .filter(|&&(f, _)| f == from)
            .map(|&(_, t)| t)
            .collect()
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn curve(&self, shaper: PrimitiveId) -> Option<Arc<[f32]>> {
        self.primitives.get(shaper).and_then(|p| p.curve.clone())
    }

    /// Whether a source is started and not yet stopped at the current time
    pub fn is_playing(&self, source: PrimitiveId) -> bool {
        self.primitives.get(source).is_some_and(|p| {
            p.started_at.is_some_and(|at| at <= self.time)
                && p.stopped_at.map_or(true, |at| at > self.time)
        })
    }

    pub fn stop_time(&self, source: PrimitiveId) -> Option<f64> {
        self.primitives.get(source).and_then(|p| p.stopped_at)
    }

    pub fn dispose_time(&self, id: PrimitiveId) -> Option<f64> {
        self.primitives.get(id).and_then(|p| p.dispose_at)
    }

    /// Scheduled events of a parameter
    pub fn events(&self, param: ParamHandle) -> Option<&[AutomationEvent]> {
        self.timeline(param).map(|t| t.events())
    }

    /// Evaluate a parameter at an arbitrary time
    pub fn value_at(&self, param: ParamHandle, time: f64) -> Option<f64> {
        self.timeline(param).map(|t| t.value_at(time))
    }

    fn timeline(&self, param: ParamHandle) -> Option<&ParamTimeline> {
        self.primitives
            .get(param.primitive)
            .and_then(|p| p.params.get(&param.param))
    }

    fn remove_primitive(&mut self, id: PrimitiveId) {
        if id == self.destination {
            return;
        }
        self.primitives.remove(id);
        self.wires.retain(|&(from, to)| {
            from != id
                && match to {
                    Endpoint::Input(target) => target != id,
                    Endpoint::Param(handle) => handle.primitive != id,
                }
        });
    }
}

impl AudioHost for OfflineHost {
    fn resume(&mut self) -> Result<(), HostError> {
        self.running = true;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn destination(&self) -> PrimitiveId {
        self.destination
    }

    fn create(&mut self, spec: PrimitiveSpec) -> PrimitiveId {
        self.primitives.insert(Primitive::new(spec))
    }

    fn connect(&mut self, from: PrimitiveId, to: Endpoint) {
        let target_exists = match to {
            Endpoint::Input(id) => self.primitives.contains_key(id),
            Endpoint::Param(handle) => self.timeline(handle).is_some(),
        };
        if !self.primitives.contains_key(from) || !target_exists || self.is_wired(from, to) {
            return;
        }
        self.wires.push((from, to));
    }

    fn disconnect(&mut self, from: PrimitiveId, to: Endpoint) {
        self.wires.retain(|&(f, t)| !(f == from && t == to));
    }

    fn param_value(&self, param: ParamHandle) -> Option<f64> {
        self.value_at(param, self.time)
    }

    fn schedule(&mut self, param: ParamHandle, event: AutomationEvent) {
        if let Some(timeline) = self
            .primitives
            .get_mut(param.primitive)
            .and_then(|p| p.params.get_mut(&param.param))
        {
            timeline.push(event);
        }
    }

    fn cancel_scheduled(&mut self, param: ParamHandle, from_time: f64) {
        if let Some(timeline) = self
            .primitives
            .get_mut(param.primitive)
            .and_then(|p| p.params.get_mut(&param.param))
        {
            timeline.cancel_from(from_time);
        }
    }

    fn set_curve(&mut self, shaper: PrimitiveId, curve: Arc<[f32]>) {
        if let Some(p) = self.primitives.get_mut(shaper) {
            if matches!(p.spec, PrimitiveSpec::WaveShaper { .. }) {
                p.curve = Some(curve);
            }
        }
    }

    fn start(&mut self, source: PrimitiveId, at: f64) {
        if let Some(p) = self.primitives.get_mut(source) {
            if p.spec.is_source() && p.started_at.is_none() {
                p.started_at = Some(at);
            }
        }
    }

    fn stop(&mut self, source: PrimitiveId, at: f64) {
        if let Some(p) = self.primitives.get_mut(source) {
            if p.spec.is_source() {
                p.stopped_at = Some(at);
            }
        }
    }

    fn dispose_at(&mut self, id: PrimitiveId, at: f64) {
        if let Some(p) = self.primitives.get_mut(id) {
            p.dispose_at = Some(at);
        }
    }

    fn release(&mut self, id: PrimitiveId) {
        self.remove_primitive(id);
    }
}
