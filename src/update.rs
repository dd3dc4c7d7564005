//! Parameter Updates
//!
//! Most parameters are host automation targets and are moved with a
//! smoothed exponential approach that supersedes any pending schedule. Three
//! parameters are not plain automation:
//!
//! - distortion `amount` and bitcrusher `bits` regenerate the waveshaper curve
//! - noise `frequency` recomputes the brown/pink/white morph gains

use crate::curves::BITS_RANGE;
use crate::error::GraphError;
use crate::graph::AudioGraph;
use crate::host::{AudioHost, ParamHandle};
use crate::node::{NodeId, ParamSlot, ShaperCurve};
use tracing::trace;

/// How a new parameter value takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Exponential approach with the configured smoothing time constant
    Smooth,
    /// Jump at the current host time
    Immediate,
}

impl<H: AudioHost> AudioGraph<H> {
    /// Move a named parameter toward `value`
    pub fn set_param(&mut self, id: NodeId, name: &str, value: f64) -> Result<(), GraphError> {
        self.apply_param(id, name, value, Transition::Smooth)
    }

    pub(crate) fn apply_param(
        &mut self,
        id: NodeId,
        name: &str,
        value: f64,
        transition: Transition,
    ) -> Result<(), GraphError> {
        let tau = self.config.smoothing_time_constant;
        let node = self
            .registry
            .get_mut(id)
            .ok_or(GraphError::UnknownNode(id))?;

        if let Some(shaper) = node.shaper.as_mut().filter(|s| s.param == name) {
            let setting = match shaper.curve {
                ShaperCurve::Distortion => value,
                ShaperCurve::Bitcrush => value.clamp(BITS_RANGE.0, BITS_RANGE.1),
            };
            shaper.setting = setting;
            let curve = self.factory.curve(shaper.curve, setting);
            self.host.set_curve(shaper.primitive, curve);
            trace!(%id, name, setting, "curve regenerated");
            return Ok(());
        }

        let noise = node.noise;
        let (key, slot) = node
            .params
            .iter_mut()
            .find(|(key, _)| **key == name)
            .ok_or_else(|| GraphError::UnknownParam {
                id,
                name: name.to_string(),
            })?;
        let key = *key;

        match slot {
            ParamSlot::Automatable(handle) => {
                let handle = *handle;
                node.resting.insert(key, value);
                schedule(&mut self.host, handle, value, transition, tau);
            }
            ParamSlot::Literal(held) => {
                *held = value;
                if let (Some(mix), "frequency") = (noise, key) {
                    let gains = self.factory.morph_gains(value);
                    for (handle, gain) in [
                        (mix.brown, gains.brown),
                        (mix.pink, gains.pink),
                        (mix.white, gains.white),
                    ] {
                        schedule(&mut self.host, handle, gain, transition, tau);
                    }
                }
            }
        }
        trace!(%id, name, value, ?transition, "parameter set");
        Ok(())
    }
}

fn schedule<H: AudioHost>(
    host: &mut H,
    handle: ParamHandle,
    value: f64,
    transition: Transition,
    time_constant: f64,
) {
    match transition {
        Transition::Smooth => host.smooth_to(handle, value, time_constant),
        Transition::Immediate => {
            let now = host.current_time();
            host.cancel_scheduled(handle, now);
            host.set_value_at(handle, value, now);
        }
    }
}
