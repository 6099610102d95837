//! Exponential synapse point process

use std::any::Any;

use crate::ion::IonBank;
use crate::mechanisms::Mechanism;
use crate::units::POINT_SCALE;

/// Single-exponential conductance synapse.
///
/// Each instance owns a conductance `g` (µS) that decays with time constant
/// `tau` (ms) and jumps by the event weight on `net_receive`. The instance
/// current `g·(v − e)` is in nA and is normalised by the CV surface area
/// into a density before accumulation, which is why the mechanism consumes
/// [`Mechanism::set_areas`].
///
/// Parameters: `tau` (2.0 ms) and `e` (0 mV).
#[derive(Debug, Clone)]
pub struct ExpSyn {
    node_index: Vec<usize>,
    tau: f64,
    e: f64,
    g: Vec<f64>,
    area_scale: Vec<f64>,
    decay: f64,
}

impl ExpSyn {
    pub fn new(node_index: Vec<usize>) -> Self {
        let count = node_index.len();
        Self {
            node_index,
            tau: 2.0,
            e: 0.0,
            g: vec![0.0; count],
            area_scale: vec![0.0; count],
            decay: 1.0,
        }
    }

    /// Per-instance conductances (µS).
    pub fn conductance(&self) -> &[f64] {
        &self.g
    }
}

impl Mechanism for ExpSyn {
    fn name(&self) -> &'static str {
        "expsyn"
    }

    fn node_index(&self) -> &[usize] {
        &self.node_index
    }

    fn init(&mut self, _voltage: &[f64], _ions: &IonBank) {
        self.g.fill(0.0);
        self.decay = 1.0;
    }

    fn set_params(&mut self, _t: f64, dt: f64) {
        self.decay = (-dt / self.tau).exp();
    }

    fn compute_current(&mut self, voltage: &[f64], current: &mut [f64], _ions: &IonBank) {
        for (k, &cv) in self.node_index.iter().enumerate() {
            current[cv] += self.area_scale[k] * self.g[k] * (voltage[cv] - self.e);
        }
    }

    fn update_state(&mut self, _voltage: &[f64], _ions: &mut IonBank) {
        for g in &mut self.g {
            *g *= self.decay;
        }
    }

    fn set_areas(&mut self, areas: &[f64]) {
        self.area_scale = self
            .node_index
            .iter()
            .map(|&cv| POINT_SCALE / areas[cv])
            .collect();
    }

    fn synapse_count(&self) -> usize {
        self.node_index.len()
    }

    fn net_receive(&mut self, target: usize, weight: f64) {
        self.g[target] += weight;
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> bool {
        match name {
            "tau" => self.tau = value,
            "e" => self.e = value,
            _ => return false,
        }
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
