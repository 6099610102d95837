//! Hodgkin–Huxley sodium/potassium mechanism

use std::any::Any;

use crate::ion::{IonBank, IonKind};
use crate::mechanisms::Mechanism;

const DEFAULT_ENA: f64 = 50.0;
const DEFAULT_EK: f64 = -77.0;

/// Classical Hodgkin–Huxley density mechanism.
///
/// Currents: `gnabar·m³h·(v − ena) + gkbar·n⁴·(v − ek) + gl·(v − el)` in
/// mA/cm². The reversal potentials `ena`/`ek` are read from the shared Na
/// and K ion state when the cell has wired them, so a reversal-potential
/// provider mechanism is picked up automatically.
///
/// Gating variables advance by exponential Euler over the step window,
/// which is unconditionally stable for the relaxation form of the rate
/// equations.
#[derive(Debug, Clone)]
pub struct HodgkinHuxley {
    node_index: Vec<usize>,
    gnabar: f64,
    gkbar: f64,
    gl: f64,
    el: f64,
    m: Vec<f64>,
    h: Vec<f64>,
    n: Vec<f64>,
    dt: f64,
    na_index: Vec<usize>,
    k_index: Vec<usize>,
}

impl HodgkinHuxley {
    pub fn new(node_index: Vec<usize>) -> Self {
        let count = node_index.len();
        Self {
            node_index,
            gnabar: 0.12,
            gkbar: 0.036,
            gl: 0.0003,
            el: -54.3,
            m: vec![0.0; count],
            h: vec![0.0; count],
            n: vec![0.0; count],
            dt: 0.0,
            na_index: Vec::new(),
            k_index: Vec::new(),
        }
    }

    /// Gating state `(m, h, n)` of the k-th owned CV.
    pub fn gates(&self, k: usize) -> (f64, f64, f64) {
        (self.m[k], self.h[k], self.n[k])
    }

    fn ena(&self, ions: &IonBank, k: usize) -> f64 {
        reversal(ions, IonKind::Na, &self.na_index, k, DEFAULT_ENA)
    }

    fn ek(&self, ions: &IonBank, k: usize) -> f64 {
        reversal(ions, IonKind::K, &self.k_index, k, DEFAULT_EK)
    }
}

/// Reversal potential of `kind` for the mechanism's k-th CV, falling back
/// to the classical default when the species is not wired.
fn reversal(ions: &IonBank, kind: IonKind, index_map: &[usize], k: usize, default: f64) -> f64 {
    match (ions.get(kind), index_map.get(k)) {
        (Some(state), Some(&pos)) => state.reversal_potential[pos],
        _ => default,
    }
}

/// `x / (exp(x / y) - 1)` with the removable singularity at `x == 0`
/// replaced by its series value.
fn vtrap(x: f64, y: f64) -> f64 {
    if (x / y).abs() < 1e-6 {
        y * (1.0 - x / y / 2.0)
    } else {
        x / ((x / y).exp() - 1.0)
    }
}

fn rates_m(v: f64) -> (f64, f64) {
    let alpha = 0.1 * vtrap(-(v + 40.0), 10.0);
    let beta = 4.0 * (-(v + 65.0) / 18.0).exp();
    (alpha, beta)
}

fn rates_h(v: f64) -> (f64, f64) {
    let alpha = 0.07 * (-(v + 65.0) / 20.0).exp();
    let beta = 1.0 / (1.0 + (-(v + 35.0) / 10.0).exp());
    (alpha, beta)
}

fn rates_n(v: f64) -> (f64, f64) {
    let alpha = 0.01 * vtrap(-(v + 55.0), 10.0);
    let beta = 0.125 * (-(v + 65.0) / 80.0).exp();
    (alpha, beta)
}

#[inline]
fn steady_state(alpha: f64, beta: f64) -> f64 {
    alpha / (alpha + beta)
}

/// Exponential Euler relaxation of a gate towards its steady state.
#[inline]
fn relax(x: f64, alpha: f64, beta: f64, dt: f64) -> f64 {
    let tau = 1.0 / (alpha + beta);
    let inf = alpha * tau;
    inf + (x - inf) * (-dt / tau).exp()
}

impl Mechanism for HodgkinHuxley {
    fn name(&self) -> &'static str {
        "hh"
    }

    fn node_index(&self) -> &[usize] {
        &self.node_index
    }

    fn init(&mut self, voltage: &[f64], _ions: &IonBank) {
        for (k, &cv) in self.node_index.iter().enumerate() {
            let v = voltage[cv];
            let (am, bm) = rates_m(v);
            let (ah, bh) = rates_h(v);
            let (an, bn) = rates_n(v);
            self.m[k] = steady_state(am, bm);
            self.h[k] = steady_state(ah, bh);
            self.n[k] = steady_state(an, bn);
        }
    }

    fn set_params(&mut self, _t: f64, dt: f64) {
        self.dt = dt;
    }

    fn compute_current(&mut self, voltage: &[f64], current: &mut [f64], ions: &IonBank) {
        for (k, &cv) in self.node_index.iter().enumerate() {
            let v = voltage[cv];
            let m3 = self.m[k] * self.m[k] * self.m[k];
            let n4 = self.n[k] * self.n[k] * self.n[k] * self.n[k];
            let i_na = self.gnabar * m3 * self.h[k] * (v - self.ena(ions, k));
            let i_k = self.gkbar * n4 * (v - self.ek(ions, k));
            let i_l = self.gl * (v - self.el);
            current[cv] += i_na + i_k + i_l;
        }
    }

    fn update_state(&mut self, voltage: &[f64], _ions: &mut IonBank) {
        for (k, &cv) in self.node_index.iter().enumerate() {
            let v = voltage[cv];
            let (am, bm) = rates_m(v);
            let (ah, bh) = rates_h(v);
            let (an, bn) = rates_n(v);
            self.m[k] = relax(self.m[k], am, bm, self.dt);
            self.h[k] = relax(self.h[k], ah, bh, self.dt);
            self.n[k] = relax(self.n[k], an, bn, self.dt);
        }
    }

    fn uses_ion(&self, kind: IonKind) -> bool {
        matches!(kind, IonKind::Na | IonKind::K)
    }

    fn set_ion(&mut self, kind: IonKind, index_map: Vec<usize>) {
        match kind {
            IonKind::Na => self.na_index = index_map,
            IonKind::K => self.k_index = index_map,
            IonKind::Ca => {}
        }
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> bool {
        match name {
            "gnabar" => self.gnabar = value,
            "gkbar" => self.gkbar = value,
            "gl" => self.gl = value,
            "el" => self.el = value,
            _ => return false,
        }
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_init_samples_steady_state() {
        let mut hh = HodgkinHuxley::new(vec![0]);
        hh.init(&[-65.0], &IonBank::default());
        let (m, h, n) = hh.gates(0);
        // Classical resting values at -65 mV
        assert_abs_diff_eq!(m, 0.0529, epsilon = 1e-3);
        assert_abs_diff_eq!(h, 0.5961, epsilon = 1e-3);
        assert_abs_diff_eq!(n, 0.3177, epsilon = 1e-3);
    }

    #[test]
    fn test_gates_relax_towards_steady_state() {
        let mut hh = HodgkinHuxley::new(vec![0]);
        hh.init(&[-65.0], &IonBank::default());
        // Hold a depolarised voltage for many small steps
        hh.set_params(0.0, 0.01);
        for _ in 0..10_000 {
            hh.update_state(&[-20.0], &mut IonBank::default());
        }
        let (am, bm) = rates_m(-20.0);
        let (m, _, _) = hh.gates(0);
        assert_relative_eq!(m, steady_state(am, bm), epsilon = 1e-6);
    }

    #[test]
    fn test_vtrap_is_continuous_at_singularity() {
        // alpha_m has a removable singularity at v = -40
        let (a_at, _) = rates_m(-40.0);
        let (a_near, _) = rates_m(-40.0 + 1e-9);
        assert_relative_eq!(a_at, a_near, epsilon = 1e-6);
        assert_relative_eq!(a_at, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_dt_leaves_gates_unchanged() {
        let mut hh = HodgkinHuxley::new(vec![0]);
        hh.init(&[-65.0], &IonBank::default());
        let before = hh.gates(0);
        hh.set_params(0.0, 0.0);
        hh.update_state(&[0.0], &mut IonBank::default());
        let after = hh.gates(0);
        assert_abs_diff_eq!(after.0, before.0, epsilon = 1e-15);
        assert_abs_diff_eq!(after.1, before.1, epsilon = 1e-15);
        assert_abs_diff_eq!(after.2, before.2, epsilon = 1e-15);
    }

    #[test]
    fn test_resting_current_is_small() {
        let mut hh = HodgkinHuxley::new(vec![0]);
        hh.init(&[-65.0], &IonBank::default());
        let mut current = [0.0];
        hh.compute_current(&[-65.0], &mut current, &IonBank::default());
        // Near rest the three currents nearly cancel
        assert_abs_diff_eq!(current[0], 0.0, epsilon = 0.05);
    }
}
