//! Ion species state shared between mechanisms
//!
//! Each species owns three vectors indexed by the union of the CVs of every
//! mechanism that declared the species. Mechanisms address the vectors
//! through an index map handed out at wiring time, so the per-step path
//! involves no lookup beyond an array index.

use nalgebra::DVector;

/// Ion species supported by the cell. Indexes a fixed-size bank, so the
/// per-step ion access never hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IonKind {
    Na,
    K,
    Ca,
}

impl IonKind {
    /// All supported species, in bank order.
    pub const ALL: [IonKind; 3] = [IonKind::Na, IonKind::K, IonKind::Ca];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            IonKind::Na => 0,
            IonKind::K => 1,
            IonKind::Ca => 2,
        }
    }
}

/// Resting potential the classical reversal defaults are expressed against.
pub const DEFAULT_RESTING_POTENTIAL: f64 = -65.0;

/// Default reversal potential and concentrations for one species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IonDefaults {
    /// Reversal potential (mV)
    pub reversal_potential: f64,
    /// Internal concentration (mM)
    pub internal_concentration: f64,
    /// External concentration (mM)
    pub external_concentration: f64,
}

impl IonDefaults {
    /// The classical squid-axon defaults, expressed relative to a resting
    /// potential of −65 mV for Na and K, and by the Nernst relation at
    /// 12.5 mV per e-fold for Ca.
    pub fn classical(kind: IonKind) -> Self {
        match kind {
            IonKind::Na => Self {
                reversal_potential: 115.0 + DEFAULT_RESTING_POTENTIAL,
                internal_concentration: 10.0,
                external_concentration: 140.0,
            },
            IonKind::K => Self {
                reversal_potential: -12.0 + DEFAULT_RESTING_POTENTIAL,
                internal_concentration: 54.4,
                external_concentration: 2.5,
            },
            IonKind::Ca => Self {
                reversal_potential: 12.5 * (2.0_f64 / 5e-5).ln(),
                internal_concentration: 5e-5,
                external_concentration: 2.0,
            },
        }
    }
}

/// Per-species state vectors over the species' shared CV index list.
#[derive(Debug, Clone)]
pub struct IonState {
    node_index: Vec<usize>,
    /// Reversal potential per indexed CV (mV)
    pub reversal_potential: DVector<f64>,
    /// Internal concentration per indexed CV (mM)
    pub internal_concentration: DVector<f64>,
    /// External concentration per indexed CV (mM)
    pub external_concentration: DVector<f64>,
}

impl IonState {
    /// Create zeroed state over a sorted CV index list.
    pub fn new(node_index: Vec<usize>) -> Self {
        let n = node_index.len();
        Self {
            node_index,
            reversal_potential: DVector::zeros(n),
            internal_concentration: DVector::zeros(n),
            external_concentration: DVector::zeros(n),
        }
    }

    /// The CVs this species is defined on.
    pub fn node_index(&self) -> &[usize] {
        &self.node_index
    }

    /// Number of indexed CVs.
    pub fn len(&self) -> usize {
        self.node_index.len()
    }

    /// True when the species indexes no CVs.
    pub fn is_empty(&self) -> bool {
        self.node_index.is_empty()
    }

    /// Fill all three vectors from a defaults record.
    pub fn apply_defaults(&mut self, defaults: IonDefaults) {
        self.reversal_potential.fill(defaults.reversal_potential);
        self.internal_concentration
            .fill(defaults.internal_concentration);
        self.external_concentration
            .fill(defaults.external_concentration);
    }
}

/// Fixed-size bank of ion states, indexed by [`IonKind`].
#[derive(Debug, Clone, Default)]
pub struct IonBank {
    states: [Option<IonState>; 3],
}

impl IonBank {
    /// State for a species, if any mechanism declared it.
    pub fn get(&self, kind: IonKind) -> Option<&IonState> {
        self.states[kind.index()].as_ref()
    }

    /// Mutable state for a species.
    pub fn get_mut(&mut self, kind: IonKind) -> Option<&mut IonState> {
        self.states[kind.index()].as_mut()
    }

    /// Install the state for a species.
    pub fn insert(&mut self, kind: IonKind, state: IonState) {
        self.states[kind.index()] = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_classical_defaults() {
        assert_relative_eq!(IonDefaults::classical(IonKind::Na).reversal_potential, 50.0);
        assert_relative_eq!(IonDefaults::classical(IonKind::K).reversal_potential, -77.0);
        // Nernst on 2.0 / 5e-5 at 12.5 mV per e-fold
        let ca = IonDefaults::classical(IonKind::Ca);
        assert_relative_eq!(ca.reversal_potential, 12.5 * 40000.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_bank_is_sparse() {
        let mut bank = IonBank::default();
        assert!(bank.get(IonKind::Na).is_none());
        bank.insert(IonKind::Na, IonState::new(vec![0, 2, 5]));
        assert_eq!(bank.get(IonKind::Na).unwrap().len(), 3);
        assert!(bank.get(IonKind::K).is_none());
    }

    #[test]
    fn test_apply_defaults_fills_vectors() {
        let mut state = IonState::new(vec![1, 4]);
        state.apply_defaults(IonDefaults::classical(IonKind::K));
        assert_eq!(state.reversal_potential.len(), 2);
        assert_relative_eq!(state.reversal_potential[0], -77.0);
        assert_relative_eq!(state.external_concentration[1], 2.5);
    }
}
