//! Membrane mechanisms
//!
//! A mechanism contributes membrane current and/or gating state on a set of
//! CVs it owns. Density mechanisms (ion channels) and point processes
//! (synapses) share one contract; point processes additionally consume
//! [`Mechanism::set_areas`] and implement [`Mechanism::net_receive`].
//!
//! Mechanisms never hold views into the cell's vectors: `compute_current`
//! and `update_state` borrow the voltage and current arrays explicitly for
//! the duration of the call.

mod expsyn;
mod hh;
mod pas;

pub use expsyn::ExpSyn;
pub use hh::HodgkinHuxley;
pub use pas::Passive;

use std::any::Any;

use crate::error::ConstructionError;
use crate::ion::{IonBank, IonKind};

/// Contract every membrane mechanism satisfies.
///
/// The cell calls, in order per step: `set_params`, `compute_current` (all
/// mechanisms, registration order), then after the voltage solve
/// `update_state` (same order). `init` runs once per `initialize()`.
pub trait Mechanism {
    /// Registry name of the mechanism.
    fn name(&self) -> &'static str;

    /// The CV indices this mechanism occupies, ascending for density
    /// mechanisms; point processes list one CV per instance.
    fn node_index(&self) -> &[usize];

    /// Reset internal state, sampling anything that depends on the initial
    /// voltage or ion state.
    fn init(&mut self, voltage: &[f64], ions: &IonBank);

    /// Receive the current timestep window before `compute_current`.
    fn set_params(&mut self, t: f64, dt: f64);

    /// Accumulate this mechanism's current density (mA/cm²) into
    /// `current[i]` for each owned CV `i`. `voltage` is current.
    fn compute_current(&mut self, voltage: &[f64], current: &mut [f64], ions: &IonBank);

    /// Advance internal gating/synaptic state across the window given to
    /// `set_params`. Runs after the voltage solve. At most one mechanism
    /// per species may write that species' reversal potential here; every
    /// other mechanism only reads the ion state.
    fn update_state(&mut self, voltage: &[f64], ions: &mut IonBank);

    /// Whether this mechanism reads or writes the given ion species.
    fn uses_ion(&self, _kind: IonKind) -> bool {
        false
    }

    /// Wire the mechanism to a species: `index_map[k]` is the position of
    /// the mechanism's k-th CV inside the species' shared index list.
    fn set_ion(&mut self, _kind: IonKind, _index_map: Vec<usize>) {}

    /// Hand point processes the CV surface areas (µm²) so per-instance
    /// currents can be normalised to densities. Density mechanisms ignore it.
    fn set_areas(&mut self, _areas: &[f64]) {}

    /// Number of synapse instances addressable through `net_receive`;
    /// zero for non-synaptic mechanisms.
    fn synapse_count(&self) -> usize {
        0
    }

    /// Deliver a discrete event to instance `target`, adding `weight` (µS)
    /// to its conductance. Only meaningful on synaptic mechanisms.
    fn net_receive(&mut self, _target: usize, _weight: f64) {}

    /// Override a named parameter. Returns false when the name is unknown.
    fn set_parameter(&mut self, name: &str, value: f64) -> bool;

    /// Downcast support for inspection in tests and tooling.
    fn as_any(&self) -> &dyn Any;
}

type Builder = fn(Vec<usize>) -> Box<dyn Mechanism>;

/// Name-keyed catalogue of mechanism constructors.
///
/// [`MechanismRegistry::core`] holds the built-in set (`pas`, `hh`,
/// `expsyn`); user mechanisms register alongside them.
pub struct MechanismRegistry {
    entries: Vec<(&'static str, Builder)>,
}

impl MechanismRegistry {
    /// Registry holding only the built-in mechanisms.
    pub fn core() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
        };
        registry.register("pas", |nodes| Box::new(Passive::new(nodes)));
        registry.register("hh", |nodes| Box::new(HodgkinHuxley::new(nodes)));
        registry.register("expsyn", |nodes| Box::new(ExpSyn::new(nodes)));
        registry
    }

    /// Register a constructor under a name, replacing any previous entry.
    pub fn register(&mut self, name: &'static str, builder: Builder) {
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, builder));
    }

    /// Instantiate a mechanism over the given CV indices.
    pub fn build(
        &self,
        name: &str,
        node_index: Vec<usize>,
    ) -> Result<Box<dyn Mechanism>, ConstructionError> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, builder)| builder(node_index))
            .ok_or_else(|| ConstructionError::UnknownMechanism(name.to_string()))
    }
}

impl Default for MechanismRegistry {
    fn default() -> Self {
        Self::core()
    }
}
