//! Finite-volume cell solver
//!
//! [`FvmCell`] owns the discretised state of one cell and advances it in
//! time: mechanisms accumulate membrane current, stimuli inject current,
//! the implicit voltage update is assembled into a Hines-ordered
//! tridiagonal system and solved in place, and pending synaptic events are
//! delivered exactly at their scheduled times between substeps.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::DVector;

use crate::error::{ConstructionError, RuntimeError};
use crate::events::{Event, EventQueue};
use crate::ion::{IonBank, IonDefaults, IonKind, IonState};
use crate::math::{area_circle, area_frustum, area_sphere, mean};
use crate::matrix::TridiagonalMatrix;
use crate::mechanisms::{ExpSyn, Mechanism, MechanismRegistry};
use crate::morphology::{CellDescription, Segment};
use crate::stimulus::IClamp;
use crate::units::{AXIAL_SCALE, MEMBRANE_SCALE, POINT_SCALE};

/// Per-cell FVM state machine.
///
/// Built once from a [`CellDescription`]; mechanisms, ions, stimuli and
/// synapses are fixed afterwards. `initialize()` moves the cell to its
/// resting state and must run before the first `advance`.
///
/// # Example
///
/// ```
/// use cablesim::cell::FvmCell;
/// use cablesim::morphology::{CellDescription, MechanismDesc};
///
/// let mut desc = CellDescription::with_soma(10.0);
/// desc.add_soma_mechanism(MechanismDesc::new("pas"));
/// let mut cell = FvmCell::new(&desc).unwrap();
/// cell.initialize();
/// cell.advance_to(10.0, 0.025).unwrap();
/// assert_eq!(cell.time(), 10.0);
/// ```
pub struct FvmCell {
    t: f64,
    matrix: TridiagonalMatrix,
    cv_area: DVector<f64>,
    face_alpha: DVector<f64>,
    cv_capacitance: DVector<f64>,
    current: DVector<f64>,
    voltage: DVector<f64>,
    v_rest: f64,
    mechanisms: Vec<Box<dyn Mechanism>>,
    /// Global synapse index -> (mechanism slot, mechanism-local instance)
    synapse_dispatch: Vec<(usize, usize)>,
    ions: IonBank,
    ion_defaults: [IonDefaults; 3],
    stimuli: Vec<(usize, IClamp)>,
    events: EventQueue,
}

impl FvmCell {
    /// Build a cell with the built-in mechanism catalogue.
    pub fn new(description: &CellDescription) -> Result<Self, ConstructionError> {
        Self::with_registry(description, &MechanismRegistry::core())
    }

    /// Build a cell, resolving mechanism names against `registry`.
    pub fn with_registry(
        description: &CellDescription,
        registry: &MechanismRegistry,
    ) -> Result<Self, ConstructionError> {
        let model = description.model()?;
        let n = model.size();

        let mut cv_area = DVector::<f64>::zeros(n);
        let mut face_alpha = DVector::<f64>::zeros(n);
        let mut cv_capacitance = DVector::<f64>::zeros(n);

        // Lower the geometry: every CV face sits at a compartment centre,
        // so each compartment splits its frustum surface between its own
        // CV and the parent CV.
        for (seg_idx, segment) in description.segments().iter().enumerate() {
            let membrane = segment.membrane();
            match segment {
                Segment::Soma { radius, .. } => {
                    let area = area_sphere(*radius);
                    cv_area[0] += area;
                    cv_capacitance[0] += area * membrane.c_m;
                }
                Segment::Cable { .. } => {
                    for comp in segment.compartments() {
                        let i = model.segment_index[seg_idx] + comp.index;
                        let j = model.parent_index[i];

                        let radius_center = mean(comp.radius_proximal, comp.radius_distal);
                        let area_face = area_circle(radius_center);
                        face_alpha[i] = area_face / (membrane.c_m * membrane.r_l * comp.length);

                        let halflen = comp.length / 2.0;
                        let area_left = area_frustum(halflen, comp.radius_proximal, radius_center);
                        let area_right = area_frustum(halflen, comp.radius_distal, radius_center);
                        cv_area[j] += area_left;
                        cv_area[i] += area_right;
                        cv_capacitance[j] += area_left * membrane.c_m;
                        cv_capacitance[i] += area_right * membrane.c_m;
                    }
                }
            }
        }

        // Normalise capacitance by CV surface and reject degenerate CVs
        for i in 0..n {
            if !(cv_area[i] > 0.0) || !cv_area[i].is_finite() {
                return Err(ConstructionError::InvalidGeometry { index: i });
            }
            cv_capacitance[i] /= cv_area[i];
            if !(cv_capacitance[i] > 0.0) || !cv_capacitance[i].is_finite() {
                return Err(ConstructionError::InvalidGeometry { index: i });
            }
        }

        // Collect mechanism placements per name; BTreeMap keeps the
        // registration order deterministic.
        let mut mech_map: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (seg_idx, segment) in description.segments().iter().enumerate() {
            for desc in segment.mechanisms() {
                mech_map.entry(desc.name.as_str()).or_default().push(seg_idx);
            }
        }

        let mut mechanisms: Vec<Box<dyn Mechanism>> = Vec::new();
        for (name, seg_indices) in &mech_map {
            let mut node_index = Vec::new();
            for &seg in seg_indices {
                node_index.extend(model.segment_index[seg]..model.segment_index[seg + 1]);
            }
            let mut mechanism = registry.build(name, node_index)?;
            for &seg in seg_indices {
                for desc in description.segments()[seg].mechanisms() {
                    if desc.name != *name {
                        continue;
                    }
                    for (param, value) in &desc.params {
                        if !mechanism.set_parameter(param, *value) {
                            return Err(ConstructionError::UnknownParameter {
                                mechanism: name.to_string(),
                                name: param.clone(),
                            });
                        }
                    }
                }
            }
            mechanisms.push(mechanism);
        }

        // Stimuli and synapses resolve to CV indices now; step time never
        // validates them again.
        let mut stimuli = Vec::with_capacity(description.stimuli().len());
        for (location, clamp) in description.stimuli() {
            stimuli.push((model.compartment_index(*location)?, *clamp));
        }

        let mut synapse_nodes = Vec::with_capacity(description.synapses().len());
        for location in description.synapses() {
            synapse_nodes.push(model.compartment_index(*location)?);
        }
        if !synapse_nodes.is_empty() {
            mechanisms.push(Box::new(ExpSyn::new(synapse_nodes)));
        }

        // Ion species over the union of the CVs of their dependents
        let mut ions = IonBank::default();
        for kind in IonKind::ALL {
            let mut used = BTreeSet::new();
            for mechanism in &mechanisms {
                if mechanism.uses_ion(kind) {
                    used.extend(mechanism.node_index().iter().copied());
                }
            }
            if used.is_empty() {
                continue;
            }
            let nodes: Vec<usize> = used.into_iter().collect();
            for mechanism in &mut mechanisms {
                if mechanism.uses_ion(kind) {
                    let index_map = mechanism
                        .node_index()
                        .iter()
                        .map(|cv| {
                            nodes
                                .binary_search(cv)
                                .expect("mechanism CV missing from ion index set")
                        })
                        .collect();
                    mechanism.set_ion(kind, index_map);
                }
            }
            ions.insert(kind, IonState::new(nodes));
        }

        for mechanism in &mut mechanisms {
            mechanism.set_areas(cv_area.as_slice());
        }

        let mut synapse_dispatch = Vec::new();
        for (slot, mechanism) in mechanisms.iter().enumerate() {
            for local in 0..mechanism.synapse_count() {
                synapse_dispatch.push((slot, local));
            }
        }

        let v_rest = description.v_rest();
        let ion_defaults = [
            description.ion_defaults(IonKind::Na),
            description.ion_defaults(IonKind::K),
            description.ion_defaults(IonKind::Ca),
        ];

        let mut cell = Self {
            t: 0.0,
            matrix: TridiagonalMatrix::new(model.parent_index),
            cv_area,
            face_alpha,
            cv_capacitance,
            current: DVector::zeros(n),
            voltage: DVector::from_element(n, v_rest),
            v_rest,
            mechanisms,
            synapse_dispatch,
            ions,
            ion_defaults,
            stimuli,
            events: EventQueue::new(),
        };
        cell.apply_ion_defaults();
        Ok(cell)
    }

    /// Reset to the resting state: time zero, resting voltage, default ion
    /// state, mechanism internal state re-sampled. Idempotent.
    pub fn initialize(&mut self) {
        self.t = 0.0;
        self.voltage.fill(self.v_rest);
        self.current.fill(0.0);
        self.apply_ion_defaults();
        for mechanism in &mut self.mechanisms {
            mechanism.init(self.voltage.as_slice(), &self.ions);
        }
    }

    fn apply_ion_defaults(&mut self) {
        for kind in IonKind::ALL {
            let defaults = self.ion_defaults[kind.index()];
            if let Some(state) = self.ions.get_mut(kind) {
                state.apply_defaults(defaults);
            }
        }
    }

    /// Advance the cell state by one implicit step of length `dt` (ms).
    pub fn advance(&mut self, dt: f64) -> Result<(), RuntimeError> {
        self.current.fill(0.0);

        for mechanism in &mut self.mechanisms {
            mechanism.set_params(self.t, dt);
            mechanism.compute_current(
                self.voltage.as_slice(),
                self.current.as_mut_slice(),
                &self.ions,
            );
        }

        for (cv, clamp) in &self.stimuli {
            let amplitude = clamp.amplitude_at(self.t);
            // current_ = i_m - i_e: injected current counts against the
            // membrane current, normalised from nA to a density
            self.current[*cv] -= POINT_SCALE * amplitude / self.cv_area[*cv];
        }

        self.assemble(dt);
        self.matrix.solve()?;
        self.voltage.copy_from(self.matrix.rhs_vector());

        for mechanism in &mut self.mechanisms {
            mechanism.update_state(self.voltage.as_slice(), &mut self.ions);
        }

        self.t += dt;
        Ok(())
    }

    /// Build the linear system for a step of length `dt`.
    ///
    /// The matrix layout, with `j = p[i]` the parent of `i`:
    ///
    /// ```text
    ///   d[j] . . u[i]
    ///    .  .     .
    ///    .     .  .
    ///   l[i] . . d[i]
    /// ```
    fn assemble(&mut self, dt: f64) {
        let n = self.size();
        let (parent, l, d, u, rhs) = self.matrix.parts_mut();

        for i in 0..n {
            d[i] = self.cv_area[i];
        }
        for i in 1..n {
            let a = AXIAL_SCALE * dt * self.face_alpha[i];
            d[i] += a;
            l[i] = -a;
            u[i] = -a;
            d[parent[i]] += a;
        }
        for i in 0..n {
            rhs[i] = self.cv_area[i]
                * (self.voltage[i]
                    - MEMBRANE_SCALE * dt / self.cv_capacitance[i] * self.current[i]);
        }
    }

    /// Advance to `tfinal` in steps of at most `dt`, delivering queued
    /// events at their exact times.
    ///
    /// No event is delivered before its scheduled time nor more than one
    /// substep late; events sharing a time are delivered in queue order
    /// through zero-length substeps. The final step lands on `tfinal`
    /// exactly because the clock is assigned, not accumulated.
    pub fn advance_to(&mut self, tfinal: f64, dt: f64) -> Result<(), RuntimeError> {
        while self.t < tfinal {
            let mut tnext = tfinal.min(self.t + dt);
            let event = self.events.pop_if_before(tnext);
            if let Some(e) = &event {
                // An event pushed with a past time is delivered now,
                // through a zero-length substep
                tnext = e.time.max(self.t);
            }
            self.advance(tnext - self.t)?;
            self.t = tnext;
            if let Some(e) = event {
                self.deliver(e)?;
            }
        }
        Ok(())
    }

    fn deliver(&mut self, event: Event) -> Result<(), RuntimeError> {
        let (slot, local) = *self
            .synapse_dispatch
            .get(event.target as usize)
            .ok_or(RuntimeError::EventOutOfRange {
                target: event.target,
                count: self.synapse_dispatch.len(),
            })?;
        self.mechanisms[slot].net_receive(local, event.weight as f64);
        Ok(())
    }

    /// Number of control volumes.
    pub fn size(&self) -> usize {
        self.matrix.size()
    }

    /// Current simulation time (ms).
    pub fn time(&self) -> f64 {
        self.t
    }

    /// Membrane potential per CV (mV).
    pub fn voltage(&self) -> &[f64] {
        self.voltage.as_slice()
    }

    /// Writable membrane potential, for clamping and initial conditions.
    pub fn voltage_mut(&mut self) -> &mut [f64] {
        self.voltage.as_mut_slice()
    }

    /// Surface area per CV (µm²).
    pub fn cv_areas(&self) -> &[f64] {
        self.cv_area.as_slice()
    }

    /// Specific capacitance per CV after area normalisation (F/m²).
    pub fn cv_capacitance(&self) -> &[f64] {
        self.cv_capacitance.as_slice()
    }

    /// The linear system of the most recent step, read-only.
    pub fn jacobian(&self) -> &TridiagonalMatrix {
        &self.matrix
    }

    /// The pending-event queue.
    pub fn queue(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// The mechanism instances, in registration order.
    pub fn mechanisms(&mut self) -> &mut [Box<dyn Mechanism>] {
        &mut self.mechanisms
    }

    /// Shared state of one ion species, if any mechanism depends on it.
    pub fn ion(&self, kind: IonKind) -> Option<&IonState> {
        self.ions.get(kind)
    }

    /// Total number of synapse instances addressable by events.
    pub fn num_synapses(&self) -> usize {
        self.synapse_dispatch.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::{Location, MechanismDesc};
    use approx::assert_relative_eq;

    fn passive_soma(g: f64) -> CellDescription {
        let mut desc = CellDescription::with_soma(10.0);
        desc.add_soma_mechanism(MechanismDesc::new("pas").with("g", g));
        desc
    }

    #[test]
    fn test_soma_geometry() {
        let cell = FvmCell::new(&passive_soma(0.001)).unwrap();
        assert_eq!(cell.size(), 1);
        assert_relative_eq!(cell.cv_areas()[0], area_sphere(10.0), epsilon = 1e-9);
        assert_relative_eq!(cell.cv_capacitance()[0], 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_mechanism_fails_construction() {
        let mut desc = CellDescription::with_soma(10.0);
        desc.add_soma_mechanism(MechanismDesc::new("nazgul"));
        assert_eq!(
            FvmCell::new(&desc).err(),
            Some(ConstructionError::UnknownMechanism("nazgul".to_string()))
        );
    }

    #[test]
    fn test_unknown_parameter_fails_construction() {
        let mut desc = CellDescription::with_soma(10.0);
        desc.add_soma_mechanism(MechanismDesc::new("pas").with("gbar", 0.1));
        assert!(matches!(
            FvmCell::new(&desc),
            Err(ConstructionError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_out_of_range_stimulus_fails_construction() {
        let mut desc = CellDescription::with_soma(10.0);
        desc.add_stimulus(Location::new(4, 0.5), IClamp::new(0.0, 1.0, 0.1));
        assert_eq!(
            FvmCell::new(&desc).err(),
            Some(ConstructionError::InvalidIndex)
        );
    }

    #[test]
    fn test_degenerate_geometry_fails_construction() {
        let desc = CellDescription::with_soma(0.0);
        assert_eq!(
            FvmCell::new(&desc).err(),
            Some(ConstructionError::InvalidGeometry { index: 0 })
        );
    }

    #[test]
    fn test_hh_wires_ions() {
        let mut desc = CellDescription::with_soma(10.0);
        desc.add_soma_mechanism(MechanismDesc::new("hh"));
        let cell = FvmCell::new(&desc).unwrap();
        let na = cell.ion(IonKind::Na).unwrap();
        assert_eq!(na.node_index(), &[0]);
        assert_relative_eq!(na.reversal_potential[0], 50.0);
        let k = cell.ion(IonKind::K).unwrap();
        assert_relative_eq!(k.reversal_potential[0], -77.0);
        assert!(cell.ion(IonKind::Ca).is_none());
    }

    #[test]
    fn test_assembly_is_symmetric() {
        let mut desc = CellDescription::with_soma(10.0);
        desc.add_cable(0, 5, 100.0, 1.0, 0.5);
        let mut cell = FvmCell::new(&desc).unwrap();
        cell.initialize();
        cell.advance(0.025).unwrap();
        let matrix = cell.jacobian();
        // The solve rewrites d and rhs but leaves the bands in place
        for i in 1..matrix.size() {
            assert_eq!(matrix.l()[i], matrix.u()[i]);
            assert!(matrix.l()[i] < 0.0);
        }
    }

    #[test]
    fn test_advance_accumulates_time() {
        let mut cell = FvmCell::new(&passive_soma(0.0)).unwrap();
        cell.initialize();
        cell.advance(0.5).unwrap();
        cell.advance(0.25).unwrap();
        assert_relative_eq!(cell.time(), 0.75);
    }

    #[test]
    fn test_event_without_synapse_is_out_of_range() {
        let mut cell = FvmCell::new(&passive_soma(0.0)).unwrap();
        cell.initialize();
        cell.queue().push(Event::new(0.5, 0, 1.0));
        assert_eq!(
            cell.advance_to(1.0, 0.1),
            Err(RuntimeError::EventOutOfRange {
                target: 0,
                count: 0
            })
        );
    }
}
