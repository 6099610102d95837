//! Cell description and compartment topology
//!
//! A [`CellDescription`] is the morphology-plus-decoration value the solver
//! is built from: a soma, cable segments discretised into compartments,
//! membrane parameters, mechanism placements, stimuli and synapse sites.
//! [`CellDescription::model`] lowers it to the immutable compartment
//! topology (parent-index and segment-index arrays) the FVM machinery runs
//! on.

use crate::error::ConstructionError;
use crate::ion::{IonDefaults, IonKind};
use crate::stimulus::IClamp;

/// A point on the cell: segment index plus relative position along it.
///
/// `position` runs from 0 (proximal end, towards the soma) to 1 (distal
/// end). The soma ignores the position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub segment: usize,
    pub position: f64,
}

impl Location {
    pub fn new(segment: usize, position: f64) -> Self {
        Self { segment, position }
    }

    /// The centre of the soma.
    pub fn soma() -> Self {
        Self::new(0, 0.5)
    }
}

/// A mechanism placement: registry name plus parameter overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct MechanismDesc {
    pub name: String,
    pub params: Vec<(String, f64)>,
}

impl MechanismDesc {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
        }
    }

    /// Override a parameter by name.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.params.push((name.to_string(), value));
        self
    }
}

/// Passive membrane parameters of a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Membrane {
    /// Specific capacitance (F/m²; 0.01 is the classical 1 µF/cm²)
    pub c_m: f64,
    /// Axial resistivity (Ω·cm)
    pub r_l: f64,
}

impl Default for Membrane {
    fn default() -> Self {
        Self {
            c_m: 0.01,
            r_l: 100.0,
        }
    }
}

/// One morphological segment of the cell.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Spherical soma, always segment 0 and CV 0.
    Soma {
        /// Radius (µm)
        radius: f64,
        membrane: Membrane,
        mechanisms: Vec<MechanismDesc>,
    },
    /// Unbranched cable, discretised into equal-length compartments.
    Cable {
        /// Segment index this cable attaches to (its distal end)
        parent: usize,
        /// Number of compartments the cable is subdivided into
        compartments: usize,
        /// Total length (µm)
        length: f64,
        /// Radius at the proximal end (µm)
        radius_proximal: f64,
        /// Radius at the distal end (µm)
        radius_distal: f64,
        membrane: Membrane,
        mechanisms: Vec<MechanismDesc>,
    },
}

/// One compartment of a cable: the radii at its two ends and its length.
/// The proximal end is the one closer to the soma under the minimal-degree
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compartment {
    pub index: usize,
    pub length: f64,
    pub radius_proximal: f64,
    pub radius_distal: f64,
}

impl Segment {
    /// Mechanism placements on this segment.
    pub fn mechanisms(&self) -> &[MechanismDesc] {
        match self {
            Segment::Soma { mechanisms, .. } => mechanisms,
            Segment::Cable { mechanisms, .. } => mechanisms,
        }
    }

    /// Membrane parameters of this segment.
    pub fn membrane(&self) -> Membrane {
        match self {
            Segment::Soma { membrane, .. } => *membrane,
            Segment::Cable { membrane, .. } => *membrane,
        }
    }

    /// Compartments of a cable, radii linearly interpolated along the
    /// segment. Empty for the soma.
    pub fn compartments(&self) -> Vec<Compartment> {
        match self {
            Segment::Soma { .. } => Vec::new(),
            Segment::Cable {
                compartments,
                length,
                radius_proximal,
                radius_distal,
                ..
            } => {
                let k = *compartments;
                let radius_at = |f: f64| radius_proximal + (radius_distal - radius_proximal) * f;
                (0..k)
                    .map(|c| Compartment {
                        index: c,
                        length: length / k as f64,
                        radius_proximal: radius_at(c as f64 / k as f64),
                        radius_distal: radius_at((c + 1) as f64 / k as f64),
                    })
                    .collect()
            }
        }
    }
}

/// Immutable compartment topology lowered from a description.
///
/// `parent_index[i]` is the parent CV of CV `i`, with `parent_index[0] == 0`
/// as the root sentinel and `parent_index[i] < i` for `i > 0`.
/// `segment_index[s]..segment_index[s + 1]` is the CV range of segment `s`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompartmentModel {
    pub parent_index: Vec<usize>,
    pub segment_index: Vec<usize>,
}

impl CompartmentModel {
    /// Number of CVs.
    pub fn size(&self) -> usize {
        self.parent_index.len()
    }

    /// Map a location to its CV index.
    pub fn compartment_index(&self, location: Location) -> Result<usize, ConstructionError> {
        let num_segments = self.segment_index.len().saturating_sub(1);
        if location.segment >= num_segments || !(0.0..=1.0).contains(&location.position) {
            return Err(ConstructionError::InvalidIndex);
        }
        let start = self.segment_index[location.segment];
        let count = self.segment_index[location.segment + 1] - start;
        let offset = ((location.position * count as f64) as usize).min(count - 1);
        Ok(start + offset)
    }
}

/// Builder-style description of a single cell.
///
/// # Example
///
/// ```
/// use cablesim::morphology::{CellDescription, Location, MechanismDesc};
///
/// let mut cell = CellDescription::with_soma(10.0);
/// cell.add_soma_mechanism(MechanismDesc::new("hh"));
/// let dend = cell.add_cable(0, 5, 200.0, 1.0, 0.5);
/// cell.add_cable_mechanism(dend, MechanismDesc::new("pas"));
/// cell.add_synapse(Location::new(dend, 1.0));
/// assert_eq!(cell.num_compartments(), 6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CellDescription {
    segments: Vec<Segment>,
    stimuli: Vec<(Location, IClamp)>,
    synapses: Vec<Location>,
    v_rest: Option<f64>,
    ion_defaults: [Option<IonDefaults>; 3],
}

impl CellDescription {
    /// An empty description. Segments are appended with [`Self::add_segment`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A description seeded with a soma of the given radius (µm).
    pub fn with_soma(radius: f64) -> Self {
        let mut cell = Self::new();
        cell.add_segment(Segment::Soma {
            radius,
            membrane: Membrane::default(),
            mechanisms: Vec::new(),
        });
        cell
    }

    /// Append a raw segment, returning its index.
    pub fn add_segment(&mut self, segment: Segment) -> usize {
        self.segments.push(segment);
        self.segments.len() - 1
    }

    /// Append a cable attached to `parent`, returning its segment index.
    /// Radii are linear between `radius_proximal` and `radius_distal`.
    pub fn add_cable(
        &mut self,
        parent: usize,
        compartments: usize,
        length: f64,
        radius_proximal: f64,
        radius_distal: f64,
    ) -> usize {
        self.add_segment(Segment::Cable {
            parent,
            compartments,
            length,
            radius_proximal,
            radius_distal,
            membrane: Membrane::default(),
            mechanisms: Vec::new(),
        })
    }

    /// Place a mechanism on the soma.
    pub fn add_soma_mechanism(&mut self, desc: MechanismDesc) {
        if let Some(Segment::Soma { mechanisms, .. }) = self.segments.first_mut() {
            mechanisms.push(desc);
        }
    }

    /// Place a mechanism on a cable segment.
    pub fn add_cable_mechanism(&mut self, segment: usize, desc: MechanismDesc) {
        if let Some(Segment::Cable { mechanisms, .. }) = self.segments.get_mut(segment) {
            mechanisms.push(desc);
        }
    }

    /// Override the membrane parameters of a segment.
    pub fn set_membrane(&mut self, segment: usize, membrane: Membrane) {
        match self.segments.get_mut(segment) {
            Some(Segment::Soma { membrane: m, .. }) => *m = membrane,
            Some(Segment::Cable { membrane: m, .. }) => *m = membrane,
            None => {}
        }
    }

    /// Attach a current clamp at a location.
    pub fn add_stimulus(&mut self, location: Location, clamp: IClamp) {
        self.stimuli.push((location, clamp));
    }

    /// Place a synapse at a location.
    pub fn add_synapse(&mut self, location: Location) {
        self.synapses.push(location);
    }

    /// Override the resting potential (mV) the cell initialises to.
    pub fn set_v_rest(&mut self, v_rest: f64) {
        self.v_rest = Some(v_rest);
    }

    /// Override the defaults of one ion species for this cell.
    pub fn set_ion_defaults(&mut self, kind: IonKind, defaults: IonDefaults) {
        self.ion_defaults[kind.index()] = Some(defaults);
    }

    /// Resting potential (mV), defaulting to the classical −65.
    pub fn v_rest(&self) -> f64 {
        self.v_rest
            .unwrap_or(crate::ion::DEFAULT_RESTING_POTENTIAL)
    }

    /// Defaults for one species: the per-cell override or the classical set.
    pub fn ion_defaults(&self, kind: IonKind) -> IonDefaults {
        self.ion_defaults[kind.index()].unwrap_or_else(|| IonDefaults::classical(kind))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn stimuli(&self) -> &[(Location, IClamp)] {
        &self.stimuli
    }

    pub fn synapses(&self) -> &[Location] {
        &self.synapses
    }

    /// Total number of CVs the description lowers to.
    pub fn num_compartments(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Soma { .. } => 1,
                Segment::Cable { compartments, .. } => *compartments,
            })
            .sum()
    }

    /// Lower the description to its compartment topology.
    ///
    /// Each cable compartment's parent is its predecessor along the
    /// minimal-degree ordering from the soma; the first compartment of a
    /// cable attaches to the distal CV of its parent segment. The result
    /// satisfies `parent_index[i] < i` for `i > 0`.
    pub fn model(&self) -> Result<CompartmentModel, ConstructionError> {
        if !matches!(self.segments.first(), Some(Segment::Soma { .. })) {
            return Err(ConstructionError::SomaPlacement);
        }

        let mut parent_index = Vec::with_capacity(self.num_compartments());
        let mut segment_index = Vec::with_capacity(self.segments.len() + 1);

        for (seg_idx, segment) in self.segments.iter().enumerate() {
            segment_index.push(parent_index.len());
            match segment {
                Segment::Soma { .. } => {
                    if seg_idx != 0 {
                        return Err(ConstructionError::SomaPlacement);
                    }
                    parent_index.push(0);
                }
                Segment::Cable {
                    parent,
                    compartments,
                    ..
                } => {
                    if *compartments == 0 {
                        return Err(ConstructionError::UnsupportedSegment);
                    }
                    if *parent >= seg_idx {
                        return Err(ConstructionError::InvalidIndex);
                    }
                    // Parent segments are already numbered, so the
                    // attachment CV is the last CV of the parent's range.
                    let attach = match self.segments[*parent] {
                        Segment::Soma { .. } => 0,
                        Segment::Cable { .. } => segment_index[*parent + 1] - 1,
                    };
                    for c in 0..*compartments {
                        let p = if c == 0 {
                            attach
                        } else {
                            parent_index.len() - 1
                        };
                        parent_index.push(p);
                    }
                }
            }
        }
        segment_index.push(parent_index.len());

        Ok(CompartmentModel {
            parent_index,
            segment_index,
        })
    }
}
