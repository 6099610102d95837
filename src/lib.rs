//! cablesim - Compartmental neuron simulation core
//!
//! A finite-volume discretisation of the 1-D cable equation on tree
//! morphologies, advanced with an implicit voltage update and a
//! Hines-ordered tridiagonal solve. Membrane mechanisms (ion channels,
//! synapses) plug into the cell through a shared-vector contract, and
//! discrete synaptic events are delivered from a time-ordered queue,
//! interleaved exactly with the time stepping.
//!
//! # Architecture
//!
//! - A [`morphology::CellDescription`] describes one cell: soma, cables,
//!   mechanism placements, stimuli and synapse sites.
//! - [`cell::FvmCell`] lowers the description into control volumes and owns
//!   all per-step state: voltage, current, geometry coefficients, the
//!   [`matrix::TridiagonalMatrix`], mechanisms, ion state and the
//!   [`events::EventQueue`].
//! - Each step assembles the implicit system from geometry and the
//!   accumulated membrane current, solves it in O(N), then lets mechanisms
//!   advance their internal state.
//!
//! # Example
//!
//! ```
//! use cablesim::prelude::*;
//!
//! // Ball-and-stick cell: HH soma, passive dendrite, one synapse
//! let mut desc = CellDescription::with_soma(10.0);
//! desc.add_soma_mechanism(MechanismDesc::new("hh"));
//! let dend = desc.add_cable(0, 5, 200.0, 1.0, 0.5);
//! desc.add_cable_mechanism(dend, MechanismDesc::new("pas"));
//! desc.add_synapse(Location::new(dend, 1.0));
//!
//! let mut cell = FvmCell::new(&desc).unwrap();
//! cell.initialize();
//! cell.queue().push(Event::new(2.0, 0, 0.5));
//! cell.advance_to(10.0, 0.025).unwrap();
//! assert_eq!(cell.time(), 10.0);
//! ```

pub mod cell;
pub mod error;
pub mod events;
pub mod ion;
pub mod math;
pub mod matrix;
pub mod mechanisms;
pub mod morphology;
pub mod stimulus;
pub mod units;

pub use cell::FvmCell;
pub use error::{ConstructionError, RuntimeError};
pub use events::{Event, EventQueue};
pub use ion::{IonBank, IonDefaults, IonKind, IonState};
pub use matrix::TridiagonalMatrix;
pub use mechanisms::{ExpSyn, HodgkinHuxley, Mechanism, MechanismRegistry, Passive};
pub use morphology::{CellDescription, Location, MechanismDesc, Membrane, Segment};
pub use stimulus::IClamp;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cell::FvmCell;
    pub use crate::error::{ConstructionError, RuntimeError};
    pub use crate::events::{Event, EventQueue};
    pub use crate::ion::{IonDefaults, IonKind};
    pub use crate::mechanisms::{Mechanism, MechanismRegistry};
    pub use crate::morphology::{CellDescription, Location, MechanismDesc, Membrane};
    pub use crate::stimulus::IClamp;
}
