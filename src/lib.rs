//! Arbitrary Lagrangian-Eulerian (ALE) compressible hydrodynamics on
//! unstructured polyhedral meshes.
//!
//! The mesh moves with the flow through an explicit predictor/corrector
//! integration of the Euler equations, with nodal masses and forces built
//! from a corner tetrahedron decomposition of every cell. Each step ends
//! with the gathering stage of a remap: conservative sub-cell masses,
//! velocities and internal energies ready for advection back to a target
//! mesh.

pub use boundary::BoundaryCondition;
pub use equation_of_state::EquationOfState;
pub use errors::ConfigError;
pub use mesh::{PolyMesh, TimeLevel};
pub use solver::AleSolver;
pub use state::HydroState;
pub use timestep::CFL;
pub use viscosity::{ArtificialViscosity, EdgeViscosity, NoViscosity};

mod boundary;
mod equation_of_state;
mod errors;
mod forces;
pub mod geometry;
mod mesh;
mod nodal;
mod remap;
mod solver;
mod state;
mod timestep;
mod utils;
mod viscosity;
