use glam::DVec3;

use crate::geometry;
use crate::mesh::PolyMesh;

/// All field buffers owned by the solver, allocated once from the mesh counts
/// and mutated in place each step.
///
/// Cell and node fields are double buffered: the `..0` buffer holds the
/// accepted start-of-step state and the `..1` buffer the predicted state.
/// Which buffer is current is fixed per pipeline stage (see
/// [`AleSolver::step`](crate::AleSolver::step)), never implicit.
///
/// `cell_mass` is set once from the initial density and volume and is never
/// written by the step: total mass conservation holds by construction.
pub struct HydroState {
    pub energy0: Vec<f64>,
    pub energy1: Vec<f64>,
    pub density0: Vec<f64>,
    pub density1: Vec<f64>,
    pub pressure0: Vec<f64>,
    pub pressure1: Vec<f64>,
    pub cell_volume: Vec<f64>,
    pub cell_mass: Vec<f64>,

    pub velocity0: Vec<DVec3>,
    pub velocity1: Vec<DVec3>,
    pub nodal_mass: Vec<f64>,
    pub nodal_volume: Vec<f64>,
    pub nodal_soundspeed: Vec<f64>,
    /// Nodal limiter scratch consumed by artificial viscosity kernels.
    pub limiter: Vec<f64>,

    /// Per (cell, local node) force accumulator, pressure plus viscosity.
    pub subcell_force: Vec<DVec3>,
    pub subcell_mass: Vec<f64>,
    pub subcell_velocity: Vec<DVec3>,
    pub subcell_volume: Vec<f64>,
    pub subcell_integrals: Vec<DVec3>,
    pub subcell_energy: Vec<f64>,
}

impl HydroState {
    /// Allocates the state buffers for `mesh` and initialises them from the
    /// given per-cell density and specific internal energy.
    ///
    /// Cell volumes are computed from the start-of-step geometry and the cell
    /// masses derived from them; velocities start at rest.
    pub fn new(mesh: &PolyMesh, density: &[f64], energy: &[f64]) -> Self {
        assert_eq!(density.len(), mesh.n_cells);
        assert_eq!(energy.len(), mesh.n_cells);

        let cell_volume: Vec<f64> = (0..mesh.n_cells)
            .map(|cell| geometry::cell_volume(mesh, &mesh.positions0, cell, mesh.centroids[cell]))
            .collect();
        let cell_mass: Vec<f64> = density
            .iter()
            .zip(cell_volume.iter())
            .map(|(rho, vol)| rho * vol)
            .collect();

        let n_cells = mesh.n_cells;
        let n_nodes = mesh.n_nodes;
        let n_incidences = mesh.n_incidences();
        HydroState {
            energy0: energy.to_vec(),
            energy1: vec![0.; n_cells],
            density0: density.to_vec(),
            density1: vec![0.; n_cells],
            pressure0: vec![0.; n_cells],
            pressure1: vec![0.; n_cells],
            cell_volume,
            cell_mass,
            velocity0: vec![DVec3::ZERO; n_nodes],
            velocity1: vec![DVec3::ZERO; n_nodes],
            nodal_mass: vec![0.; n_nodes],
            nodal_volume: vec![0.; n_nodes],
            nodal_soundspeed: vec![0.; n_nodes],
            limiter: vec![0.; n_nodes],
            subcell_force: vec![DVec3::ZERO; n_incidences],
            subcell_mass: vec![0.; n_incidences],
            subcell_velocity: vec![DVec3::ZERO; n_incidences],
            subcell_volume: vec![0.; n_incidences],
            subcell_integrals: vec![DVec3::ZERO; n_incidences],
            subcell_energy: vec![0.; n_incidences],
        }
    }

    // Read accessors for the accepted state, e.g. for visualization export.
    pub fn energy(&self) -> &[f64] {
        &self.energy0
    }

    pub fn density(&self) -> &[f64] {
        &self.density0
    }

    pub fn pressure(&self) -> &[f64] {
        &self.pressure0
    }

    pub fn velocity(&self) -> &[DVec3] {
        &self.velocity0
    }

    pub fn total_mass(&self) -> f64 {
        self.cell_mass.iter().sum()
    }

    /// Mass weighted total specific internal energy of the accepted state.
    pub fn total_internal_energy(&self) -> f64 {
        self.cell_mass
            .iter()
            .zip(self.energy0.iter())
            .map(|(m, e)| m * e)
            .sum()
    }

    pub fn self_check(&self) {
        for cell in 0..self.energy0.len() {
            debug_assert!(self.energy0[cell].is_finite());
            debug_assert!(self.density0[cell].is_finite());
            debug_assert!(self.density0[cell] > 0.);
            debug_assert!(self.cell_volume[cell] > 0.);
        }
        for v in self.velocity0.iter() {
            debug_assert!(v.is_finite());
        }
    }
}
