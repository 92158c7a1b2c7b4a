use glam::DVec3;
use rayon::prelude::*;

use crate::boundary::reflect_velocities;
use crate::equation_of_state::EquationOfState;
use crate::forces::{accumulate_pressure_forces, gather_node_forces};
use crate::geometry;
use crate::mesh::{PolyMesh, TimeLevel};
use crate::nodal::{accumulate_nodal_quantities, accumulate_subcell_mass, normalise_soundspeed};
use crate::remap::{gather_subcell_energies, reconstruct_subcell_velocities};
use crate::state::HydroState;
use crate::timestep::select_timestep;
use crate::viscosity::ArtificialViscosity;

/// Explicit predictor/corrector integrator for compressible hydrodynamics on
/// a moving polyhedral mesh, followed by the gathering stage of the remap.
///
/// One [`step`](Self::step) advances the accepted state (`..0` buffers) by
/// one timestep:
///
/// 1. Predictor: forces from the start-of-step geometry move the nodes a
///    full step; the predicted thermodynamic state is evaluated there and
///    the node positions are then pulled back to the half step.
/// 2. Corrector: forces from the half step state move the accepted nodes and
///    update the accepted energy and density.
/// 3. Remap gather: sub-cell masses, velocities and internal energies are
///    collected on the corner tetrahedron decomposition of the moved mesh.
///
/// The timestep is re-selected twice per step, directly after each node
/// move, and each stage's energy update already uses the freshly selected
/// value.
pub struct AleSolver {
    eos: EquationOfState,
    viscosity: Box<dyn ArtificialViscosity>,
    cfl: f64,
    dt: f64,
    dt_max: f64,
    time: f64,
    step_count: u64,
}

impl AleSolver {
    pub fn new(
        eos: EquationOfState,
        viscosity: Box<dyn ArtificialViscosity>,
        cfl: f64,
        dt_max: f64,
    ) -> Self {
        AleSolver {
            eos,
            viscosity,
            cfl,
            dt: dt_max,
            dt_max,
            time: 0.,
            step_count: 0,
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn eos(&self) -> &EquationOfState {
        &self.eos
    }

    /// Evaluates the initial pressure field and selects the first stable
    /// timestep. Must run once before stepping.
    pub fn initialise(&mut self, mesh: &PolyMesh, state: &mut HydroState) {
        let eos = &self.eos;
        state
            .pressure0
            .par_iter_mut()
            .zip(state.energy0.par_iter())
            .zip(state.density0.par_iter())
            .for_each(|((pressure, energy), density)| {
                *pressure = eos.gas_pressure_from_energy(*energy, *density);
            });

        self.dt =
            select_timestep(mesh, &mesh.positions0, &state.energy0, &self.eos, self.cfl)
                .min(self.dt_max);
        log::info!(
            "initialised: {} cells, {} nodes, dt = {:.6e}",
            mesh.n_cells,
            mesh.n_nodes,
            self.dt
        );
    }

    /// Advances the accepted state by one timestep.
    pub fn step(&mut self, mesh: &mut PolyMesh, state: &mut HydroState) {
        self.predictor(mesh, state);
        self.corrector(mesh, state);
        self.remap_gather(mesh, state);

        self.step_count += 1;
        state.self_check();
        log::debug!(
            "step {}: t = {:.6e}, dt = {:.6e}, internal energy = {:.6e}",
            self.step_count,
            self.time,
            self.dt,
            state.total_internal_energy()
        );
    }

    fn predictor(&mut self, mesh: &mut PolyMesh, state: &mut HydroState) {
        let eos = &self.eos;

        // Equation of state on the accepted state.
        state
            .pressure0
            .par_iter_mut()
            .zip(state.energy0.par_iter())
            .zip(state.density0.par_iter())
            .for_each(|((pressure, energy), density)| {
                *pressure = eos.gas_pressure_from_energy(*energy, *density);
            });

        accumulate_nodal_quantities(
            mesh,
            &mesh.positions0,
            &state.density0,
            &state.energy0,
            eos,
            true,
            &mut state.nodal_mass,
            &mut state.nodal_volume,
            &mut state.nodal_soundspeed,
        );
        normalise_soundspeed(&mut state.nodal_soundspeed, &state.nodal_volume);

        state.subcell_force.fill(DVec3::ZERO);
        accumulate_pressure_forces(
            mesh,
            &mesh.positions0,
            &state.pressure0,
            &mut state.subcell_force,
        );
        self.viscosity.accumulate(
            mesh,
            &mesh.positions0,
            &state.velocity0,
            &state.nodal_soundspeed,
            &state.nodal_mass,
            &state.nodal_volume,
            &mut state.limiter,
            &mut state.subcell_force,
        );

        // Predicted velocities, immediately time centered.
        let node_forces = gather_node_forces(mesh, &state.subcell_force);
        let dt = self.dt;
        {
            let velocity0 = &state.velocity0;
            let nodal_mass = &state.nodal_mass;
            state
                .velocity1
                .par_iter_mut()
                .enumerate()
                .for_each(|(nn, v1)| {
                    let predicted = velocity0[nn] + dt * node_forces[nn] / nodal_mass[nn];
                    *v1 = 0.5 * (velocity0[nn] + predicted);
                });
        }
        reflect_velocities(&mesh.boundary, &mut state.velocity1);

        // Move the nodes a full step by the predicted velocity.
        {
            let velocity1 = &state.velocity1;
            let PolyMesh {
                positions0,
                positions1,
                ..
            } = &mut *mesh;
            positions1
                .par_iter_mut()
                .zip(positions0.par_iter())
                .zip(velocity1.par_iter())
                .for_each(|((x1, x0), v)| {
                    *x1 = *x0 + dt * *v;
                });
        }
        mesh.recompute_centroids(TimeLevel::Predicted);

        self.dt = select_timestep(mesh, &mesh.positions1, &state.energy0, eos, self.cfl)
            .min(self.dt_max);
        let dt = self.dt;

        // Predicted energy from the work done at the cell corners.
        {
            let mesh = &*mesh;
            let velocity1 = &state.velocity1;
            let subcell_force = &state.subcell_force;
            let energy0 = &state.energy0;
            let cell_mass = &state.cell_mass;
            state
                .energy1
                .par_iter_mut()
                .enumerate()
                .for_each(|(cell, e1)| {
                    let offset = mesh.subcell_offset(cell);
                    let mut work = 0.;
                    for (local, &node) in mesh.nodes_of_cell(cell).iter().enumerate() {
                        work += velocity1[node].dot(subcell_force[offset + local]);
                    }
                    *e1 = energy0[cell] - dt * work / cell_mass[cell];
                });
        }

        // Predicted density from the moved cell volumes.
        {
            let mesh = &*mesh;
            let cell_mass = &state.cell_mass;
            state
                .density1
                .par_iter_mut()
                .enumerate()
                .for_each(|(cell, rho1)| {
                    let volume = geometry::cell_volume(
                        mesh,
                        &mesh.positions1,
                        cell,
                        mesh.centroids[cell],
                    );
                    *rho1 = cell_mass[cell] / volume;
                });
        }

        // Time centered pressure for the corrector.
        {
            let pressure0 = &state.pressure0;
            state
                .pressure1
                .par_iter_mut()
                .enumerate()
                .for_each(|(cell, p1)| {
                    let predicted =
                        eos.gas_pressure_from_energy(state.energy1[cell], state.density1[cell]);
                    *p1 = 0.5 * (pressure0[cell] + predicted);
                });
        }

        // Pull the predicted nodes back to the half step. The cell centroids
        // are deliberately left at the full step positions; the corrector
        // consumes them as they are.
        {
            let PolyMesh {
                positions0,
                positions1,
                ..
            } = &mut *mesh;
            positions1
                .par_iter_mut()
                .zip(positions0.par_iter())
                .for_each(|(x1, x0)| {
                    *x1 = 0.5 * (*x1 + *x0);
                });
        }
    }

    fn corrector(&mut self, mesh: &mut PolyMesh, state: &mut HydroState) {
        let eos = &self.eos;

        // Nodal volume and soundspeed at the half step; the nodal mass from
        // the predictor is kept.
        accumulate_nodal_quantities(
            mesh,
            &mesh.positions1,
            &state.density1,
            &state.energy1,
            eos,
            false,
            &mut state.nodal_mass,
            &mut state.nodal_volume,
            &mut state.nodal_soundspeed,
        );
        normalise_soundspeed(&mut state.nodal_soundspeed, &state.nodal_volume);

        state.subcell_force.fill(DVec3::ZERO);
        accumulate_pressure_forces(
            mesh,
            &mesh.positions1,
            &state.pressure1,
            &mut state.subcell_force,
        );
        self.viscosity.accumulate(
            mesh,
            &mesh.positions1,
            &state.velocity1,
            &state.nodal_soundspeed,
            &state.nodal_mass,
            &state.nodal_volume,
            &mut state.limiter,
            &mut state.subcell_force,
        );

        // Corrected velocities: advance the predicted velocity another step,
        // then time center into the accepted buffer.
        let node_forces = gather_node_forces(mesh, &state.subcell_force);
        let dt = self.dt;
        state
            .velocity0
            .par_iter_mut()
            .zip(state.velocity1.par_iter_mut())
            .zip(state.nodal_mass.par_iter())
            .zip(node_forces.par_iter())
            .for_each(|(((v0, v1), mass), force)| {
                *v1 += dt * *force / *mass;
                *v0 = 0.5 * (*v1 + *v0);
            });
        reflect_velocities(&mesh.boundary, &mut state.velocity0);

        // Move the accepted nodes.
        mesh.positions0
            .par_iter_mut()
            .zip(state.velocity0.par_iter())
            .for_each(|(x0, v)| {
                *x0 += dt * *v;
            });
        self.time += dt;

        self.dt = select_timestep(mesh, &mesh.positions0, &state.energy1, eos, self.cfl)
            .min(self.dt_max);
        let dt = self.dt;

        // Corrected energy.
        {
            let mesh = &*mesh;
            let velocity0 = &state.velocity0;
            let subcell_force = &state.subcell_force;
            let cell_mass = &state.cell_mass;
            state
                .energy0
                .par_iter_mut()
                .enumerate()
                .for_each(|(cell, e0)| {
                    let offset = mesh.subcell_offset(cell);
                    let mut work = 0.;
                    for (local, &node) in mesh.nodes_of_cell(cell).iter().enumerate() {
                        work += velocity0[node].dot(subcell_force[offset + local]);
                    }
                    *e0 -= dt * work / cell_mass[cell];
                });
        }

        mesh.recompute_centroids(TimeLevel::Current);

        // Corrected density and volume from the final geometry.
        {
            let mesh = &*mesh;
            let cell_mass = &state.cell_mass;
            state
                .cell_volume
                .par_iter_mut()
                .zip(state.density0.par_iter_mut())
                .enumerate()
                .for_each(|(cell, (volume, rho0))| {
                    *volume = geometry::cell_volume(
                        mesh,
                        &mesh.positions0,
                        cell,
                        mesh.centroids[cell],
                    );
                    *rho0 = cell_mass[cell] / *volume;
                });
        }
    }

    /// Gathering stage of the remap on the final geometry of the step.
    fn remap_gather(&mut self, mesh: &PolyMesh, state: &mut HydroState) {
        accumulate_subcell_mass(
            mesh,
            &mesh.positions0,
            &state.density0,
            &mut state.subcell_mass,
        );
        reconstruct_subcell_velocities(
            mesh,
            &state.velocity0,
            &state.subcell_mass,
            &state.cell_mass,
            &mut state.subcell_velocity,
        );
        gather_subcell_energies(
            mesh,
            &mesh.positions0,
            &state.energy0,
            &state.density0,
            &mut state.subcell_volume,
            &mut state.subcell_integrals,
            &mut state.subcell_energy,
        );
    }
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;
    use glam::DVec3;

    use crate::equation_of_state::EquationOfState;
    use crate::mesh::PolyMesh;
    use crate::state::HydroState;
    use crate::timestep::CFL;
    use crate::viscosity::NoViscosity;

    use super::AleSolver;

    fn uniform_setup(n: usize) -> (PolyMesh, HydroState, AleSolver) {
        let mesh = PolyMesh::rectilinear(n, n, n, DVec3::ONE);
        let density = vec![1.; mesh.n_cells];
        let energy = vec![1.; mesh.n_cells];
        let state = HydroState::new(&mesh, &density, &energy);
        let solver = AleSolver::new(
            EquationOfState::ideal(1.4),
            Box::new(NoViscosity),
            CFL,
            0.05,
        );
        (mesh, state, solver)
    }

    #[test]
    fn test_uniform_state_stays_at_rest() {
        // In a uniform box the interior pressure forces cancel and the wall
        // normal components are removed by reflection, so nothing moves.
        let (mut mesh, mut state, mut solver) = uniform_setup(3);
        solver.initialise(&mesh, &mut state);
        let positions_before = mesh.positions0.clone();
        solver.step(&mut mesh, &mut state);

        for v in &state.velocity0 {
            assert!(v.length() < 1e-12);
        }
        for (before, after) in positions_before.iter().zip(mesh.positions0.iter()) {
            assert!((*after - *before).length() < 1e-12);
        }
        for cell in 0..mesh.n_cells {
            assert_approx_eq!(f64, state.density0[cell], 1., epsilon = 1e-12);
            assert_approx_eq!(f64, state.energy0[cell], 1., epsilon = 1e-12);
        }
    }

    #[test]
    fn test_step_advances_time_and_selects_dt() {
        let (mut mesh, mut state, mut solver) = uniform_setup(3);
        solver.initialise(&mesh, &mut state);
        let dt0 = solver.dt();
        assert!(dt0 > 0. && dt0 <= 0.05);

        solver.step(&mut mesh, &mut state);
        assert_eq!(solver.step_count(), 1);
        assert!(solver.time() > 0.);
        assert!(solver.dt() > 0. && solver.dt() <= 0.05);
    }

    #[test]
    fn test_hotspot_expands_and_conserves_mass() {
        let mesh_size = 4;
        let mut mesh = PolyMesh::rectilinear(mesh_size, mesh_size, mesh_size, DVec3::ONE);
        let density = vec![1.; mesh.n_cells];
        let mut energy = vec![1.; mesh.n_cells];
        // Heat the cells around the box centre.
        for cell in 0..mesh.n_cells {
            if (mesh.centroids[cell] - DVec3::splat(2.)).length() < 1. {
                energy[cell] = 10.;
            }
        }
        let mut state = HydroState::new(&mesh, &density, &energy);
        let mut solver = AleSolver::new(
            EquationOfState::ideal(1.4),
            Box::new(NoViscosity),
            CFL,
            0.01,
        );
        solver.initialise(&mesh, &mut state);
        let mass_before = state.total_mass();

        let mut moved = false;
        for _ in 0..3 {
            solver.step(&mut mesh, &mut state);
            moved |= state.velocity0.iter().any(|v| v.length() > 1e-10);
        }

        assert!(moved);
        // Cell masses are invariants of the Lagrangian motion; the density
        // and volume fields must still reproduce them.
        let mass_after: f64 = state
            .density0
            .iter()
            .zip(state.cell_volume.iter())
            .map(|(rho, vol)| rho * vol)
            .sum();
        assert_approx_eq!(f64, mass_after, mass_before, epsilon = 1e-10);
        state.self_check();
    }
}
