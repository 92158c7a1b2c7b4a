use ale_hydro::{
    AleSolver, ArtificialViscosity, EquationOfState, HydroState, NoViscosity, PolyMesh, CFL,
};
use glam::DVec3;

pub const GAMMA: f64 = 1.4;

/// A cubic box of unit cells with a hot ball of gas in the centre,
/// integrated without artificial viscosity.
pub fn hotspot_setup(n: usize, dt_max: f64) -> (PolyMesh, HydroState, AleSolver) {
    let mesh = PolyMesh::rectilinear(n, n, n, DVec3::ONE);
    let centre = 0.5 * n as f64 * DVec3::ONE;
    let density = vec![1.; mesh.n_cells];
    let energy: Vec<f64> = (0..mesh.n_cells)
        .map(|cell| {
            if (mesh.centroids[cell] - centre).length() < 0.25 * n as f64 {
                10.
            } else {
                1.
            }
        })
        .collect();
    let state = HydroState::new(&mesh, &density, &energy);
    let solver = get_solver(Box::new(NoViscosity), dt_max);
    (mesh, state, solver)
}

pub fn get_solver(viscosity: Box<dyn ArtificialViscosity>, dt_max: f64) -> AleSolver {
    AleSolver::new(EquationOfState::ideal(GAMMA), viscosity, CFL, dt_max)
}
