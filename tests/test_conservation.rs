use ale_hydro::{BoundaryCondition, HydroState, NoViscosity, PolyMesh};
use float_cmp::assert_approx_eq;
use glam::DVec3;

use common::{get_solver, hotspot_setup};

mod common;

#[test]
fn test_cell_masses_are_invariant() {
    let (mut mesh, mut state, mut solver) = hotspot_setup(4, 5e-3);
    solver.initialise(&mesh, &mut state);
    let cell_mass = state.cell_mass.clone();

    for _ in 0..5 {
        solver.step(&mut mesh, &mut state);
    }

    // The flow has to actually develop for this to mean anything.
    assert!(state.velocity0.iter().any(|v| v.length() > 1e-8));

    // Density and volume always reproduce the fixed cell masses.
    for cell in 0..mesh.n_cells {
        assert_approx_eq!(
            f64,
            state.density0[cell] * state.cell_volume[cell],
            cell_mass[cell],
            epsilon = 1e-11
        );
    }
    assert_approx_eq!(
        f64,
        state.total_mass(),
        cell_mass.iter().sum::<f64>(),
        epsilon = 1e-11
    );
}

#[test]
fn test_subcell_masses_sum_to_cell_mass() {
    let (mut mesh, mut state, mut solver) = hotspot_setup(4, 5e-3);
    solver.initialise(&mesh, &mut state);
    for _ in 0..3 {
        solver.step(&mut mesh, &mut state);
    }

    for cell in 0..mesh.n_cells {
        let offset = mesh.subcell_offset(cell);
        let n = mesh.nodes_of_cell(cell).len();
        let total: f64 = state.subcell_mass[offset..offset + n].iter().sum();
        assert_approx_eq!(f64, total, state.cell_mass[cell], epsilon = 1e-11);
    }
}

#[test]
fn test_subcell_energies_are_consistent() {
    // The gathered sub-cell internal energies of a cell recombine to the
    // cell's total internal energy: the gradient term integrates out against
    // the cell centroid.
    let (mut mesh, mut state, mut solver) = hotspot_setup(4, 1e-3);
    solver.initialise(&mesh, &mut state);
    for _ in 0..2 {
        solver.step(&mut mesh, &mut state);
    }

    for cell in 0..mesh.n_cells {
        let offset = mesh.subcell_offset(cell);
        let n = mesh.nodes_of_cell(cell).len();
        let gathered: f64 = state.subcell_energy[offset..offset + n].iter().sum();
        let expected = state.density0[cell] * state.energy0[cell] * state.cell_volume[cell];
        assert_approx_eq!(f64, gathered, expected, epsilon = 1e-5 * expected.abs());
    }
}

#[test]
fn test_subcell_volumes_tile_the_cells() {
    let (mut mesh, mut state, mut solver) = hotspot_setup(3, 1e-3);
    solver.initialise(&mesh, &mut state);
    solver.step(&mut mesh, &mut state);

    for cell in 0..mesh.n_cells {
        let offset = mesh.subcell_offset(cell);
        let n = mesh.nodes_of_cell(cell).len();
        let total: f64 = state.subcell_volume[offset..offset + n].iter().sum();
        assert_approx_eq!(
            f64,
            total,
            state.cell_volume[cell],
            epsilon = 1e-9 * state.cell_volume[cell]
        );
    }
}

#[test]
fn test_single_cell_stays_at_rest() {
    // Every node of an isolated cell sits on at least two walls, so the
    // boundary treatment pins the whole cell in place.
    let mut mesh = PolyMesh::rectilinear(1, 1, 1, DVec3::ONE);
    assert!(mesh
        .boundary
        .iter()
        .all(|b| matches!(b, BoundaryCondition::Fixed)));

    let mut state = HydroState::new(&mesh, &[1.], &[2.]);
    let mut solver = get_solver(Box::new(NoViscosity), 1e-2);
    solver.initialise(&mesh, &mut state);
    for _ in 0..4 {
        solver.step(&mut mesh, &mut state);
    }

    for v in &state.velocity0 {
        assert_eq!(*v, DVec3::ZERO);
    }
    assert_approx_eq!(f64, state.density0[0], 1., epsilon = 1e-13);
    assert_approx_eq!(f64, state.energy0[0], 2., epsilon = 1e-13);
    // Piecewise constant gathering over the eight corner sub-cells.
    for e in &state.subcell_energy {
        assert_approx_eq!(f64, *e, 2. / 8., epsilon = 1e-12);
    }
}

#[test]
fn test_boundary_velocities_stay_admissible() {
    let (mut mesh, mut state, mut solver) = hotspot_setup(4, 5e-3);
    solver.initialise(&mesh, &mut state);
    for _ in 0..5 {
        solver.step(&mut mesh, &mut state);
    }

    for (nn, boundary) in mesh.boundary.iter().enumerate() {
        match boundary {
            BoundaryCondition::Interior => {}
            BoundaryCondition::Reflecting(normal) => {
                assert!(state.velocity0[nn].dot(*normal).abs() < 1e-12);
            }
            BoundaryCondition::Fixed => {
                assert_eq!(state.velocity0[nn], DVec3::ZERO);
            }
        }
    }
}
