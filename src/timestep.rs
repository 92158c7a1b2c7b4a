use glam::DVec3;
use rayon::prelude::*;

use crate::equation_of_state::EquationOfState;
use crate::mesh::PolyMesh;
use crate::utils::cyclic_next;

/// Default CFL factor bounding the stable timestep.
pub const CFL: f64 = 0.3;

/// Selects the stable global timestep from the supplied geometry and cell
/// energies: the minimum over all cells of `cfl * shortest_edge / soundspeed`.
///
/// Cells with vanishing soundspeed impose no bound; the caller clamps the
/// result against its configured maximum.
pub fn select_timestep(
    mesh: &PolyMesh,
    positions: &[DVec3],
    energy: &[f64],
    eos: &EquationOfState,
    cfl: f64,
) -> f64 {
    (0..mesh.n_cells)
        .into_par_iter()
        .map(|cell| {
            let mut shortest_edge = f64::INFINITY;
            for &face in mesh.faces_of_cell(cell) {
                let face_nodes = mesh.nodes_of_face(face);
                for (i, &current) in face_nodes.iter().enumerate() {
                    let next = face_nodes[cyclic_next(i, face_nodes.len())];
                    let edge = (positions[next] - positions[current]).length();
                    shortest_edge = shortest_edge.min(edge);
                }
            }
            let soundspeed = eos.sound_speed_from_energy(energy[cell]);
            if soundspeed > 0. {
                cfl * shortest_edge / soundspeed
            } else {
                f64::INFINITY
            }
        })
        .reduce(|| f64::INFINITY, f64::min)
}
