use glam::DVec3;
use rayon::prelude::*;

use crate::equation_of_state::EquationOfState;
use crate::geometry;
use crate::mesh::PolyMesh;
use crate::utils::{chunks_by_offsets_mut, cyclic_next, cyclic_prev};

/// Per node result of the corner tetrahedron reduction.
#[derive(Clone, Copy, Default)]
struct NodalAccumulation {
    mass: f64,
    volume: f64,
    soundspeed: f64,
}

/// Accumulates nodal volume and volume weighted soundspeed (and, when
/// `with_mass` is set, nodal mass) from the cells around every node.
///
/// For each face incident to a node, a corner tetrahedron (node, face
/// centroid, half edge midpoint, cell centroid) is formed towards each of the
/// up to two cells sharing the face and each of the two edges bounding the
/// node on the face. Missing face neighbours are skipped, not an error.
///
/// The sweep is node parallel: every node owns its own reduction, so no two
/// units of work write the same element.
#[allow(clippy::too_many_arguments)]
pub fn accumulate_nodal_quantities(
    mesh: &PolyMesh,
    positions: &[DVec3],
    density: &[f64],
    energy: &[f64],
    eos: &EquationOfState,
    with_mass: bool,
    nodal_mass: &mut [f64],
    nodal_volume: &mut [f64],
    nodal_soundspeed: &mut [f64],
) {
    let accumulated: Vec<NodalAccumulation> = (0..mesh.n_nodes)
        .into_par_iter()
        .map(|nn| {
            let node_c = positions[nn];
            let mut acc = NodalAccumulation::default();

            for &face in mesh.faces_of_node(nn) {
                let face_nodes = mesh.nodes_of_face(face);
                let face_c = geometry::face_centroid(face_nodes, positions);

                // Location of this node on the face and its two
                // neighbouring nodes along the face cycle.
                let node_in_face = face_nodes
                    .iter()
                    .position(|&n| n == nn)
                    .expect("node missing from incident face");
                let neighbours = [
                    face_nodes[cyclic_prev(node_in_face, face_nodes.len())],
                    face_nodes[cyclic_next(node_in_face, face_nodes.len())],
                ];

                let (left, right) = mesh.face_cells[face];
                for cell in [Some(left), right].into_iter().flatten() {
                    for &neighbour in &neighbours {
                        let half_edge = 0.5 * (positions[neighbour] + node_c);
                        let area = geometry::corner_area_vector(node_c, half_edge, face_c);
                        let volume =
                            geometry::corner_tet_volume(area, mesh.centroids[cell] - face_c);

                        if with_mass {
                            acc.mass += density[cell] * volume;
                        }
                        acc.soundspeed += eos.sound_speed_from_energy(energy[cell]) * volume;
                        acc.volume += volume;
                    }
                }
            }
            acc
        })
        .collect();

    nodal_volume
        .par_iter_mut()
        .zip(nodal_soundspeed.par_iter_mut())
        .zip(nodal_mass.par_iter_mut())
        .zip(accumulated.par_iter())
        .for_each(|(((volume, soundspeed), mass), acc)| {
            *volume = acc.volume;
            *soundspeed = acc.soundspeed;
            if with_mass {
                *mass = acc.mass;
            }
        });
}

/// Normalises the accumulated nodal soundspeed by the accumulated nodal
/// volume. A pure division: re-running it on a re-accumulated field is
/// deterministic and idempotent.
pub fn normalise_soundspeed(nodal_soundspeed: &mut [f64], nodal_volume: &[f64]) {
    nodal_soundspeed
        .par_iter_mut()
        .zip(nodal_volume.par_iter())
        .for_each(|(soundspeed, volume)| {
            *soundspeed /= volume;
        });
}

/// Fills the per (cell, local node) sub-cell masses using the same corner
/// tetrahedron decomposition as the nodal accumulation, bounded to one cell.
pub fn accumulate_subcell_mass(
    mesh: &PolyMesh,
    positions: &[DVec3],
    density: &[f64],
    subcell_mass: &mut [f64],
) {
    let chunks = chunks_by_offsets_mut(subcell_mass, &mesh.cell_nodes_offsets);
    chunks
        .into_par_iter()
        .enumerate()
        .for_each(|(cell, masses)| {
            masses.fill(0.);
            let cell_nodes = mesh.nodes_of_cell(cell);
            for &face in mesh.faces_of_cell(cell) {
                let face_nodes = mesh.nodes_of_face(face);
                let face_c = geometry::face_centroid(face_nodes, positions);
                for (i, &node) in face_nodes.iter().enumerate() {
                    let node_c = positions[node];
                    let neighbours = [
                        face_nodes[cyclic_prev(i, face_nodes.len())],
                        face_nodes[cyclic_next(i, face_nodes.len())],
                    ];
                    let mut volume = 0.;
                    for &neighbour in &neighbours {
                        let half_edge = 0.5 * (positions[neighbour] + node_c);
                        let area = geometry::corner_area_vector(node_c, half_edge, face_c);
                        volume += geometry::corner_tet_volume(area, mesh.centroids[cell] - face_c);
                    }
                    let node_off = cell_nodes
                        .iter()
                        .position(|&n| n == node)
                        .expect("face node missing from cell");
                    masses[node_off] += density[cell] * volume;
                }
            }
        });
}
