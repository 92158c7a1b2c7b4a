use glam::DVec3;
use rayon::prelude::*;

use crate::geometry;
use crate::mesh::PolyMesh;
use crate::utils::{chunks_by_offsets_mut, cyclic_next};

/// Accumulates the pressure gradient force contributions into the per
/// (cell, local node) sub-cell force array, zeroing it first.
///
/// For every cell face edge, the planar corner basis (node, face centroid,
/// edge midpoint, cell centroid) yields an area vector whose orientation is
/// fixed up by the sign of its dot product with the face-to-cell vector: the
/// node winding around irregular polyhedral cells is unspecified, so the
/// vector is flipped whenever it points towards the cell centroid. This is a
/// documented heuristic tied to that convention, not a general solution; the
/// conservation tests cover it.
///
/// The sweep is cell parallel and each cell writes only its own sub-cell
/// slots. Downstream kernels (artificial viscosity) add into the same array.
pub fn accumulate_pressure_forces(
    mesh: &PolyMesh,
    positions: &[DVec3],
    pressure: &[f64],
    subcell_force: &mut [DVec3],
) {
    let chunks = chunks_by_offsets_mut(subcell_force, &mesh.cell_nodes_offsets);
    chunks
        .into_par_iter()
        .enumerate()
        .for_each(|(cell, forces)| {
            forces.fill(DVec3::ZERO);
            let cell_nodes = mesh.nodes_of_cell(cell);

            for &face in mesh.faces_of_cell(cell) {
                let face_nodes = mesh.nodes_of_face(face);
                let face_c = geometry::face_centroid(face_nodes, positions);

                for (i, &current) in face_nodes.iter().enumerate() {
                    let next = face_nodes[cyclic_next(i, face_nodes.len())];
                    let half_edge = 0.5 * (positions[current] + positions[next]);
                    let mut area =
                        geometry::corner_area_vector(positions[current], half_edge, face_c);

                    // Orientation fix-up for the unspecified winding order.
                    if (mesh.centroids[cell] - face_c).dot(area) > 0. {
                        area = -area;
                    }

                    // Local offsets of the two edge nodes within the cell.
                    let mut node_off = 0;
                    let mut next_node_off = 0;
                    for (off, &n) in cell_nodes.iter().enumerate() {
                        if n == current {
                            node_off = off;
                        } else if n == next {
                            next_node_off = off;
                        }
                    }

                    let contribution = pressure[cell] * area;
                    forces[node_off] += contribution;
                    forces[next_node_off] += contribution;
                }
            }
        });
}

/// Gathers the total force on every node by summing the sub-cell force slots
/// of all incident cells.
///
/// The local offset of the node within each cell is found by a linear search
/// over the cell's node list (first match wins). Parallel over nodes: the
/// shared sub-cell array is only read here, each node owns its own sum.
pub fn gather_node_forces(mesh: &PolyMesh, subcell_force: &[DVec3]) -> Vec<DVec3> {
    (0..mesh.n_nodes)
        .into_par_iter()
        .map(|nn| {
            let mut force = DVec3::ZERO;
            for &cell in mesh.cells_of_node(nn) {
                let cell_nodes = mesh.nodes_of_cell(cell);
                let node_off = cell_nodes
                    .iter()
                    .position(|&n| n == nn)
                    .expect("node missing from incident cell");
                force += subcell_force[mesh.subcell_offset(cell) + node_off];
            }
            force
        })
        .collect()
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;
    use glam::DVec3;

    use crate::mesh::PolyMesh;

    use super::*;

    #[test]
    fn test_uniform_pressure_cancels_on_interior_nodes() {
        // With uniform pressure, the sub-cell forces of the cells around an
        // interior node close a surface: the gathered force vanishes.
        let mesh = PolyMesh::rectilinear(2, 2, 2, DVec3::ONE);
        let pressure = vec![3.; mesh.n_cells];
        let mut subcell_force = vec![DVec3::ZERO; mesh.n_incidences()];
        accumulate_pressure_forces(&mesh, &mesh.positions0, &pressure, &mut subcell_force);
        let forces = gather_node_forces(&mesh, &subcell_force);

        let centre = mesh
            .positions0
            .iter()
            .position(|p| (*p - DVec3::ONE).length() < 1e-12)
            .unwrap();
        assert_approx_eq!(f64, forces[centre].length(), 0., epsilon = 1e-12);
    }

    #[test]
    fn test_cell_force_balance() {
        // The flipped area vectors of one cell sum to a closed surface:
        // the net force a cell exerts on its own nodes is zero.
        let mesh = PolyMesh::rectilinear(1, 1, 1, DVec3::new(1., 0.5, 2.));
        let pressure = vec![1.7];
        let mut subcell_force = vec![DVec3::ZERO; mesh.n_incidences()];
        accumulate_pressure_forces(&mesh, &mesh.positions0, &pressure, &mut subcell_force);
        let net: DVec3 = subcell_force.iter().sum();
        assert_approx_eq!(f64, net.length(), 0., epsilon = 1e-12);
    }

    #[test]
    fn test_corner_force_points_outward() {
        let mesh = PolyMesh::rectilinear(1, 1, 1, DVec3::ONE);
        let pressure = vec![1.];
        let mut subcell_force = vec![DVec3::ZERO; mesh.n_incidences()];
        accumulate_pressure_forces(&mesh, &mesh.positions0, &pressure, &mut subcell_force);
        let forces = gather_node_forces(&mesh, &subcell_force);
        for (node, force) in forces.iter().enumerate() {
            let outward = mesh.positions0[node] - mesh.centroids[0];
            assert!(force.dot(outward) > 0.);
        }
    }
}
