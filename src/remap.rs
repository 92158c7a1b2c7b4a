use glam::{DMat3, DVec3};
use rayon::prelude::*;

use crate::geometry::{self, TET_FACES};
use crate::mesh::PolyMesh;
use crate::utils::{chunks_by_offsets_mut, cyclic_next, cyclic_prev};

/// Face blend of nodal velocities around one (cell, node) pair: the sum over
/// the faces of the cell touching the node of the left/right neighbour
/// velocities and a mass weighted face centre stencil.
///
/// Returns the blend vector and the stencil count `Sn` (two per face).
fn node_face_blend(
    mesh: &PolyMesh,
    cell: usize,
    node: usize,
    velocity: &[DVec3],
    subcell_mass: &[f64],
) -> (DVec3, f64) {
    let cell_nodes = mesh.nodes_of_cell(cell);
    let offset = mesh.subcell_offset(cell);
    let mut blend = DVec3::ZERO;
    let mut sn = 0usize;

    for &face in mesh.faces_of_node(node) {
        let (left, right) = mesh.face_cells[face];
        if left != cell && right != Some(cell) {
            continue;
        }
        sn += 2;

        let face_nodes = mesh.nodes_of_face(face);
        let mut face_velocity = DVec3::ZERO;
        let mut face_mass = 0.;
        let mut node_in_face = 0;
        for (i, &n) in face_nodes.iter().enumerate() {
            let left_n = face_nodes[cyclic_prev(i, face_nodes.len())];
            let right_n = face_nodes[cyclic_next(i, face_nodes.len())];
            let local = cell_nodes
                .iter()
                .position(|&c| c == n)
                .expect("face node missing from cell");
            let mass = subcell_mass[offset + local];
            face_velocity +=
                mass * (2. * velocity[n] - 0.5 * velocity[left_n] - 0.5 * velocity[right_n]);
            face_mass += mass;
            if n == node {
                node_in_face = i;
            }
        }

        let left_n = face_nodes[cyclic_prev(node_in_face, face_nodes.len())];
        let right_n = face_nodes[cyclic_next(node_in_face, face_nodes.len())];
        blend +=
            0.5 * velocity[left_n] + 0.5 * velocity[right_n] + 2. * face_velocity / face_mass;
    }

    (blend, sn as f64)
}

/// Reconstructs the corner localised velocities used as the remap source.
///
/// Per cell, a mass weighted cell average `uc` is blended with the per node
/// face stencils; the 2.5, 1.5 and 0.25 coefficients are the empirically
/// fixed weights of the reconstruction scheme and are preserved exactly.
/// A spatially uniform velocity field is reproduced without modification.
pub fn reconstruct_subcell_velocities(
    mesh: &PolyMesh,
    velocity: &[DVec3],
    subcell_mass: &[f64],
    cell_mass: &[f64],
    subcell_velocity: &mut [DVec3],
) {
    let chunks = chunks_by_offsets_mut(subcell_velocity, &mesh.cell_nodes_offsets);
    chunks
        .into_par_iter()
        .enumerate()
        .for_each(|(cell, reconstructed)| {
            let cell_nodes = mesh.nodes_of_cell(cell);
            let offset = mesh.subcell_offset(cell);

            let blends: Vec<(DVec3, f64)> = cell_nodes
                .iter()
                .map(|&node| node_face_blend(mesh, cell, node, velocity, subcell_mass))
                .collect();

            // Weighted velocity at the cell centre.
            let mut uc = DVec3::ZERO;
            for (nn, &node) in cell_nodes.iter().enumerate() {
                let (blend, sn) = blends[nn];
                let mass = subcell_mass[offset + nn];
                uc += mass * (2.5 * velocity[node] - blend / sn) / cell_mass[cell];
            }

            for (nn, &node) in cell_nodes.iter().enumerate() {
                let (blend, sn) = blends[nn];
                reconstructed[nn] = 0.25 * (1.5 * velocity[node] + uc + blend / sn);
            }
        });
}

/// Solves the 3x3 least squares system for the energy gradient.
///
/// Boundary and low connectivity cells can make the system singular (fewer
/// than three independent neighbours). Guard policy: the coefficient matrix
/// is Tikhonov regularised proportionally to its trace, which leaves well
/// conditioned systems untouched to ~1e-8 and keeps rank deficient ones
/// finite; with no neighbours at all the gradient is clamped to zero.
fn solve_energy_gradient(coeff: DMat3, rhs: DVec3) -> DVec3 {
    let trace = coeff.x_axis.x + coeff.y_axis.y + coeff.z_axis.z;
    if trace <= 0. {
        return DVec3::ZERO;
    }
    let regularised = coeff + DMat3::from_diagonal(DVec3::splat(1e-8 * trace / 3.));
    regularised.inverse() * rhs
}

/// Gathering stage of the remap: reconstructs a linear internal energy field
/// per cell from the neighbours' weighted volume integrals and redistributes
/// the internal energy onto the corner tetrahedral sub-cells.
///
/// The sum of a cell's sub-cell energies equals `density * energy * volume`
/// up to reconstruction error (the linear term cancels against the volume
/// centroid).
pub fn gather_subcell_energies(
    mesh: &PolyMesh,
    positions: &[DVec3],
    energy: &[f64],
    density: &[f64],
    subcell_volume: &mut [f64],
    subcell_integrals: &mut [DVec3],
    subcell_energy: &mut [f64],
) {
    let volume_chunks = chunks_by_offsets_mut(subcell_volume, &mesh.cell_nodes_offsets);
    let integral_chunks = chunks_by_offsets_mut(subcell_integrals, &mesh.cell_nodes_offsets);
    let energy_chunks = chunks_by_offsets_mut(subcell_energy, &mesh.cell_nodes_offsets);

    volume_chunks
        .into_par_iter()
        .zip(integral_chunks)
        .zip(energy_chunks)
        .enumerate()
        .for_each(|(cell, ((volumes, integrals), energies))| {
            volumes.fill(0.);
            integrals.fill(DVec3::ZERO);
            energies.fill(0.);

            let cell_centroid = mesh.centroids[cell];
            let cell_nodes = mesh.nodes_of_cell(cell);

            // Least squares system from the face neighbours' weighted volume
            // integrals, re-centred on this cell's centroid.
            let mut coeff = DMat3::ZERO;
            let mut rhs = DVec3::ZERO;
            for &face in mesh.faces_of_cell(cell) {
                let Some(neighbour) = mesh.neighbour_across(cell, face) else {
                    // Boundary face.
                    continue;
                };
                let (mut integral, vol) =
                    geometry::cell_weighted_volume_integral(mesh, positions, neighbour);
                integral -= cell_centroid * vol;

                let w = 2. / (vol * vol);
                coeff += DMat3::from_cols(
                    w * integral.x * integral,
                    w * integral.y * integral,
                    w * integral.z * integral,
                );
                let de = energy[neighbour] - energy[cell];
                rhs += 2. * integral * de / vol;
            }
            let grad_energy = solve_energy_gradient(coeff, rhs);

            // Corner tetrahedral sub-cells: two per face/node pair, anchored
            // at the node with the edge midpoint, face centroid and cell
            // centroid.
            for &face in mesh.faces_of_cell(cell) {
                let face_nodes = mesh.nodes_of_face(face);
                let face_c = geometry::face_centroid(face_nodes, positions);
                for (i, &anchor) in face_nodes.iter().enumerate() {
                    let sides = [
                        face_nodes[cyclic_prev(i, face_nodes.len())],
                        face_nodes[cyclic_next(i, face_nodes.len())],
                    ];
                    let node_off = cell_nodes
                        .iter()
                        .position(|&n| n == anchor)
                        .expect("face node missing from cell");

                    for &side in &sides {
                        let tet_nodes = [
                            positions[anchor],
                            0.5 * (positions[side] + positions[anchor]),
                            face_c,
                            cell_centroid,
                        ];
                        let tet_centroid =
                            0.25 * (tet_nodes[0] + tet_nodes[1] + tet_nodes[2] + tet_nodes[3]);
                        let (integral, vol) = geometry::weighted_volume_integral(
                            TET_FACES.iter().map(|f| &f[..]),
                            &tet_nodes,
                            tet_centroid,
                        );

                        volumes[node_off] += vol;
                        integrals[node_off] += integral;
                        energies[node_off] += vol
                            * (density[cell] * energy[cell] - grad_energy.dot(cell_centroid))
                            + grad_energy.dot(integral);
                    }
                }
            }
        });
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;
    use glam::DVec3;

    use crate::mesh::PolyMesh;
    use crate::nodal::accumulate_subcell_mass;

    use super::*;

    #[test]
    fn test_uniform_velocity_is_reproduced() {
        let mesh = PolyMesh::rectilinear(2, 2, 2, DVec3::ONE);
        let density = vec![1.; mesh.n_cells];
        let velocity = vec![DVec3::new(0.3, -0.2, 0.7); mesh.n_nodes];
        let mut subcell_mass = vec![0.; mesh.n_incidences()];
        accumulate_subcell_mass(&mesh, &mesh.positions0, &density, &mut subcell_mass);
        let cell_mass = vec![1.; mesh.n_cells];

        let mut subcell_velocity = vec![DVec3::ZERO; mesh.n_incidences()];
        reconstruct_subcell_velocities(
            &mesh,
            &velocity,
            &subcell_mass,
            &cell_mass,
            &mut subcell_velocity,
        );
        for v in subcell_velocity {
            assert_approx_eq!(f64, v.x, 0.3, epsilon = 1e-13);
            assert_approx_eq!(f64, v.y, -0.2, epsilon = 1e-13);
            assert_approx_eq!(f64, v.z, 0.7, epsilon = 1e-13);
        }
    }

    #[test]
    fn test_two_cell_gradient_sign_and_magnitude() {
        // Two unit cells along x, energies differing by 0.5: the reduced
        // one-neighbour system gives grad = de / dx towards the hotter cell.
        let mesh = PolyMesh::rectilinear(2, 1, 1, DVec3::ONE);
        let energy = [1., 1.5];
        let density = [1., 1.];
        let mut volumes = vec![0.; mesh.n_incidences()];
        let mut integrals = vec![DVec3::ZERO; mesh.n_incidences()];
        let mut energies = vec![0.; mesh.n_incidences()];
        gather_subcell_energies(
            &mesh,
            &mesh.positions0,
            &energy,
            &density,
            &mut volumes,
            &mut integrals,
            &mut energies,
        );

        // Recover the gradient the kernel used from the sub-cell energies of
        // cell 0: e_sc = vol * (rho e - g.cc) + g.integral.
        let offset = mesh.subcell_offset(0);
        let n = mesh.nodes_of_cell(0).len();
        let total: f64 = energies[offset..offset + n].iter().sum();
        let base = density[0] * energy[0] * 1.0;
        // A positive x-gradient shifts energy towards the shared face, but
        // the cell total stays the reconstructed mean.
        assert_approx_eq!(f64, total, base, epsilon = 1e-6);

        // The sub-cells anchored at the shared face (x = 1) must hold more
        // energy than those at the outer wall (x = 0).
        let mut inner = 0.;
        let mut outer = 0.;
        let mut outer_volume = 0.;
        let mut outer_integral_x = 0.;
        for (local, &node) in mesh.nodes_of_cell(0).iter().enumerate() {
            if mesh.positions0[node].x > 0.5 {
                inner += energies[offset + local];
            } else {
                outer += energies[offset + local];
                outer_volume += volumes[offset + local];
                outer_integral_x += integrals[offset + local].x;
            }
        }
        assert!(inner > outer);

        // Recover the gradient magnitude from the outer wall sub-cells:
        // e = v * (rho e - g * 0.5) + g * I_x, so g = (e - v) / (I_x - v / 2).
        // The reduced one-neighbour system gives g = de / dx = 0.5 here.
        let recovered = (outer - outer_volume) / (outer_integral_x - 0.5 * outer_volume);
        assert_approx_eq!(f64, recovered, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_subcell_volumes_tile_the_cell() {
        let mesh = PolyMesh::rectilinear(2, 1, 1, DVec3::new(0.5, 1., 2.));
        let energy = [1., 2.];
        let density = [1., 1.];
        let mut volumes = vec![0.; mesh.n_incidences()];
        let mut integrals = vec![DVec3::ZERO; mesh.n_incidences()];
        let mut energies = vec![0.; mesh.n_incidences()];
        gather_subcell_energies(
            &mesh,
            &mesh.positions0,
            &energy,
            &density,
            &mut volumes,
            &mut integrals,
            &mut energies,
        );
        for cell in 0..mesh.n_cells {
            let offset = mesh.subcell_offset(cell);
            let n = mesh.nodes_of_cell(cell).len();
            let total: f64 = volumes[offset..offset + n].iter().sum();
            assert_approx_eq!(f64, total, 1., epsilon = 1e-12);
        }
    }

    #[test]
    fn test_isolated_cell_gradient_is_guarded() {
        // A single cell has no neighbours: the least squares system is
        // empty and the gradient must clamp to zero, not NaN.
        let mesh = PolyMesh::rectilinear(1, 1, 1, DVec3::ONE);
        let mut volumes = vec![0.; mesh.n_incidences()];
        let mut integrals = vec![DVec3::ZERO; mesh.n_incidences()];
        let mut energies = vec![0.; mesh.n_incidences()];
        gather_subcell_energies(
            &mesh,
            &mesh.positions0,
            &[2.],
            &[3.],
            &mut volumes,
            &mut integrals,
            &mut energies,
        );
        let total: f64 = energies.iter().sum();
        assert!(total.is_finite());
        // Piecewise constant gathering: rho * e * V.
        assert_approx_eq!(f64, total, 6., epsilon = 1e-12);
        for e in energies {
            assert_approx_eq!(f64, e, 6. / 8., epsilon = 1e-12);
        }
    }
}
