use glam::DVec3;
use rayon::prelude::*;

use crate::mesh::PolyMesh;
use crate::utils::{chunks_by_offsets_mut, cyclic_next};

/// Artificial viscosity kernel, consumed by the integrator as a black box.
///
/// Implementations add (never replace) their stabilising contributions into
/// the sub-cell force array, after the pressure gradient accumulation has
/// filled it. The nodal soundspeed, mass and volume accumulators and the
/// nodal limiter scratch of the current stage are supplied as inputs.
pub trait ArtificialViscosity: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn accumulate(
        &self,
        mesh: &PolyMesh,
        positions: &[DVec3],
        velocity: &[DVec3],
        nodal_soundspeed: &[f64],
        nodal_mass: &[f64],
        nodal_volume: &[f64],
        limiter: &mut [f64],
        subcell_force: &mut [DVec3],
    );
}

/// No artificial viscosity. Adequate for smooth flows and used by most of the
/// test problems.
pub struct NoViscosity;

impl ArtificialViscosity for NoViscosity {
    fn accumulate(
        &self,
        _mesh: &PolyMesh,
        _positions: &[DVec3],
        _velocity: &[DVec3],
        _nodal_soundspeed: &[f64],
        _nodal_mass: &[f64],
        _nodal_volume: &[f64],
        _limiter: &mut [f64],
        _subcell_force: &mut [DVec3],
    ) {
    }
}

/// Edge based linear plus quadratic artificial viscosity.
///
/// For every compressing cell face edge (velocity difference opposing the
/// edge direction), a dissipative force along the edge is added to both edge
/// end sub-cell slots with opposite signs, so the term never changes the
/// cell's momentum. The linear term is scaled by the local nodal soundspeed,
/// the quadratic term by the velocity jump itself.
pub struct EdgeViscosity {
    /// Linear (soundspeed) coefficient, typically ~0.5.
    pub coeff1: f64,
    /// Quadratic (velocity jump) coefficient, typically ~0.75.
    pub coeff2: f64,
}

impl ArtificialViscosity for EdgeViscosity {
    fn accumulate(
        &self,
        mesh: &PolyMesh,
        positions: &[DVec3],
        velocity: &[DVec3],
        nodal_soundspeed: &[f64],
        nodal_mass: &[f64],
        nodal_volume: &[f64],
        _limiter: &mut [f64],
        subcell_force: &mut [DVec3],
    ) {
        let chunks = chunks_by_offsets_mut(subcell_force, &mesh.cell_nodes_offsets);
        chunks
            .into_par_iter()
            .enumerate()
            .for_each(|(cell, forces)| {
                let cell_nodes = mesh.nodes_of_cell(cell);
                for &face in mesh.faces_of_cell(cell) {
                    let face_nodes = mesh.nodes_of_face(face);
                    for (i, &current) in face_nodes.iter().enumerate() {
                        let next = face_nodes[cyclic_next(i, face_nodes.len())];
                        let dx = positions[next] - positions[current];
                        let edge_length = dx.length();
                        if edge_length == 0. {
                            continue;
                        }
                        let direction = dx / edge_length;
                        let du = (velocity[next] - velocity[current]).dot(direction);
                        // Only compressing edges dissipate.
                        if du >= 0. {
                            continue;
                        }

                        let density = 0.5
                            * (nodal_mass[current] / nodal_volume[current]
                                + nodal_mass[next] / nodal_volume[next]);
                        let soundspeed =
                            0.5 * (nodal_soundspeed[current] + nodal_soundspeed[next]);
                        let q = density * (self.coeff2 * du * du - self.coeff1 * soundspeed * du);
                        let force = q * edge_length * direction;

                        let mut node_off = 0;
                        let mut next_node_off = 0;
                        for (off, &n) in cell_nodes.iter().enumerate() {
                            if n == current {
                                node_off = off;
                            } else if n == next {
                                next_node_off = off;
                            }
                        }
                        forces[node_off] += force;
                        forces[next_node_off] -= force;
                    }
                }
            });
    }
}
