use glam::DVec3;
use rayon::prelude::*;

use crate::boundary::BoundaryCondition;

/// An unstructured polyhedral mesh with CSR-style adjacency for all six
/// topology relations.
///
/// Node coordinates are double buffered: `positions0` holds the start-of-step
/// geometry and `positions1` the predicted (time centred) geometry. Cell
/// centroids are recomputed in place as the mesh moves. Face node lists are
/// stored in cyclic order around the face; the winding orientation is not
/// guaranteed, which the force kernels compensate for explicitly.
///
/// Boundary faces have no second neighbour (`face_cells[f].1 == None`); all
/// accumulation loops short-circuit the missing adjacency.
pub struct PolyMesh {
    pub n_nodes: usize,
    pub n_cells: usize,
    pub n_faces: usize,

    pub node_faces_offsets: Vec<usize>,
    pub node_faces: Vec<usize>,
    pub node_cells_offsets: Vec<usize>,
    pub node_cells: Vec<usize>,
    pub cell_nodes_offsets: Vec<usize>,
    pub cell_nodes: Vec<usize>,
    pub cell_faces_offsets: Vec<usize>,
    pub cell_faces: Vec<usize>,
    pub face_nodes_offsets: Vec<usize>,
    pub face_nodes: Vec<usize>,
    pub face_cells: Vec<(usize, Option<usize>)>,

    pub positions0: Vec<DVec3>,
    pub positions1: Vec<DVec3>,
    pub centroids: Vec<DVec3>,

    pub boundary: Vec<BoundaryCondition>,
}

impl PolyMesh {
    pub fn nodes_of_face(&self, face: usize) -> &[usize] {
        &self.face_nodes[self.face_nodes_offsets[face]..self.face_nodes_offsets[face + 1]]
    }

    pub fn nodes_of_cell(&self, cell: usize) -> &[usize] {
        &self.cell_nodes[self.cell_nodes_offsets[cell]..self.cell_nodes_offsets[cell + 1]]
    }

    pub fn faces_of_cell(&self, cell: usize) -> &[usize] {
        &self.cell_faces[self.cell_faces_offsets[cell]..self.cell_faces_offsets[cell + 1]]
    }

    pub fn faces_of_node(&self, node: usize) -> &[usize] {
        &self.node_faces[self.node_faces_offsets[node]..self.node_faces_offsets[node + 1]]
    }

    pub fn cells_of_node(&self, node: usize) -> &[usize] {
        &self.node_cells[self.node_cells_offsets[node]..self.node_cells_offsets[node + 1]]
    }

    /// Number of (cell, local node) incidences, the size of all sub-cell arrays.
    pub fn n_incidences(&self) -> usize {
        self.cell_nodes.len()
    }

    /// Base index of a cell's sub-cell slots.
    pub fn subcell_offset(&self, cell: usize) -> usize {
        self.cell_nodes_offsets[cell]
    }

    /// The neighbour of `cell` across `face`, if any.
    pub fn neighbour_across(&self, cell: usize, face: usize) -> Option<usize> {
        let (left, right) = self.face_cells[face];
        if left == cell {
            right
        } else {
            Some(left)
        }
    }

    /// Builds a rectilinear hexahedral mesh of `nx * ny * nz` cells with the
    /// given cell size, with reflecting outer walls (nodes on a single wall
    /// reflect, nodes on edges and corners are fixed).
    pub fn rectilinear(nx: usize, ny: usize, nz: usize, cell_size: DVec3) -> Self {
        assert!(nx > 0 && ny > 0 && nz > 0, "empty mesh extents");

        let n_nodes = (nx + 1) * (ny + 1) * (nz + 1);
        let n_cells = nx * ny * nz;
        let n_faces_x = (nx + 1) * ny * nz;
        let n_faces_y = nx * (ny + 1) * nz;
        let n_faces_z = nx * ny * (nz + 1);
        let n_faces = n_faces_x + n_faces_y + n_faces_z;

        let node_id = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let cell_id = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);
        let face_x_id = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + ny * k);
        let face_y_id = |i: usize, j: usize, k: usize| n_faces_x + i + nx * (j + (ny + 1) * k);
        let face_z_id =
            |i: usize, j: usize, k: usize| n_faces_x + n_faces_y + i + nx * (j + ny * k);

        // Node positions and boundary conditions.
        let mut positions0 = Vec::with_capacity(n_nodes);
        let mut boundary = Vec::with_capacity(n_nodes);
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    positions0.push(DVec3::new(
                        i as f64 * cell_size.x,
                        j as f64 * cell_size.y,
                        k as f64 * cell_size.z,
                    ));
                    let mut normals = vec![];
                    if i == 0 {
                        normals.push(-DVec3::X);
                    }
                    if i == nx {
                        normals.push(DVec3::X);
                    }
                    if j == 0 {
                        normals.push(-DVec3::Y);
                    }
                    if j == ny {
                        normals.push(DVec3::Y);
                    }
                    if k == 0 {
                        normals.push(-DVec3::Z);
                    }
                    if k == nz {
                        normals.push(DVec3::Z);
                    }
                    boundary.push(match normals.len() {
                        0 => BoundaryCondition::Interior,
                        1 => BoundaryCondition::Reflecting(normals[0]),
                        _ => BoundaryCondition::Fixed,
                    });
                }
            }
        }

        // Face -> node (cyclic winding) and face -> cell.
        let mut face_nodes = Vec::with_capacity(4 * n_faces);
        let mut face_nodes_offsets = Vec::with_capacity(n_faces + 1);
        let mut face_cells = Vec::with_capacity(n_faces);
        face_nodes_offsets.push(0);
        // Faces with x-normal.
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..=nx {
                    face_nodes.extend_from_slice(&[
                        node_id(i, j, k),
                        node_id(i, j + 1, k),
                        node_id(i, j + 1, k + 1),
                        node_id(i, j, k + 1),
                    ]);
                    face_nodes_offsets.push(face_nodes.len());
                    let left = if i > 0 { Some(cell_id(i - 1, j, k)) } else { None };
                    let right = if i < nx { Some(cell_id(i, j, k)) } else { None };
                    face_cells.push(pack_face_cells(left, right));
                }
            }
        }
        // Faces with y-normal.
        for k in 0..nz {
            for j in 0..=ny {
                for i in 0..nx {
                    face_nodes.extend_from_slice(&[
                        node_id(i, j, k),
                        node_id(i, j, k + 1),
                        node_id(i + 1, j, k + 1),
                        node_id(i + 1, j, k),
                    ]);
                    face_nodes_offsets.push(face_nodes.len());
                    let left = if j > 0 { Some(cell_id(i, j - 1, k)) } else { None };
                    let right = if j < ny { Some(cell_id(i, j, k)) } else { None };
                    face_cells.push(pack_face_cells(left, right));
                }
            }
        }
        // Faces with z-normal.
        for k in 0..=nz {
            for j in 0..ny {
                for i in 0..nx {
                    face_nodes.extend_from_slice(&[
                        node_id(i, j, k),
                        node_id(i + 1, j, k),
                        node_id(i + 1, j + 1, k),
                        node_id(i, j + 1, k),
                    ]);
                    face_nodes_offsets.push(face_nodes.len());
                    let left = if k > 0 { Some(cell_id(i, j, k - 1)) } else { None };
                    let right = if k < nz { Some(cell_id(i, j, k)) } else { None };
                    face_cells.push(pack_face_cells(left, right));
                }
            }
        }

        // Cell -> node and cell -> face.
        let mut cell_nodes = Vec::with_capacity(8 * n_cells);
        let mut cell_nodes_offsets = Vec::with_capacity(n_cells + 1);
        let mut cell_faces = Vec::with_capacity(6 * n_cells);
        let mut cell_faces_offsets = Vec::with_capacity(n_cells + 1);
        cell_nodes_offsets.push(0);
        cell_faces_offsets.push(0);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    cell_nodes.extend_from_slice(&[
                        node_id(i, j, k),
                        node_id(i + 1, j, k),
                        node_id(i + 1, j + 1, k),
                        node_id(i, j + 1, k),
                        node_id(i, j, k + 1),
                        node_id(i + 1, j, k + 1),
                        node_id(i + 1, j + 1, k + 1),
                        node_id(i, j + 1, k + 1),
                    ]);
                    cell_nodes_offsets.push(cell_nodes.len());
                    cell_faces.extend_from_slice(&[
                        face_x_id(i, j, k),
                        face_x_id(i + 1, j, k),
                        face_y_id(i, j, k),
                        face_y_id(i, j + 1, k),
                        face_z_id(i, j, k),
                        face_z_id(i, j, k + 1),
                    ]);
                    cell_faces_offsets.push(cell_faces.len());
                }
            }
        }

        // Node -> cell and node -> face by CSR inversion.
        let (node_cells_offsets, node_cells) =
            invert_csr(n_nodes, &cell_nodes_offsets, &cell_nodes);
        let (node_faces_offsets, node_faces) =
            invert_csr(n_nodes, &face_nodes_offsets, &face_nodes);

        let mut mesh = PolyMesh {
            n_nodes,
            n_cells,
            n_faces,
            node_faces_offsets,
            node_faces,
            node_cells_offsets,
            node_cells,
            cell_nodes_offsets,
            cell_nodes,
            cell_faces_offsets,
            cell_faces,
            face_nodes_offsets,
            face_nodes,
            face_cells,
            positions1: positions0.clone(),
            positions0,
            centroids: vec![DVec3::ZERO; n_cells],
            boundary,
        };
        mesh.recompute_centroids(TimeLevel::Current);
        mesh
    }

    /// Recomputes all cell centroids in place as the mean of each cell's
    /// nodes at the requested time level.
    pub fn recompute_centroids(&mut self, level: TimeLevel) {
        let PolyMesh {
            centroids,
            positions0,
            positions1,
            cell_nodes,
            cell_nodes_offsets,
            ..
        } = self;
        let positions: &[DVec3] = match level {
            TimeLevel::Current => positions0,
            TimeLevel::Predicted => positions1,
        };
        centroids
            .par_iter_mut()
            .enumerate()
            .for_each(|(cell, centroid)| {
                let nodes = &cell_nodes[cell_nodes_offsets[cell]..cell_nodes_offsets[cell + 1]];
                let mut sum = DVec3::ZERO;
                for &node in nodes {
                    sum += positions[node];
                }
                *centroid = sum / nodes.len() as f64;
            });
    }

    pub fn positions(&self, level: TimeLevel) -> &[DVec3] {
        match level {
            TimeLevel::Current => &self.positions0,
            TimeLevel::Predicted => &self.positions1,
        }
    }
}

/// Which of the two geometry buffers a pipeline stage reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeLevel {
    /// The accepted start-of-step state (the "0" buffers).
    Current,
    /// The predicted, time advanced state (the "1" buffers).
    Predicted,
}

fn pack_face_cells(left: Option<usize>, right: Option<usize>) -> (usize, Option<usize>) {
    match (left, right) {
        (Some(l), r) => (l, r),
        (None, Some(r)) => (r, None),
        (None, None) => unreachable!("face without any neighbouring cell"),
    }
}

/// Inverts a CSR relation `from -> to` into `to -> from`, preserving the scan
/// order of the source entities.
fn invert_csr(n_to: usize, offsets: &[usize], items: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut counts = vec![0usize; n_to + 1];
    for &item in items {
        counts[item + 1] += 1;
    }
    for i in 0..n_to {
        counts[i + 1] += counts[i];
    }
    let inv_offsets = counts.clone();
    let mut inv_items = vec![0usize; items.len()];
    let mut cursor = inv_offsets.clone();
    for from in 0..offsets.len() - 1 {
        for &to in &items[offsets[from]..offsets[from + 1]] {
            inv_items[cursor[to]] = from;
            cursor[to] += 1;
        }
    }
    (inv_offsets, inv_items)
}
