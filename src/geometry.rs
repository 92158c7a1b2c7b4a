use glam::DVec3;

use crate::mesh::PolyMesh;

/// Face connectivity of the corner tetrahedron used as the sub-cell shape in
/// the remap stage: nodes 0..3 are (anchor, edge midpoint, face centroid,
/// cell centroid).
pub const TET_FACES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];

/// Centroid of a face as the arithmetic mean of its nodes.
pub fn face_centroid(face_nodes: &[usize], positions: &[DVec3]) -> DVec3 {
    let mut sum = DVec3::ZERO;
    for &node in face_nodes {
        sum += positions[node];
    }
    sum / face_nodes.len() as f64
}

/// Half area vector of the planar corner basis spanned by
/// (face centroid - node) and (face centroid - half edge midpoint).
pub fn corner_area_vector(node: DVec3, half_edge: DVec3, face_c: DVec3) -> DVec3 {
    0.5 * (face_c - node).cross(face_c - half_edge)
}

/// Volume of the corner tetrahedron spanned by a corner area vector and the
/// vector from the face centroid to the cell centroid.
///
/// Taken as an absolute value: the node winding order around irregular
/// polyhedral cells is not guaranteed, so the sign of the triple product is
/// not meaningful here.
pub fn corner_tet_volume(area: DVec3, face_to_cell: DVec3) -> f64 {
    (face_to_cell.dot(area) / 3.).abs()
}

/// Volume of the tetrahedron (a, b, c, d), unsigned.
pub fn tet_volume(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> f64 {
    ((b - a).cross(c - a).dot(d - a) / 6.).abs()
}

/// Cell volume as the sum of half-tetrahedron contributions over all cell
/// faces.
///
/// Each face edge contributes twice (once per bounding node), hence the
/// factor 2 on the single half-tetrahedron triple product.
pub fn cell_volume(mesh: &PolyMesh, positions: &[DVec3], cell: usize, centroid: DVec3) -> f64 {
    let mut volume = 0.;
    for &face in mesh.faces_of_cell(cell) {
        let face_nodes = mesh.nodes_of_face(face);
        let face_c = face_centroid(face_nodes, positions);
        for (i, &current) in face_nodes.iter().enumerate() {
            let next = face_nodes[crate::utils::cyclic_next(i, face_nodes.len())];
            let half_edge = 0.5 * (positions[current] + positions[next]);
            let a = half_edge - face_c;
            let b = centroid - face_c;
            let area = 0.5 * a.cross(b);
            volume += (2. * (half_edge - positions[current]).dot(area) / 3.).abs();
        }
    }
    volume
}

/// Weighted volume integral of a polyhedron given by its faces: returns
/// `(integral of x dV, volume)`, computed by tetrahedral decomposition about
/// `reference` (exact for linear integrands).
///
/// Works both for mesh cells and for the 4-node corner tetrahedra of the
/// remap stage.
pub fn weighted_volume_integral<'a>(
    faces: impl IntoIterator<Item = &'a [usize]>,
    positions: &[DVec3],
    reference: DVec3,
) -> (DVec3, f64) {
    let mut integral = DVec3::ZERO;
    let mut volume = 0.;
    for face_nodes in faces {
        let face_c = face_centroid(face_nodes, positions);
        for (i, &current) in face_nodes.iter().enumerate() {
            let next = face_nodes[crate::utils::cyclic_next(i, face_nodes.len())];
            let a = positions[current];
            let b = positions[next];
            let vol = tet_volume(a, b, face_c, reference);
            integral += vol * 0.25 * (a + b + face_c + reference);
            volume += vol;
        }
    }
    (integral, volume)
}

/// Weighted volume integral of a whole mesh cell about its centroid.
pub fn cell_weighted_volume_integral(
    mesh: &PolyMesh,
    positions: &[DVec3],
    cell: usize,
) -> (DVec3, f64) {
    weighted_volume_integral(
        mesh.faces_of_cell(cell)
            .iter()
            .map(|&face| mesh.nodes_of_face(face)),
        positions,
        mesh.centroids[cell],
    )
}
