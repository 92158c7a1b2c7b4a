use glam::DVec3;
use rayon::prelude::*;

/// Boundary condition attached to a mesh node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoundaryCondition {
    Interior,
    /// Reflecting wall with outward unit normal.
    Reflecting(DVec3),
    /// Node pinned in place (domain edges and corners, where two or more
    /// walls meet and no single normal exists).
    Fixed,
}

/// Applies the boundary conditions to a nodal velocity field in place.
///
/// Reflecting nodes lose their wall-normal velocity component, fixed nodes
/// are zeroed, interior nodes are untouched.
pub fn reflect_velocities(boundary: &[BoundaryCondition], velocity: &mut [DVec3]) {
    velocity
        .par_iter_mut()
        .zip(boundary.par_iter())
        .for_each(|(v, bc)| match bc {
            BoundaryCondition::Interior => (),
            BoundaryCondition::Reflecting(normal) => *v -= v.dot(*normal) * *normal,
            BoundaryCondition::Fixed => *v = DVec3::ZERO,
        });
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;
    use glam::DVec3;

    use super::{reflect_velocities, BoundaryCondition};

    #[test]
    fn test_reflect() {
        let boundary = [
            BoundaryCondition::Interior,
            BoundaryCondition::Reflecting(DVec3::X),
            BoundaryCondition::Fixed,
        ];
        let mut velocity = [DVec3::new(1., 2., 3.); 3];
        reflect_velocities(&boundary, &mut velocity);
        assert_eq!(velocity[0], DVec3::new(1., 2., 3.));
        assert_approx_eq!(f64, velocity[1].x, 0.);
        assert_approx_eq!(f64, velocity[1].y, 2.);
        assert_approx_eq!(f64, velocity[1].z, 3.);
        assert_eq!(velocity[2], DVec3::ZERO);
    }
}
