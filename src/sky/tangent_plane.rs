//! Gnomonic (tangent-plane) projection about a fixed sky position.
//!
//! Working in the plane tangent to the sky at the pixel centre removes the RA = 0/360
//! discontinuity and the convergence of meridians near the poles: within a few degrees of the
//! centre, distances in the plane are angular distances to a very good approximation.
//!
//! Plane coordinates `(xi, eta)` are expressed in degrees, `xi` increasing towards east
//! (increasing RA) and `eta` towards north.

use nalgebra::{Rotation3, Vector3};

use crate::constants::{Degree, RADEG};

/// Unit vector pointing at (RA, Dec) in degrees.
#[inline]
pub fn radec_to_unit(ra: Degree, dec: Degree) -> Vector3<f64> {
    let (sin_ra, cos_ra) = (ra * RADEG).sin_cos();
    let (sin_dec, cos_dec) = (dec * RADEG).sin_cos();
    Vector3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
}

/// (RA, Dec) in degrees of a (not necessarily normalized) direction vector.
#[inline]
pub fn unit_to_radec(v: &Vector3<f64>) -> (Degree, Degree) {
    let ra = v.y.atan2(v.x).to_degrees().rem_euclid(360.0);
    let dec = v.z.atan2(v.x.hypot(v.y)).to_degrees();
    (ra, dec)
}

/// Great-circle separation between two positions, in degrees.
///
/// Uses the chord length between unit vectors, which stays accurate for sub-arcsecond
/// separations where the spherical law of cosines loses all precision.
pub fn angular_separation_deg(ra1: Degree, dec1: Degree, ra2: Degree, dec2: Degree) -> Degree {
    let chord = (radec_to_unit(ra1, dec1) - radec_to_unit(ra2, dec2)).norm();
    (2.0 * (chord / 2.0).min(1.0).asin()).to_degrees()
}

/// Gnomonic projection centred on a sky position.
#[derive(Debug, Clone)]
pub struct TangentPlane {
    center_ra: Degree,
    center_dec: Degree,
    /// Rotation bringing the centre onto the +x axis, north onto +z.
    rotation: Rotation3<f64>,
}

impl TangentPlane {
    /// Build the projection tangent to the sphere at (`ra`, `dec`), in degrees.
    pub fn new(ra: Degree, dec: Degree) -> Self {
        let rot_ra = Rotation3::from_axis_angle(&Vector3::z_axis(), -ra * RADEG);
        let rot_dec = Rotation3::from_axis_angle(&Vector3::y_axis(), dec * RADEG);
        TangentPlane {
            center_ra: ra,
            center_dec: dec,
            rotation: rot_dec * rot_ra,
        }
    }

    pub fn center(&self) -> (Degree, Degree) {
        (self.center_ra, self.center_dec)
    }

    /// Project a sky position onto the plane.
    ///
    /// Return
    /// ----------
    /// * `Some((xi, eta))` in degrees, or `None` when the position lies on the hemisphere
    ///   opposite to the centre, where the gnomonic projection is undefined.
    pub fn project(&self, ra: Degree, dec: Degree) -> Option<(f64, f64)> {
        let v = self.rotation * radec_to_unit(ra, dec);
        if v.x <= 0.0 {
            return None;
        }
        Some(((v.y / v.x).to_degrees(), (v.z / v.x).to_degrees()))
    }

    /// Inverse projection from plane coordinates (degrees) back to (RA, Dec).
    pub fn deproject(&self, xi: f64, eta: f64) -> (Degree, Degree) {
        let local = Vector3::new(1.0, xi * RADEG, eta * RADEG);
        let v = self.rotation.inverse() * local;
        unit_to_radec(&v)
    }
}

#[cfg(test)]
mod tangent_plane_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_projects_to_origin() {
        let plane = TangentPlane::new(123.4, -56.7);
        let (xi, eta) = plane.project(123.4, -56.7).unwrap();
        assert!(xi.abs() < 1e-12);
        assert!(eta.abs() < 1e-12);
    }

    #[test]
    fn test_axes_orientation() {
        let plane = TangentPlane::new(10.0, 20.0);
        let (xi, eta) = plane.project(10.0, 20.01).unwrap();
        assert!(xi.abs() < 1e-9);
        assert_relative_eq!(eta, 0.01, epsilon = 1e-7);

        let (xi, eta) = plane.project(10.01, 20.0).unwrap();
        assert!(xi > 0.0);
        assert_relative_eq!(xi, 0.01 * (20.0 * RADEG).cos(), epsilon = 1e-6);
        assert!(eta.abs() < 1e-5);
    }

    #[test]
    fn test_round_trip_across_ra_zero() {
        let plane = TangentPlane::new(0.1, 5.0);
        for (ra, dec) in [(359.8, 5.1), (0.3, 4.8), (0.0, 5.0)] {
            let (xi, eta) = plane.project(ra, dec).unwrap();
            let (ra2, dec2) = plane.deproject(xi, eta);
            assert!(angular_separation_deg(ra, dec, ra2, dec2) < 1e-10);
        }
    }

    #[test]
    fn test_round_trip_near_pole() {
        let plane = TangentPlane::new(200.0, 89.9);
        let (xi, eta) = plane.project(20.0, 89.95).unwrap();
        let (ra, dec) = plane.deproject(xi, eta);
        assert!(angular_separation_deg(20.0, 89.95, ra, dec) < 1e-10);
    }

    #[test]
    fn test_opposite_hemisphere_is_rejected() {
        let plane = TangentPlane::new(0.0, 0.0);
        assert!(plane.project(180.0, 0.0).is_none());
    }

    #[test]
    fn test_angular_separation() {
        assert!(angular_separation_deg(0.0, 0.0, 0.0, 0.0).abs() < 1e-15);
        assert_relative_eq!(
            angular_separation_deg(0.0, 0.0, 90.0, 0.0),
            90.0,
            epsilon = 1e-10
        );
        assert_relative_eq!(
            angular_separation_deg(359.9999, 0.0, 0.0001, 0.0),
            0.0002,
            epsilon = 1e-10
        );
        // 0.5 arcsec along the meridian
        assert_relative_eq!(
            angular_separation_deg(10.0, 20.0, 10.0, 20.0 + 0.5 / 3600.0) * 3600.0,
            0.5,
            epsilon = 1e-9
        );
    }
}
