use nalgebra::{Point3, Vector3};

/// Vectors shorter than this are treated as degenerate when normalizing.
const DEGENERATE_LENGTH: f64 = 1e-8;

/// Arithmetic mean of a set of positions, or `None` for an empty set.
pub fn centroid<'a>(positions: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Point3<f64>> {
    let mut sum = Vector3::zeros();
    let mut count = 0usize;
    for p in positions {
        sum += p.coords;
        count += 1;
    }
    (count > 0).then(|| Point3::from(sum / count as f64))
}

/// Angle a1-a2-a3 in degrees, vertex at `a2`.
///
/// Returns `None` when either arm has (near) zero length.
pub fn calc_angle(a1: &Point3<f64>, a2: &Point3<f64>, a3: &Point3<f64>) -> Option<f64> {
    let v21 = a1 - a2;
    let v23 = a3 - a2;
    let n21 = v21.norm();
    let n23 = v23.norm();
    if n21 < DEGENERATE_LENGTH || n23 < DEGENERATE_LENGTH {
        return None;
    }
    let cos = (v21.dot(&v23) / (n21 * n23)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Torsion angle a1-a2-a3-a4 about the a2-a3 bond, in degrees within `[-180, 180]`.
///
/// The magnitude is the angle between the normals of the (a1, a2, a3) and
/// (a2, a3, a4) planes; the sign follows the right-hand rule about a2→a3.
/// Returns `None` if any bond or either plane normal is degenerate.
pub fn calc_torsion_angle(
    a1: &Point3<f64>,
    a2: &Point3<f64>,
    a3: &Point3<f64>,
    a4: &Point3<f64>,
) -> Option<f64> {
    let a12 = a2 - a1;
    let a23 = a3 - a2;
    let a34 = a4 - a3;

    let n12 = a12.cross(&a23);
    let n34 = a23.cross(&a34);
    let len12 = n12.norm();
    let len34 = n34.norm();
    if a23.norm() < DEGENERATE_LENGTH || len12 < DEGENERATE_LENGTH || len34 < DEGENERATE_LENGTH {
        return None;
    }

    let cos = (n12.dot(&n34) / (len12 * len34)).clamp(-1.0, 1.0);
    let angle = cos.acos().to_degrees();
    if n12.cross(&n34).dot(&a23) < 0.0 {
        Some(-angle)
    } else {
        Some(angle)
    }
}
