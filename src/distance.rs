use nalgebra::{DVector, Point3};

/// Euclidian distance between two points of the same frame
///
pub fn euclidean(p1: &Point3<f32>, p2: &Point3<f32>) -> f32 {
    (p1 - p2).norm()
}

/// Cosine similarity between two vectors
///
/// When the vector lengths don't match, the longer vector is truncated to the shorter one.
/// A zero vector has no direction: the similarity with it is `0.0`, never `NaN`.
///
pub fn cosine(f1: &DVector<f32>, f2: &DVector<f32>) -> f32 {
    let len = f1.len().min(f2.len());
    let (f1, f2) = (f1.rows(0, len), f2.rows(0, len));

    let divisor = f1.norm() * f2.norm();
    if divisor < crate::EPS {
        return 0.0;
    }
    f1.dot(&f2) / divisor
}

#[cfg(test)]
mod tests {
    use crate::distance::{cosine, euclidean};
    use crate::EPS;
    use nalgebra::{DVector, Point3};

    #[test]
    fn euclidean_distances() {
        let p1 = Point3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(0.0, 1.0, 0.0);
        assert!(euclidean(&p1, &p1).abs() < EPS);
        assert!((euclidean(&p1, &p2) - 2.0f32.sqrt()).abs() < EPS);
    }

    #[test]
    fn cosine_distances() {
        let v1 = DVector::from_vec(vec![1f32, 0.0, 0.0]);
        let v2 = DVector::from_vec(vec![0f32, 1.0f32, 0.0]);
        let v3 = DVector::from_vec(vec![-1.0f32, 0.0, 0.0]);
        let d = cosine(&v1, &v1);
        assert!((d - 1.0).abs() < EPS);
        let d = cosine(&v1, &v3);
        assert!((d + 1.0).abs() < EPS);
        let d = cosine(&v1, &v2);
        assert!(d.abs() < EPS);
    }

    #[test]
    fn cosine_zero_vector() {
        let v1 = DVector::from_vec(vec![0.5f32, 0.5]);
        let zero = DVector::zeros(2);
        assert_eq!(cosine(&v1, &zero), 0.0);
        assert_eq!(cosine(&zero, &zero), 0.0);
    }

    #[test]
    fn cosine_truncates() {
        let v1 = DVector::from_vec(vec![1f32, 0.0, 5.0]);
        let v2 = DVector::from_vec(vec![1f32, 0.0]);
        assert!((cosine(&v1, &v2) - 1.0).abs() < EPS);
    }
}
