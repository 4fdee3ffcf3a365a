use wide::f32x8;

pub type Number = f32;

pub const EPSILON: f64 = 1e-12;

/// Squared Euclidean distance between two equal-length vectors using SIMD operations.
pub fn squared_distance_simd(a: &[Number], b: &[Number]) -> Number {
    debug_assert_eq!(a.len(), b.len());
    let len = a.len().min(b.len());
    let simd_len = len - (len % 8);

    let mut acc = f32x8::splat(0.0);
    for i in (0..simd_len).step_by(8) {
        let va = f32x8::new([
            a[i],
            a[i + 1],
            a[i + 2],
            a[i + 3],
            a[i + 4],
            a[i + 5],
            a[i + 6],
            a[i + 7],
        ]);
        let vb = f32x8::new([
            b[i],
            b[i + 1],
            b[i + 2],
            b[i + 3],
            b[i + 4],
            b[i + 5],
            b[i + 6],
            b[i + 7],
        ]);
        let diff = va - vb;
        acc += diff * diff;
    }

    let mut total = acc.reduce_add();

    // Handle remaining elements
    for i in simd_len..len {
        let diff = a[i] - b[i];
        total += diff * diff;
    }

    total
}

pub fn squared_distance_2d(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(a: &[Number], b: &[Number]) -> Number {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[test]
    fn simd_distance_matches_scalar_with_remainder() {
        let a: Vec<Number> = (0..19).map(|i| i as Number * 0.5).collect();
        let b: Vec<Number> = (0..19).map(|i| (i as Number).sin()).collect();
        assert!((squared_distance_simd(&a, &b) - scalar(&a, &b)).abs() < 1e-3);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = vec![0.25; 16];
        assert_eq!(squared_distance_simd(&a, &a), 0.0);
    }

    #[test]
    fn planar_distance() {
        assert_eq!(squared_distance_2d([0.0, 0.0], [3.0, 4.0]), 25.0);
    }
}
