pub use flame;
pub use nalgebra;

#[allow(non_camel_case_types)]
pub type float = f64;
pub use std::f64::consts::PI;
pub use std::f64::{INFINITY, NEG_INFINITY};

/// Wraps `b` into the interval `(a - PI, a + PI]`.
pub fn phase_unwrap(a: float, mut b: float) -> float {
    if a.is_infinite() || b.is_infinite() {
        return b;
    }
    while b > a + PI {
        b -= 2.0 * PI;
    }
    while b <= a - PI {
        b += 2.0 * PI;
    }
    b
}

pub type Vector2 = nalgebra::Vector2<float>;
pub type Vector4 = nalgebra::Vector4<float>;
pub type Matrix4 = nalgebra::Matrix4<float>;
pub type Matrix4x2 = nalgebra::Matrix4x2<float>;
pub type DVector = nalgebra::DVector<float>;
pub type DMatrix = nalgebra::DMatrix<float>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_unwrap_wraps_into_window() {
        assert!((phase_unwrap(0.0, 1.5 * PI) + 0.5 * PI).abs() < 1e-12);
        assert!((phase_unwrap(0.0, -1.5 * PI) - 0.5 * PI).abs() < 1e-12);
        assert!((phase_unwrap(PI, 0.1) - 0.1).abs() < 1e-12);
        assert_eq!(phase_unwrap(0.0, PI), PI);
    }
}
