//! Bessel functions of the first kind.
//!
//! Thin wrappers over `libm`, whose `j0`/`j1`/`jn` switch from rational
//! approximations to Hankel asymptotic forms at large arguments and stay
//! accurate across the whole real axis. The diffraction kernels reach
//! arguments of $k n_i r \sin\theta$, which grows without bound with the
//! lateral extent of the volume.

/// $J_0(x)$.
#[inline]
pub fn j0(x: f64) -> f64 {
    libm::j0(x)
}

/// $J_1(x)$.
#[inline]
pub fn j1(x: f64) -> f64 {
    libm::j1(x)
}

/// $J_2(x)$, zero at the origin.
#[inline]
pub fn j2(x: f64) -> f64 {
    libm::jn(2, x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_values_at_origin() {
        assert_eq!(j0(0.0), 1.0);
        assert_eq!(j1(0.0), 0.0);
        assert_eq!(j2(0.0), 0.0);
    }

    #[test]
    fn test_first_zeros() {
        assert_abs_diff_eq!(j0(2.404_825_557_695_773), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(j1(3.831_705_970_207_512), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(j2(5.135_622_301_840_683), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_recurrence_holds_at_large_argument() {
        // J2(x) = 2 J1(x) / x - J0(x)
        for &x in &[0.5, 7.3, 42.0, 250.0, 1.0e4] {
            assert_abs_diff_eq!(j2(x), 2.0 * j1(x) / x - j0(x), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_large_argument_matches_asymptotic_envelope() {
        // J0(x) ~ sqrt(2 / (pi x)) cos(x - pi/4) for x >> 1
        let x = 5.0e3;
        let asymptotic =
            (2.0 / (std::f64::consts::PI * x)).sqrt() * (x - std::f64::consts::FRAC_PI_4).cos();
        assert_abs_diff_eq!(j0(x), asymptotic, epsilon = 1e-6);
    }
}
