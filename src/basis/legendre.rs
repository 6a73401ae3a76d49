use super::BasisError;

/// Value and derivative of the Legendre polynomial `P_n` at `x` (no domain checking)
pub(crate) fn legendre_recurrence(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }

    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=n {
        let k = k as f64;
        let p_next = ((2.0 * k - 1.0) * x * p - (k - 1.0) * p_prev) / k;
        p_prev = p;
        p = p_next;
    }

    let nf = n as f64;
    let dp = if (x.abs() - 1.0).abs() < f64::EPSILON {
        // P_n'(±1) = (±1)^(n+1) n (n+1) / 2
        let sign = if x > 0.0 || n % 2 == 1 { 1.0 } else { -1.0 };
        sign * nf * (nf + 1.0) / 2.0
    } else {
        nf * (x * p - p_prev) / (x * x - 1.0)
    };

    (p, dp)
}

fn check_argument(x: f64) -> Result<(), BasisError> {
    if x.is_nan() || x.abs() > 1.0 {
        Err(BasisError::LegendreArgument { x })
    } else {
        Ok(())
    }
}

/// Legendre polynomial `P_n(x)`. `x` must lie in `[-1, 1]`.
pub fn legendre(n: usize, x: f64) -> Result<f64, BasisError> {
    check_argument(x)?;
    Ok(legendre_recurrence(n, x).0)
}

/// First derivative of the Legendre polynomial `P_n(x)`. `x` must lie in `[-1, 1]`.
pub fn legendre_derivative(n: usize, x: f64) -> Result<f64, BasisError> {
    check_argument(x)?;
    Ok(legendre_recurrence(n, x).1)
}

/// Associated Legendre function `P_l^m(x)` (including the Condon-Shortley phase), with `0 <= m <= l` and `x` in `[-1, 1]`.
pub fn associated_legendre(l: usize, m: usize, x: f64) -> Result<f64, BasisError> {
    check_argument(x)?;
    if m > l {
        return Err(BasisError::LegendreDegree { l, m });
    }

    // P_m^m
    let mut pmm = 1.0;
    if m > 0 {
        let somx2 = ((1.0 - x) * (1.0 + x)).sqrt();
        let mut fact = 1.0;
        for _ in 1..=m {
            pmm *= -fact * somx2;
            fact += 2.0;
        }
    }
    if l == m {
        return Ok(pmm);
    }

    // P_{m+1}^m
    let mut pmmp1 = x * (2 * m + 1) as f64 * pmm;
    if l == m + 1 {
        return Ok(pmmp1);
    }

    let mut pll = 0.0;
    for ll in (m + 2)..=l {
        pll = (x * (2 * ll - 1) as f64 * pmmp1 - (ll + m - 1) as f64 * pmm) / (ll - m) as f64;
        pmm = pmmp1;
        pmmp1 = pll;
    }
    Ok(pll)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn low_order_values() {
        let x = 0.3;
        assert_abs_diff_eq!(legendre(0, x).unwrap(), 1.0);
        assert_abs_diff_eq!(legendre(1, x).unwrap(), x);
        assert_abs_diff_eq!(legendre(2, x).unwrap(), 0.5 * (3.0 * x * x - 1.0), epsilon = 1e-15);
        assert_abs_diff_eq!(
            legendre(3, x).unwrap(),
            0.5 * (5.0 * x.powi(3) - 3.0 * x),
            epsilon = 1e-15
        );
        assert_abs_diff_eq!(
            legendre_derivative(3, x).unwrap(),
            0.5 * (15.0 * x * x - 3.0),
            epsilon = 1e-14
        );
    }

    #[test]
    fn derivative_at_endpoints() {
        for n in 0..8 {
            let nf = n as f64;
            assert_abs_diff_eq!(
                legendre_derivative(n, 1.0).unwrap(),
                nf * (nf + 1.0) / 2.0,
                epsilon = 1e-12
            );
            let sign = if n % 2 == 0 { -1.0 } else { 1.0 };
            assert_abs_diff_eq!(
                legendre_derivative(n, -1.0).unwrap(),
                sign * nf * (nf + 1.0) / 2.0,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn associated_values() {
        let x: f64 = 0.4;
        let s = (1.0 - x * x).sqrt();
        assert_abs_diff_eq!(associated_legendre(1, 1, x).unwrap(), -s, epsilon = 1e-15);
        assert_abs_diff_eq!(
            associated_legendre(2, 1, x).unwrap(),
            -3.0 * x * s,
            epsilon = 1e-15
        );
        assert_abs_diff_eq!(
            associated_legendre(3, 2, x).unwrap(),
            15.0 * x * (1.0 - x * x),
            epsilon = 1e-14
        );
        assert_abs_diff_eq!(
            associated_legendre(4, 0, x).unwrap(),
            legendre(4, x).unwrap(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn argument_out_of_range() {
        assert_eq!(
            legendre(2, 1.5),
            Err(BasisError::LegendreArgument { x: 1.5 })
        );
        assert!(associated_legendre(2, 1, -1.01).is_err());
        assert!(associated_legendre(1, 2, 0.5).is_err());
    }
}
