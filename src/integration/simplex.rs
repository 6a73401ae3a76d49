use super::{QuadratureError, QuadratureRule, RuleFamily, Topology};

/*
    Reference Triangle: vertices (0, 0), (1, 0), (0, 1) -- area 1/2
    Reference Tet: vertices (0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 0, 1) -- volume 1/6

    Tables below are stored in barycentric form with weights normalized to sum to one,
    and are scaled to the reference element when the rule is constructed.
*/

// 13 point, degree 7 triangle rule: (weight, barycentric orbit generator)
const TRI_13_CENTROID_WEIGHT: f64 = -0.149570044467682;
const TRI_13_ORBIT_A: (f64, f64) = (0.175615257433208, 0.260345966079040);
const TRI_13_ORBIT_B: (f64, f64) = (0.053347235608838, 0.065130102902216);
const TRI_13_ORBIT_C: (f64, [f64; 2]) = (0.077113760890257, [0.048690315425316, 0.312865496004874]);

/// Number of points of the cheapest simplex table which is exact to `degree`
pub fn points_for_degree(topology: Topology, degree: usize) -> Option<usize> {
    match topology {
        Topology::Triangle => match degree {
            0..=2 => Some(3),
            3..=5 => Some(7),
            6..=7 => Some(13),
            _ => None,
        },
        Topology::Tet => match degree {
            0..=2 => Some(4),
            3..=4 => Some(11),
            _ => None,
        },
        _ => None,
    }
}

/// Construct a tabulated simplex rule by its number of points
pub fn simplex_rule(topology: Topology, points: usize) -> Result<QuadratureRule, QuadratureError> {
    let (bary, weights, degree): (Vec<Vec<f64>>, Vec<f64>, usize) = match (topology, points) {
        (Topology::Triangle, 3) => {
            let (b, w) = tri_orbit_aab(1.0 / 3.0, 1.0 / 6.0);
            (b, w, 2)
        }
        (Topology::Triangle, 7) => {
            let sqrt_15 = 15.0_f64.sqrt();
            let mut b = vec![vec![1.0 / 3.0; 3]];
            let mut w = vec![9.0 / 40.0];

            for (weight, a) in [
                ((155.0 - sqrt_15) / 1200.0, (6.0 - sqrt_15) / 21.0),
                ((155.0 + sqrt_15) / 1200.0, (6.0 + sqrt_15) / 21.0),
            ] {
                let (ob, ow) = tri_orbit_aab(weight, a);
                b.extend(ob);
                w.extend(ow);
            }
            (b, w, 5)
        }
        (Topology::Triangle, 13) => {
            let mut b = vec![vec![1.0 / 3.0; 3]];
            let mut w = vec![TRI_13_CENTROID_WEIGHT];

            for (weight, a) in [TRI_13_ORBIT_A, TRI_13_ORBIT_B] {
                let (ob, ow) = tri_orbit_aab(weight, a);
                b.extend(ob);
                w.extend(ow);
            }

            let (weight, [a, c]) = TRI_13_ORBIT_C;
            let d = 1.0 - a - c;
            for perm in [[a, c, d], [a, d, c], [c, a, d], [c, d, a], [d, a, c], [d, c, a]] {
                b.push(perm.to_vec());
                w.push(weight);
            }
            (b, w, 7)
        }
        (Topology::Tet, 4) => {
            let sqrt_5 = 5.0_f64.sqrt();
            let a = (5.0 - sqrt_5) / 20.0;
            let b = (5.0 + 3.0 * sqrt_5) / 20.0;
            (tet_orbit_aaab(a, b), vec![0.25; 4], 2)
        }
        (Topology::Tet, 11) => {
            // Keast #2
            let mut b = vec![vec![0.25; 4]];
            let mut w = vec![-74.0 / 5625.0 * 6.0];

            b.extend(tet_orbit_aaab(1.0 / 14.0, 11.0 / 14.0));
            w.extend([343.0 / 45000.0 * 6.0; 4]);

            let root = (5.0_f64 / 14.0).sqrt();
            let p = (1.0 + root) / 4.0;
            let q = (1.0 - root) / 4.0;
            for perm in [
                [p, p, q, q],
                [p, q, p, q],
                [p, q, q, p],
                [q, p, p, q],
                [q, p, q, p],
                [q, q, p, p],
            ] {
                b.push(perm.to_vec());
                w.push(56.0 / 2250.0 * 6.0);
            }
            (b, w, 4)
        }
        _ => {
            return Err(QuadratureError::UnsupportedRule {
                topology,
                family: RuleFamily::Simplex,
                points,
            })
        }
    };

    let volume = topology.reference_volume();
    let knots = bary.iter().flat_map(|l| l[1..].to_vec()).collect();
    let weights = weights.iter().map(|w| w * volume).collect();

    Ok(QuadratureRule::new(
        topology,
        RuleFamily::Simplex,
        knots,
        weights,
        degree,
    ))
}

// the three points with barycentric coordinates (a, a, 1 - 2a) and permutations
fn tri_orbit_aab(weight: f64, a: f64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let b = 1.0 - 2.0 * a;
    (
        vec![vec![a, a, b], vec![a, b, a], vec![b, a, a]],
        vec![weight; 3],
    )
}

// the four points with barycentric coordinates (a, a, a, b) and permutations
fn tet_orbit_aaab(a: f64, b: f64) -> Vec<Vec<f64>> {
    vec![
        vec![b, a, a, a],
        vec![a, b, a, a],
        vec![a, a, b, a],
        vec![a, a, a, b],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn factorial(n: usize) -> f64 {
        (1..=n).map(|k| k as f64).product()
    }

    #[test]
    fn triangle_rules_are_exact() {
        for points in [3, 7, 13] {
            let rule = simplex_rule(Topology::Triangle, points).unwrap();
            assert_eq!(rule.nweight(), points);
            assert_abs_diff_eq!(rule.weights.iter().sum::<f64>(), 0.5, epsilon = 1e-13);

            for a in 0..=rule.degree() {
                for b in 0..=(rule.degree() - a) {
                    let exact = factorial(a) * factorial(b) / factorial(a + b + 2);
                    let approx = rule.integrate(|s| s[0].powi(a as i32) * s[1].powi(b as i32));
                    assert_abs_diff_eq!(approx, exact, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn tet_rules_are_exact() {
        for points in [4, 11] {
            let rule = simplex_rule(Topology::Tet, points).unwrap();
            assert_eq!(rule.nweight(), points);
            assert_abs_diff_eq!(rule.weights.iter().sum::<f64>(), 1.0 / 6.0, epsilon = 1e-13);

            for a in 0..=rule.degree() {
                for b in 0..=(rule.degree() - a) {
                    for c in 0..=(rule.degree() - a - b) {
                        let exact = factorial(a) * factorial(b) * factorial(c)
                            / factorial(a + b + c + 3);
                        let approx = rule.integrate(|s| {
                            s[0].powi(a as i32) * s[1].powi(b as i32) * s[2].powi(c as i32)
                        });
                        assert_abs_diff_eq!(approx, exact, epsilon = 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn points_lie_inside_the_simplex() {
        for (topology, points) in [
            (Topology::Triangle, 3),
            (Topology::Triangle, 7),
            (Topology::Triangle, 13),
            (Topology::Tet, 4),
            (Topology::Tet, 11),
        ] {
            let rule = simplex_rule(topology, points).unwrap();
            for (s, _) in rule.iter() {
                assert!(s.iter().all(|x| *x > 0.0));
                assert!(s.iter().sum::<f64>() < 1.0);
            }
        }
    }

    #[test]
    fn unsupported_table() {
        assert!(simplex_rule(Topology::Triangle, 6).is_err());
        assert!(simplex_rule(Topology::Quad, 4).is_err());
        assert_eq!(points_for_degree(Topology::Tet, 5), None);
    }
}
