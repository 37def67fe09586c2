//! Quadrature over the aperture half-angle.
//!
//! Every diffraction integral in this crate has the form
//! $\int_0^{\alpha} f(\theta)\,d\theta$ where $\alpha$ is the aperture
//! half-angle in the immersion medium. The node set depends only on $\alpha$
//! and the sample count, so one [`QuadratureNodes`] value serves every plane
//! and both models of a request; only the integrand changes with $z$.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Fixed-order quadrature rule used to sample the aperture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadratureRule {
    /// Gauss–Legendre nodes mapped onto $[0, \alpha]$.
    #[default]
    GaussLegendre,
    /// Composite Simpson on an equally spaced grid. The $\theta = 0$ node is
    /// dropped since every integrand carries a $\sin\theta$ factor; odd sample
    /// counts are rounded up to the next even count.
    Simpson,
}

/// One quadrature sample with the trigonometric values every integrand needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub theta: f64,
    pub sin_theta: f64,
    pub cos_theta: f64,
    pub weight: f64,
}

/// Immutable quadrature node set over $[0, \alpha]$, ordered by increasing angle.
#[derive(Debug, Clone)]
pub struct QuadratureNodes {
    rule: QuadratureRule,
    upper: f64,
    nodes: Vec<Node>,
}

impl QuadratureNodes {
    /// Build `n_samples` nodes on $[0, \text{upper}]$.
    ///
    /// # Panics
    /// Panics if `n_samples < 4` or `upper` is not positive; parameter
    /// validation rules both out before a session is created.
    pub fn new(rule: QuadratureRule, upper: f64, n_samples: usize) -> Self {
        Self::with_breakpoints(rule, upper, n_samples, &[])
    }

    /// Build nodes on $[0, \text{upper}]$ split into panels at `breakpoints`.
    ///
    /// The rule is applied to each panel separately, so an integrand with a
    /// kink at a breakpoint (a layer's critical angle) is smooth on every
    /// panel. Samples are shared out in proportion to panel width with at
    /// least 4 per panel; breakpoints outside $(0, \text{upper})$ are ignored.
    ///
    /// # Panics
    /// Same conditions as [`QuadratureNodes::new`].
    pub fn with_breakpoints(
        rule: QuadratureRule,
        upper: f64,
        n_samples: usize,
        breakpoints: &[f64],
    ) -> Self {
        assert!(n_samples >= 4, "at least 4 quadrature samples are required");
        assert!(upper > 0.0, "integration range must be positive");

        let mut edges = vec![0.0];
        let mut inner: Vec<f64> = breakpoints
            .iter()
            .copied()
            .filter(|&b| b > 0.0 && b < upper)
            .collect();
        inner.sort_by(f64::total_cmp);
        inner.dedup();
        edges.extend(inner);
        edges.push(upper);

        let mut theta = Vec::with_capacity(n_samples + 4 * edges.len());
        let mut weights = Vec::with_capacity(theta.capacity());
        for panel in edges.windows(2) {
            let (lower, width) = (panel[0], panel[1] - panel[0]);
            let count = ((n_samples as f64 * width / upper).ceil() as usize).max(4);
            match rule {
                QuadratureRule::GaussLegendre => {
                    let (x, w) = gauss_legendre(count);
                    let half = 0.5 * width;
                    theta.extend(x.iter().map(|&xi| lower + half * (xi + 1.0)));
                    weights.extend(w.iter().map(|&wi| half * wi));
                }
                QuadratureRule::Simpson => {
                    let (t, w) = simpson(width, count);
                    // The panel's left end coincides with the previous panel's last node.
                    if let Some(last) = weights.last_mut() {
                        *last += width / (t.len() as f64) / 3.0;
                    }
                    theta.extend(t.iter().map(|&ti| lower + ti));
                    weights.extend(w);
                }
            }
        }

        let nodes = theta
            .into_iter()
            .zip(weights)
            .map(|(theta, weight)| Node {
                theta,
                sin_theta: theta.sin(),
                cos_theta: theta.cos(),
                weight,
            })
            .collect();

        Self { rule, upper, nodes }
    }

    pub fn rule(&self) -> QuadratureRule {
        self.rule
    }

    /// Upper integration limit (the aperture half-angle).
    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Apply the rule to a real integrand.
    pub fn integrate(&self, f: impl Fn(f64) -> f64) -> f64 {
        self.nodes.iter().map(|n| n.weight * f(n.theta)).sum()
    }
}

/// Default sample count when the caller does not fix one.
///
/// Four samples per half-oscillation of the integrand, never fewer than 60.
/// Two sources oscillate: the fastest Bessel kernel (argument
/// `max_bessel_arg` at the aperture edge) and the pupil phase, which winds
/// through `max_phase_span` radians across the aperture.
pub fn adaptive_sample_count(half_angle: f64, max_bessel_arg: f64, max_phase_span: f64) -> usize {
    let oscillations = ((half_angle * max_bessel_arg + max_phase_span) / PI).floor() as usize;
    (4 * (1 + oscillations)).max(60)
}

/// Gauss–Legendre nodes and weights on $[-1, 1]$, ascending.
fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut x = vec![0.0; n];
    let mut w = vec![0.0; n];

    // Roots are symmetric; solve for the positive half with Newton's method.
    for i in 0..(n + 1) / 2 {
        let mut z = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre(n, z);
            let step = p / dp;
            z -= step;
            if step.abs() <= 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre(n, z);
        let weight = 2.0 / ((1.0 - z * z) * dp * dp);

        x[i] = -z;
        x[n - 1 - i] = z;
        w[i] = weight;
        w[n - 1 - i] = weight;
    }

    (x, w)
}

/// $P_n(z)$ and $P_n'(z)$ via the three-term recurrence.
fn legendre(n: usize, z: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = z;
    for j in 2..=n {
        let jf = j as f64;
        let next = ((2.0 * jf - 1.0) * z * p - (jf - 1.0) * p_prev) / jf;
        p_prev = p;
        p = next;
    }
    let dp = n as f64 * (z * p - p_prev) / (z * z - 1.0);
    (p, dp)
}

/// Composite Simpson nodes $\theta_j = j h$, $j = 1..N$, with weights
/// $h/3 \cdot (4, 2, 4, \dots, 2, 4, 1)$.
fn simpson(upper: f64, n_samples: usize) -> (Vec<f64>, Vec<f64>) {
    let n = n_samples + n_samples % 2;
    let h = upper / n as f64;

    let theta = (1..=n).map(|j| j as f64 * h).collect();
    let weights = (1..=n)
        .map(|j| {
            let pattern = if j == n {
                1.0
            } else if j % 2 == 1 {
                4.0
            } else {
                2.0
            };
            pattern * h / 3.0
        })
        .collect();

    (theta, weights)
}
