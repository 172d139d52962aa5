//! Johnson-SU distribution and its maximum-likelihood fit.
//!
//! `X = xi + lambda * sinh((Z - gamma) / delta)` with `Z ~ N(0, 1)`, `delta > 0`, `lambda > 0`.

use {
    serde::Serialize,
    statrs::{
        distribution::{ContinuousCDF, Normal},
        statistics::Statistics,
    },
    std::f64::consts::PI,
};

use crate::{
    config::{ANALYSIS, DF, FitSettings},
    error::FitError,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JohnsonSu {
    pub gamma: f64,
    pub delta: f64,
    pub xi: f64,
    pub lambda: f64,
}

impl JohnsonSu {
    pub fn new(gamma: f64, delta: f64, xi: f64, lambda: f64) -> Option<Self> {
        let finite = [gamma, delta, xi, lambda].iter().all(|v| v.is_finite());
        (finite && delta > 0.0 && lambda > 0.0).then_some(Self {
            gamma,
            delta,
            xi,
            lambda,
        })
    }

    /// `Z` corresponding to `x`.
    fn z(&self, x: f64) -> f64 {
        self.gamma + self.delta * ((x - self.xi) / self.lambda).asinh()
    }

    pub fn ln_pdf(&self, x: f64) -> f64 {
        let u = (x - self.xi) / self.lambda;
        let z = self.z(x);
        self.delta.ln() - self.lambda.ln() - 0.5 * (2.0 * PI).ln() - 0.5 * u.mul_add(u, 1.0).ln()
            - 0.5 * z * z
    }

    pub fn pdf(&self, x: f64) -> f64 {
        self.ln_pdf(x).exp()
    }

    pub fn cdf(&self, x: f64) -> f64 {
        Normal::standard().cdf(self.z(x))
    }

    /// Inverse CDF, `p` in (0, 1).
    pub fn quantile(&self, p: f64) -> f64 {
        let z = Normal::standard().inverse_cdf(p);
        self.xi + self.lambda * ((z - self.gamma) / self.delta).sinh()
    }

    fn negative_log_likelihood(&self, sample: &[f64]) -> f64 {
        -sample.iter().map(|&x| self.ln_pdf(x)).sum::<f64>()
    }
}

// Search box on the standardised scale. Outside it the objective is +inf.
const LN_SCALE_BOUND: f64 = 7.0;
const LOCATION_BOUND: f64 = 50.0;

/// Objective over `theta = (gamma, ln delta, xi, ln lambda)`.
fn objective(theta: &[f64; 4], sample: &[f64]) -> f64 {
    let [gamma, ln_delta, xi, ln_lambda] = *theta;
    if ln_delta.abs() > LN_SCALE_BOUND
        || ln_lambda.abs() > LN_SCALE_BOUND
        || gamma.abs() > LOCATION_BOUND
        || xi.abs() > LOCATION_BOUND
    {
        return f64::INFINITY;
    }
    match JohnsonSu::new(gamma, ln_delta.exp(), xi, ln_lambda.exp()) {
        Some(dist) => {
            let nll = dist.negative_log_likelihood(sample);
            if nll.is_nan() { f64::INFINITY } else { nll }
        }
        None => f64::INFINITY,
    }
}

/// Fit by maximum likelihood. The sample is standardised first so the optimiser always
/// works on unit scale, then the location and scale are mapped back.
pub fn fit_johnson_su(sample: &[f64]) -> Result<JohnsonSu, FitError> {
    fit_with(sample, &ANALYSIS.fit)
}

pub fn fit_with(sample: &[f64], settings: &FitSettings) -> Result<JohnsonSu, FitError> {
    if sample.len() < settings.min_samples {
        return Err(FitError::TooFewSamples {
            required: settings.min_samples,
            actual: sample.len(),
        });
    }
    if sample.iter().any(|x| !x.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let mean = sample.mean();
    let std = sample.std_dev();
    if sample.iter().all(|&x| x == sample[0]) || !std.is_finite() || std <= 0.0 {
        return Err(FitError::DegenerateSample);
    }
    let standardised: Vec<f64> = sample.iter().map(|x| (x - mean) / std).collect();

    // gamma = 0, delta = 1, xi = 0, lambda = 1
    let start = [0.0; 4];
    let best = nelder_mead(|theta| objective(theta, &standardised), start, settings)?;

    let [gamma, ln_delta, xi, ln_lambda] = best;
    let fitted = JohnsonSu::new(
        gamma,
        ln_delta.exp(),
        mean + std * xi,
        std * ln_lambda.exp(),
    )
    .ok_or(FitError::NonFinite)?;

    if DF.log_fit {
        log::info!("Johnson-SU fit on {} returns: {:?}", sample.len(), fitted);
    }
    Ok(fitted)
}

/// Johnson-SU VaR at `confidence_level`: the fitted parameters and their quantile.
pub fn johnson_su_var(sample: &[f64], confidence_level: f64) -> Result<(JohnsonSu, f64), FitError> {
    let fitted = fit_johnson_su(sample)?;
    let q = fitted.quantile(confidence_level);
    if q.is_finite() {
        Ok((fitted, q))
    } else {
        Err(FitError::NonFinite)
    }
}

// ============================================================================
// Nelder-Mead simplex search (reflection 1, expansion 2, contraction 0.5, shrink 0.5)
// ============================================================================

const INITIAL_STEP: f64 = 0.5;

fn nelder_mead<F>(f: F, start: [f64; 4], settings: &FitSettings) -> Result<[f64; 4], FitError>
where
    F: Fn(&[f64; 4]) -> f64,
{
    const N: usize = 4;

    let mut simplex: Vec<([f64; 4], f64)> = Vec::with_capacity(N + 1);
    simplex.push((start, f(&start)));
    for i in 0..N {
        let mut vertex = start;
        vertex[i] += INITIAL_STEP;
        simplex.push((vertex, f(&vertex)));
    }

    for iteration in 0..settings.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, f_best) = simplex[0];
        let f_worst = simplex[N].1;

        let f_spread = f_worst - f_best;
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|(v, _)| v.iter().zip(best.iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        if f_best.is_finite()
            && f_spread <= settings.f_tolerance * (1.0 + f_best.abs())
            && x_spread <= settings.x_tolerance
        {
            if DF.log_fit {
                log::info!("Nelder-Mead converged after {} iterations", iteration);
            }
            return Ok(best);
        }

        let mut centroid = [0.0; N];
        for (v, _) in &simplex[..N] {
            for (c, x) in centroid.iter_mut().zip(v) {
                *c += x / N as f64;
            }
        }
        let worst = simplex[N].0;
        let towards = |coef: f64| -> [f64; 4] {
            std::array::from_fn(|i| centroid[i] + coef * (worst[i] - centroid[i]))
        };

        let reflected = towards(-1.0);
        let f_reflected = f(&reflected);

        if f_reflected < f_best {
            let expanded = towards(-2.0);
            let f_expanded = f(&expanded);
            simplex[N] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }
        if f_reflected < simplex[N - 1].1 {
            simplex[N] = (reflected, f_reflected);
            continue;
        }

        // Outside contraction if the reflection beat the worst vertex, inside otherwise.
        let (contracted, f_contracted) = if f_reflected < f_worst {
            let c = towards(-0.5);
            (c, f(&c))
        } else {
            let c = towards(0.5);
            (c, f(&c))
        };
        if f_contracted < f_worst.min(f_reflected) {
            simplex[N] = (contracted, f_contracted);
            continue;
        }

        for vertex in simplex.iter_mut().skip(1) {
            let shrunk: [f64; 4] = std::array::from_fn(|i| best[i] + 0.5 * (vertex.0[i] - best[i]));
            *vertex = (shrunk, f(&shrunk));
        }
    }

    if simplex.iter().any(|(v, fv)| !fv.is_finite() || v.iter().any(|x| !x.is_finite())) {
        return Err(FitError::NonFinite);
    }
    Err(FitError::NotConverged {
        iterations: settings.max_iterations,
    })
}
