//! MCMC convergence checks for the optional Bayesian backend.
//!
//! When priors come from a posterior sampler, run its chains through
//! [`mcmc_convergence`] before trusting the calibration. The default
//! engine is not Bayesian; callers on that path skip this module and
//! report `calibration_method: "heuristic"` instead.

use serde::{Deserialize, Serialize};

/// R-hat above which chains are considered unmixed.
const R_HAT_THRESHOLD: f64 = 1.05;

/// Minimum effective sample size for a usable posterior.
const ESS_FLOOR: f64 = 100.0;

/// Convergence summary across chains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceSummary {
    /// Split-chain potential scale reduction factor.
    pub r_hat: f64,
    /// Effective sample size across all chains.
    pub ess: f64,
    pub converged: bool,
}

/// Split-chain R-hat and effective sample size.
///
/// `chains` holds one sample vector per chain; chains are split in half so
/// within-chain drift shows up as apparent non-mixing.
pub fn mcmc_convergence(chains: &[Vec<f64>]) -> Option<ConvergenceSummary> {
    let min_len = chains.iter().map(Vec::len).min()?;
    if chains.is_empty() || min_len < 4 {
        return None;
    }

    // Split every chain in half, truncated to even length.
    let half = min_len / 2;
    let split: Vec<&[f64]> = chains
        .iter()
        .flat_map(|c| [&c[..half], &c[half..2 * half]])
        .collect();

    let m = split.len() as f64;
    let n = half as f64;
    let chain_means: Vec<f64> = split.iter().map(|c| mean(c)).collect();
    let grand_mean = mean(&chain_means);
    let between = n / (m - 1.0)
        * chain_means
            .iter()
            .map(|mu| (mu - grand_mean).powi(2))
            .sum::<f64>();
    let within = split
        .iter()
        .zip(&chain_means)
        .map(|(c, mu)| c.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (n - 1.0))
        .sum::<f64>()
        / m;

    let var_plus = (n - 1.0) / n * within + between / n;
    let r_hat = if within > 0.0 {
        (var_plus / within).sqrt()
    } else {
        1.0
    };

    // ESS from the lag-1 autocorrelation, pooled across split chains.
    let rho = pooled_lag1_autocorrelation(&split, &chain_means, within);
    let ess = (m * n) / (1.0 + 2.0 * rho.max(0.0));

    Some(ConvergenceSummary {
        r_hat,
        ess,
        converged: r_hat <= R_HAT_THRESHOLD && ess >= ESS_FLOOR,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len().max(1) as f64
}

fn pooled_lag1_autocorrelation(split: &[&[f64]], means: &[f64], within: f64) -> f64 {
    if within <= 0.0 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut count = 0usize;
    for (chain, mu) in split.iter().zip(means) {
        for pair in chain.windows(2) {
            total += (pair[0] - mu) * (pair[1] - mu);
            count += 1;
        }
    }
    total / count.max(1) as f64 / within
}
