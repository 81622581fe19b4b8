//! Markdown calibration report.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use dfs_core::kernel::KernelStatsSnapshot;

use crate::convergence::ConvergenceSummary;
use crate::metrics::CalibrationMetrics;

/// Everything the report renders.
#[derive(Debug, Clone)]
pub struct ReportInputs<'a> {
    pub slate_id: &'a str,
    /// Archetype name -> marginal metrics.
    pub metrics: &'a BTreeMap<String, CalibrationMetrics>,
    /// Joint event name -> mean absolute calibration error.
    pub joint_errors: Option<&'a BTreeMap<String, f64>>,
    /// Present only when a Bayesian backend produced the priors.
    pub convergence: Option<ConvergenceSummary>,
    pub kernel: &'a KernelStatsSnapshot,
}

/// Render the offline calibration report.
pub fn generate_report(inputs: &ReportInputs<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Calibration report: {}", inputs.slate_id);
    let _ = writeln!(out);

    match inputs.convergence {
        Some(summary) => {
            let _ = writeln!(out, "calibration_method: bayesian");
            let _ = writeln!(
                out,
                "convergence: r_hat = {:.4}, ess = {:.0}, converged = {}",
                summary.r_hat, summary.ess, summary.converged
            );
        }
        None => {
            let _ = writeln!(out, "calibration_method: heuristic");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Marginal calibration by archetype");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "| archetype | crps | log score | cov 50 | cov 80 | cov 95 |"
    );
    let _ = writeln!(out, "|---|---|---|---|---|---|");
    for (archetype, m) in inputs.metrics {
        let _ = writeln!(
            out,
            "| {archetype} | {:.3} | {:.3} | {:.2} | {:.2} | {:.2} |",
            m.crps, m.log_score, m.coverage_50, m.coverage_80, m.coverage_95
        );
    }
    let _ = writeln!(out);

    if let Some(joint) = inputs.joint_errors {
        let _ = writeln!(out, "## Joint event calibration");
        let _ = writeln!(out);
        for (event, error) in joint {
            let _ = writeln!(out, "- `{event}`: mean abs error {error:.3}");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Kernel rejection statistics");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "validated {} states, rejected {} ({:.2}%)",
        inputs.kernel.total_validated,
        inputs.kernel.total_rejected,
        inputs.kernel.rejection_rate * 100.0
    );
    let top = inputs.kernel.top_reasons(5);
    if top.is_empty() {
        let _ = writeln!(out, "no rejections recorded");
    } else {
        for (code, count) in top {
            let _ = writeln!(out, "- `{code}`: {count}");
        }
    }

    out
}
