//! Prometheus text-exposition rendering of run results.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::types::AggregatedFinding;

/// Render the run results in Prometheus exposition format.
///
/// Output ordering is deterministic (sorted by cluster and severity) so the
/// file diffs cleanly between runs.
#[must_use]
pub fn render(rows: &[AggregatedFinding], failed: &[String], timestamp_secs: i64) -> String {
    let mut per_cluster: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for row in rows {
        *per_cluster
            .entry(row.cluster.as_str())
            .or_default()
            .entry(row.severity.as_str())
            .or_default() += 1;
        *totals.entry(row.severity.as_str()).or_default() += 1;
    }

    let mut out = String::new();
    out.push_str("# HELP ncc_check_total Total number of NCC checks by cluster and severity\n");
    out.push_str("# TYPE ncc_check_total counter\n");
    for (cluster, counts) in &per_cluster {
        for (severity, count) in counts {
            let _ = writeln!(
                out,
                "ncc_check_total{{cluster=\"{}\",severity=\"{severity}\"}} {count} {timestamp_secs}",
                escape_label(cluster),
            );
        }
    }

    out.push_str(
        "\n# HELP ncc_check_global_total Total number of NCC checks by severity across all clusters\n",
    );
    out.push_str("# TYPE ncc_check_global_total counter\n");
    for (severity, count) in &totals {
        let _ = writeln!(
            out,
            "ncc_check_global_total{{severity=\"{severity}\"}} {count} {timestamp_secs}",
        );
    }

    out.push_str("\n# HELP ncc_cluster_healthy Cluster health status (1=healthy, 0=unhealthy)\n");
    out.push_str("# TYPE ncc_cluster_healthy gauge\n");
    let failed_set: BTreeSet<&str> = failed.iter().map(String::as_str).collect();
    let mut all_clusters: BTreeSet<&str> = per_cluster.keys().copied().collect();
    all_clusters.extend(failed_set.iter().copied());
    for cluster in &all_clusters {
        let healthy = u8::from(!failed_set.contains(cluster));
        let _ = writeln!(
            out,
            "ncc_cluster_healthy{{cluster=\"{}\"}} {healthy} {timestamp_secs}",
            escape_label(cluster),
        );
    }

    out.push_str("\n# HELP ncc_clusters_total Total number of clusters processed\n");
    out.push_str("# TYPE ncc_clusters_total gauge\n");
    let _ = writeln!(out, "ncc_clusters_total {} {timestamp_secs}", all_clusters.len());

    out.push_str("\n# HELP ncc_clusters_failed_total Total number of failed clusters\n");
    out.push_str("# TYPE ncc_clusters_failed_total gauge\n");
    let _ = writeln!(
        out,
        "ncc_clusters_failed_total {} {timestamp_secs}",
        failed.len()
    );

    out
}

/// Escape a Prometheus label value.
fn escape_label(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
