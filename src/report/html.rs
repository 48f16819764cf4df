//! HTML report rendering.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::aggregate::Aggregate;
use crate::types::Finding;

/// Render the per-endpoint report table.
#[must_use]
pub fn endpoint_report(findings: &[Finding], generated_at: DateTime<Utc>) -> String {
    let mut rows = String::new();
    for finding in findings {
        let _ = write!(
            rows,
            r#"
      <tr>
        <td><span class="sev {sev}">{sev}</span></td>
        <td class="mono">{check}</td>
        <td class="mono">{detail}</td>
      </tr>"#,
            sev = finding.severity,
            check = html_escape(&finding.check_name),
            detail = multiline(&finding.detail),
        );
    }

    format!(
        r#"<html>
<head>
  <meta charset="utf-8">
  <title>NCC Report</title>
  <style>
    :root {{
      --fail: #ef4444;
      --warn: #f59e0b;
      --info: #3b82f6;
      --err:  #374151;
      --border: #d1d5db;
      --thead: #f3f4f6;
    }}
    * {{ box-sizing: border-box; }}
    body {{ margin: 16px; font-family: system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif; color: #111827; }}
    h1 {{ margin: 0 0 8px 0; font-size: 20px; }}
    .meta {{ color: #6b7280; font-size: 12px; margin-bottom: 12px; }}
    table {{ border-collapse: collapse; width: 100%; border: 1px solid var(--border); }}
    thead th {{
      position: sticky; top: 0; background: var(--thead);
      border-bottom: 1px solid var(--border);
      padding: 10px; text-align: left; font-size: 13px;
    }}
    tbody td {{ border-bottom: 1px solid var(--border); padding: 10px; vertical-align: top; }}
    tbody tr:nth-child(odd) {{ background: #fafafa; }}
    .sev {{ display: inline-block; padding: 2px 8px; border-radius: 999px; font-weight: 600; font-size: 12px; }}
    .sev.FAIL {{ color: #fff; background: var(--fail); }}
    .sev.WARN {{ color: #111827; background: #fde68a; }}
    .sev.INFO {{ color: #fff; background: var(--info); }}
    .sev.ERR  {{ color: #111827; background: #e5e7eb; }}
    .mono {{ font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; white-space: pre-wrap; word-break: break-word; }}
  </style>
</head>
<body>
  <h1>NCC Report</h1>
  <div class="meta">Generated at {generated}</div>
  <table>
    <thead>
      <tr>
        <th style="width:120px">Severity</th>
        <th style="width:360px">NCC Check Name</th>
        <th>Detail Information</th>
      </tr>
    </thead>
    <tbody>{rows}
    </tbody>
  </table>
</body>
</html>"#,
        generated = generated_at.to_rfc3339(),
        rows = rows,
    )
}

/// Per-endpoint report files linked from the aggregated page.
#[derive(Debug, Clone)]
pub struct EndpointLinks {
    pub host: String,
    /// File names (relative to the filtered dir), e.g. `c1.log.html`.
    pub files: Vec<String>,
}

/// Render the aggregated index page over all endpoints.
#[must_use]
pub fn aggregate_report(aggregate: &Aggregate, links: &[EndpointLinks]) -> String {
    let mut link_items = String::new();
    for link in links {
        let anchors = link
            .files
            .iter()
            .map(|f| format!(r#"<a href="{f}">{f}</a>"#, f = html_escape(f)))
            .collect::<Vec<_>>()
            .join(" | ");
        let _ = write!(
            link_items,
            "\n    <li>{host}: {anchors}</li>",
            host = html_escape(&link.host),
        );
    }

    let mut rows = String::new();
    for row in &aggregate.rows {
        let _ = write!(
            rows,
            r#"
      <tr class="{sev}">
        <td>{cluster}</td>
        <td>{sev}</td>
        <td>{check}</td>
        <td class="mono">{detail}</td>
      </tr>"#,
            sev = row.severity,
            cluster = html_escape(&row.cluster),
            check = html_escape(&row.check),
            detail = multiline(&row.detail),
        );
    }

    let mut failed = String::new();
    if !aggregate.failed.is_empty() {
        let _ = write!(
            failed,
            r#"
  <div class="failed">Failed clusters: {}</div>"#,
            html_escape(&aggregate.failed.join(", "))
        );
    }

    format!(
        r#"<html>
<head>
  <meta charset="utf-8">
  <title>NCC Aggregated Report</title>
  <style>
    body {{ font-family: system-ui, sans-serif; margin: 20px; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
    th {{ background-color: #f2f2f2; }}
    .mono {{ font-family: ui-monospace, Menlo, Consolas, monospace; white-space: pre-wrap; }}
    .failed {{ color: #b91c1c; margin: 12px 0; }}
    .FAIL {{ background-color: #ffebee; }}
    .WARN {{ background-color: #fff3e0; }}
    .INFO {{ background-color: #e3f2fd; }}
    .ERR {{ background-color: #f5f5f5; }}
  </style>
</head>
<body>
  <h1>NCC Aggregated Report</h1>
  <div>Generated at {generated}</div>{failed}
  <ul>{links}
  </ul>
  <table>
    <thead>
      <tr>
        <th>Cluster</th>
        <th>Severity</th>
        <th>Check</th>
        <th>Detail</th>
      </tr>
    </thead>
    <tbody>{rows}
    </tbody>
  </table>
</body>
</html>"#,
        generated = aggregate.generated_at.to_rfc3339(),
        failed = failed,
        links = link_items,
        rows = rows,
    )
}

/// Simple HTML escaping for user content.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Escape and convert newlines to `<br>` for table cells.
fn multiline(s: &str) -> String {
    html_escape(s).replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregatedFinding, Severity};

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(multiline("a\nb"), "a<br>b");
    }

    #[test]
    fn test_endpoint_report_escapes_detail() {
        let findings = vec![Finding {
            severity: Severity::Fail,
            check_name: "Detailed information for <check>".to_string(),
            detail: "FAIL: a < b\nRefer to KB".to_string(),
        }];
        let html = endpoint_report(&findings, Utc::now());
        assert!(html.contains("&lt;check&gt;"));
        assert!(html.contains("a &lt; b<br>Refer to KB"));
        assert!(html.contains(r#"class="sev FAIL""#));
    }

    #[test]
    fn test_aggregate_report_lists_failures_and_links() {
        let aggregate = Aggregate {
            rows: vec![AggregatedFinding {
                cluster: "c1".to_string(),
                severity: Severity::Warn,
                check: "Detailed information for x".to_string(),
                detail: "WARN: y".to_string(),
            }],
            succeeded: vec!["c1".to_string()],
            failed: vec!["c2".to_string()],
            generated_at: Utc::now(),
        };
        let links = vec![EndpointLinks {
            host: "c1".to_string(),
            files: vec!["c1.log.html".to_string(), "c1.log.csv".to_string()],
        }];
        let html = aggregate_report(&aggregate, &links);
        assert!(html.contains("Failed clusters: c2"));
        assert!(html.contains(r#"<a href="c1.log.html">"#));
        assert!(html.contains(r#"class="WARN""#));
    }
}
