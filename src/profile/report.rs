//! Rendering of aggregated prefix statistics

use crate::common::{display_key, format_bytes, Result};
use crate::profile::aggregate::{PrefixMap, PrefixStats};
use crate::profile::value_type::TypeMask;
use serde::Serialize;
use std::fmt::Write;

const PREFIX_WIDTH: usize = 42;

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub prefix: String,
    pub member_count: u64,
    pub average_size: u64,
    pub total_size: u64,
    pub types: TypeMask,
}

impl ReportRow {
    pub fn new(prefix: &[u8], stats: &PrefixStats) -> Self {
        Self {
            prefix: display_key(prefix),
            member_count: stats.member_count,
            average_size: stats.average_size(),
            total_size: stats.total_size,
            types: stats.types,
        }
    }
}

/// Rows for a prefix map, sorted by prefix bytes.
pub fn rows(map: &PrefixMap) -> Vec<ReportRow> {
    // BTreeMap iteration is already in byte order.
    map.iter()
        .map(|(prefix, stats)| ReportRow::new(prefix, stats))
        .collect()
}

/// Outcome of a complete profiling run.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    /// Keys scanned by the sampling pass
    pub sampled_keys: u64,
    /// Keys scanned by the aggregation pass
    pub scanned_keys: u64,
    /// Keys attributed to at least one prefix
    pub matched_keys: u64,
    /// Whether size and type columns carry data
    pub collect_stats: bool,
    pub summary: Vec<ReportRow>,
    pub detail: Vec<ReportRow>,
}

impl ProfileReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain text tables, one for summary and one for detail prefixes.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "sampled {} keys, scanned {} keys, {} matched a prefix",
            self.sampled_keys, self.scanned_keys, self.matched_keys
        );
        out.push('\n');
        render_section(&mut out, "Summary", '-', &self.summary, self.collect_stats);
        render_section(&mut out, "Detail", '*', &self.detail, self.collect_stats);
        out
    }
}

fn render_section(out: &mut String, title: &str, fill: char, rows: &[ReportRow], with_stats: bool) {
    let bar: String = std::iter::repeat(fill).take(22).collect();
    let _ = writeln!(out, "{bar}{title}{bar}");

    if with_stats {
        let _ = writeln!(
            out,
            "|    {:<width$} {:>10} {:>12} {:>12}  {}",
            "PREFIX",
            "KEYS",
            "AVG SIZE",
            "TOTAL SIZE",
            "TYPES",
            width = PREFIX_WIDTH
        );
    } else {
        let _ = writeln!(out, "|    {:<width$} {:>10}", "PREFIX", "KEYS", width = PREFIX_WIDTH);
    }

    for row in rows {
        if with_stats {
            let _ = writeln!(
                out,
                "|    {:<width$} {:>10} {:>12} {:>12}  {}",
                row.prefix,
                row.member_count,
                format_bytes(row.average_size),
                format_bytes(row.total_size),
                row.types,
                width = PREFIX_WIDTH
            );
        } else {
            let _ = writeln!(
                out,
                "|    {:<width$} {:>10}",
                row.prefix,
                row.member_count,
                width = PREFIX_WIDTH
            );
        }
    }

    let _ = writeln!(out, "{bar}{title}<{}>{bar}", rows.len());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::value_type::ValueType;

    fn map(entries: &[(&str, u64, u64)]) -> PrefixMap {
        entries
            .iter()
            .map(|(prefix, count, total)| {
                let mut stats = PrefixStats {
                    member_count: *count,
                    total_size: *total,
                    ..Default::default()
                };
                stats.types.insert(ValueType::String);
                (prefix.as_bytes().to_vec(), stats)
            })
            .collect()
    }

    fn report(collect_stats: bool) -> ProfileReport {
        ProfileReport {
            sampled_keys: 100,
            scanned_keys: 1000,
            matched_keys: 1000,
            collect_stats,
            summary: rows(&map(&[("order:", 600, 6000), ("log:", 400, 1200)])),
            detail: rows(&map(&[("order:eu:", 3, 100), ("empty:", 0, 0)])),
        }
    }

    #[test]
    fn test_rows_sorted_with_average() {
        let report = report(true);
        let prefixes: Vec<&str> = report.summary.iter().map(|r| r.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["log:", "order:"]);
        assert_eq!(report.summary[1].average_size, 10);

        let eu = report.detail.iter().find(|r| r.prefix == "order:eu:").unwrap();
        assert_eq!(eu.average_size, 33);
        let empty = report.detail.iter().find(|r| r.prefix == "empty:").unwrap();
        assert_eq!(empty.average_size, 0);
    }

    #[test]
    fn test_render_table_with_stats() {
        let text = report(true).render_table();
        assert!(text.contains("Summary<2>"));
        assert!(text.contains("Detail<2>"));
        assert!(text.contains("TOTAL SIZE"));
        let order_line = text.lines().find(|l| l.contains("order:") && !l.contains("eu")).unwrap();
        assert!(order_line.contains("600"));
        assert!(order_line.contains("5.86 KB"));
        assert!(order_line.contains("string"));
    }

    #[test]
    fn test_render_table_without_stats() {
        let text = report(false).render_table();
        assert!(!text.contains("TOTAL SIZE"));
        assert!(text.contains(&format!("|    {:<42} {:>10}", "log:", 400)));
    }

    #[test]
    fn test_json_output() {
        let json = report(true).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"][0]["prefix"], "log:");
        assert_eq!(value["summary"][0]["member_count"], 400);
        assert_eq!(value["summary"][0]["types"][0], "string");
        assert_eq!(value["scanned_keys"], 1000);
    }
}
