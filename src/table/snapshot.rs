//! Deep read-only view of a table and its human-readable rendering

use serde::Serialize;

use crate::aggregator::AggregatorSnapshot;
use crate::matcher::MatcherSnapshot;
use crate::rewriter::RewriterSnapshot;
use crate::route::RouteSnapshot;

/// Everything an operator can see of the current pipeline
///
/// Produced by `Table::snapshot`; fully decoupled from live state, so
/// concurrent mutations never alter an already-returned snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot {
    pub spool_dir: String,
    pub rewriters: Vec<RewriterSnapshot>,
    pub blacklist: Vec<MatcherSnapshot>,
    pub aggregators: Vec<AggregatorSnapshot>,
    pub routes: Vec<RouteSnapshot>,
}

/// Columns never collapse below this width, so empty sections stay legible
const MIN_COLUMN_WIDTH: usize = 4;

impl TableSnapshot {
    /// Renders the snapshot as aligned text tables
    #[must_use]
    pub fn print(&self) -> String {
        let mut out = String::new();

        out.push_str("rewriters:\n");
        render_rows(
            &mut out,
            1,
            &["#", "old", "new", "max"],
            &self
                .rewriters
                .iter()
                .enumerate()
                .map(|(index, rewriter)| {
                    vec![
                        index.to_string(),
                        rewriter.old.clone(),
                        rewriter.new.clone(),
                        rewriter
                            .max
                            .map_or_else(|| "all".to_string(), |max| max.to_string()),
                    ]
                })
                .collect::<Vec<_>>(),
        );

        out.push_str("blacklist:\n");
        render_rows(
            &mut out,
            1,
            &["#", "prefix", "sub", "regex"],
            &self
                .blacklist
                .iter()
                .enumerate()
                .map(|(index, matcher)| {
                    vec![
                        index.to_string(),
                        matcher.prefix.clone(),
                        matcher.sub.clone(),
                        matcher.regex.clone(),
                    ]
                })
                .collect::<Vec<_>>(),
        );

        out.push_str("aggregators:\n");
        render_rows(
            &mut out,
            1,
            &["#", "function", "regex", "prefix", "sub", "format", "interval", "wait"],
            &self
                .aggregators
                .iter()
                .enumerate()
                .map(|(index, aggregator)| {
                    vec![
                        index.to_string(),
                        aggregator.function.to_string(),
                        aggregator.regex.clone(),
                        aggregator.prefix.clone(),
                        aggregator.sub.clone(),
                        aggregator.format.clone(),
                        aggregator.interval_secs.to_string(),
                        aggregator.wait_secs.to_string(),
                    ]
                })
                .collect::<Vec<_>>(),
        );

        out.push_str("routes:\n");
        for route in &self.routes {
            render_rows(
                &mut out,
                1,
                &["key", "type", "prefix", "sub", "regex"],
                &[vec![
                    route.key.clone(),
                    route.kind.to_string(),
                    route.matcher.prefix.clone(),
                    route.matcher.sub.clone(),
                    route.matcher.regex.clone(),
                ]],
            );
            render_rows(
                &mut out,
                2,
                &["addr", "prefix", "sub", "regex", "spool dir", "spool", "pickle", "online"],
                &route
                    .destinations
                    .iter()
                    .map(|destination| {
                        vec![
                            destination.addr.clone(),
                            destination.matcher.prefix.clone(),
                            destination.matcher.sub.clone(),
                            destination.matcher.regex.clone(),
                            destination.spool_dir.clone(),
                            destination.spool.to_string(),
                            destination.pickle.to_string(),
                            destination.online.to_string(),
                        ]
                    })
                    .collect::<Vec<_>>(),
            );
        }
        out
    }
}

impl std::fmt::Display for TableSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.print())
    }
}

/// Appends a header plus rows, padding each column to its widest cell
fn render_rows(out: &mut String, indent_level: usize, headers: &[&str], rows: &[Vec<String>]) {
    let indent = "  ".repeat(indent_level);
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| header.len().max(MIN_COLUMN_WIDTH))
        .collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if index < widths.len() {
                widths[index] = widths[index].max(cell.len());
            }
        }
    }

    out.push_str(&indent);
    for (index, header) in headers.iter().enumerate() {
        push_cell(out, header, widths[index], index + 1 == headers.len());
    }
    out.push('\n');
    for row in rows {
        out.push_str(&indent);
        for (index, cell) in row.iter().enumerate() {
            push_cell(out, cell, widths[index], index + 1 == row.len());
        }
        out.push('\n');
    }
}

fn push_cell(out: &mut String, cell: &str, width: usize, last: bool) {
    if last {
        out.push_str(cell);
    } else {
        out.push_str(&format!("{cell:<width$}  "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregationFunction;
    use crate::route::{DestinationSnapshot, RouteKind};

    fn sample() -> TableSnapshot {
        TableSnapshot {
            spool_dir: "/var/spool/relay".to_string(),
            rewriters: vec![RewriterSnapshot {
                old: "prod.".to_string(),
                new: "p.".to_string(),
                max: Some(1),
            }],
            blacklist: vec![MatcherSnapshot {
                prefix: "junk.".to_string(),
                sub: String::new(),
                regex: String::new(),
            }],
            aggregators: vec![AggregatorSnapshot {
                function: AggregationFunction::Sum,
                regex: r"^m\.(.*)$".to_string(),
                prefix: String::new(),
                sub: String::new(),
                format: "agg.$1".to_string(),
                interval_secs: 60,
                wait_secs: 120,
            }],
            routes: vec![RouteSnapshot {
                key: "core".to_string(),
                kind: RouteKind::SendAllMatch,
                matcher: MatcherSnapshot {
                    prefix: String::new(),
                    sub: String::new(),
                    regex: String::new(),
                },
                destinations: vec![DestinationSnapshot {
                    addr: "graphite-storage-01.example.com:2003".to_string(),
                    matcher: MatcherSnapshot {
                        prefix: String::new(),
                        sub: String::new(),
                        regex: String::new(),
                    },
                    spool_dir: "/var/spool/relay/core".to_string(),
                    spool: true,
                    pickle: false,
                    online: true,
                }],
            }],
        }
    }

    #[test]
    fn test_print_renders_every_section() {
        let rendered = sample().print();
        for section in ["rewriters:", "blacklist:", "aggregators:", "routes:"] {
            assert!(rendered.contains(section), "missing {section}");
        }
        assert!(rendered.contains("prod."));
        assert!(rendered.contains("junk."));
        assert!(rendered.contains("agg.$1"));
        assert!(rendered.contains("send-all-match"));
        assert!(rendered.contains("graphite-storage-01.example.com:2003"));
    }

    #[test]
    fn test_columns_adapt_to_content() {
        let rendered = sample().print();
        // the addr column grows to hold the long hostname, keeping the
        // following column aligned after it
        let dest_header = rendered
            .lines()
            .find(|line| line.contains("spool dir"))
            .unwrap();
        let dest_row = rendered
            .lines()
            .find(|line| line.contains("graphite-storage-01"))
            .unwrap();
        let header_col = dest_header.find("prefix").unwrap();
        let addr_width = "graphite-storage-01.example.com:2003".len();
        assert!(header_col > addr_width);
        assert!(dest_row.len() >= dest_header.len() - "online".len());
    }

    #[test]
    fn test_minimum_widths_hold_for_empty_sections() {
        let empty = TableSnapshot {
            spool_dir: String::new(),
            rewriters: Vec::new(),
            blacklist: Vec::new(),
            aggregators: Vec::new(),
            routes: Vec::new(),
        };
        let rendered = empty.print();
        let header = rendered
            .lines()
            .find(|line| line.trim_start().starts_with('#'))
            .unwrap();
        // "#" padded to the minimum width before the next column starts
        assert!(header.starts_with("  #   "));
    }

    #[test]
    fn test_display_matches_print() {
        let snapshot = sample();
        assert_eq!(snapshot.to_string(), snapshot.print());
    }
}
