//! Annotation statistics as Vega-Lite chart specifications.
//!
//! Charts are plain JSON documents; rendering them is left to any Vega-Lite
//! viewer. All charts of a run are bundled into one zip archive.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::archive::write_bundle;
use crate::config::Config;
use crate::error::Result;
use crate::model::AnnotatorId;
use crate::table::AnnotationTable;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// One named chart specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub file_name: String,
    pub spec: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnnotatorSummary {
    pub annotator: AnnotatorId,
    pub total: usize,
    pub unique: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// Statistics
// ═══════════════════════════════════════════════════════════════════════

fn sorted_counts(counts: HashMap<&str, usize>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = counts.into_iter().map(|(t, n)| (t.to_string(), n)).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Occurrences of each tag used by an annotator, most frequent first.
pub fn tag_counts(table: &AnnotationTable, annotator: AnnotatorId) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in table.rows.iter().filter(|r| r.user_id == annotator) {
        *counts.entry(row.pattern_tag.as_str()).or_default() += 1;
    }
    sorted_counts(counts)
}

pub fn summary(table: &AnnotationTable, annotators: &[AnnotatorId]) -> Vec<AnnotatorSummary> {
    annotators
        .iter()
        .map(|&annotator| {
            let tags: Vec<&str> = table
                .rows
                .iter()
                .filter(|r| r.user_id == annotator)
                .map(|r| r.pattern_tag.as_str())
                .collect();
            let unique = tags.iter().collect::<HashSet<_>>().len();
            AnnotatorSummary {
                annotator,
                total: tags.len(),
                unique,
            }
        })
        .collect()
}

/// Tag with annotator-specific prefixes removed, for comparing vocabularies.
/// Only the first matching prefix is stripped.
pub fn standardize_tag(tag: &str) -> String {
    let tag = tag.trim().to_lowercase();
    if tag.starts_with("sub.vz") {
        // the separator after the prefix goes too
        return tag.chars().skip(7).collect();
    }
    for prefix in ["pat-", "vz", "sub-"] {
        if let Some(rest) = tag.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    tag
}

/// The `top_n` most frequent standardized tags over all annotators, and for
/// each of them the occurrences per annotator.
pub fn top_standardized(
    table: &AnnotationTable,
    annotators: &[AnnotatorId],
    top_n: usize,
) -> (Vec<String>, BTreeMap<(String, AnnotatorId), usize>) {
    let rows: Vec<(String, AnnotatorId)> = table
        .rows
        .iter()
        .filter(|r| annotators.contains(&r.user_id))
        .map(|r| (standardize_tag(&r.pattern_tag), r.user_id))
        .collect();

    let mut totals: HashMap<&str, usize> = HashMap::new();
    for (tag, _) in &rows {
        *totals.entry(tag.as_str()).or_default() += 1;
    }
    let top: Vec<String> = sorted_counts(totals)
        .into_iter()
        .take(top_n)
        .map(|(tag, _)| tag)
        .collect();

    let mut grouped = BTreeMap::new();
    for (tag, user) in rows {
        if top.contains(&tag) {
            *grouped.entry((tag, user)).or_default() += 1;
        }
    }
    (top, grouped)
}

// ═══════════════════════════════════════════════════════════════════════
// Chart specifications
// ═══════════════════════════════════════════════════════════════════════

fn user_label(annotator: AnnotatorId) -> String {
    format!("User {annotator}")
}

fn tag_chart(annotator: AnnotatorId, counts: &[(String, usize)]) -> Value {
    let values: Vec<Value> = counts
        .iter()
        .map(|(tag, n)| json!({ "Pattern Tag": tag, "Occurrences": n }))
        .collect();
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": format!("Pattern Occurrences: {}", user_label(annotator)),
        "data": { "values": values },
        "mark": "bar",
        "encoding": {
            "y": { "field": "Pattern Tag", "type": "nominal", "sort": "-x" },
            "x": { "field": "Occurrences", "type": "quantitative" },
            "tooltip": [
                { "field": "Pattern Tag", "type": "nominal" },
                { "field": "Occurrences", "type": "quantitative" }
            ]
        },
        "params": [{ "name": "grid", "select": "interval", "bind": "scales" }]
    })
}

fn summary_chart(summaries: &[AnnotatorSummary]) -> Value {
    let values: Vec<Value> = summaries
        .iter()
        .flat_map(|s| {
            let user = user_label(s.annotator);
            [
                json!({ "User": user, "Metric": "Total Occurrences", "Count": s.total }),
                json!({ "User": user, "Metric": "Unique Patterns", "Count": s.unique }),
            ]
        })
        .collect();
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": "Pattern Occurrences and Variety by User",
        "data": { "values": values },
        "mark": "bar",
        "encoding": {
            "x": { "field": "User", "type": "nominal", "axis": null },
            "y": { "field": "Count", "type": "quantitative", "title": "Count" },
            "color": { "field": "User", "type": "nominal", "title": "User" },
            "column": {
                "field": "Metric",
                "type": "nominal",
                "title": "Metric",
                "header": { "titleOrient": "bottom", "labelOrient": "bottom" }
            },
            "tooltip": [
                { "field": "User", "type": "nominal" },
                { "field": "Metric", "type": "nominal" },
                { "field": "Count", "type": "quantitative" }
            ]
        }
    })
}

fn standardized_chart(top: &[String], grouped: &BTreeMap<(String, AnnotatorId), usize>) -> Value {
    let values: Vec<Value> = grouped
        .iter()
        .map(|((tag, user), n)| {
            json!({ "standardized_tag": tag, "User": user_label(*user), "Occurrences": n })
        })
        .collect();
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": format!("Top {} Standardized Patterns by User", top.len()),
        "data": { "values": values },
        "mark": "bar",
        "encoding": {
            "x": {
                "field": "standardized_tag",
                "type": "nominal",
                "title": "Standardized Pattern Tag",
                "sort": top
            },
            "y": { "field": "Occurrences", "type": "quantitative", "title": "Total Occurrences" },
            "color": { "field": "User", "type": "nominal", "title": "User" },
            "tooltip": [
                { "field": "standardized_tag", "type": "nominal" },
                { "field": "User", "type": "nominal" },
                { "field": "Occurrences", "type": "quantitative" }
            ]
        }
    })
}

/// Every chart for a table: one per annotator, the summary comparison and the
/// top standardized tags.
pub fn build_charts(table: &AnnotationTable, annotators: &[AnnotatorId], top_n: usize) -> Vec<Chart> {
    let mut charts: Vec<Chart> = annotators
        .iter()
        .map(|&a| Chart {
            file_name: format!("user_{a}_patterns_chart.json"),
            spec: tag_chart(a, &tag_counts(table, a)),
        })
        .collect();

    charts.push(Chart {
        file_name: "all_users_comparison_chart.json".into(),
        spec: summary_chart(&summary(table, annotators)),
    });

    let (top, grouped) = top_standardized(table, annotators, top_n);
    charts.push(Chart {
        file_name: format!("top_{top_n}_standardized_patterns_chart.json"),
        spec: standardized_chart(&top, &grouped),
    });
    charts
}

/// Build all charts and write them into the configured bundle.
#[tracing::instrument(skip_all)]
pub fn write_charts(config: &Config, table: &AnnotationTable) -> Result<PathBuf> {
    let charts = build_charts(table, &config.annotators, config.chart_top_n);
    let entries = charts
        .iter()
        .map(|c| Ok((c.file_name.clone(), serde_json::to_string_pretty(&c.spec)?)))
        .collect::<Result<Vec<_>>>()?;
    let path = config.paths.charts_bundle.clone();
    write_bundle(&path, &entries)?;
    info!(path = %path.display(), charts = entries.len(), "chart bundle written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CSV: &str = "song_id,user_id,pattern_tag,xml_file\n\
        0,36,Pat-1,x\n\
        0,36,Pat-1,x\n\
        0,36,VZ1,x\n\
        1,46,sub.vz-1,x\n\
        1,46,pat-1,x\n\
        1,48,Sub-2,x\n";

    fn table() -> AnnotationTable {
        AnnotationTable::from_reader(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn standardization_strips_one_prefix() {
        assert_eq!(standardize_tag("Pat-12"), "12");
        assert_eq!(standardize_tag(" sub.vz-3 "), "3");
        assert_eq!(standardize_tag("VZ4"), "4");
        assert_eq!(standardize_tag("Sub-5"), "5");
        assert_eq!(standardize_tag("motif"), "motif");
        assert_eq!(standardize_tag("sub.vz"), "");
    }

    #[test]
    fn counts_sorted_by_frequency_then_tag() {
        assert_eq!(
            tag_counts(&table(), 36),
            vec![("Pat-1".to_string(), 2), ("VZ1".to_string(), 1)]
        );
        assert_eq!(
            summary(&table(), &[36, 51]),
            vec![
                AnnotatorSummary { annotator: 36, total: 3, unique: 2 },
                AnnotatorSummary { annotator: 51, total: 0, unique: 0 },
            ]
        );
    }

    #[test]
    fn top_tags_group_by_annotator() {
        let (top, grouped) = top_standardized(&table(), &[36, 46, 48], 2);
        assert_eq!(top, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(grouped[&("1".to_string(), 36)], 3);
        assert_eq!(grouped[&("1".to_string(), 46)], 2);
        assert_eq!(grouped[&("2".to_string(), 48)], 1);
    }

    #[test]
    fn one_chart_per_annotator_plus_two() {
        let charts = build_charts(&table(), &[36, 46], 20);
        let names: Vec<&str> = charts.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "user_36_patterns_chart.json",
                "user_46_patterns_chart.json",
                "all_users_comparison_chart.json",
                "top_20_standardized_patterns_chart.json",
            ]
        );
        assert_eq!(charts[0].spec["data"]["values"][0]["Occurrences"], 2);
    }
}
