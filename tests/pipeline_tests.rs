//! Integration tests: run each batch job over a small annotation table and
//! one pre-rendered page in a temporary folder.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use patternlib::{
    analyse_all, charts, overlay_all, score_colors, similarity, visualize_all, AnnotationTable, Config,
    MatchKind, MatchSet, PatternError,
};

const ANNOTATIONS: &str = "song_id,user_id,pattern_tag,xml_file,start_measure,pattern_rank\n\
0,36,Pat-1,\"<measure><note xml:id=\"\"n1\"\"/><note xml:id=\"\"n2\"\"/><note xml:id=\"\"n3\"\"/></measure>\",1,1\n\
0,46,Pat-1.1,\"<measure><note xml:id=\"\"n2\"\"/><note xml:id=\"\"n3\"\"/></measure>\",1,2\n\
0,46,Pat-2,\"<measure><note xml:id=\"\"n4\"\"/></measure>\",3,\n\
0,48,Pat-3,\"<measure><note xml:id=\"\"n4\"\"/></measure>\",5,\n";

const PAGE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 21000 29700">
  <g class="page-margin" transform="translate(500, 500)">
    <g id="m1" class="measure">
      <g id="n1" class="note"><g class="notehead"><use xlink:href="#E0A4" x="1000" y="2000"/></g></g>
      <g id="n2" class="note"><g class="notehead"><use xlink:href="#E0A4" x="2000" y="2000"/></g></g>
      <g id="n3" class="note"><g class="notehead"><use xlink:href="#E0A4" x="3000" y="2000"/></g></g>
      <g id="n4" class="note"><g class="notehead"><use xlink:href="#E0A4" x="4000" y="2000"/></g></g>
    </g>
  </g>
</svg>"##;

const SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mei xmlns="http://www.music-encoding.org/ns/mei">
  <measure n="1"><staff><layer>
    <note xml:id="n1"/><note xml:id="n2"/><note xml:id="n3"/><note xml:id="n4"/>
  </layer></staff></measure>
</mei>"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    config: Config,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    fs::write(root.join("annotations.csv"), ANNOTATIONS).unwrap();
    fs::create_dir_all(root.join("pages")).unwrap();
    fs::write(root.join("pages/000_Bach.svg"), PAGE).unwrap();
    fs::create_dir_all(root.join("scores")).unwrap();
    fs::write(root.join("scores/000_Bach.mei"), SCORE).unwrap();

    let mut config = Config::default();
    config.annotators = vec![36, 46, 48];
    config.song_count = 1;
    config.paths.annotations = root.join("annotations.csv");
    config.paths.pages_dir = root.join("pages");
    config.paths.scores_dir = root.join("scores");
    config.paths.results_dir = root.join("results");
    config.paths.output_dir = root.join("out");
    config.paths.similarity_dir = root.join("similarity");
    config.paths.charts_bundle = root.join("charts.zip");
    Fixture {
        _dir: dir,
        root,
        config,
    }
}

fn table(config: &Config) -> AnnotationTable {
    AnnotationTable::load(&config.paths.annotations).unwrap()
}

fn names(paths: &[PathBuf], base: &Path) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.strip_prefix(base).unwrap().to_string_lossy().replace('\\', "/"))
        .collect()
}

// ─── Matching ───────────────────────────────────────────────────────

#[test]
fn boundary_sharing_containment_is_reported_as_intersect() {
    let fx = fixture();
    let written = analyse_all(&fx.config, &table(&fx.config)).unwrap();
    assert_eq!(
        names(&written, &fx.config.paths.results_dir),
        vec!["0_36_46.json", "0_36_48.json", "0_46_48.json"]
    );

    let set = MatchSet::read(&fx.config.paths.results_dir.join("0_36_46.json")).unwrap();
    assert_eq!(set.matches.len(), 1);
    assert_eq!(set.matches[0].kind, MatchKind::Intersect);
    assert_eq!(set.matches[0].left.tag, "Pat-1");
    assert_eq!(set.matches[0].right.tag, "Pat-1.1");

    let empty = MatchSet::read(&fx.config.paths.results_dir.join("0_36_48.json")).unwrap();
    assert!(empty.matches.is_empty());

    // identical single-note spans
    let same = MatchSet::read(&fx.config.paths.results_dir.join("0_46_48.json")).unwrap();
    assert_eq!(same.matches.len(), 1);
    assert_eq!(same.matches[0].kind, MatchKind::Intersect);
}

#[test]
fn relation_files_use_tuple_records() {
    let fx = fixture();
    analyse_all(&fx.config, &table(&fx.config)).unwrap();
    let text = fs::read_to_string(fx.config.paths.results_dir.join("0_36_46.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json[0][0][1], "Pat-1");
    assert_eq!(json[0][1][0], serde_json::json!(["n2", "n3"]));
    assert_eq!(json[0][2], "intersect");
}

#[test]
fn missing_annotation_table_aborts() {
    let err = AnnotationTable::load(Path::new("/nowhere/annotations.csv")).unwrap_err();
    assert!(matches!(err, PatternError::MissingInput(_)));
}

// ─── Overlays ───────────────────────────────────────────────────────

#[test]
fn visualized_pages_carry_colors_and_boxes() {
    let fx = fixture();
    analyse_all(&fx.config, &table(&fx.config)).unwrap();
    let written = visualize_all(&fx.config).unwrap();
    let out = &fx.config.paths.output_dir;
    assert_eq!(
        names(&written, out),
        vec!["0/000_Bach_36_46_0_0.svg", "0/000_Bach_46_48_0_0.svg"]
    );

    let svg = fs::read_to_string(out.join("0/000_Bach_36_46_0_0.svg")).unwrap();
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let color = |id: &str| {
        doc.descendants()
            .find(|n| n.attribute("id") == Some(id))
            .and_then(|n| n.attribute("color"))
    };
    assert_eq!(color("n1"), Some("red"));
    assert_eq!(color("n2"), Some("green"));
    assert_eq!(color("n4"), None);

    let margin = doc
        .descendants()
        .find(|n| n.attribute("class") == Some("page-margin"))
        .unwrap();
    assert!(margin.children().any(|n| n.tag_name().name() == "rect"));
    let label = margin
        .children()
        .find(|n| n.tag_name().name() == "text")
        .and_then(|n| n.text());
    assert_eq!(label, Some("intersect Pat-1 Pat-1.1"));
}

#[test]
fn pages_without_margin_group_are_skipped() {
    let fx = fixture();
    fs::write(
        fx.root.join("pages/000_Bach.svg"),
        PAGE.replace("page-margin", "page-body"),
    )
    .unwrap();
    analyse_all(&fx.config, &table(&fx.config)).unwrap();
    assert!(visualize_all(&fx.config).unwrap().is_empty());
    assert!(overlay_all(&fx.config, &table(&fx.config)).unwrap().is_empty());
}

#[test]
fn tag_overlay_boxes_every_pattern() {
    let fx = fixture();
    let written = overlay_all(&fx.config, &table(&fx.config)).unwrap();
    assert_eq!(names(&written, &fx.config.paths.output_dir), vec!["000_Bach_annotated.svg"]);

    let svg = fs::read_to_string(&written[0]).unwrap();
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let labels: Vec<&str> = doc
        .descendants()
        .filter(|n| n.tag_name().name() == "text")
        .filter_map(|n| n.text())
        .collect();
    assert_eq!(labels, vec!["Pat-1 (1)", "Pat-1.1 (2)", "Pat-2", "Pat-3"]);
}

#[test]
fn visualize_without_results_folder_fails() {
    let fx = fixture();
    let err = visualize_all(&fx.config).unwrap_err();
    assert!(matches!(err, PatternError::MissingInput(_)));
}

// ─── Similarity, charts, colored scores ─────────────────────────────

#[test]
fn similarity_matrices_are_written() {
    let mut fx = fixture();
    fx.config.similarity_radius = 1;
    let written = similarity::score_all(&fx.config, &table(&fx.config)).unwrap();
    assert_eq!(
        names(&written, &fx.config.paths.similarity_dir),
        vec!["000_similarity.json", "000_similarity.svg"]
    );

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
    // 36: {1,2}, 46: {1,2,3,4}
    assert_eq!(json["values"][0][1], 0.5);
    assert_eq!(json["annotators"], serde_json::json!([36, 46, 48]));
}

#[test]
fn chart_bundle_holds_one_entry_per_chart() {
    let fx = fixture();
    let path = charts::write_charts(&fx.config, &table(&fx.config)).unwrap();
    let data = fs::read(path).unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
    let mut entries: Vec<&str> = archive.file_names().collect();
    entries.sort();
    assert_eq!(
        entries,
        vec![
            "all_users_comparison_chart.json",
            "top_20_standardized_patterns_chart.json",
            "user_36_patterns_chart.json",
            "user_46_patterns_chart.json",
            "user_48_patterns_chart.json",
        ]
    );
}

#[test]
fn score_notes_are_colored_by_tag() {
    let fx = fixture();
    let written = score_colors::color_all(&fx.config, &table(&fx.config)).unwrap();
    assert_eq!(names(&written, &fx.config.paths.output_dir), vec!["scores/000_Bach.xml"]);

    let text = fs::read_to_string(&written[0]).unwrap();
    let doc = roxmltree::Document::parse(&text).unwrap();
    let colors: Vec<(&str, Option<&str>)> = doc
        .descendants()
        .filter(|n| n.tag_name().name() == "note")
        .map(|n| {
            (
                n.attribute(("http://www.w3.org/XML/1998/namespace", "id")).unwrap(),
                n.attribute("color"),
            )
        })
        .collect();
    let palette = &fx.config.palette.score_tags;
    assert_eq!(
        colors,
        vec![
            ("n1", palette.get("Pat-1").map(String::as_str)),
            ("n2", palette.get("Pat-1.1").map(String::as_str)),
            ("n3", palette.get("Pat-1.1").map(String::as_str)),
            ("n4", palette.get("Pat-3").map(String::as_str)),
        ]
    );
}

// ─── Batch resilience ───────────────────────────────────────────────

/// Song 0 gets a broken page and score, song 1 a copy of the good ones.
fn two_song_fixture() -> Fixture {
    let mut fx = fixture();
    fx.config.song_count = 2;
    let song_one = ANNOTATIONS
        .lines()
        .skip(1)
        .map(|line| format!("1{}\n", &line[1..]))
        .collect::<String>();
    fs::write(fx.root.join("annotations.csv"), format!("{ANNOTATIONS}{song_one}")).unwrap();

    fs::remove_file(fx.root.join("pages/000_Bach.svg")).unwrap();
    fs::write(fx.root.join("pages/000_broken.svg"), "<svg><g></svg>").unwrap();
    fs::write(fx.root.join("pages/001_good.svg"), PAGE).unwrap();

    fs::write(fx.root.join("scores/000_Bach.mei"), "<mei><measure>").unwrap();
    fs::write(fx.root.join("scores/001_good.mei"), SCORE).unwrap();
    fx
}

#[test]
fn broken_page_does_not_stop_later_songs() {
    let fx = two_song_fixture();
    analyse_all(&fx.config, &table(&fx.config)).unwrap();
    fs::write(fx.config.paths.results_dir.join("1_36_99.json"), "not json").unwrap();

    let out = &fx.config.paths.output_dir;
    let written = visualize_all(&fx.config).unwrap();
    assert_eq!(
        names(&written, out),
        vec!["1/001_good_36_46_0_0.svg", "1/001_good_46_48_0_0.svg"]
    );
    assert!(out.join("1/001_good_36_46_0_0.svg").is_file());

    let written = overlay_all(&fx.config, &table(&fx.config)).unwrap();
    assert_eq!(names(&written, out), vec!["001_good_annotated.svg"]);
}

#[test]
fn broken_score_does_not_stop_later_songs() {
    let fx = two_song_fixture();
    let written = score_colors::color_all(&fx.config, &table(&fx.config)).unwrap();
    assert_eq!(names(&written, &fx.config.paths.output_dir), vec!["scores/001_good.xml"]);
}
