//! Colors the notes of a full score source by the pattern they belong to.
//!
//! Only tags with a configured color take part. When several patterns claim
//! a note, the row that comes last in the table wins.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::archive::read_score_source;
use crate::config::Config;
use crate::document::{DocumentEdit, Markup, StylePatch};
use crate::engraver::SongCatalog;
use crate::error::{PatternError, Result};
use crate::model::{AnnotatorId, SongId};
use crate::parser::note_id;
use crate::table::{instance_from_row, AnnotationTable};

/// Score source formats, in order of preference.
pub const SCORE_EXTENSIONS: [&str; 4] = ["mei", "xml", "musicxml", "mxl"];

/// Note id → tag over one song's rows by the given annotators.
pub fn note_tag_map(
    table: &AnnotationTable,
    song_id: SongId,
    annotators: &[AnnotatorId],
    colors: &BTreeMap<String, String>,
) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (idx, row) in table.song_rows(song_id) {
        if !annotators.contains(&row.user_id) || !colors.contains_key(&row.pattern_tag) {
            continue;
        }
        if let Some(instance) = instance_from_row(idx, row) {
            for id in instance.note_ids {
                map.insert(id, instance.tag.clone());
            }
        }
    }
    map
}

/// Set `color` on every mapped note of a score. Returns the rewritten source
/// and the number of colored notes.
pub fn color_score(
    source: &str,
    note_tags: &HashMap<String, String>,
    colors: &BTreeMap<String, String>,
) -> Result<(String, usize)> {
    let markup = Markup::new(source);
    let patches: Vec<StylePatch> = {
        let doc = markup.parse()?;
        let notes: Vec<&str> = doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "note")
            .filter_map(|n| note_id(&n))
            .collect();
        if notes.is_empty() {
            return Err(PatternError::format("score source contains no identified notes"));
        }
        notes
            .into_iter()
            .filter_map(|id| {
                let color = colors.get(note_tags.get(id)?)?;
                Some(StylePatch::attribute(id, "color", color.as_str()))
            })
            .collect()
    };
    let count = patches.len();
    let edit = DocumentEdit {
        patches,
        appended: Vec::new(),
    };
    Ok((markup.rewrite(&edit)?, count))
}

/// Color one score file and write it as `{output}/scores/{stem}.xml`.
pub fn color_file(config: &Config, note_tags: &HashMap<String, String>, source: &Path) -> Result<PathBuf> {
    let text = read_score_source(source)?;
    let (colored, count) = color_score(&text, note_tags, &config.palette.score_tags)?;
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PatternError::format(format!("bad file name {}", source.display())))?;
    let path = config.paths.output_dir.join("scores").join(format!("{stem}.xml"));
    crate::error::write_file(&path, colored)?;
    info!(path = %path.display(), notes = count, "colored score written");
    Ok(path)
}

/// Color the score of one song. A song without a score source is an error.
pub fn color_song(config: &Config, table: &AnnotationTable, catalog: &SongCatalog, song_id: SongId) -> Result<PathBuf> {
    let source = catalog
        .song_files(song_id, &SCORE_EXTENSIONS)
        .into_iter()
        .next()
        .ok_or_else(|| PatternError::missing(format!("no score source for song {song_id}")))?;
    let note_tags = note_tag_map(table, song_id, &config.annotators, &config.palette.score_tags);
    color_file(config, &note_tags, source)
}

/// Color every configured song that has a score source. A song whose score
/// cannot be colored is skipped with a warning.
#[tracing::instrument(skip_all)]
pub fn color_all(config: &Config, table: &AnnotationTable) -> Result<Vec<PathBuf>> {
    let catalog = SongCatalog::open(&config.paths.scores_dir)?;
    let mut written = Vec::new();
    for song_id in config.songs() {
        if catalog.song_files(song_id, &SCORE_EXTENSIONS).is_empty() {
            warn!(song_id, "no score source for song, skipping");
            continue;
        }
        match color_song(config, table, &catalog, song_id) {
            Ok(path) => written.push(path),
            Err(e) => warn!(song_id, error = %e, "score not colored"),
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCORE: &str = r#"<mei xmlns="http://www.music-encoding.org/ns/mei">
  <measure><staff><layer>
    <note xml:id="n1" pname="c"/><note xml:id="n2" pname="d"/><note xml:id="n3" pname="e"/>
  </layer></staff></measure>
</mei>"#;

    fn colors() -> BTreeMap<String, String> {
        [("Pat-1", "#E63946"), ("Pat-2", "#1D3557")]
            .into_iter()
            .map(|(t, c)| (t.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn later_rows_win_and_unknown_tags_are_ignored() {
        let csv = "song_id,user_id,pattern_tag,xml_file\n\
            0,36,Pat-1,\"<m><note xml:id=\"\"n1\"\"/><note xml:id=\"\"n2\"\"/></m>\"\n\
            0,51,Pat-2,\"<m><note xml:id=\"\"n2\"\"/></m>\"\n\
            0,51,Other,\"<m><note xml:id=\"\"n3\"\"/></m>\"\n\
            0,99,Pat-1,\"<m><note xml:id=\"\"n3\"\"/></m>\"\n";
        let table = AnnotationTable::from_reader(csv.as_bytes()).unwrap();
        let map = note_tag_map(&table, 0, &[36, 51], &colors());
        assert_eq!(map.len(), 2);
        assert_eq!(map["n1"], "Pat-1");
        assert_eq!(map["n2"], "Pat-2");
    }

    #[test]
    fn mapped_notes_get_color_attribute() {
        let map: HashMap<String, String> = [("n2".to_string(), "Pat-2".to_string())].into();
        let (out, count) = color_score(SCORE, &map, &colors()).unwrap();
        assert_eq!(count, 1);
        let doc = roxmltree::Document::parse(&out).unwrap();
        let colored: Vec<&str> = doc
            .descendants()
            .filter_map(|n| n.attribute("color"))
            .collect();
        assert_eq!(colored, vec!["#1D3557"]);
        assert!(out.contains(r#"xml:id="n2""#));
    }

    #[test]
    fn score_without_notes_is_rejected() {
        let err = color_score("<mei/>", &HashMap::new(), &colors()).unwrap_err();
        assert!(matches!(err, PatternError::Format(_)));
    }
}
