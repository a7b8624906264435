//! Zip archives: reading compressed score sources and writing the chart
//! bundle.
//!
//! A compressed score (`.mxl`) is a zip archive holding
//!   - META-INF/container.xml  naming the root score file
//!   - the root score file itself (e.g. `score.xml`)
//!   - optionally images and other assets

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{self, PatternError, Result};
use crate::parser::parse_options;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Load a score source as text. `.mxl` files are unpacked, anything else is
/// read as-is.
pub fn read_score_source(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(PatternError::missing(format!("score source {}", path.display())));
    }
    let compressed = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mxl"));
    if !compressed {
        return error::read_to_string(path);
    }
    let data = std::fs::read(path).map_err(|e| PatternError::io(path, e))?;
    unpack_score(&data)
}

/// Root score text of an `.mxl` archive.
pub fn unpack_score(data: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let root = root_file_name(&mut archive)?;

    let mut file = archive.by_name(&root)?;
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| PatternError::format(format!("cannot read '{root}' from archive: {e}")))?;
    Ok(text)
}

/// Root file named by the container manifest, or the first score-looking
/// entry outside `META-INF/` when the manifest is absent.
fn root_file_name(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String> {
    let manifest = match archive.by_name(CONTAINER_PATH) {
        Ok(mut entry) => {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| PatternError::format(format!("cannot read {CONTAINER_PATH}: {e}")))?;
            Some(text)
        }
        Err(_) => None,
    };

    if let Some(text) = manifest {
        let doc = roxmltree::Document::parse_with_options(&text, parse_options())?;
        return doc
            .descendants()
            .filter(|n| n.tag_name().name() == "rootfile")
            .find_map(|n| n.attribute("full-path"))
            .map(str::to_string)
            .ok_or_else(|| PatternError::format(format!("{CONTAINER_PATH} names no rootfile")));
    }

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names
        .iter()
        .find(|name| {
            !name.starts_with("META-INF/")
                && [".xml", ".musicxml", ".mei"].iter().any(|ext| name.ends_with(ext))
        })
        .cloned()
        .ok_or_else(|| PatternError::format(format!("no score file in archive: {names:?}")))
}

/// Write named entries into a new deflate-compressed zip archive.
pub fn write_bundle(path: &Path, entries: &[(String, String)]) -> Result<()> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in entries {
        writer.start_file(name.as_str(), options)?;
        writer
            .write_all(contents.as_bytes())
            .map_err(|e| PatternError::io(path, e))?;
    }
    let bytes = writer.finish()?.into_inner();
    error::write_file(path, bytes)
}
