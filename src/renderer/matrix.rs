//! Heat-map rendering of annotator similarity matrices.

use super::constants::*;
use super::svg_builder::SvgBuilder;
use crate::similarity::{similarity_color, SimilarityMatrix};

/// Render a matrix as a grid of colored cells with the value in each cell and
/// annotator ids along both axes.
pub(crate) fn render_matrix(matrix: &SimilarityMatrix) -> String {
    let n = matrix.annotators.len() as f64;
    let grid = n * MATRIX_CELL;
    let width = MATRIX_MARGIN_LEFT + grid + MATRIX_MARGIN_RIGHT;
    let height = MATRIX_MARGIN_TOP + grid + MATRIX_MARGIN_BOTTOM;
    let mut svg = SvgBuilder::new(width, height);

    svg.rect(0.0, 0.0, width, height, "white", "none", 0.0);
    let title = if matrix.radius == 0 {
        format!("Song {:03}", matrix.song_id)
    } else {
        format!("Song {:03} (radius {})", matrix.song_id, matrix.radius)
    };
    svg.text(width / 2.0, MATRIX_TITLE_SIZE + 8.0, &title, MATRIX_TITLE_SIZE, "bold", MATRIX_TEXT_COLOR, "middle");

    for (i, annotator) in matrix.annotators.iter().enumerate() {
        let offset = i as f64 * MATRIX_CELL + MATRIX_CELL / 2.0;
        let label = annotator.to_string();
        // row label on the left, column label on top
        svg.text(
            MATRIX_MARGIN_LEFT - 10.0,
            MATRIX_MARGIN_TOP + offset + MATRIX_FONT_SIZE / 3.0,
            &label,
            MATRIX_FONT_SIZE,
            "normal",
            MATRIX_LABEL_COLOR,
            "end",
        );
        svg.text(
            MATRIX_MARGIN_LEFT + offset,
            MATRIX_MARGIN_TOP - 10.0,
            &label,
            MATRIX_FONT_SIZE,
            "normal",
            MATRIX_LABEL_COLOR,
            "middle",
        );
    }

    for (i, row) in matrix.values.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            let x = MATRIX_MARGIN_LEFT + j as f64 * MATRIX_CELL;
            let y = MATRIX_MARGIN_TOP + i as f64 * MATRIX_CELL;
            svg.rect(x, y, MATRIX_CELL, MATRIX_CELL, &similarity_color(value).to_hex(), "none", 0.0);
            // dark text on the bright end of the scale
            let text_color = if value > 0.5 { MATRIX_TEXT_COLOR } else { "white" };
            svg.text(
                x + MATRIX_CELL / 2.0,
                y + MATRIX_CELL / 2.0 + MATRIX_FONT_SIZE / 3.0,
                &format!("{value:.2}"),
                MATRIX_FONT_SIZE,
                "normal",
                text_color,
                "middle",
            );
        }
    }

    for k in 0..=matrix.annotators.len() {
        let pos = k as f64 * MATRIX_CELL;
        svg.line(
            MATRIX_MARGIN_LEFT,
            MATRIX_MARGIN_TOP + pos,
            MATRIX_MARGIN_LEFT + grid,
            MATRIX_MARGIN_TOP + pos,
            MATRIX_GRID_COLOR,
            1.0,
        );
        svg.line(
            MATRIX_MARGIN_LEFT + pos,
            MATRIX_MARGIN_TOP,
            MATRIX_MARGIN_LEFT + pos,
            MATRIX_MARGIN_TOP + grid,
            MATRIX_GRID_COLOR,
            1.0,
        );
    }

    svg.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_cell_per_pair() {
        let matrix = SimilarityMatrix {
            song_id: 3,
            radius: 1,
            annotators: vec![36, 46],
            values: vec![vec![1.0, 0.25], vec![0.25, 1.0]],
        };
        let svg = render_matrix(&matrix);
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let rects = doc.descendants().filter(|n| n.tag_name().name() == "rect").count();
        assert_eq!(rects, 5, "background plus four cells");
        assert!(svg.contains("Song 003 (radius 1)"));
        assert!(svg.contains(">0.25<"));
    }
}
