use crate::error::ContextError;
use crate::fonts::{wrap_words, BuiltinFont};
use crate::pdf::{Color, PdfDocument, BLACK, GREY, LIGHT_GREY};

/// Leading of the paragraph style used inside table cells.
const PARAGRAPH_LEADING: f32 = 12.0;
/// Font size of the paragraph style used inside table cells.
const PARAGRAPH_FONT_SIZE: f32 = 10.0;

/// A block of text made of hard lines, each of which is word-wrapped to the cell width.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub lines: Vec<String>,
}

impl Paragraph {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Paragraph {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// The lines as they are drawn within the given width, blank hard lines included.
    pub fn wrapped_lines(&self, maximum_width: f32) -> Vec<String> {
        self.lines
            .iter()
            .flat_map(|line| {
                wrap_words(line, BuiltinFont::Helvetica, PARAGRAPH_FONT_SIZE, maximum_width)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    /// A single line drawn with the font of its row.
    Text(String),
    Paragraph(Paragraph),
}

impl Cell {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Cell::Text(text.into())
    }

    /// The plain text of the cell, hard lines joined with newlines.
    pub fn plain_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.clone(),
            Cell::Paragraph(paragraph) => paragraph.lines.join("\n"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableStyle {
    pub box_width: f32,
    pub box_color: Color,
    pub grid_width: f32,
    pub grid_color: Color,
    pub header_background: Color,
    pub header_font: BuiltinFont,
    pub header_font_size: f32,
    pub body_font: BuiltinFont,
    pub body_font_size: f32,
    pub horizontal_padding: f32,
    pub vertical_padding: f32,
}

impl Default for TableStyle {
    fn default() -> Self {
        TableStyle {
            box_width: 1.0,
            box_color: BLACK,
            grid_width: 0.5,
            grid_color: GREY,
            header_background: LIGHT_GREY,
            header_font: BuiltinFont::HelveticaBold,
            header_font_size: 11.0,
            body_font: BuiltinFont::Helvetica,
            body_font_size: 10.0,
            horizontal_padding: 6.0,
            vertical_padding: 3.0,
        }
    }
}

/// A table whose column widths and row heights are fixed up front. The first row
/// is the header. Content never changes the geometry, text that does not fit
/// simply overflows its cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    column_widths: Vec<f32>,
    row_heights: Vec<f32>,
    rows: Vec<Vec<Cell>>,
    pub style: TableStyle,
}

impl Table {
    pub fn new(
        column_widths: Vec<f32>,
        row_heights: Vec<f32>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, ContextError> {
        if rows.len() != row_heights.len() {
            return Err(ContextError::with_context(format!(
                "The table has {} rows but {} row heights",
                rows.len(),
                row_heights.len()
            )));
        }
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != column_widths.len())
        {
            return Err(ContextError::with_context(format!(
                "Row {} of the table has {} cells instead of {}",
                index,
                row.len(),
                column_widths.len()
            )));
        }

        Ok(Table {
            column_widths,
            row_heights,
            rows,
            style: TableStyle::default(),
        })
    }

    pub fn column_widths(&self) -> &[f32] {
        &self.column_widths
    }

    pub fn row_heights(&self) -> &[f32] {
        &self.row_heights
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_widths.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    pub fn width(&self) -> f32 {
        self.column_widths.iter().sum()
    }

    pub fn height(&self) -> f32 {
        self.row_heights.iter().sum()
    }

    /// Paints the table with its bottom-left corner at `origin`: header background,
    /// grid, outer box, then the cell contents.
    pub fn draw(
        &self,
        pdf_document: &mut PdfDocument,
        page_index: usize,
        layer_index: usize,
        origin: [f32; 2],
    ) -> Result<(), ContextError> {
        let [left, bottom] = origin;
        let (width, height) = (self.width(), self.height());
        let top = bottom + height;
        let column_edges = edges(left, &self.column_widths, 1.0);
        let row_edges = edges(top, &self.row_heights, -1.0);

        if let (Some(header_height), Some(_)) = (self.row_heights.first(), self.rows.first()) {
            pdf_document.fill_rectangle(
                page_index,
                layer_index,
                [left, top - header_height, width, *header_height],
                self.style.header_background,
            )?;
        }

        for x in column_edges.iter() {
            pdf_document.stroke_line(
                page_index,
                layer_index,
                [*x, bottom],
                [*x, top],
                self.style.grid_width,
                self.style.grid_color,
            )?;
        }
        for y in row_edges.iter() {
            pdf_document.stroke_line(
                page_index,
                layer_index,
                [left, *y],
                [left + width, *y],
                self.style.grid_width,
                self.style.grid_color,
            )?;
        }
        pdf_document.stroke_rectangle(
            page_index,
            layer_index,
            [left, bottom, width, height],
            self.style.box_width,
            self.style.box_color,
        )?;

        let regular_font = pdf_document.add_builtin_font(BuiltinFont::Helvetica);
        for (row_index, row) in self.rows.iter().enumerate() {
            let (font, font_size) = if row_index == 0 {
                (self.style.header_font, self.style.header_font_size)
            } else {
                (self.style.body_font, self.style.body_font_size)
            };
            let font_index = pdf_document.add_builtin_font(font);
            let cell_top = row_edges[row_index];

            for (column_index, cell) in row.iter().enumerate() {
                let text_left = column_edges[column_index] + self.style.horizontal_padding;
                let text_width =
                    self.column_widths[column_index] - 2.0 * self.style.horizontal_padding;

                match cell {
                    Cell::Empty => {}
                    Cell::Text(text) => pdf_document.write_text_to_layer_in_page(
                        page_index,
                        layer_index,
                        BLACK,
                        text,
                        font_index,
                        font_size,
                        [text_left, cell_top - self.style.vertical_padding - font_size],
                    )?,
                    Cell::Paragraph(paragraph) => {
                        let first_baseline =
                            cell_top - self.style.vertical_padding - PARAGRAPH_FONT_SIZE;
                        for (line_index, line) in
                            paragraph.wrapped_lines(text_width).iter().enumerate()
                        {
                            if line.is_empty() {
                                continue;
                            }
                            pdf_document.write_text_to_layer_in_page(
                                page_index,
                                layer_index,
                                BLACK,
                                line,
                                regular_font,
                                PARAGRAPH_FONT_SIZE,
                                [
                                    text_left,
                                    first_baseline - line_index as f32 * PARAGRAPH_LEADING,
                                ],
                            )?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// The positions of every boundary of consecutive spans starting at `start`,
/// walking in the given direction.
fn edges(start: f32, spans: &[f32], direction: f32) -> Vec<f32> {
    let mut edges = Vec::with_capacity(spans.len() + 1);
    let mut position = start;
    edges.push(position);
    for span in spans {
        position += direction * span;
        edges.push(position);
    }
    edges
}
