use crate::error::ContextError;
use crate::fonts::BuiltinFont;
use crate::pdf::{PdfDocument, BLACK};
use crate::record::{format_money, InvoiceRecord};
use crate::table::{Cell, Paragraph, Table};

/// Left margin of the invoice fields.
pub const LEFT_MARGIN: f32 = 50.0;
/// Baseline of the first invoice field.
pub const FIRST_LINE_Y: f32 = 700.0;
pub const LINE_HEIGHT: f32 = 16.0;
/// Bottom-left corner of the table, the same for every invoice.
pub const TABLE_ORIGIN: [f32; 2] = [50.0, 280.0];
pub const COLUMN_WIDTHS: [f32; 3] = [210.0, 110.0, 120.0];
pub const ROW_HEIGHTS: [f32; 5] = [30.0, 90.0, 15.0, 45.0, 25.0];

/// The size of a page in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// A4 portrait, 210 × 297 mm.
    pub const A4: PageSize = PageSize {
        width: 595.2756,
        height: 841.8898,
    };
}

/// One line of text at a fixed position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub font: BuiltinFont,
    pub font_size: f32,
    /// Start of the baseline, in points from the bottom-left corner of the page.
    pub position: [f32; 2],
}

/// Everything that is drawn for one invoice, before it is turned into PDF content.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub page_size: PageSize,
    pub lines: Vec<TextLine>,
    pub table: Table,
    pub table_origin: [f32; 2],
}

/// A fresh single-page PDF document holding the painted overlay of one invoice.
#[derive(Debug)]
pub struct OverlayArtifact {
    pub document: lopdf::Document,
}

/// Moves down the page one line at a time. Positions are never reused, whether
/// or not something gets drawn at them.
struct Cursor {
    y: f32,
}

impl Cursor {
    fn advance(&mut self, lines: u8) -> f32 {
        self.y -= f32::from(lines) * LINE_HEIGHT;
        self.y
    }
}

/// Lays out the fields of one invoice on a page of the given size.
pub fn layout(record: &InvoiceRecord, page_size: PageSize) -> Result<Overlay, ContextError> {
    let mut lines = Vec::new();
    let mut line = |text: String, font: BuiltinFont, font_size: f32, y: f32| {
        lines.push(TextLine {
            text,
            font,
            font_size,
            position: [LEFT_MARGIN, y],
        })
    };
    let mut cursor = Cursor { y: FIRST_LINE_Y };

    line(
        format!("Date: {}", record.display_date()),
        BuiltinFont::HelveticaBold,
        10.0,
        cursor.y,
    );
    line(
        format!("Invoice No: {}", record.display_invoice_number()),
        BuiltinFont::HelveticaBold,
        10.0,
        cursor.advance(1),
    );
    line(
        "Bill To / Ship To".into(),
        BuiltinFont::HelveticaBold,
        10.0,
        cursor.advance(2),
    );
    line(
        record.company_name.clone(),
        BuiltinFont::HelveticaBold,
        9.0,
        cursor.advance(1),
    );
    line(
        record.company_address.clone(),
        BuiltinFont::Helvetica,
        9.0,
        cursor.advance(1),
    );
    let gst_y = cursor.advance(1);
    if let Some(gst_number) = record.gst_number() {
        line(
            format!("GST No.: {}", gst_number),
            BuiltinFont::HelveticaBold,
            9.0,
            gst_y,
        );
    }
    line(
        format!("Place of Supply: {}", record.party_state),
        BuiltinFont::HelveticaBold,
        10.0,
        cursor.advance(2),
    );

    Ok(Overlay {
        page_size,
        lines,
        table: invoice_table(record)?,
        table_origin: TABLE_ORIGIN,
    })
}

fn invoice_table(record: &InvoiceRecord) -> Result<Table, ContextError> {
    let description = Paragraph::new([
        record.type_of_service.clone(),
        String::new(),
        "(From".into(),
        record.party_name.clone(),
        format!("Address: {})", record.city_name),
    ]);
    let reverse_charges = Paragraph::new(["RCM CGST", "RCM SGST", "RCM IGST"]);

    Table::new(
        COLUMN_WIDTHS.to_vec(),
        ROW_HEIGHTS.to_vec(),
        vec![
            vec![
                Cell::text("Description"),
                Cell::text("HSN/SAC"),
                Cell::text("Amount (INR)"),
            ],
            vec![
                Cell::Paragraph(description),
                Cell::text(record.sac_code.clone()),
                Cell::text(format_money(record.taxable_value)),
            ],
            vec![Cell::Empty, Cell::Empty, Cell::Empty],
            vec![
                Cell::Paragraph(reverse_charges),
                Cell::Empty,
                Cell::text(format_money(record.total_rcm_payable)),
            ],
            vec![
                Cell::text("Total"),
                Cell::Empty,
                Cell::text(format_money(record.total_amount())),
            ],
        ],
    )
}

impl Overlay {
    /// Paints the overlay into a new single-page PDF document.
    pub fn paint(&self, identifier: &str) -> Result<OverlayArtifact, ContextError> {
        let mut pdf_document = PdfDocument::new(identifier.to_string());
        let (page_index, layer_index) =
            pdf_document.add_page_with_layer(self.page_size.width, self.page_size.height);

        for line in self.lines.iter() {
            let font_index = pdf_document.add_builtin_font(line.font);
            pdf_document.write_text_to_layer_in_page(
                page_index,
                layer_index,
                BLACK,
                &line.text,
                font_index,
                line.font_size,
                line.position,
            )?;
        }
        self.table
            .draw(&mut pdf_document, page_index, layer_index, self.table_origin)?;

        Ok(OverlayArtifact {
            document: pdf_document.into_document("overlay")?,
        })
    }
}

/// Lays out and paints the overlay of one invoice.
pub fn render(record: &InvoiceRecord, page_size: PageSize) -> Result<OverlayArtifact, ContextError> {
    record.validate()?;
    log::debug!("Rendering the overlay of invoice {:?}", record.display_invoice_number());
    layout(record, page_size)?.paint(&record.output_identifier())
}
