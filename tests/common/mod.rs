#![allow(dead_code)]

use invoicr::{fonts::BuiltinFont, overlay::PageSize, pdf::PdfDocument, pdf::BLACK, spreadsheet::Column};
use std::io::Write as _;
use std::path::Path;
use zip::write::FileOptions;

/// A cell of a fixture spreadsheet.
#[derive(Debug, Clone)]
pub enum SheetValue {
    Text(String),
    Number(f64),
    /// A serial date number, stored with a date number format.
    Date(f64),
    Empty,
}

impl From<&str> for SheetValue {
    fn from(text: &str) -> Self {
        SheetValue::Text(text.to_string())
    }
}

impl From<f64> for SheetValue {
    fn from(number: f64) -> Self {
        SheetValue::Number(number)
    }
}

pub fn invoice_header() -> Vec<String> {
    Column::ALL
        .iter()
        .map(|column| column.header().to_string())
        .collect()
}

/// A complete row in the order of `invoice_header`.
pub fn invoice_row(invoice_number: &str, taxable_value: f64, total_rcm_payable: f64) -> Vec<SheetValue> {
    vec![
        "2024-03-15".into(),
        invoice_number.into(),
        "Hexa Logistics Pvt Ltd".into(),
        "12 Harbour Road, Chennai".into(),
        "33AAACH1234F1Z5".into(),
        "Tamil Nadu".into(),
        "Goods Transport Agency".into(),
        "Sri Balaji Transports".into(),
        "Coimbatore".into(),
        SheetValue::Number(996511.0),
        taxable_value.into(),
        total_rcm_payable.into(),
    ]
}

pub fn sample_rows(count: usize) -> Vec<Vec<SheetValue>> {
    (1..=count)
        .map(|index| invoice_row(&format!("INV/2024/{:03}", index), 1000.0 * index as f64, 50.0))
        .collect()
}

fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index + 1;
    while remaining > 0 {
        letters.push(b'A' + ((remaining - 1) % 26) as u8);
        remaining = (remaining - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Index of the cell format using the built-in `m/d/yyyy` number format (14).
const DATE_STYLE_INDEX: usize = 1;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

fn sheet_xml(header: &[String], rows: &[Vec<SheetValue>]) -> String {
    let header_row: Vec<SheetValue> = header.iter().map(|text| text.as_str().into()).collect();
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row_index, row) in std::iter::once(&header_row).chain(rows.iter()).enumerate() {
        let row_number = row_index + 1;
        xml.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (column_index, value) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letter(column_index), row_number);
            match value {
                SheetValue::Text(text) => xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    reference,
                    escape_xml(text)
                )),
                SheetValue::Number(number) => {
                    xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, number))
                }
                SheetValue::Date(serial) => xml.push_str(&format!(
                    r#"<c r="{}" s="{}"><v>{}</v></c>"#,
                    reference, DATE_STYLE_INDEX, serial
                )),
                SheetValue::Empty => {}
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Writes a single-sheet xlsx workbook whose first row is the header.
pub fn write_xlsx(path: &Path, header: &[String], rows: &[Vec<SheetValue>]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#.to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Invoices" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#.to_string(),
        ),
        ("xl/styles.xml", STYLES_XML.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(header, rows)),
    ];
    for (name, contents) in parts {
        writer.start_file(name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

pub fn xlsx_bytes(header: &[String], rows: &[Vec<SheetValue>]) -> Vec<u8> {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("invoices.xlsx");
    write_xlsx(&path, header, rows);
    std::fs::read(path).unwrap()
}

/// A two-page letterhead, only its first page ends up in the invoices.
pub fn template_bytes() -> Vec<u8> {
    let mut pdf_document = PdfDocument::new("letterhead".into());
    let font_index = pdf_document.add_builtin_font(BuiltinFont::HelveticaBold);
    for text in ["HEXA LETTERHEAD", "TERMS AND CONDITIONS"] {
        let (page_index, layer_index) =
            pdf_document.add_page_with_layer(PageSize::A4.width, PageSize::A4.height);
        pdf_document
            .write_text_to_layer_in_page(
                page_index,
                layer_index,
                BLACK,
                text,
                font_index,
                14.0,
                [50.0, 780.0],
            )
            .unwrap();
    }
    pdf_document.write_all("letterhead").unwrap();
    pdf_document.save_to_bytes().unwrap()
}

pub fn write_template(path: &Path) {
    std::fs::write(path, template_bytes()).unwrap();
}

/// Every string shown on the first page, including the ones painted by form XObjects.
pub fn shown_text(document: &lopdf::Document) -> Vec<String> {
    let page_id = document.get_pages()[&1];
    let mut streams = vec![document.get_page_content(page_id).unwrap()];
    let (resources, _) = document.get_page_resources(page_id);
    if let Some(xobjects) = resources.and_then(|resources| resources.get(b"XObject").ok()) {
        let xobjects = match xobjects {
            lopdf::Object::Reference(id) => document.get_dictionary(*id).unwrap(),
            object => object.as_dict().unwrap(),
        };
        for (_, xobject) in xobjects.iter() {
            let stream = document
                .get_object(xobject.as_reference().unwrap())
                .unwrap()
                .as_stream()
                .unwrap();
            streams.push(stream.decompressed_content().unwrap_or(stream.content.clone()));
        }
    }

    streams
        .iter()
        .flat_map(|stream| lopdf::content::Content::decode(stream).unwrap().operations)
        .filter(|operation| operation.operator == "Tj")
        .map(|operation| String::from_utf8_lossy(operation.operands[0].as_str().unwrap()).into_owned())
        .collect()
}
