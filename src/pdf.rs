use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use std::{collections::BTreeMap, io::BufWriter, mem};
use time::OffsetDateTime;

use crate::error::ContextError;
use crate::fonts::{encode_win_ansi, BuiltinFont};

/// An RGB color with components between 0 and 1.
pub type Color = [f32; 3];

pub const BLACK: Color = [0.0, 0.0, 0.0];
/// The 50% grey used for the inner grid of tables.
pub const GREY: Color = [0.502, 0.502, 0.502];
/// The light grey used for table header backgrounds.
pub const LIGHT_GREY: Color = [0.827, 0.827, 0.827];

/// One layer of PDF data, that is an ordered list of content stream operations.
#[derive(Debug, Clone)]
pub struct PdfLayer {
    /// Name of the layer, only used for diagnostics.
    pub(crate) name: String,
    /// Stream objects in this layer.
    pub(super) operations: Vec<Operation>,
}

impl PdfLayer {
    /// Encodes the operations of the layer into an uncompressed content stream.
    fn encode(&self) -> Result<Vec<u8>, ContextError> {
        lopdf::content::Content {
            operations: self.operations.clone(),
        }
        .encode()
        .map_err(|error| {
            ContextError::with_error(
                format!("Failed to encode the content of the layer {:?}", self.name),
                &error,
            )
        })
    }
}

/// The representation of a PDF page, with its size in points and its layers.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    /// Page layers, painted in order.
    pub layers: Vec<PdfLayer>,
}

/// A high-level writer for PDF documents on top of `lopdf`. Pages and fonts are
/// referenced by indices returned when adding them, and everything is only
/// assembled into the underlying document when `write_all` is called.
///
/// Nothing written by this struct depends on the clock or on randomness, so the
/// same sequence of calls always produces the same bytes.
pub struct PdfDocument {
    /// The association between the font resource names, the object they are stored in and the font face.
    fonts: BTreeMap<String, (lopdf::ObjectId, BuiltinFont)>,
    /// The underlying PDF document: this is a low-level interface and shouldn't be directly interacted with
    /// unless strictly necessary.
    pub inner_document: lopdf::Document,
    /// The identifier of the document, it is used to in order to set the PDF `ID` tag.
    pub identifier: String,
    /// The pages of the PDF document.
    pub(crate) pages: Vec<PdfPage>,
}

impl PdfDocument {
    /// Create a new `PdfDocument` by defaulting the underlying PDF document to version 1.5
    /// of the PDF specification and customly specifying the PDF identifier.
    pub fn new(pdf_document_identifier: String) -> Self {
        PdfDocument {
            fonts: BTreeMap::default(),
            inner_document: lopdf::Document::with_version("1.5"),
            identifier: pdf_document_identifier,
            pages: Vec::new(),
        }
    }

    /// Adds a page of given width and height in points with an empty layer for contents to be added to.
    /// Returns the index of the page and of the layer in the page, to be passed to the drawing functions.
    pub fn add_page_with_layer(&mut self, page_width: f32, page_height: f32) -> (usize, usize) {
        self.pages.push(PdfPage {
            width: page_width,
            height: page_height,
            layers: vec![PdfLayer {
                name: "Layer0".into(),
                operations: Vec::new(),
            }],
        });

        (self.pages.len() - 1, 0)
    }

    /// Registers one of the standard fonts in the document and returns its index,
    /// adding the same face twice returns the index it was first given.
    pub fn add_builtin_font(&mut self, builtin_font: BuiltinFont) -> usize {
        if let Some(font_index) = self
            .fonts
            .values()
            .position(|(_, registered_font)| *registered_font == builtin_font)
        {
            return font_index;
        }

        let font_index = self.fonts.len();
        let font_object_id = self.inner_document.new_object_id();
        self.fonts
            .insert(font_resource_name(font_index), (font_object_id, builtin_font));

        font_index
    }

    /// Writes a single line of text with its baseline starting at the given position
    /// in points. The text is encoded in `WinAnsiEncoding`, characters it cannot
    /// represent are replaced and logged.
    #[allow(clippy::too_many_arguments)]
    pub fn write_text_to_layer_in_page(
        &mut self,
        page_index: usize,
        layer_index: usize,
        color: Color,
        text: &str,
        font_index: usize,
        font_size: f32,
        caret_position: [f32; 2],
    ) -> Result<(), ContextError> {
        // Make sure the font exists before emitting any operation
        self.get_font(font_index)?;
        let [x, y] = caret_position;
        let [r, g, b] = color;

        self.add_operations_to_layer_in_page(
            layer_index,
            page_index,
            vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(font_resource_name(font_index).into_bytes()),
                        font_size.into(),
                    ],
                ),
                Operation::new("Td", vec![x.into(), y.into()]),
                Operation::new("rg", vec![r.into(), g.into(), b.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        encode_win_ansi(text),
                        StringFormat::Hexadecimal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        )
    }

    /// Fills the rectangle `[x, y, width, height]` with the given color.
    pub fn fill_rectangle(
        &mut self,
        page_index: usize,
        layer_index: usize,
        rectangle: [f32; 4],
        color: Color,
    ) -> Result<(), ContextError> {
        let [x, y, width, height] = rectangle;
        let [r, g, b] = color;
        self.add_operations_to_layer_in_page(
            layer_index,
            page_index,
            vec![
                Operation::new("q", vec![]),
                Operation::new("rg", vec![r.into(), g.into(), b.into()]),
                Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
            ],
        )
    }

    /// Strokes the outline of the rectangle `[x, y, width, height]`.
    pub fn stroke_rectangle(
        &mut self,
        page_index: usize,
        layer_index: usize,
        rectangle: [f32; 4],
        line_width: f32,
        color: Color,
    ) -> Result<(), ContextError> {
        let [x, y, width, height] = rectangle;
        let mut operations = stroke_state(line_width, color);
        operations.push(Operation::new(
            "re",
            vec![x.into(), y.into(), width.into(), height.into()],
        ));
        operations.push(Operation::new("S", vec![]));
        operations.push(Operation::new("Q", vec![]));

        self.add_operations_to_layer_in_page(layer_index, page_index, operations)
    }

    /// Strokes a straight line between two points.
    pub fn stroke_line(
        &mut self,
        page_index: usize,
        layer_index: usize,
        from: [f32; 2],
        to: [f32; 2],
        line_width: f32,
        color: Color,
    ) -> Result<(), ContextError> {
        let mut operations = stroke_state(line_width, color);
        operations.push(Operation::new("m", vec![from[0].into(), from[1].into()]));
        operations.push(Operation::new("l", vec![to[0].into(), to[1].into()]));
        operations.push(Operation::new("S", vec![]));
        operations.push(Operation::new("Q", vec![]));

        self.add_operations_to_layer_in_page(layer_index, page_index, operations)
    }

    /// Assembles the pages, fonts, catalog and trailer into the underlying document.
    ///
    /// The instance ID is the second half of the PDF `ID` tag, the dates of the
    /// information dictionary are fixed to the Unix epoch.
    pub fn write_all(&mut self, instance_id: &str) -> Result<(), ContextError> {
        use lopdf::Object::*;
        use lopdf::StringFormat::*;

        let epoch = to_pdf_timestamp_format(&OffsetDateTime::UNIX_EPOCH);
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", "False".into()),
            ("CreationDate", String(epoch.clone().into_bytes(), Literal)),
            ("ModDate", String(epoch.into_bytes(), Literal)),
            ("Producer", String(b"invoicr".to_vec(), Literal)),
            (
                "Identifier",
                String(self.identifier.clone().into_bytes(), Literal),
            ),
        ]);
        let document_info_id = self.inner_document.add_object(Dictionary(document_info));

        let pages_id = self.inner_document.new_object_id();
        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", "Catalog".into()),
            ("PageLayout", "OneColumn".into()),
            ("PageMode", "UseNone".into()),
            ("Pages", Reference(pages_id)),
        ]);
        let catalog_id = self.inner_document.add_object(catalog);

        self.inner_document
            .trailer
            .set("Root", Reference(catalog_id));
        self.inner_document
            .trailer
            .set("Info", Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Array(vec![
                String(self.identifier.clone().into_bytes(), Literal),
                String(instance_id.as_bytes().to_vec(), Literal),
            ]),
        );

        let fonts_dictionary = self.insert_fonts_into_document();
        let resources_id = self
            .inner_document
            .add_object(lopdf::Dictionary::from_iter(vec![(
                "Font",
                Dictionary(fonts_dictionary),
            )]));

        let mut page_ids = Vec::<lopdf::Object>::new();
        for page in self.pages.iter() {
            let media_box: lopdf::Object =
                vec![0.into(), 0.into(), page.width.into(), page.height.into()].into();

            // All the layers of a page are merged into one content stream
            let mut merged_layer_streams = Vec::<u8>::new();
            for layer in page.layers.iter() {
                merged_layer_streams.append(&mut layer.encode()?);
            }
            let merged_layer_stream =
                lopdf::Stream::new(lopdf::Dictionary::new(), merged_layer_streams)
                    .with_compression(false);
            let page_content_id = self.inner_document.add_object(merged_layer_stream);

            let page_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", "Page".into()),
                ("Rotate", Integer(0)),
                ("MediaBox", media_box.clone()),
                ("CropBox", media_box),
                ("Parent", Reference(pages_id)),
                ("Resources", Reference(resources_id)),
                ("Contents", Reference(page_content_id)),
            ]);
            let page_id = self.inner_document.add_object(page_dictionary);
            page_ids.push(Reference(page_id))
        }

        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", "Pages".into()),
            ("Count", Integer(self.pages.len() as i64)),
            ("Kids", Array(page_ids)),
        ]);
        self.inner_document
            .objects
            .insert(pages_id, Dictionary(pages));

        Ok(())
    }

    /// Writes everything and hands over the underlying `lopdf` document.
    pub fn into_document(mut self, instance_id: &str) -> Result<lopdf::Document, ContextError> {
        self.write_all(instance_id)?;
        Ok(self.inner_document)
    }

    /// Save the `PdfDocument` to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        save_document_to_bytes(&mut self.inner_document)
    }

    /// Converts the fonts into a resource dictionary and inserts them into the document.
    fn insert_fonts_into_document(&mut self) -> lopdf::Dictionary {
        let mut font_dictionary = lopdf::Dictionary::new();

        for (font_id, (font_object_id, builtin_font)) in self.fonts.iter() {
            let font = lopdf::Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Font".to_vec())),
                ("Subtype", Object::Name(b"Type1".to_vec())),
                (
                    "BaseFont",
                    Object::Name(builtin_font.base_font().as_bytes().to_vec()),
                ),
                ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
            ]);
            self.inner_document
                .objects
                .insert(*font_object_id, Object::Dictionary(font));
            font_dictionary.set(font_id.clone(), Object::Reference(*font_object_id));
        }

        font_dictionary
    }

    /// This function is responsible for adding the given operations to the specified layer and page.
    fn add_operations_to_layer_in_page(
        &mut self,
        layer_index: usize,
        page_index: usize,
        operations: Vec<Operation>,
    ) -> Result<(), ContextError> {
        let pdf_layer_reference = self.get_mut_layer_in_page(layer_index, page_index)?;
        pdf_layer_reference.operations.extend(operations);

        Ok(())
    }

    // Retrieve the font at the given font index.
    fn get_font(&self, font_index: usize) -> Result<&(lopdf::ObjectId, BuiltinFont), ContextError> {
        self.fonts
            .get(&font_resource_name(font_index))
            .ok_or(ContextError::with_context(format!(
                "Failed to find font {} into the fonts map",
                font_index
            )))
    }

    // Retrieve the specified layer in the given page via the respective indices.
    fn get_mut_layer_in_page(
        &mut self,
        layer_index: usize,
        page_index: usize,
    ) -> Result<&mut PdfLayer, ContextError> {
        let pdf_page = self
            .pages
            .get_mut(page_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the page with index {}",
                page_index
            )))?;
        let pdf_layer = pdf_page
            .layers
            .get_mut(layer_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the layer with index {}",
                layer_index
            )))?;

        Ok(pdf_layer)
    }
}

/// Serializes any `lopdf` document into bytes.
pub fn save_document_to_bytes(document: &mut lopdf::Document) -> Result<Vec<u8>, ContextError> {
    let mut pdf_document_bytes = Vec::new();
    let mut writer = BufWriter::new(&mut pdf_document_bytes);
    document.save_to(&mut writer).map_err(|error| {
        ContextError::with_error("Error while saving the PDF document to bytes", &error)
    })?;
    mem::drop(writer);

    Ok(pdf_document_bytes)
}

fn font_resource_name(font_index: usize) -> String {
    format!("F{font_index}")
}

/// Opens a graphics state block with the stroking color and line width set.
fn stroke_state(line_width: f32, color: Color) -> Vec<Operation> {
    let [r, g, b] = color;
    vec![
        Operation::new("q", vec![]),
        Operation::new("RG", vec![r.into(), g.into(), b.into()]),
        Operation::new("w", vec![line_width.into()]),
    ]
}

/// Formats the given time so that it matches what the PDF specification expects.
/// An example of it is the following: D:20170505150224+02'00'.
fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}
