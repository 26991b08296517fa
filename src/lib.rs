//! Invoicr generates invoices by overlaying the rows of a spreadsheet onto a PDF template.
//! Every row becomes one single-page PDF document: the first page of the template in the
//! background and the invoice fields, laid out at fixed positions together with a small
//! table of amounts, painted on top of it.
//!
//! The library is organized as a pipeline. The rows are read with `spreadsheet::read_records`,
//! each `InvoiceRecord` is laid out and painted by `overlay::render`, the result is merged onto
//! the template by `compositor::composite` and `batch::generate_invoices` drives all of this
//! over a whole spreadsheet. The same pipeline is exposed over HTTP by the `server` module,
//! which returns the generated invoices as a zip archive.

/// This module contains the `ContextError` type which is the error type used throughout this library.
///
/// An error is made of a context explaining what was being done and, if the failure came from another
/// library, the description of that source error. Errors raised deep in the pipeline can be wrapped
/// with `ContextError::within` so that, for example, the invoice being generated is reported as well.
pub mod error;

/// The JSON configuration shared by the command line and the HTTP service.
pub mod configuration;

/// The `InvoiceRecord` struct, that is one row of the spreadsheet, together with the rules for
/// displaying its fields and naming the files generated from it.
pub mod record;

/// Reading the invoice records out of the first worksheet of a spreadsheet.
///
/// The columns are looked up by their header, so their order does not matter, but every required
/// column must be present: a missing one is reported by name before anything is rendered.
pub mod spreadsheet;

/// Metrics and text encoding of the standard PDF fonts used on the invoices.
pub mod fonts;

/// The module were the `PdfDocument` interface for writing PDF documents is presented.
///
/// # Introduction
///
/// The main component of this module is the struct `PdfDocument`, a thin layer on top of `lopdf`.
/// Pages and fonts are added first and referenced by the indices returned, then text, lines and
/// rectangles are drawn onto the layers of the pages with functions such as `write_text_to_layer_in_page`
/// or `stroke_line`. Nothing is assembled until `write_all` (or `into_document`) is called.
///
/// Every value written in the document is derived from the calls made on it, dates included, so
/// that rendering the same content twice results in the same bytes. This is what makes the
/// generated invoices testable byte for byte.
pub mod pdf;

/// A table with fixed column widths and row heights, drawn with a grid and a header row.
pub mod table;

/// The layout of one invoice: where each field goes and how the table of amounts is filled.
pub mod overlay;

/// Merging an overlay page on top of the first page of a template document.
///
/// The template page is deep-copied into a new document, so that neither input is modified, and
/// the overlay page is attached to it as a form XObject painted after the template content.
pub mod compositor;

/// Generating one PDF file per record.
pub mod batch;

/// Packaging the generated invoices into a zip archive.
pub mod archive;

/// The HTTP service: an upload form and the endpoint turning a spreadsheet and a template into
/// a zip archive of invoices.
pub mod server;
