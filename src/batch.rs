use std::collections::HashSet;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::compositor::composite;
use crate::error::ContextError;
use crate::overlay::{render, PageSize};
use crate::record::InvoiceRecord;

/// One invoice written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedInvoice {
    /// The identifier the file is named after, suffixed when it was already taken.
    pub identifier: String,
    pub path: PathBuf,
}

/// Loads the template document the overlays are composed onto.
pub fn load_template(template_path: &Path) -> Result<lopdf::Document, ContextError> {
    lopdf::Document::load(template_path).map_err(|error| {
        ContextError::with_error(
            format!("Failed to load the template {:?}", template_path),
            &error,
        )
    })
}

/// Renders every record onto the template and writes one PDF per record into the
/// output directory, which is created if needed. Records are processed in order
/// and the first failure aborts the whole batch.
///
/// Files are named `Invoice_<identifier>.pdf`. When several records share an
/// identifier the later ones are suffixed with `_2`, `_3` and so on, so that
/// there are always as many files as records.
pub fn generate_invoices(
    records: &[InvoiceRecord],
    template: &lopdf::Document,
    output_directory: &Path,
    mut on_generated: impl FnMut(&GeneratedInvoice),
) -> Result<Vec<GeneratedInvoice>, ContextError> {
    std::fs::create_dir_all(output_directory).map_err(|error| {
        ContextError::with_error(
            format!("Failed to create the output directory {:?}", output_directory),
            &error,
        )
    })?;

    let mut used_identifiers = HashSet::<String>::new();
    let mut generated_invoices = Vec::with_capacity(records.len());
    for record in records {
        let base_identifier = record.output_identifier();
        let mut identifier = base_identifier.clone();
        let mut suffix = 1;
        while used_identifiers.contains(&identifier) {
            suffix += 1;
            identifier = format!("{}_{}", base_identifier, suffix);
        }
        used_identifiers.insert(identifier.clone());

        let path = output_directory.join(format!("Invoice_{}.pdf", identifier));
        generate_invoice(record, template, &path).map_err(|error| {
            error.within(format!(
                "Failed to generate the invoice {:?}",
                record.display_invoice_number()
            ))
        })?;
        log::info!("Generated the invoice {:?}", path);

        let generated_invoice = GeneratedInvoice { identifier, path };
        on_generated(&generated_invoice);
        generated_invoices.push(generated_invoice);
    }

    Ok(generated_invoices)
}

/// Renders one record, composes it onto the template and saves the result.
fn generate_invoice(
    record: &InvoiceRecord,
    template: &lopdf::Document,
    path: &Path,
) -> Result<(), ContextError> {
    let overlay = render(record, PageSize::A4)?;
    let mut invoice = composite(template, &overlay.document)?;

    let file = std::fs::File::create(path).map_err(|error| {
        ContextError::with_error(format!("Failed to create the file {:?}", path), &error)
    })?;
    invoice
        .save_to(&mut BufWriter::new(file))
        .map_err(|error| ContextError::with_error(format!("Failed to save {:?}", path), &error))?;

    Ok(())
}
