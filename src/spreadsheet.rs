use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader as _};

use crate::error::ContextError;
use crate::record::InvoiceRecord;

/// The columns of the invoice spreadsheet, identified by their exact header text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    InvoiceDate,
    InvoiceNumber,
    CompanyName,
    CompanyAddress,
    CompanyGstNumber,
    PartyState,
    TypeOfService,
    PartyName,
    CityName,
    SacCode,
    TaxableValue,
    TotalRcmPayable,
}

impl Column {
    pub const ALL: [Column; 12] = [
        Column::InvoiceDate,
        Column::InvoiceNumber,
        Column::CompanyName,
        Column::CompanyAddress,
        Column::CompanyGstNumber,
        Column::PartyState,
        Column::TypeOfService,
        Column::PartyName,
        Column::CityName,
        Column::SacCode,
        Column::TaxableValue,
        Column::TotalRcmPayable,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::InvoiceDate => "Inv date",
            Column::InvoiceNumber => "Inv no",
            Column::CompanyName => "Company Name",
            Column::CompanyAddress => "Company Address",
            Column::CompanyGstNumber => "Company GST Number",
            Column::PartyState => "Party state",
            Column::TypeOfService => "Type of Service",
            Column::PartyName => "Party Name",
            Column::CityName => "City name",
            Column::SacCode => "SAC CODE",
            Column::TaxableValue => "Taxable value",
            Column::TotalRcmPayable => "Total RCM payable",
        }
    }

    pub fn is_required(self) -> bool {
        self != Column::CompanyGstNumber
    }
}

/// Where each known column sits in the header row.
#[derive(Debug)]
struct ColumnPositions(HashMap<Column, usize>);

impl ColumnPositions {
    /// Matches the header row against the schema, failing on the first required
    /// column that is not present.
    fn from_header(header: &[Data]) -> Result<Self, ContextError> {
        let mut positions = HashMap::new();
        for column in Column::ALL {
            let position = header
                .iter()
                .position(|cell| matches!(cell, Data::String(text) if text == column.header()));
            match position {
                Some(position) => {
                    positions.insert(column, position);
                }
                None if column.is_required() => {
                    return Err(ContextError::with_context(format!(
                        "Missing column {:?} in the spreadsheet",
                        column.header()
                    )));
                }
                None => log::debug!("Optional column {:?} is absent", column.header()),
            }
        }

        Ok(ColumnPositions(positions))
    }

    fn cell<'a>(&self, row: &'a [Data], column: Column) -> &'a Data {
        self.0
            .get(&column)
            .and_then(|position| row.get(*position))
            .unwrap_or(&Data::Empty)
    }
}

/// Reads every invoice of the first worksheet of the spreadsheet at the given path.
pub fn read_records(spreadsheet_path: &Path) -> Result<Vec<InvoiceRecord>, ContextError> {
    let mut workbook = open_workbook_auto(spreadsheet_path).map_err(|error| {
        ContextError::with_error(
            format!("Failed to open the spreadsheet {:?}", spreadsheet_path),
            &error,
        )
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ContextError::with_context(format!(
            "The spreadsheet {:?} has no worksheets",
            spreadsheet_path
        )))?
        .map_err(|error| {
            ContextError::with_error(
                format!("Failed to read the first worksheet of {:?}", spreadsheet_path),
                &error,
            )
        })?;

    let records = records_from_range(&range)?;
    log::info!(
        "Loaded {} invoices from {:?}",
        records.len(),
        spreadsheet_path
    );

    Ok(records)
}

/// Converts a worksheet into records. The first row is the header, rows without
/// any value (blank text included) are skipped.
pub fn records_from_range(range: &Range<Data>) -> Result<Vec<InvoiceRecord>, ContextError> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or(ContextError::with_context("The spreadsheet is empty"))?;
    let positions = ColumnPositions::from_header(header)?;
    // Spreadsheet row numbers are 1-based and the header occupies the first one
    let first_row_number = range.start().map_or(0, |(row, _)| row as usize) + 2;

    let mut records = Vec::new();
    for (index, row) in rows.enumerate() {
        if row.iter().all(|cell| cell_text(cell).is_none()) {
            continue;
        }
        let row_number = first_row_number + index;
        records.push(record_from_row(&positions, row, row_number)?);
    }

    Ok(records)
}

fn record_from_row(
    positions: &ColumnPositions,
    row: &[Data],
    row_number: usize,
) -> Result<InvoiceRecord, ContextError> {
    let text = |column: Column| cell_text(positions.cell(row, column)).unwrap_or_default();
    let amount = |column: Column| cell_amount(positions.cell(row, column), column, row_number);

    let record = InvoiceRecord {
        invoice_date: text(Column::InvoiceDate),
        invoice_number: cell_text(positions.cell(row, Column::InvoiceNumber)),
        company_name: text(Column::CompanyName),
        company_address: text(Column::CompanyAddress),
        company_gst_number: cell_text(positions.cell(row, Column::CompanyGstNumber)),
        party_state: text(Column::PartyState),
        type_of_service: text(Column::TypeOfService),
        party_name: text(Column::PartyName),
        city_name: text(Column::CityName),
        sac_code: text(Column::SacCode),
        taxable_value: amount(Column::TaxableValue)?,
        total_rcm_payable: amount(Column::TotalRcmPayable)?,
    };
    log::trace!("Row {}: {:?}", row_number, record);

    Ok(record)
}

/// The textual form of a cell, `None` for empty cells.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            Some(text.trim().to_string()).filter(|text| !text.is_empty())
        }
        Data::Int(value) => Some(value.to_string()),
        Data::Float(value) => Some(number_text(*value)),
        Data::Bool(value) => Some(value.to_string()),
        Data::DateTime(date_time) => Some(match date_time.as_datetime() {
            Some(date_time) => date_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => number_text(date_time.as_f64()),
        }),
        Data::Error(error) => Some(error.to_string()),
    }
}

/// Integral numbers, such as codes typed as numbers, are written without decimals.
fn number_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn cell_amount(cell: &Data, column: Column, row_number: usize) -> Result<f64, ContextError> {
    let amount = match cell {
        Data::Float(value) => Some(*value),
        Data::Int(value) => Some(*value as f64),
        Data::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match amount {
        Some(amount) if amount.is_finite() => Ok(amount),
        _ => Err(ContextError::with_context(format!(
            "Invalid amount in column {:?} at row {}: {:?}",
            column.header(),
            row_number,
            cell
        ))),
    }
}
