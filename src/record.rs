use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// Identifier used for the output file of a row without an invoice number.
pub const UNKNOWN_INVOICE_IDENTIFIER: &str = "unknown";

/// Textual form a spreadsheet uses for a blank optional value.
const MISSING_VALUE_SENTINEL: &str = "nan";

/// One row of the spreadsheet, already converted from cells into typed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    /// Textual form of the invoice date, of which only the first 10 characters are shown.
    pub invoice_date: String,
    pub invoice_number: Option<String>,
    pub company_name: String,
    pub company_address: String,
    pub company_gst_number: Option<String>,
    /// The place of supply.
    pub party_state: String,
    pub type_of_service: String,
    pub party_name: String,
    pub city_name: String,
    pub sac_code: String,
    pub taxable_value: f64,
    pub total_rcm_payable: f64,
}

impl InvoiceRecord {
    /// The date as displayed on the invoice: the `YYYY-MM-DD` prefix of its textual form.
    pub fn display_date(&self) -> String {
        self.invoice_date.chars().take(10).collect()
    }

    /// The invoice number as displayed on the invoice.
    pub fn display_invoice_number(&self) -> &str {
        self.invoice_number.as_deref().unwrap_or_default()
    }

    /// The tax registration number, unless it is blank or the `nan` sentinel.
    pub fn gst_number(&self) -> Option<&str> {
        self.company_gst_number
            .as_deref()
            .map(str::trim)
            .filter(|gst_number| {
                !gst_number.is_empty() && !gst_number.eq_ignore_ascii_case(MISSING_VALUE_SENTINEL)
            })
    }

    pub fn total_amount(&self) -> f64 {
        self.taxable_value + self.total_rcm_payable
    }

    /// Derives the name used for the output file: the invoice number with path
    /// separators replaced by dashes, or `unknown` when there is none.
    pub fn output_identifier(&self) -> String {
        match self.invoice_number.as_deref() {
            Some(invoice_number) if !invoice_number.is_empty() => {
                invoice_number.replace(['/', '\\'], "-")
            }
            _ => UNKNOWN_INVOICE_IDENTIFIER.to_string(),
        }
    }

    /// Checks that both monetary fields are finite numbers.
    pub fn validate(&self) -> Result<(), ContextError> {
        for (name, amount) in [
            ("taxable value", self.taxable_value),
            ("total RCM payable", self.total_rcm_payable),
        ] {
            if !amount.is_finite() {
                return Err(ContextError::with_context(format!(
                    "The {} of invoice {:?} is not a finite number ({})",
                    name,
                    self.display_invoice_number(),
                    amount
                )));
            }
        }

        Ok(())
    }
}

/// Formats an amount with two decimals and comma-grouped thousands, e.g. `1,300.25`.
pub fn format_money(amount: f64) -> String {
    let fixed = format!("{:.2}", amount);
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(unsigned) => ("-", unsigned),
        None => ("", fixed.as_str()),
    };
    let (integral, fractional) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(integral.len() + integral.len() / 3);
    for (index, digit) in integral.chars().enumerate() {
        if index > 0 && (integral.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}{grouped}.{fractional}")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_record() -> InvoiceRecord {
        InvoiceRecord {
            invoice_date: "2024-03-15T00:00:00".into(),
            invoice_number: Some("INV/2024/007".into()),
            company_name: "Hexa Logistics Pvt Ltd".into(),
            company_address: "12 Harbour Road, Chennai".into(),
            company_gst_number: Some("33AAACH1234F1Z5".into()),
            party_state: "Tamil Nadu".into(),
            type_of_service: "Goods Transport Agency".into(),
            party_name: "Sri Balaji Transports".into(),
            city_name: "Coimbatore".into(),
            sac_code: "996511".into(),
            taxable_value: 1234.5,
            total_rcm_payable: 65.75,
        }
    }

    #[test]
    fn formats_money_with_grouping() {
        assert_eq!(format_money(1300.25), "1,300.25");
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(999.999), "1,000.00");
        assert_eq!(format_money(123.0), "123.00");
        assert_eq!(format_money(1234567.891), "1,234,567.89");
        assert_eq!(format_money(-98765.4), "-98,765.40");
    }

    #[test]
    fn total_is_the_sum_of_both_amounts() {
        let record = sample_record();
        assert_eq!(format_money(record.total_amount()), "1,300.25");
    }

    #[test]
    fn displays_only_the_date_prefix() {
        let record = sample_record();
        assert_eq!(record.display_date(), "2024-03-15");

        let short = InvoiceRecord {
            invoice_date: "15/03".into(),
            ..sample_record()
        };
        assert_eq!(short.display_date(), "15/03");
    }

    #[test]
    fn sanitizes_the_output_identifier() {
        assert_eq!(sample_record().output_identifier(), "INV-2024-007");

        let backslashed = InvoiceRecord {
            invoice_number: Some(r"RCM\24/25\001".into()),
            ..sample_record()
        };
        assert_eq!(backslashed.output_identifier(), "RCM-24-25-001");

        let missing = InvoiceRecord {
            invoice_number: None,
            ..sample_record()
        };
        assert_eq!(missing.output_identifier(), "unknown");
    }

    #[test]
    fn suppresses_missing_gst_numbers() {
        assert_eq!(sample_record().gst_number(), Some("33AAACH1234F1Z5"));

        for sentinel in [None, Some(""), Some("nan"), Some("NaN"), Some("NAN")] {
            let record = InvoiceRecord {
                company_gst_number: sentinel.map(String::from),
                ..sample_record()
            };
            assert_eq!(record.gst_number(), None, "{:?}", sentinel);
        }
    }

    #[test]
    fn rejects_non_finite_amounts() {
        assert!(sample_record().validate().is_ok());

        let record = InvoiceRecord {
            total_rcm_payable: f64::NAN,
            ..sample_record()
        };
        let error = record.validate().unwrap_err();
        assert!(error.context.contains("total RCM payable"));
    }
}
