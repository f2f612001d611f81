use crate::error::ValidationError;
use crate::record::ResponseRecord;
use crate::sheet::CellValue;
use crate::types::Field;

/// Check that `record` can produce a receipt.
///
/// Required fields are checked in [`Field::required`] order and the first gap
/// is reported, so the same row always yields the same error. The amount must
/// then parse as a finite number.
pub fn validate(record: &ResponseRecord) -> Result<f64, ValidationError> {
    for &field in Field::required() {
        if record.value(field).is_empty() {
            return Err(ValidationError::MissingField(field));
        }
    }
    parse_amount(record.value(Field::Amount))
}

/// Finite numeric amount from a cell. Text is trimmed before parsing.
pub fn parse_amount(value: &CellValue) -> Result<f64, ValidationError> {
    let parsed = match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => s.trim().parse::<f64>().ok(),
        CellValue::Bool(_) | CellValue::Empty => None,
    };
    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(ValidationError::NonNumericAmount(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnConfig;

    fn record(name: &str, org: &str, email: &str, purpose: &str, amount: CellValue) -> ResponseRecord {
        let mut cells = vec![CellValue::Empty; 12];
        cells[0] = CellValue::text("2026-10-01");
        cells[2] = CellValue::text(name);
        cells[3] = CellValue::text(org);
        cells[4] = CellValue::text(email);
        cells[5] = CellValue::text(purpose);
        cells[8] = amount;
        ResponseRecord::new(2, cells, ColumnConfig::default())
    }

    #[test]
    fn complete_record_passes() {
        let r = record("Kim", "Acme", "kim@example.com", "General Fund", CellValue::text("50000"));
        assert_eq!(validate(&r).unwrap(), 50000.0);

        let r = record("Kim", "Acme", "kim@example.com", "General Fund", CellValue::Number(12.5));
        assert_eq!(validate(&r).unwrap(), 12.5);
    }

    #[test]
    fn first_missing_field_is_reported() {
        let r = record("", "", "kim@example.com", "General Fund", CellValue::text("1"));
        assert_eq!(
            validate(&r),
            Err(ValidationError::MissingField(Field::DonorName))
        );

        let r = record("Kim", "Acme", "kim@example.com", "   ", CellValue::text("1"));
        assert_eq!(validate(&r), Err(ValidationError::MissingField(Field::Purpose)));

        let r = record("Kim", "Acme", "kim@example.com", "Fund", CellValue::Empty);
        assert_eq!(validate(&r), Err(ValidationError::MissingField(Field::Amount)));
    }

    #[test]
    fn every_required_field_is_checked() {
        let cases = [
            (Field::DonorName, ["", "Acme", "kim@example.com", "Fund", "1"]),
            (Field::DonorOrganization, ["Kim", "", "kim@example.com", "Fund", "1"]),
            (Field::Email, ["Kim", "Acme", "", "Fund", "1"]),
            (Field::Purpose, ["Kim", "Acme", "kim@example.com", "", "1"]),
            (Field::Amount, ["Kim", "Acme", "kim@example.com", "Fund", ""]),
        ];
        for (field, [name, org, email, purpose, amount]) in cases {
            let r = record(name, org, email, purpose, CellValue::text(amount));
            assert_eq!(validate(&r), Err(ValidationError::MissingField(field)), "{field}");
        }
    }

    #[test]
    fn non_numeric_amount_rejected() {
        for bad in ["abc", "50,000", "1e999", "NaN", "inf"] {
            let r = record("Kim", "Acme", "kim@example.com", "Fund", CellValue::text(bad));
            assert!(
                matches!(validate(&r), Err(ValidationError::NonNumericAmount(_))),
                "{bad} should be rejected"
            );
        }
        let r = record("Kim", "Acme", "kim@example.com", "Fund", CellValue::Bool(true));
        assert!(matches!(validate(&r), Err(ValidationError::NonNumericAmount(_))));
    }

    #[test]
    fn amount_text_is_trimmed() {
        assert_eq!(parse_amount(&CellValue::text(" 300 ")).unwrap(), 300.0);
    }
}
