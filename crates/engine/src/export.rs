//! CSV export of a group's ledger.

use crate::{EngineError, Expense, ResultEngine};

const HEADER: [&str; 6] = ["Date", "Description", "Amount", "Payer", "Category", "Status"];

/// Prefixes text cells that a spreadsheet would evaluate as a formula.
fn text_cell(value: &str) -> String {
    if value.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        format!("'{value}")
    } else {
        value.to_string()
    }
}

/// Writes `expenses` in the given order. Amounts are plain decimals in the
/// group currency so spreadsheets can sum them.
pub fn expenses_to_csv<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> ResultEngine<String> {
    let csv_err = |err: csv::Error| EngineError::Export(err.to_string());

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER).map_err(csv_err)?;
    for expense in expenses {
        writer
            .write_record([
                expense.created_at.format("%Y-%m-%d").to_string(),
                text_cell(&expense.description),
                expense.amount.to_decimal_string(),
                text_cell(&expense.payer.name),
                text_cell(&expense.category),
                expense.status.as_str().to_string(),
            ])
            .map_err(csv_err)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| EngineError::Export(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| EngineError::Export(err.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        ApprovalStatus, Currency, ExpenseSource, ExpenseStatus, Member, Money, Participant,
    };

    fn expense(description: &str, payer: &str) -> Expense {
        let payer = Member::new(1, payer);
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        Expense {
            id: 1,
            group_id: 1,
            amount: Money::new(9050, Currency::Inr),
            description: description.to_string(),
            category: "food".to_string(),
            payer: payer.clone(),
            created_by: 1,
            created_at: at,
            updated_at: at,
            status: ExpenseStatus::Approved,
            dispute_reason: None,
            source: ExpenseSource::Manual,
            explicit_split: false,
            idempotency_key: None,
            participants: vec![Participant {
                member: payer,
                share: Money::new(9050, Currency::Inr),
                approval: ApprovalStatus::Approved,
            }],
        }
    }

    #[test]
    fn writes_header_and_quotes_commas() {
        let expense = expense("Dinner, drinks", "Asha");
        let csv = expenses_to_csv([&expense]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Date,Description,Amount,Payer,Category,Status")
        );
        assert_eq!(
            lines.next(),
            Some("2026-03-14,\"Dinner, drinks\",90.50,Asha,food,APPROVED")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn formula_like_cells_are_neutralized() {
        let expense = expense("=HYPERLINK(\"http://x\")", "@asha");
        let csv = expenses_to_csv([&expense]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("\"'=HYPERLINK(\"\"http://x\"\")\""));
        assert!(row.contains(",'@asha,"));
        assert!(row.contains(",90.50,"));
    }
}
