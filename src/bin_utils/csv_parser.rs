use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Register,
    Transfer,
    PixTransfer,
    AddKey,
    EditKey,
    RemoveKey,
}

/// One script line. `account` and `target` are labels local to the script.
///
/// Column use per operation:
/// - `register`: `key` national id, `text` holder name, `password`,
///   optional `amount` opening balance
/// - `transfer`: `target`, `amount`, `text` description
/// - `pix_transfer`: `key_type`, `key`, `amount`, `text` description
/// - `add_key`, `remove_key`: `key_type`, `key`
/// - `edit_key`: `key_type`, `key` current value, `text` new value
#[derive(Debug, Deserialize)]
pub struct Operation {
    pub op: OperationKind,
    pub account: String,
    pub target: Option<String>,
    pub amount: Option<Decimal>,
    pub key_type: Option<String>,
    pub key: Option<String>,
    pub text: Option<String>,
    pub password: Option<String>,
}

/// Parses an operation script in CSV format, yielding each row with its line number.
pub struct CsvOperationParser<R> {
    iter: DeserializeRecordsIntoIter<R, Operation>,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, Result<Operation, csv::Error>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rows() {
        let script = "\
op,account,target,amount,key_type,key,text,password
register, ana ,,1000,,123.456.789-01,Ana Silva,secret1
transfer,ana,bruno,300,,,rent
withdraw,ana,,10,,,,
";
        let rows: Vec<_> = CsvOperationParser::new(script.as_bytes()).collect();
        assert_eq!(rows.len(), 3);

        let (_, register) = &rows[0];
        let register = register.as_ref().unwrap();
        assert_eq!(register.op, OperationKind::Register);
        assert_eq!(register.account, "ana");
        assert_eq!(register.target, None);
        assert_eq!(register.amount, Some(Decimal::from(1000)));
        assert_eq!(register.text.as_deref(), Some("Ana Silva"));
        assert_eq!(register.password.as_deref(), Some("secret1"));

        let (_, transfer) = &rows[1];
        let transfer = transfer.as_ref().unwrap();
        assert_eq!(transfer.op, OperationKind::Transfer);
        assert_eq!(transfer.target.as_deref(), Some("bruno"));
        assert_eq!(transfer.password, None);

        let (_, unknown) = &rows[2];
        assert!(unknown.is_err());
    }
}
