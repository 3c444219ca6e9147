use std::io::Write;

use anyhow::Context;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AccountRow {
    pub account: String,
    pub holder: String,
    pub balance: Decimal,
    /// `TYPE:value` pairs joined with `;`
    pub keys: String,
    pub transactions: usize,
}

pub fn print_accounts<W>(
    output: &mut W,
    accounts: impl Iterator<Item = AccountRow>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for row in accounts {
        writer
            .serialize(&row)
            .with_context(|| format!("Failed to write account `{}` to CSV", row.account))?;
    }
    writer.flush().context("Failed to flush CSV writer")
}
