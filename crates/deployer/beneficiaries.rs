//! Decoding of the beneficiary CSV file.
//!
//! The header row names the columns, so their order is free. `funding` is accepted in place of
//! `amount`, and a missing amount column means no funding at all.

use std::{fs::File, io::Read, path::Path};

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use timelocks_common::{Address, U256};
use tracing::debug;

use crate::{error::DeployerError, types::BeneficiaryRecord};

const REQUIRED_COLUMNS: [&str; 4] = ["beneficiary", "cliffDuration", "startTime", "duration"];

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Failed to open beneficiary file: {0}")]
    IO(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

impl From<LoaderError> for DeployerError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::IO(err) => DeployerError::IO(err),
            LoaderError::Malformed { line, reason } => {
                DeployerError::MalformedRecord { line, reason }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Row {
    beneficiary: String,
    cliff_duration: String,
    start_time: String,
    duration: String,
    #[serde(default, alias = "funding")]
    amount: Option<String>,
}

pub fn read_beneficiaries(path: &Path) -> Result<Vec<BeneficiaryRecord>, LoaderError> {
    let file = File::open(path)?;
    let records = parse_beneficiaries(file)?;
    debug!(path = %path.display(), count = records.len(), "Loaded beneficiary file");
    Ok(records)
}

/// Parses every row of `reader`. Duplicated rows are returned as they are.
pub fn parse_beneficiaries<R: Read>(reader: R) -> Result<Vec<BeneficiaryRecord>, LoaderError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(false)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|err| malformed(1, err.to_string()))?
        .clone();
    validate_headers(&headers)?;

    let mut records = Vec::new();
    let mut row = StringRecord::new();
    loop {
        let line = reader.position().line();
        match reader.read_record(&mut row) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => return Err(malformed(line, err.to_string())),
        }
        let line = row.position().map(|pos| pos.line()).unwrap_or(line);
        let raw: Row = row
            .deserialize(Some(&headers))
            .map_err(|err| malformed(line, err.to_string()))?;
        records.push(to_record(raw).map_err(|reason| malformed(line, reason))?);
    }
    Ok(records)
}

fn validate_headers(headers: &StringRecord) -> Result<(), LoaderError> {
    let has = |name: &str| headers.iter().any(|header| header == name);
    for column in REQUIRED_COLUMNS {
        if !has(column) {
            return Err(malformed(1, format!("missing column `{column}`")));
        }
    }
    if has("amount") && has("funding") {
        return Err(malformed(
            1,
            "`amount` and `funding` name the same column, give only one".to_owned(),
        ));
    }
    Ok(())
}

fn to_record(row: Row) -> Result<BeneficiaryRecord, String> {
    let amount = match row.amount.as_deref() {
        None | Some("") => U256::zero(),
        Some(raw) => U256::from_dec_str(raw).map_err(|_| format!("invalid amount `{raw}`"))?,
    };
    Ok(BeneficiaryRecord {
        beneficiary: parse_address(&row.beneficiary)?,
        cliff_duration: parse_seconds("cliffDuration", &row.cliff_duration)?,
        start_time: parse_seconds("startTime", &row.start_time)?,
        duration: parse_seconds("duration", &row.duration)?,
        amount,
    })
}

fn parse_address(raw: &str) -> Result<Address, String> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    match hex::decode(digits) {
        Ok(bytes) if bytes.len() == 20 => Ok(Address::from_slice(&bytes)),
        _ => Err(format!("invalid beneficiary address `{raw}`")),
    }
}

fn parse_seconds(column: &str, raw: &str) -> Result<u64, String> {
    raw.parse()
        .map_err(|_| format!("invalid {column} `{raw}`"))
}

fn malformed(line: u64, reason: String) -> LoaderError {
    LoaderError::Malformed { line, reason }
}
