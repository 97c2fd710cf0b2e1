//! Snapshot loader: reads the CSV exports into typed rows.
//!
//! RULE: only the loader touches the filesystem. Everything downstream
//! receives a completed `SnapshotBundle`.

use crate::{
    error::{DashError, DashResult},
    rows::{DisbursalSummaryRow, FunnelRow, L2AnalysisRow, LenderFunnelRow, SnapshotBundle},
};
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use std::{fs::File, io::Read, path::Path};

pub const FUNNEL_FILE: &str = "funnel.csv";
pub const LENDER_FUNNEL_FILE: &str = "lender_funnel.csv";
pub const DISBURSAL_FILE: &str = "disbursal_summary.csv";
pub const L2_FILE: &str = "l2_analysis.csv";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Fail on the first bad row instead of skipping it.
    pub strict: bool,
}

/// Deserialize every row of a CSV payload with a header line.
pub fn read_rows<T, R>(source_name: &str, reader: R, options: LoadOptions) -> DashResult<Vec<T>>
where
    T: DeserializeOwned + Validate,
    R: Read,
{
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (i, result) in rdr.deserialize::<T>().enumerate() {
        // Header is line 1.
        let line = i as u64 + 2;
        let outcome = result
            .map_err(|e| e.to_string())
            .and_then(|row| row.validate().map(|_| row));
        match outcome {
            Ok(row) => rows.push(row),
            Err(reason) if options.strict => {
                return Err(DashError::InvalidRow {
                    source_name: source_name.to_string(),
                    line,
                    reason,
                });
            }
            Err(reason) => {
                skipped += 1;
                log::warn!("loader: skipping {source_name} line {line}: {reason}");
            }
        }
    }

    log::info!("loader: {source_name}: {} rows ({skipped} skipped)", rows.len());
    Ok(rows)
}

/// Row-level checks beyond what deserialization enforces.
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Validate for FunnelRow {}
impl Validate for LenderFunnelRow {}

impl Validate for DisbursalSummaryRow {
    fn validate(&self) -> Result<(), String> {
        if self.lender.is_empty() {
            return Err("empty lender".into());
        }
        Ok(())
    }
}

impl Validate for L2AnalysisRow {
    fn validate(&self) -> Result<(), String> {
        if !self.major_index.is_finite() || self.major_index < 0.0 {
            return Err(format!("bad major_index {}", self.major_index));
        }
        if self.is_major() && self.major_index.fract() != 0.0 {
            return Err(format!(
                "major stage row with fractional major_index {}",
                self.major_index
            ));
        }
        Ok(())
    }
}

fn open_required(dir: &Path, name: &str) -> DashResult<File> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(DashError::MissingSource {
            name: name.to_string(),
            dir: dir.display().to_string(),
        });
    }
    Ok(File::open(path)?)
}

/// Load all four sources from `data_dir`. `lender_funnel.csv` is optional;
/// when absent the bundle pivots lender funnels from the L2 rows on demand.
pub fn load_bundle(data_dir: &str, options: LoadOptions) -> DashResult<SnapshotBundle> {
    let dir = Path::new(data_dir);

    let funnel = read_rows(FUNNEL_FILE, open_required(dir, FUNNEL_FILE)?, options)?;
    let disbursals = read_rows(DISBURSAL_FILE, open_required(dir, DISBURSAL_FILE)?, options)?;
    let l2 = read_rows(L2_FILE, open_required(dir, L2_FILE)?, options)?;

    let lender_path = dir.join(LENDER_FUNNEL_FILE);
    let lender_funnel = if lender_path.exists() {
        read_rows(LENDER_FUNNEL_FILE, File::open(lender_path)?, options)?
    } else {
        log::info!("loader: {LENDER_FUNNEL_FILE} absent, will pivot from {L2_FILE}");
        Vec::new()
    };

    Ok(SnapshotBundle { funnel, lender_funnel, disbursals, l2 })
}
