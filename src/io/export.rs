//! Export the cleaned feature table to CSV.
//!
//! Handy for the dashboard side and for eyeballing what the model was trained
//! on. Columns follow `CleanedFeatureRow` field order.

use std::path::Path;

use crate::domain::CleanedFeatureRow;
use crate::error::AppError;

pub fn write_cleaned_csv(path: &Path, rows: &[CleanedFeatureRow]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV '{}': {e}", path.display())))?;
    Ok(())
}
