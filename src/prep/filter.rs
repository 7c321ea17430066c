//! Row-level cleaning of raw DVF transactions.
//!
//! Steps, in order:
//! 1. keep sales (`nature_mutation == "Vente"`)
//! 2. keep apartments (`type_local == "Appartement"`)
//! 3. keep urban parcels (no `nature_culture`)
//! 4. coerce `code_postal` to an integer
//! 5. derive `total_surface_lots` (missing lots count as zero)
//! 6. drop rows with a missing core column
//!
//! and then the population-level outlier fence (`prep::outlier`).
//!
//! Everything here is pure: the same records always give the same table.

use tracing::debug;

use crate::domain::{APARTMENT_TYPE, CleanedFeatureRow, LOT_COUNT, RawTransactionRecord, SALE_NATURE};
use crate::prep::outlier::{OutlierFence, remove_outliers};

/// Row counts after each cleaning step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrepStats {
    pub rows_in: usize,
    pub sales: usize,
    pub apartments: usize,
    pub urban: usize,
    /// Rows of the urban set whose postal code could not be read as an integer.
    pub invalid_postal_codes: usize,
    /// Rows with all five core columns populated.
    pub complete: usize,
    /// Rows inside the outlier fence.
    pub retained: usize,
}

/// Output of the full preparation (cleaning + outlier removal).
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub rows: Vec<CleanedFeatureRow>,
    /// `None` when no row survived the row-level stage.
    pub fence: Option<OutlierFence>,
    pub stats: PrepStats,
}

impl PreparedData {
    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.valeur_fonciere).collect()
    }

    /// Min and max sale value of the cleaned table.
    pub fn target_range(&self) -> Option<(f64, f64)> {
        let mut it = self.rows.iter().map(|r| r.valeur_fonciere);
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// Run the whole preparation: row-level cleaning, then the outlier fence.
pub fn prepare(records: &[RawTransactionRecord]) -> PreparedData {
    let (rows, mut stats) = clean_records(records);
    let (rows, fence) = remove_outliers(rows);
    stats.retained = rows.len();

    if let Some(f) = &fence {
        debug!(
            p05 = f.p05,
            p25 = f.p25,
            p50 = f.p50,
            p75 = f.p75,
            lower = f.lower,
            upper = f.upper,
            "outlier fence"
        );
    }

    let prepared = PreparedData { rows, fence, stats };
    debug!(rows = prepared.rows.len(), columns = 5, "data transformation completed");
    if let Some((lo, hi)) = prepared.target_range() {
        debug!(min = lo, max = hi, "target range");
    }
    prepared
}

/// Row-level stage (steps 1–6). Applying it to its own output changes nothing.
pub fn clean_records(records: &[RawTransactionRecord]) -> (Vec<CleanedFeatureRow>, PrepStats) {
    let mut stats = PrepStats {
        rows_in: records.len(),
        ..PrepStats::default()
    };

    let sales: Vec<&RawTransactionRecord> = records
        .iter()
        .filter(|r| r.nature_mutation.as_deref() == Some(SALE_NATURE))
        .collect();
    stats.sales = sales.len();

    let apartments: Vec<&RawTransactionRecord> = sales
        .into_iter()
        .filter(|r| r.type_local.as_deref() == Some(APARTMENT_TYPE))
        .collect();
    stats.apartments = apartments.len();

    let urban: Vec<&RawTransactionRecord> = apartments
        .into_iter()
        .filter(|r| r.nature_culture.is_none())
        .collect();
    stats.urban = urban.len();

    let mut rows = Vec::with_capacity(urban.len());
    for record in urban {
        let code_postal = match record.code_postal.as_deref() {
            Some(raw) => match coerce_postal_code(raw) {
                Some(code) => Some(code),
                None => {
                    stats.invalid_postal_codes += 1;
                    debug!(code_postal = raw, "unreadable postal code, row dropped");
                    None
                }
            },
            None => None,
        };
        let total_surface_lots = total_lot_surface(&record.lot_surfaces);

        let (Some(valeur_fonciere), Some(surface_reelle_bati), Some(nombre_pieces_principales), Some(code_postal)) = (
            record.valeur_fonciere,
            record.surface_reelle_bati,
            record.nombre_pieces_principales,
            code_postal,
        ) else {
            continue;
        };

        rows.push(CleanedFeatureRow {
            valeur_fonciere,
            surface_reelle_bati,
            nombre_pieces_principales,
            code_postal,
            total_surface_lots,
        });
    }
    stats.complete = rows.len();

    debug!(
        rows_in = stats.rows_in,
        sales = stats.sales,
        apartments = stats.apartments,
        urban = stats.urban,
        complete = stats.complete,
        "row-level cleaning"
    );

    (rows, stats)
}

/// Read a postal code such as `75001`, `75001.0` or ` 75001 `.
///
/// Fractional or non-numeric values give `None`.
pub fn coerce_postal_code(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Sum of the lot surfaces, a missing lot counting as zero.
pub fn total_lot_surface(lots: &[Option<f64>; LOT_COUNT]) -> f64 {
    lots.iter().map(|v| v.unwrap_or(0.0)).sum()
}
