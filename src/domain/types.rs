//! Shared domain types.
//!
//! Column names follow the DVF ("demandes de valeurs foncières") CSV export so
//! that the cleaned table, the artifact schema and the exports all speak the same
//! vocabulary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Name of the prediction target column.
pub const TARGET_COLUMN: &str = "valeur_fonciere";

/// Number of `lotN_surface_carrez` columns in a DVF row.
pub const LOT_COUNT: usize = 5;

/// Transaction nature kept by the preparer (actual sales only).
pub const SALE_NATURE: &str = "Vente";

/// Property type kept by the preparer.
pub const APARTMENT_TYPE: &str = "Appartement";

/// A model input column.
///
/// The artifact records its feature schema with these names, and serving binds
/// request values to columns by name rather than by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    SurfaceReelleBati,
    NombrePiecesPrincipales,
    CodePostal,
    TotalSurfaceLots,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 4] = [
        FeatureColumn::SurfaceReelleBati,
        FeatureColumn::NombrePiecesPrincipales,
        FeatureColumn::CodePostal,
        FeatureColumn::TotalSurfaceLots,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FeatureColumn::SurfaceReelleBati => "surface_reelle_bati",
            FeatureColumn::NombrePiecesPrincipales => "nombre_pieces_principales",
            FeatureColumn::CodePostal => "code_postal",
            FeatureColumn::TotalSurfaceLots => "total_surface_lots",
        }
    }
}

/// Field delimiter of the input CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// Sniff the header line: semicolon if it has more `;` than `,`.
    Auto,
    Comma,
    Semicolon,
}

/// One row of the raw transaction table, before any cleaning.
///
/// Every field is optional: DVF exports leave cells empty freely, and deciding
/// what a missing value means is the preparer's job, not the parser's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTransactionRecord {
    pub nature_mutation: Option<String>,
    pub type_local: Option<String>,
    pub nature_culture: Option<String>,
    /// Kept as text: the column is integer-like but may be written `75001.0`.
    pub code_postal: Option<String>,
    pub surface_reelle_bati: Option<f64>,
    pub nombre_pieces_principales: Option<f64>,
    pub lot_surfaces: [Option<f64>; LOT_COUNT],
    pub valeur_fonciere: Option<f64>,
}

impl From<&CleanedFeatureRow> for RawTransactionRecord {
    /// Re-express a cleaned row as the raw record it could have come from.
    fn from(row: &CleanedFeatureRow) -> Self {
        let mut lot_surfaces = [None; LOT_COUNT];
        lot_surfaces[0] = Some(row.total_surface_lots);
        Self {
            nature_mutation: Some(SALE_NATURE.to_string()),
            type_local: Some(APARTMENT_TYPE.to_string()),
            nature_culture: None,
            code_postal: Some(row.code_postal.to_string()),
            surface_reelle_bati: Some(row.surface_reelle_bati),
            nombre_pieces_principales: Some(row.nombre_pieces_principales),
            lot_surfaces,
            valeur_fonciere: Some(row.valeur_fonciere),
        }
    }
}

/// A labeled, fully populated row of the cleaned table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanedFeatureRow {
    pub valeur_fonciere: f64,
    pub surface_reelle_bati: f64,
    pub nombre_pieces_principales: f64,
    pub code_postal: i64,
    pub total_surface_lots: f64,
}

impl CleanedFeatureRow {
    pub fn features(&self) -> FeatureRow {
        FeatureRow {
            surface_reelle_bati: self.surface_reelle_bati,
            nombre_pieces_principales: self.nombre_pieces_principales,
            code_postal: self.code_postal,
            total_surface_lots: self.total_surface_lots,
        }
    }
}

/// Model inputs for one property (the cleaned row minus its target).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub surface_reelle_bati: f64,
    pub nombre_pieces_principales: f64,
    pub code_postal: i64,
    pub total_surface_lots: f64,
}

impl FeatureRow {
    /// Numeric value of a passthrough column.
    pub fn value(&self, column: FeatureColumn) -> f64 {
        match column {
            FeatureColumn::SurfaceReelleBati => self.surface_reelle_bati,
            FeatureColumn::NombrePiecesPrincipales => self.nombre_pieces_principales,
            FeatureColumn::CodePostal => self.code_postal as f64,
            FeatureColumn::TotalSurfaceLots => self.total_surface_lots,
        }
    }

    /// Categorical value of an encoded column.
    pub fn category(&self, column: FeatureColumn) -> Option<i64> {
        match column {
            FeatureColumn::CodePostal => Some(self.code_postal),
            _ => None,
        }
    }
}

/// Inbound query of `GET /predict`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionRequest {
    pub surface: f64,
    pub rooms: f64,
    /// Total lot ("Carrez") surface.
    pub terrain: f64,
    pub zip: i64,
}

impl PredictionRequest {
    pub fn to_feature_row(&self) -> FeatureRow {
        FeatureRow {
            surface_reelle_bati: self.surface,
            nombre_pieces_principales: self.rooms,
            code_postal: self.zip,
            total_surface_lots: self.terrain,
        }
    }
}

/// Body of a `GET /predict` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Price { predicted_price: String },
    Error { error: String },
}

/// Random forest hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows trees until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of features considered at each split (1.0 = all).
    pub max_features: f64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1.0,
        }
    }
}

/// Configuration of a training run, derived from CLI flags.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Local path or `http(s)://` URL of the DVF CSV (optionally gzipped).
    pub input: String,
    pub delimiter: Delimiter,
    pub model_path: PathBuf,
    pub seed: u64,
    pub forest: ForestParams,
    pub export_cleaned: Option<PathBuf>,
}

/// Configuration of the prediction server.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub model_path: PathBuf,
    pub bind: SocketAddr,
    /// Return 4xx for failed predictions instead of the uniform 200.
    pub strict_status: bool,
}
