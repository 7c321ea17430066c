//! CSV ingest of raw DVF transactions.
//!
//! This module is responsible for turning a DVF export into
//! `RawTransactionRecord`s. It does not decide which rows are usable; that is
//! the preparer's job.
//!
//! Design goals:
//! - **Strict schema**: every expected column must be present (exit code 2)
//! - **Lenient rows**: unreadable cells become missing values, broken CSV
//!   lines are reported and skipped
//! - **Any reasonable source**: local path or `http(s)://` URL, plain or
//!   gzip-compressed, comma or semicolon delimited

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::time::Duration;

use csv::StringRecord;
use flate2::read::MultiGzDecoder;
use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::domain::{Delimiter, LOT_COUNT, RawTransactionRecord};
use crate::error::AppError;

/// Paris (département 75) transactions for 2022, as published by Etalab.
pub const DEFAULT_SOURCE: &str = "https://files.data.gouv.fr/geo-dvf/latest/csv/2022/departements/75.csv.gz";

pub const REQUIRED_COLUMNS: [&str; 12] = [
    "nature_mutation",
    "type_local",
    "nature_culture",
    "code_postal",
    "surface_reelle_bati",
    "nombre_pieces_principales",
    "lot1_surface_carrez",
    "lot2_surface_carrez",
    "lot3_surface_carrez",
    "lot4_surface_carrez",
    "lot5_surface_carrez",
    "valeur_fonciere",
];

const LOT_COLUMNS: [&str; LOT_COUNT] = [
    "lot1_surface_carrez",
    "lot2_surface_carrez",
    "lot3_surface_carrez",
    "lot4_surface_carrez",
    "lot5_surface_carrez",
];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// A CSV line that could not be parsed.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: parsed records plus what went wrong along the way.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub records: Vec<RawTransactionRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub delimiter: u8,
}

/// Load every record from a path or URL.
pub fn load_records(source: &str, delimiter: Delimiter) -> Result<IngestedData, AppError> {
    let reader = open_source(source)?;
    let mut reader = maybe_decompress(reader)?;

    let delimiter = match delimiter {
        Delimiter::Comma => b',',
        Delimiter::Semicolon => b';',
        Delimiter::Auto => {
            let head = reader
                .fill_buf()
                .map_err(|e| AppError::new(2, format!("Failed to read '{source}': {e}")))?;
            sniff_delimiter(head)
        }
    };

    let data = parse_records(reader, delimiter)?;
    info!(
        source,
        rows = data.rows_read,
        errors = data.row_errors.len(),
        delimiter = %(data.delimiter as char),
        "input loaded"
    );
    for e in data.row_errors.iter().take(5) {
        warn!(line = e.line, "{}", e.message);
    }
    Ok(data)
}

/// Parse records from an already decompressed CSV stream.
pub fn parse_records<R: Read>(reader: R, delimiter: u8) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map)?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines, header on line 1.
        let line = idx + 2;
        rows_read += 1;
        match result {
            Ok(record) => records.push(parse_row(&record, &header_map)),
            Err(e) => row_errors.push(RowError {
                line,
                message: format!("CSV parse error: {e}"),
            }),
        }
    }

    Ok(IngestedData {
        records,
        row_errors,
        rows_read,
        delimiter,
    })
}

fn open_source(source: &str) -> Result<Box<dyn BufRead>, AppError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let bytes = fetch_url(source)?;
        return Ok(Box::new(Cursor::new(bytes)));
    }
    let file = File::open(source).map_err(|e| AppError::new(2, format!("Failed to open CSV '{source}': {e}")))?;
    Ok(Box::new(BufReader::new(file)))
}

fn fetch_url(url: &str) -> Result<Vec<u8>, AppError> {
    info!(url, "downloading input");
    let client = Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| AppError::new(2, format!("Failed to build HTTP client: {e}")))?;
    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| AppError::new(2, format!("Failed to fetch '{url}': {e}")))?;
    let bytes = response
        .bytes()
        .map_err(|e| AppError::new(2, format!("Failed to read response from '{url}': {e}")))?;
    Ok(bytes.to_vec())
}

/// Wrap the stream in a gzip decoder when it starts with the gzip magic bytes.
fn maybe_decompress(mut reader: Box<dyn BufRead>) -> Result<Box<dyn BufRead>, AppError> {
    let head = reader
        .fill_buf()
        .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;
    if head.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(reader)
    }
}

/// Pick `;` when the first line has more semicolons than commas.
pub fn sniff_delimiter(head: &[u8]) -> u8 {
    let first_line = head.split(|&b| b == b'\n').next().unwrap_or(&[]);
    let commas = first_line.iter().filter(|&&b| b == b',').count();
    let semicolons = first_line.iter().filter(|&&b| b == b';').count();
    if semicolons > commas { b';' } else { b',' }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // A UTF-8 BOM glued to the first header would otherwise hide that column.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<(), AppError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !header_map.contains_key(**c))
        .map(|c| format!("`{c}`"))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::schema(format!("Missing required column(s): {}", missing.join(", "))))
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> RawTransactionRecord {
    let text = |name: &str| get_optional(record, header_map, name).map(str::to_string);
    let number = |name: &str| parse_opt_f64(get_optional(record, header_map, name));

    RawTransactionRecord {
        nature_mutation: text("nature_mutation"),
        type_local: text("type_local"),
        nature_culture: text("nature_culture"),
        code_postal: text("code_postal"),
        surface_reelle_bati: number("surface_reelle_bati"),
        nombre_pieces_principales: number("nombre_pieces_principales"),
        lot_surfaces: LOT_COLUMNS.map(|c| number(c)),
        valeur_fonciere: number("valeur_fonciere"),
    }
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a float, accepting a decimal comma (`300000,00`) as well as a point.
fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = if s.contains(',') && !s.contains('.') {
        s.replace(',', ".").parse::<f64>().ok()?
    } else {
        s.parse::<f64>().ok()?
    };
    if v.is_finite() { Some(v) } else { None }
}
