//! Formatted terminal output for a training run.
//!
//! Kept apart from the training code so output changes stay local.

use crate::app::pipeline::TrainingRun;
use crate::domain::TrainConfig;

/// Full summary: ingest counts, cleaning funnel, outlier fence, split and metrics.
pub fn format_training_summary(run: &TrainingRun, config: &TrainConfig) -> String {
    let mut out = String::new();
    let stats = &run.prepared.stats;
    let card = &run.pipeline.card;

    out.push_str("=== dvf - Paris apartment price model ===\n");
    out.push_str(&format!("Source: {}\n", config.input));
    out.push_str(&format!(
        "Rows: read={} | parsed={} | skipped={}\n",
        run.rows_read,
        stats.rows_in,
        run.row_errors.len()
    ));

    out.push_str("\nCleaning:\n");
    out.push_str(&format!("  {:<28} {:>9}\n", "sales (Vente)", stats.sales));
    out.push_str(&format!("  {:<28} {:>9}\n", "apartments", stats.apartments));
    out.push_str(&format!("  {:<28} {:>9}\n", "no land-use class", stats.urban));
    out.push_str(&format!("  {:<28} {:>9}\n", "complete rows", stats.complete));
    if stats.invalid_postal_codes > 0 {
        out.push_str(&format!(
            "  {:<28} {:>9}\n",
            "(unreadable postal codes)", stats.invalid_postal_codes
        ));
    }
    out.push_str(&format!("  {:<28} {:>9}\n", "after outlier fence", stats.retained));

    match &run.prepared.fence {
        Some(f) => out.push_str(&format!(
            "Fence: P5={} < price < P75 + 0.5*IQD={} (P25={}, P50={}, P75={})\n",
            fmt_eur(f.lower),
            fmt_eur(f.upper),
            fmt_eur(f.p25),
            fmt_eur(f.p50),
            fmt_eur(f.p75)
        )),
        None => out.push_str("Fence: none (no rows left before outlier removal)\n"),
    }
    if let Some((lo, hi)) = run.prepared.target_range() {
        out.push_str(&format!("Prices: [{}, {}]\n", fmt_eur(lo), fmt_eur(hi)));
    }

    out.push_str("\nModel:\n");
    out.push_str(&format!(
        "- random forest: {} trees, max_depth={}, seed={}\n",
        card.forest.n_trees,
        card.forest.max_depth.map_or_else(|| "none".to_string(), |d| d.to_string()),
        card.seed
    ));
    out.push_str(&format!(
        "- features: {} ({} postal codes + {} numeric)\n",
        run.pipeline.width(),
        run.pipeline.encoder.width(),
        run.pipeline.schema.passthrough.len()
    ));
    out.push_str(&format!(
        "- split: train={} test={} (unseen postal codes skipped: {})\n",
        card.n_train, card.n_test, card.n_unseen
    ));

    out.push_str("\nHeld-out metrics:\n");
    match &card.metrics {
        Some(m) => {
            out.push_str(&format!("Median absolute error: {:.2}\n", m.median_abs_error));
            out.push_str(&format!("MAPE: {:.2}\n", m.mape));
            out.push_str(&format!("R2: {:.2}\n", m.r2));
        }
        None => out.push_str("(no held-out rows could be scored)\n"),
    }

    out.push_str(&format!("\nArtifact: {}\n", config.model_path.display()));
    if let Some(path) = &config.export_cleaned {
        out.push_str(&format!("Cleaned table: {}\n", path.display()));
    }

    out
}

/// Whole euros, thousands separated by spaces, e.g. `1 250 000 €`.
fn fmt_eur(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{sign}{grouped} €")
}
