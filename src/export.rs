//! CSV rendering of collected records. The host owns the actual download.

use crate::resources::Stats;

/// Render stats records as CSV, one row per model.
pub fn stats_csv(records: &[Stats]) -> String {
    let mut lines = vec!["name,sizeMb,accessor,material,mesh,nodes,fps".to_string()];
    for record in records {
        let fps = record
            .fps
            .map(|fps| format!("{fps:.2}"))
            .unwrap_or_default();
        lines.push(format!(
            "{},{:.2},{},{},{},{},{}",
            record.name,
            record.size_mb,
            record.accessor,
            record.material,
            record.mesh,
            record.nodes,
            fps
        ));
    }
    lines.join("\r\n")
}

/// Render per-model benchmark results as CSV in the caller's order.
pub fn benchmark_csv(results: &[(String, f64)]) -> String {
    let mut lines = vec!["model,averageFps".to_string()];
    for (model_id, fps) in results {
        lines.push(format!("{model_id},{fps:.2}"));
    }
    lines.join("\r\n")
}
