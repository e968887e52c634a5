use crate::domain::kpi::compute_kpis;

/// Most recent observations embedded in the prompt.
pub const HISTORY_WINDOW: usize = 30;

pub fn compose(symbol: &str, history: &[f64]) -> String {
    let finite: Vec<f64> = history.iter().copied().filter(|c| c.is_finite()).collect();
    let tail = &finite[finite.len().saturating_sub(HISTORY_WINDOW)..];
    let kpis = compute_kpis(&finite);

    let recent = tail
        .iter()
        .map(|c| format!("{c:.2}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Analyze the stock {symbol} based on the following 1-year data: \
Latest Price: ${:.2}, 1-Year High: ${:.2}, 1-Year Low: ${:.2}, Average Price (1Y): ${:.2}. \
Most recent {} daily closes (oldest first): [{recent}]. \
Provide a stock recommendation (BUY, SELL, or HOLD), a confidence between 0 and 1, \
and a concise, actionable insight focusing on future outlook based on these key statistics and recent trends. \
Respond only in JSON format with keys 'verdict' (string), 'confidence' (number) and 'insight' (string).",
        kpis.latest,
        kpis.high,
        kpis.low,
        kpis.average,
        tail.len(),
    )
}
