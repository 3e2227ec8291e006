//! HTML overview of all stored metrics

use axum::{extract::State, response::Html};

use crate::api::{ApiResult, ApiState};

/// GET /
pub async fn list_metrics(State(state): State<ApiState>) -> ApiResult<Html<String>> {
    let metrics = state.store.get_all().await?;

    let mut page = String::from("<html><head><title>Metrics</title></head><body><ul>\n");
    for metric in metrics.values() {
        page.push_str(&format!(
            "<li>{} {} {}</li>\n",
            metric.kind(),
            escape(&metric.name),
            metric.value
        ));
    }
    page.push_str("</ul></body></html>\n");

    Ok(Html(page))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
