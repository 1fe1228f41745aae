use std::{fs::File, io::Write, path::Path};

use serde_json::{json, Value};

use super::{Chart, ChartKind, ChartRenderer};
use crate::app::AppError;

const PLOTLY_JS_URL: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Writes charts as an HTML page holding a Plotly figure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PlotlyRenderer;

impl PlotlyRenderer {
    pub(crate) fn figure(chart: &Chart) -> Value {
        let data = chart
            .series
            .iter()
            .map(|series| match chart.kind {
                ChartKind::Scatter => json!({
                    "type": "scatter",
                    "mode": "markers",
                    "name": series.name,
                    "x": series.x,
                    "y": series.y,
                }),
                ChartKind::Histogram => json!({
                    "type": "histogram",
                    "name": series.name,
                    "x": series.x,
                    "opacity": 0.6,
                }),
            })
            .collect::<Vec<_>>();

        let mut layout = json!({
            "title": { "text": chart.title },
            "xaxis": { "title": { "text": chart.x_label } },
            "yaxis": { "title": { "text": chart.y_label } },
            "height": 500,
        });
        if chart.kind == ChartKind::Histogram {
            layout["barmode"] = json!("overlay");
        }

        json!({ "data": data, "layout": layout })
    }

    pub(crate) fn page(chart: &Chart) -> String {
        // serde_json leaves '/' unescaped, which would let a name close the script tag.
        let figure = Self::figure(chart).to_string().replace("</", "<\\/");
        let title = html_escape(&chart.title);

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_JS_URL}"></script>
</head>
<body>
<div id="chart"></div>
<script>
var figure = {figure};
Plotly.newPlot("chart", figure.data, figure.layout);
</script>
</body>
</html>
"#
        )
    }
}

impl ChartRenderer for PlotlyRenderer {
    fn file_extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, chart: &Chart, path: &Path) -> Result<(), AppError> {
        let mut f = File::create(path).map_err(|e| AppError::chart_write(path, e))?;
        f.write_all(Self::page(chart).as_bytes())
            .map_err(|e| AppError::chart_write(path, e))
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
