use crate::series::{round2, Series};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use steward_core::{ErrorKind, RequestState, StewardResult};
use steward_orchestrator::{Agent, AgentDescriptor, Capability};
use tracing::debug;

/// Confidence reported by a data agent that produced a result.
const ANALYSIS_CONFIDENCE: f64 = 0.85;
/// Periods projected by the forecasting agent.
const FORECAST_HORIZON: usize = 3;
/// Points further than this many standard deviations from the mean are flagged.
const ANOMALY_Z_THRESHOLD: f64 = 2.0;
const MIN_ANOMALY_POINTS: usize = 3;

/// The analysis a [`DataAgent`] runs over the first uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTask {
    /// Bar, line or pie chart of the series.
    Chart,
    /// Linear-trend forecast.
    Forecast,
    /// Z-score outlier detection.
    AnomalyDetection,
    /// Growth and summary figures.
    BrandPerformance,
}

impl DataTask {
    fn descriptor(self) -> AgentDescriptor {
        match self {
            Self::Chart => AgentDescriptor::new(
                "chart_agent",
                "Chart Agent",
                "Creates bar, line and pie charts from uploaded data",
            )
            .with_capabilities(vec![Capability::ProducesArtifact, Capability::ProducesStructuredData])
            .with_keywords([
                "chart", "graph", "plot", "visualize", "visualise", "show", "display",
                "bar chart", "line chart", "pie chart",
            ]),
            Self::Forecast => AgentDescriptor::new(
                "forecasting_agent",
                "Forecasting Agent",
                "Projects future values from historical series",
            )
            .with_capabilities(vec![Capability::ProducesStructuredData, Capability::ProducesText])
            .with_keywords([
                "forecast", "predict", "prediction", "projection", "future", "trend",
                "next month", "next year", "what will",
            ]),
            Self::AnomalyDetection => AgentDescriptor::new(
                "anomaly_detection_agent",
                "Anomaly Detection Agent",
                "Flags outliers and unusual values in uploaded data",
            )
            .with_capabilities(vec![Capability::ProducesStructuredData, Capability::ProducesText])
            .with_keywords([
                "anomaly", "anomalies", "outlier", "outliers", "unusual", "abnormal",
                "detect issues", "quality control", "fraud",
            ]),
            Self::BrandPerformance => AgentDescriptor::new(
                "brand_performance_agent",
                "Brand Performance Agent",
                "Summarises KPIs, growth rates and brand metrics",
            )
            .with_capabilities(vec![Capability::ProducesStructuredData, Capability::ProducesText])
            .with_keywords([
                "performance", "kpi", "kpis", "growth rate", "market share", "brand",
                "brand metrics", "data quality",
            ]),
        }
        .requiring_files()
    }

    /// What the user is told when no file was uploaded.
    fn missing_file_message(self) -> &'static str {
        match self {
            Self::Chart => {
                "I need at least one data file to create a chart. Please upload a CSV or Excel file."
            }
            Self::Forecast => {
                "I need at least one data file to build a forecast. Please upload a CSV or Excel file."
            }
            Self::AnomalyDetection => {
                "I need at least one data file to look for anomalies. Please upload a CSV or Excel file."
            }
            Self::BrandPerformance => {
                "I need at least one data file to analyse performance. Please upload a CSV or Excel file."
            }
        }
    }
}

/// An agent that analyses the first uploaded file.
///
/// Missing or unusable data is a handled failure: the state carries an
/// `AgentExecution` error together with a response explaining what to upload.
pub struct DataAgent {
    task: DataTask,
    descriptor: AgentDescriptor,
}

impl DataAgent {
    /// Agent for one analysis task.
    pub fn new(task: DataTask) -> Self {
        Self {
            task,
            descriptor: task.descriptor(),
        }
    }

    /// The analysis this agent runs.
    pub fn task(&self) -> DataTask {
        self.task
    }

    fn analyse(&self, query: &str, file_ref: &str, series: &Series) -> Result<(String, Map<String, Value>), String> {
        let mut data = Map::new();
        data.insert("file".into(), json!(file_ref));
        data.insert("column".into(), json!(series.column));
        data.insert("points".into(), json!(series.len()));
        let subject = series.column.as_deref().unwrap_or("values");

        let response = match self.task {
            DataTask::Chart => {
                let q = query.to_lowercase();
                let chart_type = if q.contains("pie") {
                    "pie"
                } else if q.contains("line") || q.contains("trend") || q.contains("over time") {
                    "line"
                } else {
                    "bar"
                };
                data.insert("chart_type".into(), json!(chart_type));
                data.insert("labels".into(), json!(series.labels));
                data.insert("values".into(), json!(series.values));
                format!(
                    "Here is a {chart_type} chart of {subject} from '{file_ref}' ({} points).",
                    series.len()
                )
            }
            DataTask::Forecast => {
                if series.len() < 2 {
                    return Err(format!(
                        "I need at least two data points in '{file_ref}' to build a forecast."
                    ));
                }
                let (slope, intercept) = series.linear_fit();
                let start = series.len();
                let projected: Vec<f64> = (start..start + FORECAST_HORIZON)
                    .map(|i| round2(intercept + slope * i as f64))
                    .collect();
                data.insert("method".into(), json!("linear_trend"));
                data.insert("slope".into(), json!(round2(slope)));
                data.insert("forecast".into(), json!(projected));
                let listed: Vec<String> = projected.iter().map(f64::to_string).collect();
                format!(
                    "Projected {subject} for the next {FORECAST_HORIZON} periods: {} (trend of {} per period).",
                    listed.join(", "),
                    round2(slope)
                )
            }
            DataTask::AnomalyDetection => {
                if series.len() < MIN_ANOMALY_POINTS {
                    return Err(format!(
                        "I need at least {MIN_ANOMALY_POINTS} data points in '{file_ref}' to look for anomalies."
                    ));
                }
                let mean = series.mean();
                let std_dev = series.std_dev();
                let anomalies: Vec<Value> = series
                    .values
                    .iter()
                    .zip(&series.labels)
                    .filter_map(|(value, label)| {
                        let z = if std_dev == 0.0 { 0.0 } else { (value - mean) / std_dev };
                        (z.abs() > ANOMALY_Z_THRESHOLD)
                            .then(|| json!({"label": label, "value": value, "z_score": round2(z)}))
                    })
                    .collect();
                let count = anomalies.len();
                data.insert("mean".into(), json!(round2(mean)));
                data.insert("std_dev".into(), json!(round2(std_dev)));
                data.insert("anomalies".into(), Value::Array(anomalies));
                match count {
                    0 => format!("No anomalies found in {} {subject} values.", series.len()),
                    n => format!(
                        "Found {n} anomal{} in {} {subject} values (more than {ANOMALY_Z_THRESHOLD} standard deviations from the mean).",
                        if n == 1 { "y" } else { "ies" },
                        series.len()
                    ),
                }
            }
            DataTask::BrandPerformance => {
                let first = series.values.first().copied().unwrap_or_default();
                let last = series.values.last().copied().unwrap_or_default();
                let growth = (first != 0.0).then(|| round2((last - first) / first.abs() * 100.0));
                data.insert("total".into(), json!(round2(series.total())));
                data.insert("average".into(), json!(round2(series.mean())));
                data.insert("min".into(), json!(series.min()));
                data.insert("max".into(), json!(series.max()));
                data.insert("growth_rate_pct".into(), json!(growth));
                let mut text = format!(
                    "{subject} in '{file_ref}': total {}, average {}.",
                    round2(series.total()),
                    round2(series.mean())
                );
                if let Some(growth) = growth {
                    text.push_str(&format!(" Growth from first to last period: {growth}%."));
                }
                text
            }
        };
        Ok((response, data))
    }
}

#[async_trait]
impl Agent for DataAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, state: RequestState) -> StewardResult<RequestState> {
        let Some(file_ref) = state.uploaded_file_refs.first().cloned() else {
            return Ok(state
                .with_response(self.task.missing_file_message(), 0.0, None)
                .with_error(ErrorKind::AgentExecution, "No files uploaded"));
        };

        let series = state.loaded_file_data.get(&file_ref).and_then(Series::from_payload);
        let Some(series) = series else {
            debug!(agent_id = %self.descriptor.id, file_ref = %file_ref, "No numeric data for file");
            return Ok(state
                .with_response(
                    format!("I couldn't find numeric data in '{file_ref}'. Please check the file contents."),
                    0.0,
                    None,
                )
                .with_error(ErrorKind::AgentExecution, format!("No numeric data in {file_ref}")));
        };

        match self.analyse(&state.query, &file_ref, &series) {
            Ok((response, data)) => Ok(state.with_response(response, ANALYSIS_CONFIDENCE, Some(data))),
            Err(message) => Ok(state
                .with_response(message.clone(), 0.0, None)
                .with_error(ErrorKind::AgentExecution, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(query: &str, payload: Option<Value>) -> RequestState {
        let state = RequestState::new(query, "s", vec!["sales.csv".into()]);
        match payload {
            Some(p) => state.with_file_data("sales.csv", p),
            None => state,
        }
    }

    #[test]
    fn test_descriptors_require_files() {
        for task in [
            DataTask::Chart,
            DataTask::Forecast,
            DataTask::AnomalyDetection,
            DataTask::BrandPerformance,
        ] {
            assert!(DataAgent::new(task).descriptor().requires_files);
        }
    }

    #[tokio::test]
    async fn test_no_files_is_handled_failure() {
        let out = DataAgent::new(DataTask::Chart)
            .execute(RequestState::new("show a chart", "s", vec![]))
            .await
            .unwrap();
        let err = out.error.as_ref().unwrap();
        assert_eq!(err.kind, ErrorKind::AgentExecution);
        assert_eq!(err.message, "No files uploaded");
        assert!(out.agent_response.unwrap().contains("upload a CSV or Excel file"));
    }

    #[tokio::test]
    async fn test_unloaded_file_is_handled_failure() {
        let out = DataAgent::new(DataTask::BrandPerformance)
            .execute(state_with("kpi", None))
            .await
            .unwrap();
        assert_eq!(out.error.unwrap().kind, ErrorKind::AgentExecution);
        assert_eq!(out.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_chart_picks_type_from_query() {
        let out = DataAgent::new(DataTask::Chart)
            .execute(state_with("line chart please", Some(json!([1, 2, 3]))))
            .await
            .unwrap();
        assert!(!out.has_error());
        let data = out.agent_data.unwrap();
        assert_eq!(data["chart_type"], "line");
        assert_eq!(data["points"], 3);
        assert_eq!(out.confidence, ANALYSIS_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_forecast_extends_trend() {
        let out = DataAgent::new(DataTask::Forecast)
            .execute(state_with("forecast", Some(json!([10, 20, 30]))))
            .await
            .unwrap();
        let data = out.agent_data.unwrap();
        assert_eq!(data["forecast"], json!([40.0, 50.0, 60.0]));
        assert_eq!(data["slope"], 10.0);
    }

    #[tokio::test]
    async fn test_forecast_needs_two_points() {
        let out = DataAgent::new(DataTask::Forecast)
            .execute(state_with("forecast", Some(json!([10]))))
            .await
            .unwrap();
        assert_eq!(out.error.unwrap().kind, ErrorKind::AgentExecution);
    }

    #[tokio::test]
    async fn test_anomaly_flags_outlier() {
        let out = DataAgent::new(DataTask::AnomalyDetection)
            .execute(state_with(
                "find outliers",
                Some(json!([10, 11, 9, 10, 12, 10, 11, 9, 10, 100])),
            ))
            .await
            .unwrap();
        let data = out.agent_data.unwrap();
        let anomalies = data["anomalies"].as_array().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0]["value"], 100.0);
        assert_eq!(anomalies[0]["label"], "10");
    }

    #[tokio::test]
    async fn test_brand_growth_rate() {
        let out = DataAgent::new(DataTask::BrandPerformance)
            .execute(state_with(
                "kpi growth rate",
                Some(json!({"column": "revenue", "labels": ["Q1", "Q2"], "values": [100, 125]})),
            ))
            .await
            .unwrap();
        let data = out.agent_data.unwrap();
        assert_eq!(data["growth_rate_pct"], 25.0);
        assert_eq!(data["total"], 225.0);
        assert!(out.agent_response.unwrap().contains("25%"));
    }
}
