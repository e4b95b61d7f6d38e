use serde_json::Value;

/// A labelled numeric column extracted from an uploaded file payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Source column, when the payload named one.
    pub column: Option<String>,
    /// One label per value; empty when the payload had none.
    pub labels: Vec<String>,
    /// Numeric values in payload order.
    pub values: Vec<f64>,
}

impl Series {
    /// Extract the first numeric series from a loaded payload.
    ///
    /// Accepted shapes:
    /// - `[1, 2, 3]`
    /// - `{"values": [...], "labels": [...]}` (labels optional)
    /// - `[{"month": "Jan", "sales": 10}, ...]` or the same under `"rows"`;
    ///   the first numeric field becomes the values, the first string field
    ///   the labels.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::Array(items) if items.iter().all(Value::is_number) => {
                Self::unlabelled(items.iter().filter_map(Value::as_f64).collect())
            }
            Value::Array(items) => Self::from_rows(items),
            Value::Object(map) => {
                if let Some(Value::Array(values)) = map.get("values") {
                    let values: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
                    let labels = match map.get("labels") {
                        Some(Value::Array(labels)) if labels.len() == values.len() => {
                            labels.iter().map(label_text).collect()
                        }
                        _ => default_labels(values.len()),
                    };
                    return (!values.is_empty()).then(|| Self {
                        column: map.get("column").and_then(Value::as_str).map(str::to_string),
                        labels,
                        values,
                    });
                }
                match map.get("rows") {
                    Some(Value::Array(rows)) => Self::from_rows(rows),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn unlabelled(values: Vec<f64>) -> Option<Self> {
        (!values.is_empty()).then(|| Self {
            column: None,
            labels: default_labels(values.len()),
            values,
        })
    }

    fn from_rows(rows: &[Value]) -> Option<Self> {
        let first = rows.first()?.as_object()?;
        let column = first
            .iter()
            .find(|(_, v)| v.is_number())
            .map(|(k, _)| k.clone())?;
        let label_column = first
            .iter()
            .find(|(_, v)| v.is_string())
            .map(|(k, _)| k.clone());

        let mut labels = Vec::new();
        let mut values = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let Some(value) = row.get(&column).and_then(Value::as_f64) else {
                continue;
            };
            values.push(value);
            labels.push(
                label_column
                    .as_ref()
                    .and_then(|c| row.get(c))
                    .map(label_text)
                    .unwrap_or_else(|| (i + 1).to_string()),
            );
        }
        (!values.is_empty()).then(|| Self {
            column: Some(column),
            labels,
            values,
        })
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sum of all values.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Arithmetic mean; 0 for an empty series.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.total() / self.values.len() as f64
        }
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / self.values.len() as f64;
        var.sqrt()
    }

    /// Smallest value.
    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest value.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Least-squares line over the index: `(slope, intercept)`.
    pub fn linear_fit(&self) -> (f64, f64) {
        let n = self.values.len() as f64;
        if self.values.len() < 2 {
            return (0.0, self.mean());
        }
        let mean_x = (n - 1.0) / 2.0;
        let mean_y = self.mean();
        let (mut num, mut den) = (0.0, 0.0);
        for (i, y) in self.values.iter().enumerate() {
            let dx = i as f64 - mean_x;
            num += dx * (y - mean_y);
            den += dx * dx;
        }
        let slope = if den == 0.0 { 0.0 } else { num / den };
        (slope, mean_y - slope * mean_x)
    }
}

fn default_labels(len: usize) -> Vec<String> {
    (1..=len).map(|i| i.to_string()).collect()
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Round to two decimals for display and payloads.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
