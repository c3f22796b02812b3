use crate::{
    grid::TimeGrid,
    legend::Legend,
    metric::{Labels, Series},
};
use log::debug;
use serde::{ser::SerializeSeq, Serialize, Serializer};
use std::collections::BTreeSet;

/// Tabular result of one query: a shared timestamp column plus one value
/// column per series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub ref_id: String,
    // Unix milliseconds, strictly increasing.
    pub timestamps: Vec<i64>,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub labels: Labels,
    // One entry per timestamp; None where the series has no sample.
    #[serde(serialize_with = "serialize_values")]
    pub values: Vec<Option<f64>>,
}

impl Frame {
    pub fn rows(&self) -> usize {
        self.timestamps.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl Column {
    pub fn missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

/// Lays every series out on `grid`. Positions without a sample stay empty;
/// samples that are not exactly on a grid point are dropped.
pub fn assemble_range(
    ref_id: &str,
    grid: &TimeGrid,
    series: Vec<Series>,
    legend: &Legend,
) -> Frame {
    let columns = series
        .into_iter()
        .map(|series| {
            let mut values = vec![None; grid.len()];
            let mut off_grid = 0;
            for sample in &series.samples {
                match grid.position(sample.timestamp) {
                    Some(i) => values[i] = Some(sample.value),
                    None => off_grid += 1,
                }
            }
            if off_grid > 0 {
                debug!(
                    "query {}: dropped {} samples off the {}ms grid for {:?}",
                    ref_id,
                    off_grid,
                    grid.step(),
                    series.labels
                );
            }
            Column {
                name: legend.column_name(&series.labels),
                labels: series.labels,
                values,
            }
        })
        .collect();

    Frame {
        ref_id: ref_id.to_string(),
        timestamps: grid.timestamps().collect(),
        columns,
    }
}

/// Instant results have no grid: there is one row per distinct sample
/// timestamp, which is normally just the evaluation time.
pub fn assemble_instant(ref_id: &str, series: Vec<Series>, legend: &Legend) -> Frame {
    let timestamps: Vec<i64> = series
        .iter()
        .flat_map(|s| s.samples.iter().map(|sample| sample.timestamp))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let columns = series
        .into_iter()
        .map(|series| {
            let mut values = vec![None; timestamps.len()];
            for sample in &series.samples {
                if let Ok(i) = timestamps.binary_search(&sample.timestamp) {
                    values[i] = Some(sample.value);
                }
            }
            Column {
                name: legend.column_name(&series.labels),
                labels: series.labels,
                values,
            }
        })
        .collect();

    Frame {
        ref_id: ref_id.to_string(),
        timestamps,
        columns,
    }
}

// JSON has no NaN or Infinity. Sentinels are written as the tokens the
// backend uses, so they stay distinct from missing values (null).
fn serialize_values<S: Serializer>(
    values: &[Option<f64>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for value in values {
        match value {
            None => seq.serialize_element(&None::<f64>)?,
            Some(v) if v.is_nan() => seq.serialize_element("NaN")?,
            Some(v) if *v == f64::INFINITY => seq.serialize_element("+Inf")?,
            Some(v) if *v == f64::NEG_INFINITY => seq.serialize_element("-Inf")?,
            Some(v) => seq.serialize_element(v)?,
        }
    }
    seq.end()
}

#[cfg(test)]
pub mod tests {
    use super::{assemble_instant, assemble_range, Frame};
    use crate::{
        grid::TimeGrid,
        legend::Legend,
        metric::{Labels, Sample, Series},
    };

    const T0: i64 = 1641889530000;

    fn series(pairs: &[(&str, &str)], samples: &[(i64, f64)]) -> Series {
        Series::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            samples
                .iter()
                .map(|&(timestamp, value)| Sample { timestamp, value })
                .collect(),
        )
    }

    fn legend() -> Legend<'static> {
        Legend::new(None, "go_goroutines")
    }

    #[test]
    fn test_assemble_range_full() {
        let grid = TimeGrid::new(T0, T0 + 2000, 1000).unwrap();
        let frame = assemble_range(
            "A",
            &grid,
            vec![series(
                &[("__name__", "go_goroutines"), ("job", "prometheus")],
                &[(T0, 21.0), (T0 + 1000, 32.0), (T0 + 2000, 43.0)],
            )],
            &legend(),
        );

        assert_eq!(frame.ref_id, "A");
        assert_eq!(frame.rows(), 3);
        assert_eq!(frame.timestamps, vec![T0, T0 + 1000, T0 + 2000]);
        assert_eq!(frame.columns.len(), 1);
        let column = &frame.columns[0];
        assert_eq!(column.name, r#"go_goroutines{job="prometheus"}"#);
        assert_eq!(column.labels["job"], "prometheus");
        assert_eq!(column.values, vec![Some(21.0), Some(32.0), Some(43.0)]);
        assert_eq!(column.missing(), 0);
    }

    #[test]
    fn test_assemble_range_gaps() {
        let grid = TimeGrid::new(T0, T0 + 8000, 1000).unwrap();
        let frame = assemble_range(
            "A",
            &grid,
            vec![series(
                &[("job", "prometheus")],
                &[(T0 + 3000, 21.0), (T0 + 4000, 32.0), (T0 + 7000, 43.0)],
            )],
            &legend(),
        );

        assert_eq!(frame.rows(), 9);
        let column = &frame.columns[0];
        assert_eq!(column.values.len(), 9);
        assert_eq!(
            column.values,
            vec![
                None,
                None,
                None,
                Some(21.0),
                Some(32.0),
                None,
                None,
                Some(43.0),
                None
            ]
        );
        assert_eq!(column.missing(), 6);
    }

    #[test]
    fn test_assemble_range_drops_off_grid_samples() {
        let grid = TimeGrid::new(T0, T0 + 2000, 1000).unwrap();
        let frame = assemble_range(
            "A",
            &grid,
            vec![series(
                &[],
                &[
                    (T0 - 1000, 1.0),
                    (T0 + 500, 2.0),
                    (T0 + 1000, 3.0),
                    (T0 + 9000, 4.0),
                ],
            )],
            &legend(),
        );
        assert_eq!(frame.columns[0].values, vec![None, Some(3.0), None]);
    }

    #[test]
    fn test_assemble_range_sentinels() {
        let grid = TimeGrid::new(T0, T0 + 2000, 1000).unwrap();
        let frame = assemble_range(
            "A",
            &grid,
            vec![
                series(
                    &[],
                    &[
                        (T0, f64::INFINITY),
                        (T0 + 1000, f64::INFINITY),
                        (T0 + 2000, f64::INFINITY),
                    ],
                ),
                series(&[("job", "x")], &[(T0, f64::NAN), (T0 + 1000, f64::NEG_INFINITY)]),
            ],
            &Legend::new(None, "1 / 0"),
        );

        assert_eq!(frame.columns[0].name, "1 / 0");
        assert_eq!(frame.columns[0].values, vec![Some(f64::INFINITY); 3]);
        assert!(frame.columns[1].values[0].unwrap().is_nan());
        assert_eq!(frame.columns[1].values[1], Some(f64::NEG_INFINITY));
        assert_eq!(frame.columns[1].values[2], None);
    }

    #[test]
    fn test_assemble_range_empty() {
        let grid = TimeGrid::new(T0, T0 + 2000, 1000).unwrap();
        let frame = assemble_range("A", &grid, vec![], &legend());
        assert!(frame.columns.is_empty());
        assert_eq!(frame.rows(), 3);
    }

    #[test]
    fn test_assemble_range_multiple_series() {
        let grid = TimeGrid::new(T0, T0 + 1000, 1000).unwrap();
        let frame = assemble_range(
            "A",
            &grid,
            vec![
                series(&[("instance", "a")], &[(T0, 1.0)]),
                series(&[("instance", "b")], &[(T0 + 1000, 2.0)]),
            ],
            &Legend::new(Some("{{instance}}"), "up"),
        );
        assert_eq!(frame.column("a").unwrap().values, vec![Some(1.0), None]);
        assert_eq!(frame.column("b").unwrap().values, vec![None, Some(2.0)]);
        assert!(frame.column("c").is_none());
    }

    #[test]
    fn test_assemble_instant() {
        let frame = assemble_instant(
            "B",
            vec![
                series(&[("instance", "a")], &[(T0, 1.0)]),
                series(&[("instance", "b")], &[(T0, f64::NAN)]),
            ],
            &legend(),
        );
        assert_eq!(frame.timestamps, vec![T0]);
        assert_eq!(frame.columns.len(), 2);
        assert_eq!(frame.columns[0].values, vec![Some(1.0)]);
        assert!(frame.columns[1].values[0].unwrap().is_nan());
    }

    #[test]
    fn test_assemble_instant_distinct_timestamps() {
        let frame = assemble_instant(
            "B",
            vec![
                series(&[("instance", "a")], &[(T0 + 1000, 1.0)]),
                series(&[("instance", "b")], &[(T0, 2.0)]),
            ],
            &legend(),
        );
        assert_eq!(frame.timestamps, vec![T0, T0 + 1000]);
        assert_eq!(frame.columns[0].values, vec![None, Some(1.0)]);
        assert_eq!(frame.columns[1].values, vec![Some(2.0), None]);
    }

    #[test]
    fn test_assemble_instant_empty() {
        let frame = assemble_instant("B", vec![], &legend());
        assert_eq!(frame.rows(), 0);
        assert!(frame.columns.is_empty());
    }

    #[test]
    fn test_frame_json() {
        let mut labels = Labels::new();
        labels.insert("job".to_string(), "x".to_string());
        let frame = Frame {
            ref_id: "A".to_string(),
            timestamps: vec![1000, 2000, 3000, 4000, 5000],
            columns: vec![super::Column {
                name: "x".to_string(),
                labels,
                values: vec![
                    Some(1.5),
                    None,
                    Some(f64::NAN),
                    Some(f64::INFINITY),
                    Some(f64::NEG_INFINITY),
                ],
            }],
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"refId":"A","timestamps":[1000,2000,3000,4000,5000],"columns":[{"name":"x","labels":{"job":"x"},"values":[1.5,null,"NaN","+Inf","-Inf"]}]}"#
        );
    }
}
