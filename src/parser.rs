use crate::{
    client::{QueryData, RawSample, ResultType},
    metric::{Sample, Series},
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unsupported result type {0}, expected vector or matrix")]
    UnsupportedResultType(ResultType),
    #[error("malformed sample value {0:?}")]
    MalformedValue(String),
}

/// Converts a backend result into series. Only vector and matrix results
/// can be turned into frames; anything else is rejected here.
pub fn parse_result(data: QueryData) -> Result<Vec<Series>, ParseError> {
    match data {
        QueryData::Matrix(result) => result
            .into_iter()
            .map(|series| {
                let samples = series
                    .values
                    .iter()
                    .map(parse_sample)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Series::new(series.metric, samples))
            })
            .collect(),
        QueryData::Vector(result) => result
            .into_iter()
            .map(|series| {
                let sample = parse_sample(&series.value)?;
                Ok(Series::new(series.metric, vec![sample]))
            })
            .collect(),
        other => Err(ParseError::UnsupportedResultType(other.result_type())),
    }
}

pub fn parse_sample(raw: &RawSample) -> Result<Sample, ParseError> {
    Ok(Sample {
        timestamp: seconds_to_millis(raw.0),
        value: parse_value(&raw.1)?,
    })
}

/// Parses a sample value token. `NaN`, `+Inf` and `-Inf` are the only
/// non-numeric tokens accepted.
pub fn parse_value(token: &str) -> Result<f64, ParseError> {
    match token {
        "NaN" => Ok(f64::NAN),
        "+Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => {
            // str::parse also takes "inf", "infinity" and "nan" in any case.
            if token
                .chars()
                .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
            {
                return Err(ParseError::MalformedValue(token.to_string()));
            }
            token
                .parse::<f64>()
                .map_err(|_| ParseError::MalformedValue(token.to_string()))
        }
    }
}

// Wire timestamps are float seconds; rounding keeps values such as
// 1641889530.123 on the millisecond they name.
pub fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}
