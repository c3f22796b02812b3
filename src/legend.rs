use crate::metric::{Labels, METRIC_NAME_LABEL};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static LEGEND_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").expect("legend placeholder regex"));

/// Names value columns after the series they hold.
#[derive(Debug, Clone, Copy)]
pub struct Legend<'a> {
    format: Option<&'a str>,
    expr: &'a str,
}

impl<'a> Legend<'a> {
    pub fn new(format: Option<&'a str>, expr: &'a str) -> Self {
        Self {
            format: format.filter(|f| !f.is_empty()),
            expr,
        }
    }

    pub fn column_name(&self, labels: &Labels) -> String {
        if let Some(format) = self.format {
            return LEGEND_PLACEHOLDER
                .replace_all(format, |caps: &Captures| {
                    labels.get(&caps[1]).cloned().unwrap_or_default()
                })
                .into_owned();
        }
        if labels.is_empty() {
            return if self.expr.is_empty() {
                "{}".to_string()
            } else {
                self.expr.to_string()
            };
        }
        metric_string(labels)
    }
}

/// `name{label="value", ...}`, the way Prometheus prints a series.
pub fn metric_string(labels: &Labels) -> String {
    let name = labels.get(METRIC_NAME_LABEL).map(String::as_str).unwrap_or("");
    let rest: Vec<String> = labels
        .iter()
        .filter(|(k, _)| k.as_str() != METRIC_NAME_LABEL)
        .map(|(k, v)| format!("{}={}", k, quote(v)))
        .collect();
    if rest.is_empty() && !name.is_empty() {
        return name.to_string();
    }
    format!("{}{{{}}}", name, rest.join(", "))
}

// Go-style quoting, as Prometheus uses when printing label values.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_ascii_control() => quoted.push_str(&format!("\\x{:02x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
