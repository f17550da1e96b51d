//! Column statistics and previews of a frame.

use crate::node::{ColumnStat, Moments, Preview};
use polars::prelude::*;
use rand::Rng;
use serde_json::{Number, Value};
use std::collections::HashMap;

/// Distinct-value key, or `None` for a missing value (null or NaN).
fn value_key(value: &AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::Float64(v) if v.is_nan() => None,
        AnyValue::Float32(v) if v.is_nan() => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        other => Some(other.to_string()),
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn json_value(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int32(v) => v.into(),
        AnyValue::Int64(v) => v.into(),
        AnyValue::UInt32(v) => v.into(),
        AnyValue::UInt64(v) => v.into(),
        AnyValue::Float32(v) => float(f64::from(v)),
        AnyValue::Float64(v) => float(v),
        AnyValue::String(s) => s.into(),
        AnyValue::StringOwned(s) => s.as_str().into(),
        other => other.to_string().into(),
    }
}

fn moments(series: &Series) -> PolarsResult<Moments> {
    let cast = series.cast(&DataType::Float64)?;
    let values: Vec<f64> = cast.f64()?.into_iter().flatten().filter(|v| !v.is_nan()).collect();
    let values = Float64Chunked::from_vec(series.name().clone(), values);
    let quantile = |q| values.quantile(q, QuantileMethod::Linear);
    Ok(Moments {
        count: values.len(),
        mean: values.mean(),
        std: values.std(1),
        min: values.min(),
        q25: quantile(0.25)?,
        q50: quantile(0.5)?,
        q75: quantile(0.75)?,
        max: values.max(),
    })
}

/// Statistics for one column. `top` keeps the `top` most frequent values;
/// equal counts keep the order in which values first appear.
pub fn column_stat(series: &Series, top: usize) -> PolarsResult<ColumnStat> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut missing = 0;
    for row in 0..series.len() {
        match value_key(&series.get(row)?) {
            Some(key) => counts.entry(key).or_insert((0, row)).0 += 1,
            None => missing += 1,
        }
    }
    let nunique = counts.len();
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|(_, (a, first_a)), (_, (b, first_b))| b.cmp(a).then(first_a.cmp(first_b)));
    let dtype = series.dtype();
    let moments = match dtype.is_integer() || dtype.is_float() {
        true => Some(moments(series)?),
        false => None,
    };
    Ok(ColumnStat {
        name: series.name().to_string(),
        dtype: dtype.to_string(),
        missing,
        nunique,
        top: ranked.into_iter().take(top).map(|(value, (count, _))| (value, count)).collect(),
        moments,
    })
}

/// Statistics for every column, in frame order.
pub fn describe(df: &DataFrame, top: usize) -> PolarsResult<Vec<ColumnStat>> {
    df.get_columns().iter().map(|column| column_stat(column.as_materialized_series(), top)).collect()
}

fn preview(df: &DataFrame, index: Vec<usize>) -> PolarsResult<Preview> {
    let series: Vec<_> = df.get_columns().iter().map(Column::as_materialized_series).collect();
    let data = index
        .iter()
        .map(|&row| series.iter().map(|s| s.get(row).map(json_value)).collect::<PolarsResult<Vec<_>>>())
        .collect::<PolarsResult<Vec<_>>>()?;
    Ok(Preview { columns: df.get_column_names_str().into_iter().map(str::to_string).collect(), index, data })
}

/// The first `n` rows.
pub fn head(df: &DataFrame, n: usize) -> PolarsResult<Preview> {
    preview(df, (0..n.min(df.height())).collect())
}

/// `n` rows drawn without replacement, in their original order.
pub fn sample(df: &DataFrame, n: usize, rng: &mut impl Rng) -> PolarsResult<Preview> {
    let mut index = rand::seq::index::sample(rng, df.height(), n.min(df.height())).into_vec();
    index.sort_unstable();
    preview(df, index)
}
