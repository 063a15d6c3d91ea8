use crate::error::{Error, Result};
use ndarray::{Array1, Array2, Axis};

/// Returns `(x - mean(x)) / std(x)` with a single mean and population standard deviation taken
/// over every element of `x`, not per feature column. This is the normalization the training
/// path uses; it keeps results comparable with the recorded experiments. `scale_min_max` is the
/// per-column alternative.
pub fn scale_global(x: &Array2<f64>) -> Result<Array2<f64>> {
    let mean = x.mean().ok_or(Error::EmptyDataset)?;
    let std = x.std(0.0);
    if std == 0.0 || !std.is_finite() {
        return Err(Error::DegenerateFeatures { std });
    }
    Ok(x.mapv(|v| (v - mean) / std))
}

/// Per-column minimum and maximum of `x`.
pub fn column_min_max(x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
    if x.nrows() == 0 {
        return Err(Error::EmptyDataset);
    }
    let min = x.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));
    let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));
    Ok((min, max))
}

/// Per-column min-max scaling into `[0, 1]` with externally supplied bounds, so a test set can be
/// scaled with the training set's range. Constant columns map to zero.
pub fn scale_min_max(x: &Array2<f64>, min: &Array1<f64>, max: &Array1<f64>) -> Result<Array2<f64>> {
    if min.len() != x.ncols() || max.len() != x.ncols() {
        return Err(Error::shape(
            "scaling bounds",
            x.ncols(),
            format!("{} / {}", min.len(), max.len()),
        ));
    }
    let range = (max - min).mapv(|r| if r == 0.0 { 1.0 } else { r });
    Ok((x - min) / &range)
}
