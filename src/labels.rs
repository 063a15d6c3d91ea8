use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Maps raw integer class labels onto one-hot rows.
///
/// Labels are first passed through the remap table, then must fall in `1..=classes`; label `k`
/// sets column `k - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: usize,
    remap: Vec<(i64, i64)>,
}

impl LabelEncoder {
    pub fn new(classes: usize) -> LabelEncoder {
        LabelEncoder {
            classes,
            remap: Vec::new(),
        }
    }

    /// The satellite image data set labels its classes `{1, 2, 3, 4, 5, 7}`. Class 7 is folded
    /// onto 6 so the one-hot matrix has six dense columns.
    pub fn satellite() -> LabelEncoder {
        LabelEncoder::new(6).with_remap(7, 6)
    }

    pub fn with_remap(mut self, from: i64, to: i64) -> LabelEncoder {
        self.remap.push((from, to));
        self
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Resolves a raw label to its zero-based column index.
    pub fn class_index(&self, label: f64) -> Result<usize> {
        if label.fract() != 0.0 || !label.is_finite() {
            return Err(Error::InvalidLabel { label });
        }
        let raw = label as i64;
        let mapped = self
            .remap
            .iter()
            .find(|(from, _)| *from == raw)
            .map_or(raw, |(_, to)| *to);

        if mapped < 1 || mapped as usize > self.classes {
            return Err(Error::InvalidLabel { label });
        }
        Ok(mapped as usize - 1)
    }

    pub fn one_hot(&self, labels: &Array1<f64>) -> Result<Array2<f64>> {
        let mut encoded = Array2::zeros((labels.len(), self.classes));
        for (mut row, &label) in encoded.rows_mut().into_iter().zip(labels.iter()) {
            row[self.class_index(label)?] = 1.0;
        }
        Ok(encoded)
    }
}

/// Column index of the largest value in each row. Ties go to the lowest index.
pub fn argmax_rows(values: ArrayView2<'_, f64>) -> Array1<usize> {
    values.map_axis(Axis(1), |row| {
        row.iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(best, best_value), (index, &value)| {
                if value > best_value {
                    (index, value)
                } else {
                    (best, best_value)
                }
            })
            .0
    })
}
