use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis, s};
use ndarray_rand::rand::{Rng, seq::SliceRandom};
use std::fs;
use std::path::Path;

/// A feature matrix and its one-hot label matrix. Row `i` of `features` always belongs to row
/// `i` of `labels`; the only reordering ever applied is a joint row permutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Array2<f64>,
}

/// A contiguous slice of rows borrowed from a dataset.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub features: ArrayView2<'a, f64>,
    pub labels: ArrayView2<'a, f64>,
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }
}

/// The rows of a whitespace-delimited numeric file, split into the feature columns and the raw
/// class label held in the last column.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTable {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
}

impl Dataset {
    pub fn new(features: Array2<f64>, labels: Array2<f64>) -> Result<Dataset> {
        if features.nrows() == 0 {
            return Err(Error::EmptyDataset);
        }
        if features.nrows() != labels.nrows() {
            return Err(Error::shape(
                "label rows",
                features.nrows(),
                labels.nrows(),
            ));
        }
        if features.ncols() == 0 || labels.ncols() == 0 {
            return Err(Error::shape(
                "dataset columns",
                "at least one feature and one class",
                format!("{} features, {} classes", features.ncols(), labels.ncols()),
            ));
        }
        Ok(Dataset { features, labels })
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &Array2<f64> {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    pub fn feature_count(&self) -> usize {
        self.features.ncols()
    }

    pub fn class_count(&self) -> usize {
        self.labels.ncols()
    }

    /// Returns a copy of the dataset with its rows in a fresh random order. Features and labels
    /// are permuted with the same index vector.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Dataset {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        Dataset {
            features: self.features.select(Axis(0), &order),
            labels: self.labels.select(Axis(0), &order),
        }
    }

    /// Number of full batches of `batch_size` rows. The trailing partial batch is not counted.
    pub fn full_batch_count(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            0
        } else {
            self.len() / batch_size
        }
    }

    /// Iterates the full batches of `batch_size` rows in row order, dropping the trailing
    /// partial batch. Fails if not even one full batch fits.
    pub fn full_batches(&self, batch_size: usize) -> Result<impl Iterator<Item = Batch<'_>>> {
        let count = self.full_batch_count(batch_size);
        if count == 0 {
            return Err(Error::NoFullBatch {
                rows: self.len(),
                batch_size,
            });
        }
        Ok((0..count).map(move |index| {
            let (start, end) = (index * batch_size, (index + 1) * batch_size);
            Batch {
                features: self.features.slice(s![start..end, ..]),
                labels: self.labels.slice(s![start..end, ..]),
            }
        }))
    }

    pub fn as_batch(&self) -> Batch<'_> {
        Batch {
            features: self.features.view(),
            labels: self.labels.view(),
        }
    }
}

/// Reads a whitespace-delimited numeric file whose last column is an integer class label.
pub fn load_labeled_table(path: impl AsRef<Path>) -> Result<LabeledTable> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| Error::io(path, source))?;
    parse_labeled_table(&text, path)
}

fn parse_labeled_table(text: &str, path: &Path) -> Result<LabeledTable> {
    let mut width = None;
    let mut values = Vec::new();
    let mut labels = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let row = line
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| Error::Parse {
                    path: path.to_path_buf(),
                    line: line_number,
                    message: format!("`{token}` is not a number"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let expected = *width.get_or_insert(row.len());
        if row.len() != expected {
            return Err(Error::RaggedRow {
                path: path.to_path_buf(),
                line: line_number,
                expected,
                found: row.len(),
            });
        }
        if expected < 2 {
            return Err(Error::Parse {
                path: path.to_path_buf(),
                line: line_number,
                message: "a row needs at least one feature and a label".to_string(),
            });
        }

        let (features, label) = row.split_at(expected - 1);
        values.extend_from_slice(features);
        labels.push(label[0]);
    }

    let width = width.ok_or(Error::EmptyDataset)?;
    let features = Array2::from_shape_vec((labels.len(), width - 1), values)
        .map_err(|err| Error::shape("feature matrix", labels.len(), err))?;
    Ok(LabeledTable {
        features,
        labels: Array1::from_vec(labels),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
    use proptest::prelude::*;
    use std::io::Write;

    fn ten_rows() -> Dataset {
        let features = Array2::from_shape_fn((10, 2), |(i, j)| (i * 2 + j) as f64);
        let labels = Array2::from_shape_fn((10, 3), |(i, j)| if i % 3 == j { 1.0 } else { 0.0 });
        Dataset::new(features, labels).unwrap()
    }

    #[test]
    fn test_full_batches_drop_partial_tail() {
        let data = ten_rows();
        let batches: Vec<_> = data.full_batches(4).unwrap().collect();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 4));
        assert_eq!(batches[1].features.row(0), data.features().row(4));
    }

    #[test]
    fn test_full_batches_use_every_row_when_divisible() {
        let data = Dataset::new(Array2::zeros((8, 2)), Array2::ones((8, 3))).unwrap();
        let batches: Vec<_> = data.full_batches(4).unwrap().collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 8);
    }

    #[test]
    fn test_no_full_batch_is_an_error() {
        let data = ten_rows();
        assert!(matches!(
            data.full_batches(11),
            Err(Error::NoFullBatch { rows: 10, batch_size: 11 })
        ));
        assert!(data.full_batches(0).is_err());
    }

    #[test]
    fn test_new_rejects_mismatched_rows() {
        let result = Dataset::new(Array2::zeros((3, 2)), Array2::zeros((2, 3)));
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
        assert!(matches!(
            Dataset::new(Array2::zeros((0, 2)), Array2::zeros((0, 3))),
            Err(Error::EmptyDataset)
        ));
    }

    #[test]
    fn test_parse_table_splits_label_column() {
        let table = parse_labeled_table("1 2 3\n4 5 7\n\n", Path::new("t.txt")).unwrap();
        assert_eq!(table.features, array![[1.0, 2.0], [4.0, 5.0]]);
        assert_eq!(table.labels, array![3.0, 7.0]);
    }

    #[test]
    fn test_parse_table_reports_bad_rows() {
        let err = parse_labeled_table("1 2 3\n4 5\n", Path::new("t.txt")).unwrap_err();
        assert!(matches!(
            err,
            Error::RaggedRow {
                line: 2,
                expected: 3,
                found: 2,
                ..
            }
        ));

        let err = parse_labeled_table("1 x 3\n", Path::new("t.txt")).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));

        let err = parse_labeled_table("\n\n", Path::new("t.txt")).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset));
    }

    #[test]
    fn test_load_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.5 1.5 1").unwrap();
        writeln!(file, "2.5 3.5 7").unwrap();
        let table = load_labeled_table(file.path()).unwrap();
        assert_eq!(table.features.dim(), (2, 2));
        assert_eq!(table.labels[1], 7.0);

        let missing = load_labeled_table("/definitely/not/here.txt");
        assert!(matches!(missing, Err(Error::Io { .. })));
    }

    proptest! {
        #[test]
        fn prop_shuffle_keeps_rows_paired(seed in any::<u64>(), rows in 1usize..40) {
            let features = Array2::from_shape_fn((rows, 3), |(i, j)| (i * 3 + j) as f64);
            let labels = Array2::from_shape_fn((rows, 2), |(i, j)| (i * 10 + j) as f64);
            let data = Dataset::new(features, labels).unwrap();

            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = data.shuffled(&mut rng);

            let mut seen = vec![false; rows];
            for (f, l) in shuffled.features().rows().into_iter().zip(shuffled.labels().rows()) {
                let original = (f[0] / 3.0) as usize;
                prop_assert_eq!(l[0], (original * 10) as f64);
                prop_assert!(!seen[original]);
                seen[original] = true;
            }
            prop_assert!(seen.into_iter().all(|s| s));
        }
    }
}
