use crate::dataset::Dataset;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use itertools::Itertools;
use ndarray::Array2;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;
const CLASSES: usize = 10;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte.gz";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte.gz";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte.gz";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte.gz";

/// MNIST train and test sets as row-per-image datasets: 784 pixel intensities scaled to `[0, 1]`
/// and a one-hot row over the ten digits.
pub struct MnistData {
    pub training_data: Dataset,
    pub test_data: Dataset,
}

impl MnistData {
    /// Loads the four gzipped IDX files from `dir`, keeping at most `train_limit` / `test_limit`
    /// leading rows of each set.
    pub fn load(
        dir: impl AsRef<Path>,
        train_limit: Option<usize>,
        test_limit: Option<usize>,
    ) -> Result<MnistData> {
        let dir = dir.as_ref();
        let training_data = decode(
            &read_gz(&dir.join(TRAIN_IMAGES))?,
            &read_gz(&dir.join(TRAIN_LABELS))?,
            train_limit,
        )?;
        let test_data = decode(
            &read_gz(&dir.join(TEST_IMAGES))?,
            &read_gz(&dir.join(TEST_LABELS))?,
            test_limit,
        )?;

        Ok(MnistData {
            training_data,
            test_data,
        })
    }
}

fn read_gz(path: &Path) -> Result<Vec<u8>> {
    // Every MNIST file is gzip compressed; inflate it whole.
    let file = File::open(path).map_err(|source| Error::io(path, source))?;
    let mut bytes = Vec::new();
    GzDecoder::new(file)
        .read_to_end(&mut bytes)
        .map_err(|source| Error::io(path, source))?;
    Ok(bytes)
}

/// Reads `count` big-endian u32 header fields from the front of `bytes`.
fn header(bytes: &[u8], count: usize) -> Result<Vec<u32>> {
    if bytes.len() < count * 4 {
        return Err(Error::Mnist(format!(
            "file of {} bytes is too short for its header",
            bytes.len()
        )));
    }
    Ok(bytes[..count * 4]
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Decodes raw (already decompressed) IDX image and label bytes.
pub fn decode(image_bytes: &[u8], label_bytes: &[u8], limit: Option<usize>) -> Result<Dataset> {
    // Image header: magic, image count, rows, columns. Label header: magic, label count.
    let image_header = header(image_bytes, 4)?;
    let label_header = header(label_bytes, 2)?;
    if image_header[0] != IMAGE_MAGIC {
        return Err(Error::Mnist(format!(
            "image magic number {} (expected {IMAGE_MAGIC})",
            image_header[0]
        )));
    }
    if label_header[0] != LABEL_MAGIC {
        return Err(Error::Mnist(format!(
            "label magic number {} (expected {LABEL_MAGIC})",
            label_header[0]
        )));
    }

    // Both files must describe the same number of samples.
    let images = image_header[1] as usize;
    let pixels = image_header[2] as usize * image_header[3] as usize;
    if images != label_header[1] as usize {
        return Err(Error::Mnist(format!(
            "{images} images but {} labels",
            label_header[1]
        )));
    }
    if pixels == 0 {
        return Err(Error::Mnist("images have zero pixels".into()));
    }

    // Pixel data follows the 16 byte image header, labels the 8 byte label header.
    let image_data = &image_bytes[16..];
    let label_data = &label_bytes[8..];
    if image_data.len() < images * pixels || label_data.len() < images {
        return Err(Error::Mnist(format!(
            "header promises {images} images but the data is truncated"
        )));
    }

    // Keep only the leading `limit` samples.
    let rows = limit.map_or(images, |limit| limit.min(images));
    if rows == 0 {
        return Err(Error::EmptyDataset);
    }

    // One row per image, intensities scaled from 0..=255 to [0, 1].
    let mut features = Vec::with_capacity(rows * pixels);
    for image in image_data.iter().chunks(pixels).into_iter().take(rows) {
        features.extend(image.map(|&value| f64::from(value) / 255.0));
    }

    // One-hot digit rows.
    let mut labels = Array2::zeros((rows, CLASSES));
    for (mut row, &digit) in labels.rows_mut().into_iter().zip(label_data) {
        let digit = digit as usize;
        if digit >= CLASSES {
            return Err(Error::InvalidLabel {
                label: digit as f64,
            });
        }
        row[digit] = 1.0;
    }

    let features = Array2::from_shape_vec((rows, pixels), features)
        .map_err(|err| Error::shape("MNIST images", rows * pixels, err))?;
    Dataset::new(features, labels)
}
