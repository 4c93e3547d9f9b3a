use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, info};

use crate::data::idx;
use crate::error::DatasetError;
use crate::math::tensor::Tensor;

pub const MNIST_CLASSES: usize = 10;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// Single-channel images with one class index each.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledImages {
    pub height: usize,
    pub width: usize,
    /// `len() * height * width` values in `[0, 1]`, row-major per image.
    pub pixels: Vec<f64>,
    pub labels: Vec<usize>,
}

impl LabeledImages {
    pub fn new(
        height: usize,
        width: usize,
        pixels: Vec<f64>,
        labels: Vec<usize>,
    ) -> Result<LabeledImages, DatasetError> {
        if pixels.len() != labels.len() * height * width {
            return Err(DatasetError::Format {
                path: PathBuf::from("<memory>"),
                reason: format!(
                    "{} pixels do not make {} images of {}×{}",
                    pixels.len(), labels.len(), height, width
                ),
            });
        }
        Ok(LabeledImages { height, width, pixels, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn image(&self, i: usize) -> &[f64] {
        let n = self.height * self.width;
        &self.pixels[i * n..(i + 1) * n]
    }
}

/// One mini-batch: images as `[N, 1, H, W]` plus their labels.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Tensor,
    pub labels: Vec<usize>,
}

/// A finite pass over a split, yielding batches in a fixed order.
/// The last batch may be smaller than `batch_size`.
pub struct Batches<'a> {
    data: &'a LabeledImages,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;

        let (h, w) = (self.data.height, self.data.width);
        let mut pixels = Vec::with_capacity(indices.len() * h * w);
        let mut labels = Vec::with_capacity(indices.len());
        for &i in indices {
            pixels.extend_from_slice(self.data.image(i));
            labels.push(self.data.labels[i]);
        }
        Some(Batch {
            images: Tensor::from_vec(&[indices.len(), 1, h, w], pixels),
            labels,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.cursor + self.batch_size - 1) / self.batch_size;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Batches<'a> {}

/// A restartable stream over one split. Each call to `epoch` starts a new
/// pass; shuffled splits draw a fresh permutation from their seeded RNG.
pub struct Split<'a> {
    data: &'a LabeledImages,
    batch_size: usize,
    shuffle: Option<StdRng>,
}

impl<'a> Split<'a> {
    pub fn epoch(&mut self) -> Batches<'a> {
        let mut order: Vec<usize> = (0..self.data.len()).collect();
        if let Some(rng) = self.shuffle.as_mut() {
            order.shuffle(rng);
        }
        Batches { data: self.data, order, batch_size: self.batch_size, cursor: 0 }
    }

    /// Number of batches one epoch yields.
    pub fn batch_count(&self) -> usize {
        (self.data.len() + self.batch_size - 1) / self.batch_size
    }

    pub fn sample_count(&self) -> usize {
        self.data.len()
    }
}

/// MNIST handwritten digits: a training split and a validation split (the
/// standard 10k test set), served in batches.
#[derive(Debug, Clone)]
pub struct Mnist {
    pub training: LabeledImages,
    pub validation: LabeledImages,
    pub batch_size: usize,
    pub seed: u64,
}

impl Mnist {
    /// Loads the four standard IDX files from `dir`. Each may also be present
    /// gzip-compressed with a `.gz` suffix.
    pub fn load<P: AsRef<Path>>(dir: P, batch_size: usize, seed: u64) -> Result<Mnist, DatasetError> {
        let dir = dir.as_ref();
        info!(dir = %dir.display(), "loading MNIST");
        let training = load_split(dir, TRAIN_IMAGES, TRAIN_LABELS)?;
        let validation = load_split(dir, TEST_IMAGES, TEST_LABELS)?;
        info!(
            training = training.len(),
            validation = validation.len(),
            "MNIST loaded"
        );
        Mnist::from_splits(training, validation, batch_size, seed)
    }

    pub fn from_splits(
        training: LabeledImages,
        validation: LabeledImages,
        batch_size: usize,
        seed: u64,
    ) -> Result<Mnist, DatasetError> {
        if batch_size == 0 {
            return Err(DatasetError::InvalidBatchSize);
        }
        Ok(Mnist { training, validation, batch_size, seed })
    }

    /// Training stream; reshuffled on every epoch.
    pub fn training(&self) -> Split<'_> {
        Split {
            data: &self.training,
            batch_size: self.batch_size,
            shuffle: Some(StdRng::seed_from_u64(self.seed)),
        }
    }

    /// Validation stream; always in file order.
    pub fn validation(&self) -> Split<'_> {
        Split { data: &self.validation, batch_size: self.batch_size, shuffle: None }
    }
}

fn load_split(dir: &Path, images_name: &str, labels_name: &str) -> Result<LabeledImages, DatasetError> {
    let (images_path, image_bytes) = read_idx_file(dir, images_name)?;
    let (labels_path, label_bytes) = read_idx_file(dir, labels_name)?;

    let images = idx::parse_images(&image_bytes)
        .map_err(|reason| DatasetError::Format { path: images_path.clone(), reason })?;
    let labels = idx::parse_labels(&label_bytes, MNIST_CLASSES)
        .map_err(|reason| DatasetError::Format { path: labels_path.clone(), reason })?;

    if images.count != labels.len() {
        return Err(DatasetError::Format {
            path: labels_path,
            reason: format!(
                "image file declares {} items but label file declares {}",
                images.count,
                labels.len()
            ),
        });
    }
    LabeledImages::new(images.rows, images.cols, images.pixels, labels)
}

/// Reads `dir/name`, falling back to `dir/name.gz`.
fn read_idx_file(dir: &Path, name: &str) -> Result<(PathBuf, Vec<u8>), DatasetError> {
    let plain = dir.join(name);
    let gz = dir.join(format!("{}.gz", name));
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| DatasetError::Io { path, source }
    };

    let mut bytes = Vec::new();
    if plain.is_file() {
        debug!(path = %plain.display(), "reading IDX file");
        File::open(&plain)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(io_err(&plain))?;
        Ok((plain, bytes))
    } else if gz.is_file() {
        debug!(path = %gz.display(), "reading gzipped IDX file");
        File::open(&gz)
            .and_then(|f| GzDecoder::new(f).read_to_end(&mut bytes))
            .map_err(io_err(&gz))?;
        Ok((gz, bytes))
    } else {
        Err(DatasetError::Io {
            path: plain,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "neither raw nor .gz file found"),
        })
    }
}
