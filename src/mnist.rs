use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use itertools::Itertools;
use log::{debug, info};
use ndarray::{Array, Array2, ArrayView1, Axis, concatenate};
use ndarray_rand::rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

pub const IMAGE_SIDE: usize = 28;
pub const PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const CLASSES: usize = 10;

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;

// Every MNIST digit, one image per row with pixels scaled to [0, 1], alongside its label.
pub struct MnistCorpus {
    pub images: Array2<f64>,
    pub labels: Vec<u8>,
}

// One side of the train/test split in the layout the network consumes: every column of inputs is
// a [784 x 1] image and the matching column of targets is its one-hot [10 x 1] label.
pub struct LabelledSet {
    pub inputs: Array2<f64>,
    pub targets: Array2<f64>,
    pub labels: Vec<u8>,
}

impl LabelledSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub struct MnistData {
    pub training: LabelledSet,
    pub test: LabelledSet,
}

impl MnistCorpus {
    // Load the training and t10k files from data_dir and merge them into the full 70000 digit
    // corpus.
    pub fn load(data_dir: &Path) -> Result<MnistCorpus> {
        let mut corpus = MnistCorpus::from_idx(
            &read_gz(&data_dir.join("train-images-idx3-ubyte.gz"))?,
            &read_gz(&data_dir.join("train-labels-idx1-ubyte.gz"))?,
        )?;
        let test_corpus = MnistCorpus::from_idx(
            &read_gz(&data_dir.join("t10k-images-idx3-ubyte.gz"))?,
            &read_gz(&data_dir.join("t10k-labels-idx1-ubyte.gz"))?,
        )?;
        corpus.append(test_corpus)?;

        info!(
            "loaded {} MNIST digits from {}",
            corpus.len(),
            data_dir.display()
        );
        Ok(corpus)
    }

    // Take the raw bytes of an IDX image file and an IDX label file, and convert them into a
    // corpus. The image header is four big-endian u32s (magic 2051, image count, rows, columns)
    // and the label header is two (magic 2049, label count).
    pub fn from_idx(image_bytes: &[u8], label_bytes: &[u8]) -> Result<MnistCorpus> {
        let mut image_bytes_iter = image_bytes.iter().copied();
        let mut label_bytes_iter = label_bytes.iter().copied();

        // Read the headers through mutable references so the same iterators can be reused for the
        // data bytes afterwards. If either magic number is wrong, an incorrect file has been
        // provided, so bail out before touching the body.
        let [magic, images, rows, columns] = read_header::<4>(&mut image_bytes_iter)?;
        if magic != IMAGE_MAGIC {
            return Err(Error::InvalidIdx(format!(
                "image file magic number is {magic}, expected {IMAGE_MAGIC}"
            )));
        }
        let [magic, labels] = read_header::<2>(&mut label_bytes_iter)?;
        if magic != LABEL_MAGIC {
            return Err(Error::InvalidIdx(format!(
                "label file magic number is {magic}, expected {LABEL_MAGIC}"
            )));
        }
        if images != labels {
            return Err(Error::InvalidIdx(format!(
                "{images} images but {labels} labels"
            )));
        }

        let images = images as usize;
        let pixels_per_image = rows as usize * columns as usize;
        if pixels_per_image != PIXELS {
            return Err(Error::InvalidIdx(format!(
                "images are {rows}x{columns}, expected {IMAGE_SIDE}x{IMAGE_SIDE}"
            )));
        }
        // The header's counts must account for every remaining byte, otherwise the file was cut
        // short (or has trailing junk) and the chunking below would silently misalign.
        if image_bytes_iter.len() != images * pixels_per_image || label_bytes_iter.len() != images {
            return Err(Error::InvalidIdx(format!(
                "file bodies are truncated or padded for {images} samples"
            )));
        }
        debug!("parsing {images} images of {rows}x{columns}");

        // Both iterators have had their headers consumed and nothing else, so walk the image bytes
        // in chunks of one image each, paired with the label of that image.
        let mut pixels = Vec::with_capacity(images * pixels_per_image);
        let mut label_values = Vec::with_capacity(images);
        for (image_chunk, label) in image_bytes_iter
            .chunks(pixels_per_image)
            .into_iter()
            .zip(label_bytes_iter)
        {
            if usize::from(label) >= CLASSES {
                return Err(Error::InvalidIdx(format!("label {label} is not a digit")));
            }
            // Scale each byte from 0..=255 down to 0.0..=1.0 and append the image as the next row of
            // the flat pixel buffer, which is reshaped into an [images x 784] array at the end.
            pixels.extend(image_chunk.map(|value| f64::from(value) / 255.0));
            label_values.push(label);
        }

        Ok(MnistCorpus {
            images: Array2::from_shape_vec((images, pixels_per_image), pixels)?,
            labels: label_values,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn append(&mut self, other: MnistCorpus) -> Result<()> {
        self.images = concatenate(Axis(0), &[self.images.view(), other.images.view()])?;
        self.labels.extend(other.labels);
        Ok(())
    }
}

// Read a whole gzip-compressed file into memory.
pub fn read_gz(path: &Path) -> Result<Vec<u8>> {
    let io_error = |source| Error::Io {
        path: PathBuf::from(path),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    let mut bytes = Vec::new();
    GzDecoder::new(file)
        .read_to_end(&mut bytes)
        .map_err(io_error)?;
    Ok(bytes)
}

// Read a bare 28x28 greyscale bitmap (784 bytes, row-major, 0 is background) as a [784 x 1] network
// input.
pub fn read_raw_image(path: &Path) -> Result<Array2<f64>> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: PathBuf::from(path),
        source,
    })?;
    if bytes.len() != PIXELS {
        return Err(Error::InvalidImage(format!(
            "expected {PIXELS} bytes ({IMAGE_SIDE}x{IMAGE_SIDE} image), got {}",
            bytes.len()
        )));
    }
    Ok(Array2::from_shape_vec(
        (PIXELS, 1),
        bytes.into_iter().map(|value| f64::from(value) / 255.0).collect(),
    )?)
}

// Consume N big-endian u32s from the front of an IDX byte stream.
fn read_header<const N: usize>(bytes: &mut impl Iterator<Item = u8>) -> Result<[u32; N]> {
    let mut header = [0; N];
    for field in header.iter_mut() {
        let mut word = [0; 4];
        for byte in word.iter_mut() {
            *byte = bytes
                .next()
                .ok_or_else(|| Error::InvalidIdx("header is truncated".to_string()))?;
        }
        *field = u32::from_be_bytes(word);
    }
    Ok(header)
}

// Turn labels into a [classes x m] array where column j is 0.0 everywhere except in the row
// corresponding to labels[j], whose value is 1.0.
pub fn one_hot(labels: &[u8], classes: usize) -> Array2<f64> {
    Array::from_shape_fn((classes, labels.len()), |(i, j)| {
        if i == usize::from(labels[j]) {
            1.0
        } else {
            0.0
        }
    })
}

// Shuffle the corpus with a seeded RNG and hold out ceil(test_size * n) samples for testing.
pub fn train_test_split(corpus: &MnistCorpus, test_size: f64, seed: u64) -> Result<MnistData> {
    if corpus.is_empty() {
        return Err(Error::InvalidConfig("cannot split an empty corpus".to_string()));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::InvalidConfig(format!(
            "test size must lie strictly between 0 and 1, got {test_size}"
        )));
    }

    let mut indices = (0..corpus.len()).collect::<Vec<_>>();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let test_count = (test_size * corpus.len() as f64).ceil() as usize;
    if test_count >= corpus.len() {
        return Err(Error::InvalidConfig(format!(
            "a test size of {test_size} leaves no training samples out of {}",
            corpus.len()
        )));
    }
    let (test_indices, training_indices) = indices.split_at(test_count);

    let data = MnistData {
        training: labelled_set(corpus, training_indices),
        test: labelled_set(corpus, test_indices),
    };
    info!(
        "split into {} training and {} test samples",
        data.training.len(),
        data.test.len()
    );
    Ok(data)
}

fn labelled_set(corpus: &MnistCorpus, indices: &[usize]) -> LabelledSet {
    let labels = indices
        .iter()
        .map(|&index| corpus.labels[index])
        .collect::<Vec<_>>();
    LabelledSet {
        // Selecting rows and reversing the axes gives one sample per column.
        inputs: corpus.images.select(Axis(0), indices).reversed_axes(),
        targets: one_hot(&labels, CLASSES),
        labels,
    }
}

// Render a row-major image with shaded block characters, one text line per image row.
pub fn render_ascii(pixels: ArrayView1<f64>, columns: usize) -> String {
    pixels
        .iter()
        .chunks(columns)
        .into_iter()
        .map(|row| {
            row.map(|&activation| shade(activation))
                .collect::<String>()
        })
        .join("\n")
}

// Block character for an activation in [0, 1].
pub fn shade(activation: f64) -> char {
    match activation {
        a if a < 0.2 => ' ',
        a if a < 0.4 => '░',
        a if a < 0.6 => '▒',
        a if a < 0.8 => '▓',
        _ => '█',
    }
}
