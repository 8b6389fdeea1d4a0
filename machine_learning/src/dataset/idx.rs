//! Reader for the IDX files MNIST-like datasets ship in.
//!
//! Only unsigned byte payloads (type `0x08`) are supported. Files must be decompressed.

use std::{fs, path::Path};

use log::debug;
use ndarray::Array2;

use super::Dataset;
use crate::{MlErr, Result};

const UBYTE: u8 = 0x08;

/// Mean and standard deviation of the FashionMNIST training pixels scaled to `[0, 1]`.
pub const FASHION_MNIST_MEAN: f32 = 0.1307;
pub const FASHION_MNIST_STD: f32 = 0.3081;

/// A decoded IDX file: its dimensions and its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxArray {
    pub dims: Vec<usize>,
    pub data: Vec<u8>,
}

/// Decodes an IDX buffer.
///
/// # Arguments
/// * `what` - What the buffer holds, used for error messages.
/// * `bytes` - The whole file.
pub fn parse(what: &'static str, bytes: &[u8]) -> Result<IdxArray> {
    let invalid = |detail: String| MlErr::InvalidIdx { what, detail };

    let [0, 0, kind, ndims, rest @ ..] = bytes else {
        return Err(invalid("missing magic number".into()));
    };

    if *kind != UBYTE {
        return Err(invalid(format!("unsupported element type {kind:#04x}")));
    }

    let ndims = *ndims as usize;
    if rest.len() < ndims * 4 {
        return Err(invalid(format!("truncated header for {ndims} dimensions")));
    }

    let (header, data) = rest.split_at(ndims * 4);
    let dims: Vec<usize> = header
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]) as usize)
        .collect();

    let expected: usize = dims.iter().product();
    if data.len() != expected {
        return Err(invalid(format!(
            "expected {expected} bytes of data for {dims:?}, got {}",
            data.len()
        )));
    }

    Ok(IdxArray {
        dims,
        data: data.to_vec(),
    })
}

/// Builds a dataset from decoded IDX images and labels, flattening every image into one row and
/// normalizing pixels to `(x / 255 - mean) / std`.
///
/// # Arguments
/// * `images` - An IDX array of at least one dimension, the first one being the example count.
/// * `labels` - A one dimensional IDX array with a label per image.
/// * `classes` - The amount of classes.
/// * `mean` - The pixel mean after scaling to `[0, 1]`.
/// * `std` - The pixel standard deviation after scaling to `[0, 1]`.
pub fn to_dataset(
    images: IdxArray,
    labels: IdxArray,
    classes: usize,
    mean: f32,
    std: f32,
) -> Result<Dataset> {
    let Some((&n, pixel_dims)) = images.dims.split_first() else {
        return Err(MlErr::InvalidIdx {
            what: "images",
            detail: "no dimensions".into(),
        });
    };

    if labels.dims != [n] {
        return Err(MlErr::InvalidIdx {
            what: "labels",
            detail: format!("expected dimensions [{n}], got {:?}", labels.dims),
        });
    }

    if n == 0 {
        return Err(MlErr::EmptyDataset);
    }

    let pixels = pixel_dims.iter().product();
    let x = images
        .data
        .iter()
        .map(|&p| (p as f32 / 255. - mean) / std)
        .collect();

    let x = Array2::from_shape_vec((n, pixels), x)?;
    Dataset::from_labels(x, &labels.data, classes)
}

/// Loads a FashionMNIST split from its (decompressed) images and labels files.
///
/// # Arguments
/// * `images` - The path to the `*-images-idx3-ubyte` file.
/// * `labels` - The path to the `*-labels-idx1-ubyte` file.
pub fn load_fashion_mnist<P: AsRef<Path>>(images: P, labels: P) -> Result<Dataset> {
    let (images, labels) = (images.as_ref(), labels.as_ref());
    debug!(
        "loading idx files: images={} labels={}",
        images.display(),
        labels.display()
    );

    let images = parse("images", &fs::read(images)?)?;
    let labels = parse("labels", &fs::read(labels)?)?;
    to_dataset(images, labels, 10, FASHION_MNIST_MEAN, FASHION_MNIST_STD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(dims: &[u32], data: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0, 0, UBYTE, dims.len() as u8];
        for d in dims {
            bytes.extend(d.to_be_bytes());
        }
        bytes.extend(data);
        bytes
    }

    #[test]
    fn parses_header_and_payload() {
        let bytes = idx(&[2, 2, 2], &[0, 1, 2, 3, 4, 5, 6, 7]);
        let array = parse("images", &bytes).unwrap();

        assert_eq!(array.dims, [2, 2, 2]);
        assert_eq!(array.data, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn rejects_malformed_files() {
        assert!(parse("images", &[0, 0]).is_err());
        assert!(parse("images", &[0, 0, 0x0D, 1, 0, 0, 0, 1, 0, 0, 0, 0]).is_err());
        assert!(parse("images", &idx(&[3], &[1, 2])).is_err());
        assert!(parse("images", &[0, 0, UBYTE, 2, 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn normalizes_and_one_hot_encodes() {
        let images = parse("images", &idx(&[2, 1, 2], &[0, 255, 255, 0])).unwrap();
        let labels = parse("labels", &idx(&[2], &[1, 0])).unwrap();

        let dataset = to_dataset(images, labels, 3, 0.5, 0.5).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.x().row(0).to_vec(), [-1.0, 1.0]);
        assert_eq!(dataset.y().row(0).to_vec(), [0.0, 1.0, 0.0]);
        assert_eq!(dataset.class_of(1), 0);
    }

    #[test]
    fn labels_must_match_images() {
        let images = parse("images", &idx(&[2, 1], &[0, 1])).unwrap();
        let labels = parse("labels", &idx(&[1], &[0])).unwrap();

        assert!(matches!(
            to_dataset(images, labels, 10, 0., 1.),
            Err(MlErr::InvalidIdx { what: "labels", .. })
        ));
    }
}
