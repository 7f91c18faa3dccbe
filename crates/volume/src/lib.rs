//! Flat voxel volumes and the named-dataset container they are stored in.
//!
//! A [`Volume`] is a row-major flat array plus a shape. All region and
//! boundary bookkeeping elsewhere in the workspace is expressed as raveled
//! indices into one of these arenas, so the volume also carries the
//! ravel/unravel arithmetic and the border-padding step that keeps a
//! probability volume, a watershed volume and a ground-truth mask in a
//! single shared index space.
//!
//! A [`DatasetFile`] is a container of named datasets, one per volume or
//! matrix, serialized with bincode. Input stacks conventionally live under
//! the dataset name `stack`; training dumps use `samples` and `labels`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode dataset file: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Failed to decode dataset file: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("No dataset named '{0}' in file")]
    MissingDataset(String),

    #[error("Dataset holds {actual} elements but shape {shape:?} requires {expected}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Dataset '{name}' is {actual}, expected {expected}")]
    WrongDtype {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, VolumeError>;

/// A dense n-dimensional array stored flat in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Copy> Volume<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(VolumeError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// A volume of the given shape with every element set to `value`.
    pub fn filled(shape: Vec<usize>, value: T) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![value; len],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn get(&self, index: usize) -> T {
        self.data[index]
    }

    pub fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
    }

    /// Row-major strides, innermost axis last.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.shape.len()];
        for axis in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        strides
    }

    /// Flatten axis coordinates into an index into [`Self::as_slice`].
    pub fn ravel(&self, coords: &[usize]) -> usize {
        debug_assert_eq!(coords.len(), self.shape.len());
        self.strides()
            .iter()
            .zip(coords)
            .map(|(stride, c)| stride * c)
            .sum()
    }

    /// Inverse of [`Self::ravel`].
    pub fn unravel(&self, index: usize) -> Vec<usize> {
        let mut coords = Vec::with_capacity(self.shape.len());
        let mut rem = index;
        for stride in self.strides() {
            coords.push(rem / stride);
            rem %= stride;
        }
        coords
    }

    /// A copy of the volume with `width` border layers of `value` added on
    /// every side of every axis.
    ///
    /// Padding all collaborating volumes by the same width keeps their
    /// raveled indices interchangeable.
    pub fn pad(&self, width: usize, value: T) -> Volume<T> {
        let shape: Vec<usize> = self.shape.iter().map(|s| s + 2 * width).collect();
        let mut padded = Volume::filled(shape, value);
        for index in 0..self.len() {
            let coords: Vec<usize> = self
                .unravel(index)
                .into_iter()
                .map(|c| c + width)
                .collect();
            let target = padded.ravel(&coords);
            padded.data[target] = self.data[index];
        }
        padded
    }

    pub fn map<U: Copy, F: Fn(T) -> U>(&self, f: F) -> Volume<U> {
        Volume {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

/// Payload of one named dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatasetData {
    U8(Vec<u8>),
    U32(Vec<u32>),
    F64(Vec<f64>),
}

impl DatasetData {
    fn dtype(&self) -> &'static str {
        match self {
            DatasetData::U8(_) => "u8",
            DatasetData::U32(_) => "u32",
            DatasetData::F64(_) => "f64",
        }
    }
}

/// One shaped, typed array inside a [`DatasetFile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub shape: Vec<usize>,
    pub data: DatasetData,
}

impl Dataset {
    pub fn from_u8_volume(volume: &Volume<u8>) -> Self {
        Self {
            shape: volume.shape().to_vec(),
            data: DatasetData::U8(volume.as_slice().to_vec()),
        }
    }

    pub fn from_u32_volume(volume: &Volume<u32>) -> Self {
        Self {
            shape: volume.shape().to_vec(),
            data: DatasetData::U32(volume.as_slice().to_vec()),
        }
    }

    pub fn from_f64_volume(volume: &Volume<f64>) -> Self {
        Self {
            shape: volume.shape().to_vec(),
            data: DatasetData::F64(volume.as_slice().to_vec()),
        }
    }

    pub fn to_u8_volume(&self, name: &str) -> Result<Volume<u8>> {
        match &self.data {
            DatasetData::U8(data) => Volume::new(self.shape.clone(), data.clone()),
            other => Err(VolumeError::WrongDtype {
                name: name.to_string(),
                expected: "u8",
                actual: other.dtype(),
            }),
        }
    }

    pub fn to_u32_volume(&self, name: &str) -> Result<Volume<u32>> {
        match &self.data {
            DatasetData::U32(data) => Volume::new(self.shape.clone(), data.clone()),
            other => Err(VolumeError::WrongDtype {
                name: name.to_string(),
                expected: "u32",
                actual: other.dtype(),
            }),
        }
    }

    pub fn to_f64_volume(&self, name: &str) -> Result<Volume<f64>> {
        match &self.data {
            DatasetData::F64(data) => Volume::new(self.shape.clone(), data.clone()),
            other => Err(VolumeError::WrongDtype {
                name: name.to_string(),
                expected: "f64",
                actual: other.dtype(),
            }),
        }
    }
}

/// A file holding named datasets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetFile {
    datasets: BTreeMap<String, Dataset>,
}

impl DatasetFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        let (file, _) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(file)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn dataset(&self, name: &str) -> Result<&Dataset> {
        self.datasets
            .get(name)
            .ok_or_else(|| VolumeError::MissingDataset(name.to_string()))
    }

    pub fn insert(&mut self, name: impl Into<String>, dataset: Dataset) {
        self.datasets.insert(name.into(), dataset);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_volume() -> Volume<u32> {
        Volume::new(vec![2, 3], vec![1, 2, 3, 4, 5, 6]).expect("Should build volume")
    }

    #[test]
    fn test_new_rejects_shape_mismatch() {
        let result = Volume::new(vec![2, 2], vec![1u8, 2, 3]);
        assert!(matches!(result, Err(VolumeError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_ravel_unravel_round_trip() {
        let volume = create_test_volume();
        for index in 0..volume.len() {
            let coords = volume.unravel(index);
            assert_eq!(volume.ravel(&coords), index);
        }
        assert_eq!(volume.ravel(&[1, 2]), 5);
    }

    #[test]
    fn test_pad_places_interior_and_border() {
        let volume = create_test_volume();
        let padded = volume.pad(1, 0);
        assert_eq!(padded.shape(), &[4, 5]);
        assert_eq!(padded.get(padded.ravel(&[1, 1])), 1);
        assert_eq!(padded.get(padded.ravel(&[2, 3])), 6);
        // whole border is the fill value
        for index in 0..padded.len() {
            let coords = padded.unravel(index);
            let on_border = coords
                .iter()
                .zip(padded.shape())
                .any(|(&c, &s)| c == 0 || c == s - 1);
            if on_border {
                assert_eq!(padded.get(index), 0);
            }
        }
    }

    #[test]
    fn test_dataset_round_trip_and_missing_dataset() {
        let mut file = DatasetFile::default();
        file.insert("stack", Dataset::from_u32_volume(&create_test_volume()));

        let path = std::env::temp_dir().join("volume_dataset_round_trip.bin");
        file.save(&path).expect("Should save dataset file");
        let reloaded = DatasetFile::open(&path).expect("Should reopen dataset file");
        std::fs::remove_file(&path).ok();

        let stack = reloaded
            .dataset("stack")
            .expect("Should find stack dataset")
            .to_u32_volume("stack")
            .expect("Should decode as u32");
        assert_eq!(stack, create_test_volume());

        assert!(matches!(
            reloaded.dataset("missing"),
            Err(VolumeError::MissingDataset(_))
        ));
    }

    #[test]
    fn test_dataset_wrong_dtype() {
        let mut file = DatasetFile::default();
        file.insert("stack", Dataset::from_u32_volume(&create_test_volume()));
        let err = file
            .dataset("stack")
            .unwrap()
            .to_f64_volume("stack")
            .unwrap_err();
        assert!(matches!(err, VolumeError::WrongDtype { .. }));
    }
}
