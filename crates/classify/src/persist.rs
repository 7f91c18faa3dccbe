//! Model and training-set persistence.
//!
//! The fitted model is written as one opaque bincode object. The optional
//! training-data dump goes into a [`DatasetFile`] under the fixed dataset
//! names `samples` and `labels`; an existing file at the dump path is
//! removed first, and only a missing file is ignored during that removal.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use ndarray::{Array1, Array2};
use tracing::info;
use volume::{Dataset, DatasetData, DatasetFile};

use crate::classifier::TrainedModel;
use crate::error::{ClassifyError, Result};
use crate::replay::TrainingSet;

pub fn save_model<P: AsRef<Path>>(path: P, model: &TrainedModel) -> Result<()> {
    let bytes = bincode::serde::encode_to_vec(model, bincode::config::standard())?;
    fs::write(&path, bytes)?;
    info!(path = %path.as_ref().display(), "saved classifier");
    Ok(())
}

pub fn load_model<P: AsRef<Path>>(path: P) -> Result<TrainedModel> {
    let bytes = fs::read(path)?;
    let (model, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
    Ok(model)
}

pub fn save_training_data<P: AsRef<Path>>(path: P, set: &TrainingSet) -> Result<()> {
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => return Err(error.into()),
    }

    let mut file = DatasetFile::default();
    file.insert(
        "samples",
        Dataset {
            shape: vec![set.samples.nrows(), set.samples.ncols()],
            data: DatasetData::F64(set.samples.iter().copied().collect()),
        },
    );
    file.insert(
        "labels",
        Dataset {
            shape: vec![set.labels.len()],
            data: DatasetData::F64(set.labels.to_vec()),
        },
    );
    file.save(&path)?;
    info!(path = %path.as_ref().display(), rows = set.len(), "saved training data");
    Ok(())
}

pub fn load_training_data<P: AsRef<Path>>(path: P) -> Result<TrainingSet> {
    let file = DatasetFile::open(path)?;
    let samples = file.dataset("samples")?;
    let labels = file.dataset("labels")?;

    let DatasetData::F64(sample_data) = &samples.data else {
        return Err(ClassifyError::InvalidTrainingSet(
            "samples dataset is not f64".to_string(),
        ));
    };
    let DatasetData::F64(label_data) = &labels.data else {
        return Err(ClassifyError::InvalidTrainingSet(
            "labels dataset is not f64".to_string(),
        ));
    };
    if samples.shape.len() != 2 {
        return Err(ClassifyError::InvalidTrainingSet(format!(
            "samples dataset has {} axes, expected 2",
            samples.shape.len()
        )));
    }
    let samples = Array2::from_shape_vec(
        (samples.shape[0], samples.shape[1]),
        sample_data.clone(),
    )
    .map_err(|e| ClassifyError::InvalidTrainingSet(e.to_string()))?;
    Ok(TrainingSet {
        samples,
        labels: Array1::from_vec(label_data.clone()),
    })
}
