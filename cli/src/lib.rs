use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use classify::{
    BoundaryMask, ClassWeighting, Classifier, ClassifierKind, ReplayLabeler, SvmKernel,
    save_model, save_training_data,
};
use rag::{FeatureSetKind, RegionGraph};
use volume::{DatasetFile, Volume};

/// Dataset name input volumes are read from.
pub const STACK_DATASET: &str = "stack";

#[derive(Error, Debug)]
pub enum TrainingRunError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Volume(#[from] volume::VolumeError),
    #[error(transparent)]
    Rag(#[from] rag::RagError),
    #[error(transparent)]
    Classify(#[from] classify::ClassifyError),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One complete training run: inputs, tolerances, model selection, outputs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TrainingRun {
    pub watershed: PathBuf,
    pub ground_truth: PathBuf,
    pub probabilities: PathBuf,
    pub classifier_out: PathBuf,
    #[serde(default = "default_max_threshold")]
    pub max_threshold: f64,
    #[serde(default = "default_true_tolerance")]
    pub true_tolerance: f64,
    #[serde(default = "default_false_tolerance")]
    pub false_tolerance: f64,
    #[serde(default)]
    pub balance_classes: bool,
    #[serde(default)]
    pub classifier: ClassifierKind,
    #[serde(default)]
    pub kernel: SvmKernel,
    #[serde(default)]
    pub feature_set: FeatureSetKind,
    #[serde(default)]
    pub save_training_data: Option<PathBuf>,
}

fn default_max_threshold() -> f64 {
    255.0
}

fn default_true_tolerance() -> f64 {
    0.9
}

fn default_false_tolerance() -> f64 {
    0.1
}

impl TrainingRun {
    /// Load a run configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, TrainingRunError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load a run configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, TrainingRunError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a run configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, TrainingRunError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load a run configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self, TrainingRunError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load a run configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TrainingRunError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(TrainingRunError::UnsupportedFileFormat),
        }
    }

    /// Convert the run configuration to a JSON string
    pub fn to_json(&self) -> Result<String, TrainingRunError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Convert the run configuration to a TOML string
    pub fn to_toml(&self) -> Result<String, TrainingRunError> {
        Ok(toml::to_string_pretty(&self)?)
    }
}

/// Summary counts of a finished training run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TrainingReport {
    pub merges: usize,
    pub kept: usize,
    pub positives: usize,
    pub negatives: usize,
}

/// Execute a full training run: load volumes, record a merge history,
/// replay and label it, fit the selected classifier, persist the results.
pub fn run(config: &TrainingRun) -> Result<TrainingReport, TrainingRunError> {
    let watershed = load_u32_stack(&config.watershed)?;
    let ground_truth = load_u32_stack(&config.ground_truth)?;
    let probabilities = load_f64_stack(&config.probabilities)?;

    let mask = BoundaryMask::best_possible(&watershed, &ground_truth)?;

    info!(threshold = config.max_threshold, "agglomerating");
    let mut recorder = RegionGraph::from_volumes(&watershed, &probabilities)?;
    let history = recorder.agglomerate(config.max_threshold)?;
    drop(recorder);

    // fresh, un-merged graph for the replay pass
    let mut graph = RegionGraph::from_volumes(&watershed, &probabilities)?;
    let extractor = config.feature_set.build();
    let labeler = ReplayLabeler::new(config.true_tolerance, config.false_tolerance);
    let set = labeler.replay(&mut graph, &history, &mask, extractor.as_ref())?;
    let filtered = set.filtered();

    let weighting = if config.balance_classes {
        ClassWeighting::Balanced
    } else {
        ClassWeighting::Uniform
    };
    info!(
        rows = filtered.len(),
        classifier = %config.classifier,
        "fitting classifier"
    );
    let mut model = config.classifier.build(config.kernel);
    model.fit(&filtered.samples, &filtered.labels, weighting)?;

    save_model(&config.classifier_out, &model)?;
    if let Some(path) = &config.save_training_data {
        save_training_data(path, &filtered)?;
    }

    let positives = filtered.labels.iter().filter(|&&label| label > 0.0).count();
    Ok(TrainingReport {
        merges: history.len(),
        kept: filtered.len(),
        positives,
        negatives: filtered.len() - positives,
    })
}

fn load_u32_stack(path: &Path) -> Result<Volume<u32>, TrainingRunError> {
    let file = open_container(path)?;
    Ok(file.dataset(STACK_DATASET)?.to_u32_volume(STACK_DATASET)?)
}

fn load_f64_stack(path: &Path) -> Result<Volume<f64>, TrainingRunError> {
    let file = open_container(path)?;
    Ok(file.dataset(STACK_DATASET)?.to_f64_volume(STACK_DATASET)?)
}

fn open_container(path: &Path) -> Result<DatasetFile, TrainingRunError> {
    DatasetFile::open(path).map_err(|e| {
        error!("failed to load volume {}: {e}", path.display());
        e.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use volume::Dataset;

    fn create_scenario_files(directory: &Path) -> (PathBuf, PathBuf, PathBuf) {
        // regions 1 and 3 share ground-truth body 7, region 2 is body 8:
        // the 1|2 ridge is a true boundary, the 1|3 ridge is not
        #[rustfmt::skip]
        let ws = Volume::new(vec![4, 5], vec![
            1, 1, 0, 2, 2,
            1, 1, 0, 2, 2,
            0, 0, 0, 0, 0,
            3, 3, 0, 0, 0,
        ]).expect("Should build watershed");
        #[rustfmt::skip]
        let gt = Volume::new(vec![4, 5], vec![
            7, 7, 0, 8, 8,
            7, 7, 0, 8, 8,
            0, 0, 0, 0, 0,
            7, 7, 0, 0, 0,
        ]).expect("Should build ground truth");
        #[rustfmt::skip]
        let probs = Volume::new(vec![4, 5], vec![
            0.5, 0.5, 0.9, 0.8, 0.8,
            0.5, 0.5, 0.9, 0.8, 0.8,
            0.2, 0.2, 0.3, 0.3, 0.3,
            0.2, 0.2, 0.3, 0.3, 0.3,
        ]).expect("Should build probabilities");

        let ws_path = directory.join("train-ws.bin");
        let gt_path = directory.join("train-gt.bin");
        let probs_path = directory.join("train-probs.bin");

        let mut file = DatasetFile::default();
        file.insert(STACK_DATASET, Dataset::from_u32_volume(&ws));
        file.save(&ws_path).expect("Should save watershed");

        let mut file = DatasetFile::default();
        file.insert(STACK_DATASET, Dataset::from_u32_volume(&gt));
        file.save(&gt_path).expect("Should save ground truth");

        let mut file = DatasetFile::default();
        file.insert(STACK_DATASET, Dataset::from_f64_volume(&probs));
        file.save(&probs_path).expect("Should save probabilities");

        (ws_path, gt_path, probs_path)
    }

    #[test]
    fn test_config_round_trips() {
        let config = TrainingRun {
            watershed: PathBuf::from("ws.bin"),
            ground_truth: PathBuf::from("gt.bin"),
            probabilities: PathBuf::from("probs.bin"),
            classifier_out: PathBuf::from("model.bin"),
            max_threshold: 0.5,
            true_tolerance: 0.9,
            false_tolerance: 0.1,
            balance_classes: true,
            classifier: ClassifierKind::LogisticRegression,
            kernel: SvmKernel::Rbf,
            feature_set: FeatureSetKind::FullStatistics,
            save_training_data: None,
        };
        let json = config.to_json().expect("Should serialize to JSON");
        assert_eq!(TrainingRun::from_json(&json).expect("Should parse"), config);
        let toml = config.to_toml().expect("Should serialize to TOML");
        assert_eq!(TrainingRun::from_toml(&toml).expect("Should parse"), config);
    }

    #[test]
    fn test_config_defaults() {
        let json = r#"{
            "watershed": "ws.bin",
            "ground_truth": "gt.bin",
            "probabilities": "probs.bin",
            "classifier_out": "model.bin"
        }"#;
        let config = TrainingRun::from_json(json).expect("Should parse");
        assert_eq!(config.max_threshold, 255.0);
        assert_eq!(config.true_tolerance, 0.9);
        assert_eq!(config.false_tolerance, 0.1);
        assert_eq!(config.classifier, ClassifierKind::Svm);
        assert_eq!(config.kernel, SvmKernel::Rbf);
        assert!(!config.balance_classes);
    }

    #[test]
    fn test_run_end_to_end() {
        let directory = std::env::temp_dir().join("agglom_train_end_to_end");
        fs::create_dir_all(&directory).expect("Should create temp directory");
        let (watershed, ground_truth, probabilities) = create_scenario_files(&directory);
        let model_path = directory.join("model.bin");
        let dump_path = directory.join("training-data.bin");

        let config = TrainingRun {
            watershed,
            ground_truth,
            probabilities,
            classifier_out: model_path.clone(),
            max_threshold: 255.0,
            true_tolerance: 0.9,
            false_tolerance: 0.1,
            balance_classes: true,
            classifier: ClassifierKind::Svm,
            kernel: SvmKernel::Rbf,
            feature_set: FeatureSetKind::FullStatistics,
            save_training_data: Some(dump_path.clone()),
        };
        let report = run(&config).expect("Should run training");
        assert_eq!(report.merges, 2);
        assert_eq!(report.kept, 2);
        assert_eq!(report.positives, 1);
        assert_eq!(report.negatives, 1);

        // the persisted model predicts (n, 2) probability rows summing to 1
        let model = classify::load_model(&model_path).expect("Should reload model");
        let dumped = classify::load_training_data(&dump_path).expect("Should reload dump");
        assert_eq!(dumped.samples.shape(), &[2, 9]);
        let probabilities = model
            .predict_probability(&dumped.samples)
            .expect("Should predict");
        assert_eq!(probabilities.shape(), &[2, 2]);
        for row in probabilities.rows() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-12);
        }

        fs::remove_dir_all(&directory).ok();
    }
}
