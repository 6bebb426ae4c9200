use std::path::PathBuf;

// Hyperparameters and dataset settings for a single training run. The defaults are the values the
// digit recognizer has always been trained with; the command line can override any of them.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub data_dir: PathBuf,
    pub hidden_neurons: usize,
    pub epochs: u32,
    // None trains on the whole training split at once.
    pub batch_size: Option<usize>,
    pub test_size: f64,
    pub split_seed: u64,
    pub init_seed: Option<u64>,
    pub adam: AdamConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            data_dir: PathBuf::from("data"),
            hidden_neurons: 128,
            epochs: 50,
            batch_size: None,
            test_size: 0.2,
            split_seed: 42,
            init_seed: None,
            adam: AdamConfig::default(),
        }
    }
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}
