use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::mnist::LabelledSet;
use crate::network::{NeuralNetwork, cross_entropy};
use crate::optimizer::Adam;
use log::{debug, info};
use ndarray::Axis;
use ndarray_rand::rand::{Rng, seq::SliceRandom};

// Loss history of a training run, one entry per epoch.
pub struct TrainingReport {
    pub losses: Vec<f64>,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }
}

// Trains the network with Adam for config.epochs epochs. Without a batch size every epoch is a
// single step over the whole training set. With one, the training columns are shuffled and every
// chunk of batch_size columns takes its own step, and the epoch's loss is the mean over samples.
pub fn train<R: Rng + ?Sized>(
    network: &mut NeuralNetwork,
    training: &LabelledSet,
    config: &TrainingConfig,
    rng: &mut R,
) -> Result<TrainingReport> {
    if training.is_empty() {
        return Err(Error::InvalidConfig("no training samples".to_string()));
    }
    if config.batch_size == Some(0) {
        return Err(Error::InvalidConfig("batch size must be positive".to_string()));
    }

    let mut optimizer = Adam::new(network, config.adam);
    let mut losses = Vec::with_capacity(config.epochs as usize);
    let mut indices = (0..training.len()).collect::<Vec<_>>();

    for epoch in 0..config.epochs {
        let loss = match config.batch_size {
            None => full_batch_step(network, &mut optimizer, training),
            Some(batch_size) => {
                // Shuffle the sample order each epoch, then gather every chunk of column indices
                // into its own input and target matrices so each batch can be stepped on like a
                // whole training set.
                indices.shuffle(rng);
                let mut summed_loss = 0.0;
                for batch in indices.chunks(batch_size) {
                    let batch_set = LabelledSet {
                        inputs: training.inputs.select(Axis(1), batch),
                        targets: training.targets.select(Axis(1), batch),
                        labels: batch.iter().map(|&index| training.labels[index]).collect(),
                    };
                    summed_loss +=
                        full_batch_step(network, &mut optimizer, &batch_set) * batch.len() as f64;
                }
                summed_loss / training.len() as f64
            }
        };
        losses.push(loss);

        if epoch % 10 == 0 {
            info!("Epoch {epoch}, Loss: {loss}");
        } else {
            debug!("Epoch {epoch}, Loss: {loss}");
        }
    }
    debug!("took {} optimizer steps", optimizer.steps_taken());

    Ok(TrainingReport { losses })
}

// One forward pass, loss, backward pass and Adam step over every column of the set. Returns the loss
// measured before the step.
fn full_batch_step(network: &mut NeuralNetwork, optimizer: &mut Adam, set: &LabelledSet) -> f64 {
    let inputs = set.inputs.view();
    let targets = set.targets.view();

    let pass = network.forward(&inputs);
    let loss = cross_entropy(&pass.a2, &targets);
    let gradients = network.backward(&inputs, &targets, &pass);
    optimizer.step(network, &gradients);
    loss
}

// Fraction of the set the network classifies correctly.
pub fn accuracy(network: &NeuralNetwork, set: &LabelledSet) -> f64 {
    if set.is_empty() {
        return 0.0;
    }
    let correct_answers = network
        .classify(&set.inputs.view())
        .into_iter()
        .zip(&set.labels)
        .filter(|&(prediction, &label)| prediction == usize::from(label))
        .count();
    correct_answers as f64 / set.len() as f64
}
