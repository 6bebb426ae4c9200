use anyhow::{Context, Result};
use clap::Parser;
use digit_sketchpad::config::{AdamConfig, TrainingConfig};
use digit_sketchpad::mnist::{
    CLASSES, IMAGE_SIDE, MnistCorpus, PIXELS, read_raw_image, render_ascii, train_test_split,
};
use digit_sketchpad::network::NeuralNetwork;
use digit_sketchpad::train::{accuracy, train};
use digit_sketchpad::ui::{loss_chart, sketch};
use env_logger::Env;
use log::{info, warn};
use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "Train a digit recognizer on MNIST, then classify a digit you draw")]
struct Args {
    /// Directory holding the four gzipped MNIST IDX files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    #[arg(long, default_value_t = 50)]
    epochs: u32,
    #[arg(long, default_value_t = 0.001)]
    learning_rate: f64,
    #[arg(long, default_value_t = 128)]
    hidden: usize,
    /// Train on shuffled mini-batches of this size instead of the whole training set at once
    #[arg(long)]
    batch_size: Option<usize>,
    /// Fraction of the corpus held out for testing
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,
    #[arg(long, default_value_t = 42)]
    split_seed: u64,
    /// Seed for weight initialization and batch shuffling; random when omitted
    #[arg(long)]
    init_seed: Option<u64>,
    /// Skip the loss chart
    #[arg(long)]
    no_plot: bool,
    /// Classify a raw 28x28 greyscale bitmap (784 bytes) instead of drawing
    #[arg(long)]
    image: Option<PathBuf>,
}

impl Args {
    fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            data_dir: self.data_dir.clone(),
            hidden_neurons: self.hidden,
            epochs: self.epochs,
            batch_size: self.batch_size,
            test_size: self.test_size,
            split_seed: self.split_seed,
            init_seed: self.init_seed,
            adam: AdamConfig {
                learning_rate: self.learning_rate,
                ..AdamConfig::default()
            },
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.training_config();

    let data = {
        let corpus = MnistCorpus::load(&config.data_dir).with_context(|| {
            format!(
                "could not load MNIST from {} (expected train-images-idx3-ubyte.gz, \
                 train-labels-idx1-ubyte.gz, t10k-images-idx3-ubyte.gz and t10k-labels-idx1-ubyte.gz)",
                config.data_dir.display()
            )
        })?;
        train_test_split(&corpus, config.test_size, config.split_seed)?
    };

    let mut rng = match config.init_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut network = NeuralNetwork::new(PIXELS, config.hidden_neurons, CLASSES, &mut rng);

    info!("Training the neural network...");
    let report = train(&mut network, &data.training, &config, &mut rng)?;
    info!(
        "test accuracy: {:.2}% over {} samples",
        accuracy(&network, &data.test) * 100.0,
        data.test.len()
    );

    if !args.no_plot {
        loss_chart::show(&report.losses).context("could not show the loss chart")?;
    }

    let input = match &args.image {
        Some(path) => read_raw_image(path)?,
        None => {
            println!("Draw your digit by clicking and dragging with the mouse.");
            let canvas = sketch::draw_digit()?;
            if canvas.is_blank() {
                warn!("nothing was drawn, classifying an empty canvas");
            }
            canvas.to_input()
        }
    };
    println!("{}", render_ascii(input.column(0), IMAGE_SIDE));

    let prediction = network.predict(&input.view())?;
    println!("The model predicts: {prediction}");
    Ok(())
}
