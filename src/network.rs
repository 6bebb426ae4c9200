use crate::error::{Error, Result};
use itertools::Itertools;
use ndarray::{Array, Array2, ArrayView2, Axis};
use ndarray_rand::{RandomExt, rand::Rng, rand_distr::StandardNormal};

const LEAKY_RELU_SLOPE: f64 = 0.01;
const LOG_EPSILON: f64 = 1e-8;

// A fully connected network with a single leaky ReLU hidden layer and a softmax output layer.
// Weights are stored so a layer's output is weights.dot(input) + biases, with every sample of a
// batch in its own column.
pub struct NeuralNetwork {
    pub weights_input_hidden: Array2<f64>,
    pub bias_hidden: Array2<f64>,
    pub weights_hidden_output: Array2<f64>,
    pub bias_output: Array2<f64>,
}

// The intermediate values of a forward pass that backpropagation needs.
pub struct ForwardPass {
    pub z1: Array2<f64>,
    pub a1: Array2<f64>,
    pub a2: Array2<f64>,
}

// Gradients of the cost with respect to every parameter, shaped like the parameters themselves.
pub struct Gradients {
    pub weights_input_hidden: Array2<f64>,
    pub bias_hidden: Array2<f64>,
    pub weights_hidden_output: Array2<f64>,
    pub bias_output: Array2<f64>,
}

impl NeuralNetwork {
    // He initialization: weights drawn from a standard normal distribution scaled by
    // sqrt(2 / fan_in), biases start at zero.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
        rng: &mut R,
    ) -> NeuralNetwork {
        let he = |fan_in: usize| (2.0 / fan_in as f64).sqrt();
        NeuralNetwork {
            weights_input_hidden: Array2::<f64>::random_using(
                (hidden_size, input_size),
                StandardNormal,
                rng,
            ) * he(input_size),
            bias_hidden: Array::zeros((hidden_size, 1)),
            weights_hidden_output: Array2::<f64>::random_using(
                (output_size, hidden_size),
                StandardNormal,
                rng,
            ) * he(hidden_size),
            bias_output: Array::zeros((output_size, 1)),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights_input_hidden.ncols()
    }

    // Every trainable parameter, in the same order as Gradients::parameters.
    pub fn parameters_mut(&mut self) -> [&mut Array2<f64>; 4] {
        [
            &mut self.weights_input_hidden,
            &mut self.bias_hidden,
            &mut self.weights_hidden_output,
            &mut self.bias_output,
        ]
    }

    // Computes every layer's pre-activation and activation for a batch of inputs. The input must be
    // a [input_size x m] array or the dot product panics.
    pub fn forward(&self, input: &ArrayView2<f64>) -> ForwardPass {
        // Hidden layer: a1 = leaky_relu(w1.x + b1). The [hidden x 1] bias column is broadcast across
        // every sample column of the batch.
        let z1 = self.weights_input_hidden.dot(input) + &self.bias_hidden;
        let a1 = z1.mapv(leaky_relu);

        // Output layer: softmax turns each column of weighted inputs into a probability for every
        // digit.
        let z2 = self.weights_hidden_output.dot(&a1) + &self.bias_output;
        let a2 = softmax(&z2);
        ForwardPass { z1, a1, a2 }
    }

    // Backpropagates the softmax cross-entropy error through both layers. Every gradient is
    // averaged over the m columns of the batch.
    pub fn backward(
        &self,
        input: &ArrayView2<f64>,
        expected_output: &ArrayView2<f64>,
        pass: &ForwardPass,
    ) -> Gradients {
        let m = input.ncols() as f64;

        // With a softmax output and cross-entropy cost, the error of the output layer's weighted
        // inputs collapses to the difference between the activations and the expected output. Each
        // column of dz2 is the error for the corresponding sample in the batch.
        let dz2 = &pass.a2 - expected_output;

        // The dot product of the errors with the transposed hidden activations sums the per-sample
        // weight gradients for us, so dividing by m gives the batch average. The bias gradient is
        // the error itself, so summing each row and dividing by m averages it over the batch.
        let weights_hidden_output = dz2.dot(&pass.a1.t()) / m;
        let bias_output = dz2.sum_axis(Axis(1)).insert_axis(Axis(1)) / m;

        // Carry the error back through the output weights, then scale it by the slope of the
        // leaky ReLU at each hidden neuron's weighted input (1 where it was positive, 0.01
        // elsewhere).
        let dz1 = self.weights_hidden_output.t().dot(&dz2) * pass.z1.mapv(leaky_relu_derivative);

        // Same averaging as the output layer, with the network input standing in for the hidden
        // activations.
        let weights_input_hidden = dz1.dot(&input.t()) / m;
        let bias_hidden = dz1.sum_axis(Axis(1)).insert_axis(Axis(1)) / m;

        Gradients {
            weights_input_hidden,
            bias_hidden,
            weights_hidden_output,
            bias_output,
        }
    }

    // Classifies a single [input_size x 1] sample.
    pub fn predict(&self, input: &ArrayView2<f64>) -> Result<usize> {
        if input.dim() != (self.input_size(), 1) {
            return Err(Error::Shape(ndarray::ShapeError::from_kind(
                ndarray::ErrorKind::IncompatibleShape,
            )));
        }
        let probabilities = self.forward(input).a2;
        Ok(argmax(probabilities.column(0).iter()))
    }

    // Predicted class of every column of a batch.
    pub fn classify(&self, inputs: &ArrayView2<f64>) -> Vec<usize> {
        self.forward(inputs)
            .a2
            .columns()
            .into_iter()
            .map(|column| argmax(column.iter()))
            .collect()
    }
}

impl Gradients {
    pub fn parameters(&self) -> [&Array2<f64>; 4] {
        [
            &self.weights_input_hidden,
            &self.bias_hidden,
            &self.weights_hidden_output,
            &self.bias_output,
        ]
    }

    pub fn parameters_mut(&mut self) -> [&mut Array2<f64>; 4] {
        [
            &mut self.weights_input_hidden,
            &mut self.bias_hidden,
            &mut self.weights_hidden_output,
            &mut self.bias_output,
        ]
    }

    pub fn zeros_like(network: &NeuralNetwork) -> Gradients {
        Gradients {
            weights_input_hidden: Array::zeros(network.weights_input_hidden.raw_dim()),
            bias_hidden: Array::zeros(network.bias_hidden.raw_dim()),
            weights_hidden_output: Array::zeros(network.weights_hidden_output.raw_dim()),
            bias_output: Array::zeros(network.bias_output.raw_dim()),
        }
    }
}

// Mean over every element of -Y * ln(P + 1e-8).
pub fn cross_entropy(predictions: &Array2<f64>, expected_output: &ArrayView2<f64>) -> f64 {
    let log_predictions = predictions.mapv(|p| (p + LOG_EPSILON).ln());
    -(expected_output * &log_predictions).mean().unwrap_or(0.0)
}

// Column-wise softmax. Subtracting each column's maximum first keeps exp from overflowing.
pub fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let max = z.fold_axis(Axis(0), f64::NEG_INFINITY, |&a, &b| a.max(b));
    let mut exp_z = z - &max.insert_axis(Axis(0));
    exp_z.mapv_inplace(f64::exp);
    let sum = exp_z.sum_axis(Axis(0)).insert_axis(Axis(0));
    exp_z / &sum
}

pub fn leaky_relu(z: f64) -> f64 {
    (LEAKY_RELU_SLOPE * z).max(z)
}

pub fn leaky_relu_derivative(z: f64) -> f64 {
    if z > 0.0 { 1.0 } else { LEAKY_RELU_SLOPE }
}

fn argmax<'a>(values: impl Iterator<Item = &'a f64>) -> usize {
    values.position_max_by(|a, b| a.total_cmp(b)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_rand::rand::{SeedableRng, rngs::StdRng};

    fn small_network() -> NeuralNetwork {
        NeuralNetwork::new(4, 5, 3, &mut StdRng::seed_from_u64(1))
    }

    #[test]
    fn initialization_shapes_and_zero_biases() {
        let network = NeuralNetwork::new(784, 128, 10, &mut StdRng::seed_from_u64(0));
        assert_eq!(network.weights_input_hidden.dim(), (128, 784));
        assert_eq!(network.weights_hidden_output.dim(), (10, 128));
        assert_eq!(network.bias_hidden.dim(), (128, 1));
        assert_eq!(network.bias_output.dim(), (10, 1));
        assert!(network.bias_hidden.iter().all(|&b| b == 0.0));

        // He scaling puts the sample standard deviation near sqrt(2 / 784).
        let n = network.weights_input_hidden.len() as f64;
        let variance = network.weights_input_hidden.mapv(|w| w * w).sum() / n;
        assert!((variance - 2.0 / 784.0).abs() < 2.0 / 784.0 * 0.05);
    }

    #[test]
    fn leaky_relu_and_derivative() {
        assert_eq!(leaky_relu(2.0), 2.0);
        assert_eq!(leaky_relu(-2.0), -0.02);
        assert_eq!(leaky_relu_derivative(3.0), 1.0);
        assert_eq!(leaky_relu_derivative(0.0), 0.01);
        assert_eq!(leaky_relu_derivative(-1.0), 0.01);
    }

    #[test]
    fn softmax_columns_are_distributions() {
        let probabilities = softmax(&array![[1.0, 1000.0], [2.0, 1000.0], [3.0, -1000.0]]);
        for column in probabilities.columns() {
            assert!((column.sum() - 1.0).abs() < 1e-12);
        }
        assert!(probabilities[(2, 0)] > probabilities[(1, 0)]);
        assert!((probabilities[(0, 1)] - 0.5).abs() < 1e-12);
        assert!(probabilities.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn cross_entropy_averages_over_all_elements() {
        let predictions = array![[0.5, 1.0], [0.5, 0.0]];
        let targets = array![[1.0, 1.0], [0.0, 0.0]];
        let expected = -((0.5 + LOG_EPSILON).ln() + (1.0 + LOG_EPSILON).ln()) / 4.0;
        assert!((cross_entropy(&predictions, &targets.view()) - expected).abs() < 1e-12);
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut network = small_network();
        network.bias_hidden.fill(0.1);
        let input = array![[0.2, -0.4], [0.9, 0.1], [-0.3, 0.7], [0.5, 0.5]];
        let targets = array![[1.0, 0.0], [0.0, 0.0], [0.0, 1.0]];

        let pass = network.forward(&input.view());
        let gradients = network.backward(&input.view(), &targets.view(), &pass);

        // The analytic gradients are for the summed cross-entropy averaged over samples, which is
        // the element mean scaled by the number of classes.
        let classes = network.bias_output.nrows() as f64;
        let cost = |network: &NeuralNetwork| {
            cross_entropy(&network.forward(&input.view()).a2, &targets.view()) * classes
        };

        let step = 1e-6;
        for (row, column) in [(0, 0), (2, 3), (4, 1)] {
            let original = network.weights_input_hidden[(row, column)];
            network.weights_input_hidden[(row, column)] = original + step;
            let plus = cost(&network);
            network.weights_input_hidden[(row, column)] = original - step;
            let minus = cost(&network);
            network.weights_input_hidden[(row, column)] = original;

            let numeric = (plus - minus) / (2.0 * step);
            assert!((numeric - gradients.weights_input_hidden[(row, column)]).abs() < 1e-5);
        }
        for row in 0..3 {
            let original = network.bias_output[(row, 0)];
            network.bias_output[(row, 0)] = original + step;
            let plus = cost(&network);
            network.bias_output[(row, 0)] = original - step;
            let minus = cost(&network);
            network.bias_output[(row, 0)] = original;

            let numeric = (plus - minus) / (2.0 * step);
            assert!((numeric - gradients.bias_output[(row, 0)]).abs() < 1e-5);
        }
    }

    #[test]
    fn predict_rejects_wrong_shape() {
        let network = small_network();
        assert!(network.predict(&Array2::<f64>::zeros((3, 1)).view()).is_err());
        assert!(network.predict(&Array2::<f64>::zeros((4, 2)).view()).is_err());
        assert!(network.predict(&Array2::<f64>::zeros((4, 1)).view()).unwrap() < 3);
    }

    #[test]
    fn classify_agrees_with_predict() {
        let network = small_network();
        let inputs = array![[0.2, -0.4], [0.9, 0.1], [-0.3, 0.7], [0.5, 0.5]];
        let classes = network.classify(&inputs.view());
        for (j, &class) in classes.iter().enumerate() {
            let column = inputs.column(j).to_owned().insert_axis(Axis(1));
            assert_eq!(network.predict(&column.view()).unwrap(), class);
        }
    }
}
