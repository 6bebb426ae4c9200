use crate::config::AdamConfig;
use crate::network::{Gradients, NeuralNetwork};
use ndarray::{Array2, Zip};

// Adam keeps exponentially decaying averages of every parameter's gradient (first moment) and
// squared gradient (second moment), and scales each step by their bias-corrected ratio.
pub struct Adam {
    config: AdamConfig,
    t: i32,
    first_moments: Gradients,
    second_moments: Gradients,
}

impl Adam {
    pub fn new(network: &NeuralNetwork, config: AdamConfig) -> Adam {
        Adam {
            config,
            t: 0,
            first_moments: Gradients::zeros_like(network),
            second_moments: Gradients::zeros_like(network),
        }
    }

    pub fn steps_taken(&self) -> i32 {
        self.t
    }

    // Run one optimization step, moving every parameter of the network against its gradient.
    pub fn step(&mut self, network: &mut NeuralNetwork, gradients: &Gradients) {
        self.t += 1;
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let first_correction = 1.0 - beta1.powi(self.t);
        let second_correction = 1.0 - beta2.powi(self.t);

        for (((parameter, gradient), first), second) in network
            .parameters_mut()
            .into_iter()
            .zip(gradients.parameters())
            .zip(self.first_moments.parameters_mut())
            .zip(self.second_moments.parameters_mut())
        {
            update_parameter(
                parameter,
                gradient,
                first,
                second,
                |m, v| {
                    let m_hat = m / first_correction;
                    let v_hat = v / second_correction;
                    learning_rate * m_hat / (v_hat.sqrt() + epsilon)
                },
                (beta1, beta2),
            );
        }
    }
}

fn update_parameter(
    parameter: &mut Array2<f64>,
    gradient: &Array2<f64>,
    first: &mut Array2<f64>,
    second: &mut Array2<f64>,
    delta: impl Fn(f64, f64) -> f64,
    (beta1, beta2): (f64, f64),
) {
    Zip::from(parameter)
        .and(gradient)
        .and(first)
        .and(second)
        .for_each(|p, &g, m, v| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            *p -= delta(*m, *v);
        });
}
