use crate::dataset::Batch;
use crate::error::{Error, Result};
use crate::gradient::GradientProvider;
use crate::network::{Gradients, Objective, ParameterSet};

/// Plain stochastic gradient descent, no momentum.
///
/// `weight_decay` is the coupled form `p <- p - lr * (g + weight_decay * p)`, applied to every
/// parameter including biases. Leave it at zero when the decay is already part of the loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    learning_rate: f64,
    weight_decay: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd {
            learning_rate,
            weight_decay: 0.0,
        }
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Sgd {
        self.weight_decay = weight_decay;
        self
    }

    /// Applies `p <- p - lr * grad(p)` to every parameter in place.
    pub fn step(&self, params: &mut ParameterSet, gradients: &Gradients) -> Result<()> {
        if params.layers().len() != gradients.layers.len() {
            return Err(Error::shape(
                "gradient layers",
                params.layers().len(),
                gradients.layers.len(),
            ));
        }
        for (layer, grad) in params.layers().iter().zip(&gradients.layers) {
            if layer.weights.dim() != grad.weights.dim() || layer.bias.dim() != grad.bias.dim() {
                return Err(Error::shape(
                    "gradient",
                    format!("{:?}", layer.weights.dim()),
                    format!("{:?}", grad.weights.dim()),
                ));
            }
        }

        let shrink = 1.0 - self.learning_rate * self.weight_decay;
        for (layer, grad) in params.layers_mut().iter_mut().zip(&gradients.layers) {
            if self.weight_decay != 0.0 {
                layer.weights *= shrink;
                layer.bias *= shrink;
            }
            layer.weights.scaled_add(-self.learning_rate, &grad.weights);
            layer.bias.scaled_add(-self.learning_rate, &grad.bias);
        }
        Ok(())
    }

    /// One minibatch update: evaluate loss and gradients at the current parameters, then step.
    /// Returns the loss measured before the step.
    pub fn train_batch<P: GradientProvider + ?Sized>(
        &self,
        provider: &P,
        objective: &Objective,
        params: &mut ParameterSet,
        batch: Batch<'_>,
    ) -> Result<f64> {
        let evaluation = provider.evaluate(objective, params, batch)?;
        self.step(params, &evaluation.gradients)?;
        Ok(evaluation.loss)
    }
}
