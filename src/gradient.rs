use crate::dataset::Batch;
use crate::error::{Error, Result};
use crate::network::{ForwardModel, Gradients, Layer, Mlp, Objective, ParameterSet};
use ndarray::{Axis, Zip};

/// Loss of a batch together with the gradient of that loss.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub loss: f64,
    pub gradients: Gradients,
}

/// Given the current parameters and one batch, produces the scalar training loss and its
/// gradient with respect to every parameter.
///
/// `Backprop` computes the gradients of the softmax/cross-entropy network in closed form.
/// `NumericGradient` estimates them by central differences through any `ForwardModel`; it is far
/// too slow for training but useful as an independent check.
pub trait GradientProvider {
    fn evaluate(
        &self,
        objective: &Objective,
        params: &ParameterSet,
        batch: Batch<'_>,
    ) -> Result<Evaluation>;
}

impl<P: GradientProvider + ?Sized> GradientProvider for &P {
    fn evaluate(
        &self,
        objective: &Objective,
        params: &ParameterSet,
        batch: Batch<'_>,
    ) -> Result<Evaluation> {
        (**self).evaluate(objective, params, batch)
    }
}

/// Analytic gradients for `Mlp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Backprop;

impl GradientProvider for Backprop {
    fn evaluate(
        &self,
        objective: &Objective,
        params: &ParameterSet,
        batch: Batch<'_>,
    ) -> Result<Evaluation> {
        if batch.is_empty() {
            return Err(Error::EmptyDataset);
        }
        // Forward pass keeps every layer's input and pre-activation.
        let pass = Mlp.forward_pass(params, batch.features)?;
        let loss = objective.loss(params, pass.probabilities.view(), batch.labels)?;

        let activation = params.hidden_activation();
        let layers = params.layers();

        // With a softmax output the cross-entropy gradient w.r.t. the logits is simply p - y,
        // averaged over the batch.
        let mut delta = (&pass.probabilities - &batch.labels) / batch.len() as f64;
        let mut gradients = Vec::with_capacity(layers.len());

        // Walk the layers output first.
        for (index, layer) in layers.iter().enumerate().rev() {
            // dL/dW = input^T . delta, plus the derivative of the L2 term on weights.
            let mut weights = pass.activations[index].t().dot(&delta);
            if objective.decay != 0.0 {
                weights.scaled_add(2.0 * objective.decay, &layer.weights);
            }
            let bias = delta.sum_axis(Axis(0));

            // Push delta through the weights and the hidden activation's derivative.
            if index > 0 {
                let mut upstream = delta.dot(&layer.weights.t());
                Zip::from(&mut upstream)
                    .and(&pass.pre_activations[index - 1])
                    .and(&pass.activations[index])
                    .for_each(|d, &z, &a| *d *= activation.derivative(z, a));
                delta = upstream;
            }

            gradients.push(Layer { weights, bias });
        }
        // Collected output first; restore the parameter order.
        gradients.reverse();

        Ok(Evaluation {
            loss,
            gradients: Gradients { layers: gradients },
        })
    }
}

/// Central-difference gradient estimate through an arbitrary forward model.
#[derive(Debug, Clone, Copy)]
pub struct NumericGradient<M> {
    model: M,
    epsilon: f64,
}

impl<M: ForwardModel> NumericGradient<M> {
    pub fn new(model: M, epsilon: f64) -> NumericGradient<M> {
        NumericGradient { model, epsilon }
    }

    fn loss(&self, objective: &Objective, params: &ParameterSet, batch: Batch<'_>) -> Result<f64> {
        let probabilities = self.model.predict(params, batch.features)?;
        objective.loss(params, probabilities.view(), batch.labels)
    }

    fn partial(
        &self,
        objective: &Objective,
        perturbed: &mut ParameterSet,
        batch: Batch<'_>,
        slot: Slot,
    ) -> Result<f64> {
        let original = *slot.get(perturbed);

        // Evaluate at +eps and -eps, then put the parameter back.
        *slot.get(perturbed) = original + self.epsilon;
        let above = self.loss(objective, perturbed, batch)?;
        *slot.get(perturbed) = original - self.epsilon;
        let below = self.loss(objective, perturbed, batch)?;
        *slot.get(perturbed) = original;

        Ok((above - below) / (2.0 * self.epsilon))
    }
}

impl<M: ForwardModel> GradientProvider for NumericGradient<M> {
    fn evaluate(
        &self,
        objective: &Objective,
        params: &ParameterSet,
        batch: Batch<'_>,
    ) -> Result<Evaluation> {
        if batch.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let loss = self.loss(objective, params, batch)?;
        let mut gradients = Gradients::zeros_like(params);
        // Nudge one scalar at a time on a private copy of the parameters.
        let mut perturbed = params.clone();

        for (index, layer) in gradients.layers.iter_mut().enumerate() {
            let (rows, cols) = layer.weights.dim();
            for row in 0..rows {
                for col in 0..cols {
                    layer.weights[[row, col]] =
                        self.partial(objective, &mut perturbed, batch, Slot::Weight(index, row, col))?;
                }
            }
            for col in 0..layer.bias.len() {
                layer.bias[col] = self.partial(objective, &mut perturbed, batch, Slot::Bias(index, col))?;
            }
        }

        Ok(Evaluation { loss, gradients })
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Weight(usize, usize, usize),
    Bias(usize, usize),
}

impl Slot {
    fn get(self, params: &mut ParameterSet) -> &mut f64 {
        match self {
            Slot::Weight(layer, row, col) => &mut params.layers_mut()[layer].weights[[row, col]],
            Slot::Bias(layer, col) => &mut params.layers_mut()[layer].bias[col],
        }
    }
}
