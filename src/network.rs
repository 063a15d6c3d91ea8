use crate::error::{Error, Result};
use crate::init::{init_bias, init_weights};
use crate::labels::argmax_rows;
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use ndarray_rand::rand::Rng;
use serde::{Deserialize, Serialize};

/// Probabilities are clamped to `[PROBABILITY_FLOOR, 1]` before taking logarithms, so a
/// confidently wrong prediction yields a large finite cost instead of infinity. NaN passes
/// through the clamp untouched.
pub const PROBABILITY_FLOOR: f64 = 1e-12;

/// Nonlinearity applied by every hidden layer. The output layer is always a softmax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Sigmoid,
    Relu,
}

impl Activation {
    pub fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid(z),
            Activation::Relu => z.max(0.0),
        }
    }

    /// Derivative with respect to the pre-activation `z`, given `a = apply(z)`.
    pub fn derivative(self, z: f64, a: f64) -> f64 {
        match self {
            Activation::Sigmoid => a * (1.0 - a),
            Activation::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Weights feeding a logistic unit get the scaled-up initialization range.
    pub fn is_logistic(self) -> bool {
        matches!(self, Activation::Sigmoid)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + f64::exp(-z))
}

/// Layer widths of a fully connected classifier, input first and class count last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Architecture {
    sizes: Vec<usize>,
    hidden_activation: Activation,
}

impl Architecture {
    pub fn new(sizes: Vec<usize>, hidden_activation: Activation) -> Result<Architecture> {
        if sizes.len() < 2 || sizes.contains(&0) {
            return Err(Error::InvalidConfig(format!(
                "a network needs at least an input and an output layer of non-zero width, got {sizes:?}"
            )));
        }
        Ok(Architecture {
            sizes,
            hidden_activation,
        })
    }

    /// Input, one hidden layer, softmax output.
    pub fn single_hidden(
        inputs: usize,
        hidden: usize,
        classes: usize,
        hidden_activation: Activation,
    ) -> Result<Architecture> {
        Architecture::new(vec![inputs, hidden, classes], hidden_activation)
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn hidden_activation(&self) -> Activation {
        self.hidden_activation
    }

    /// Draws a fresh parameter set. Weights feeding a hidden unit use the hidden activation's
    /// scaling; weights feeding the softmax never do. Biases start at zero.
    pub fn initialize<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ParameterSet> {
        let last = self.sizes.len() - 2;
        let layers = self
            .sizes
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                let logistic = index < last && self.hidden_activation.is_logistic();
                Ok(Layer {
                    weights: init_weights(pair[0], pair[1], logistic, &mut *rng)?,
                    bias: init_bias(pair[1]),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ParameterSet {
            layers,
            hidden_activation: self.hidden_activation,
        })
    }
}

/// Weight matrix and bias vector of one fully connected layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Layer {
    pub fn zeros_like(&self) -> Layer {
        Layer {
            weights: Array2::zeros(self.weights.raw_dim()),
            bias: Array1::zeros(self.bias.raw_dim()),
        }
    }
}

/// Every trainable tensor of the classifier. The sweep driver owns exactly one of these and
/// replaces it wholesale when the sweep moves to its next value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    layers: Vec<Layer>,
    hidden_activation: Activation,
}

impl ParameterSet {
    pub fn from_layers(layers: Vec<Layer>, hidden_activation: Activation) -> Result<ParameterSet> {
        if layers.is_empty() {
            return Err(Error::InvalidConfig("a parameter set needs at least one layer".into()));
        }
        for (index, layer) in layers.iter().enumerate() {
            if layer.bias.len() != layer.weights.ncols() {
                return Err(Error::shape("bias width", layer.weights.ncols(), layer.bias.len()));
            }
            if let Some(next) = layers.get(index + 1) {
                if next.weights.nrows() != layer.weights.ncols() {
                    return Err(Error::shape(
                        "layer input width",
                        layer.weights.ncols(),
                        next.weights.nrows(),
                    ));
                }
            }
        }
        Ok(ParameterSet {
            layers,
            hidden_activation,
        })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn hidden_activation(&self) -> Activation {
        self.hidden_activation
    }

    pub fn input_width(&self) -> usize {
        self.layers[0].weights.nrows()
    }

    /// Parameter names in update order: `w1, b1, w2, b2, ...`.
    pub fn names(&self) -> Vec<String> {
        (1..=self.layers.len())
            .flat_map(|i| [format!("w{i}"), format!("b{i}")])
            .collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.weights.len() + layer.bias.len())
            .sum()
    }

    /// Sum of squared weights over all layers. Biases are not included.
    pub fn weight_square_sum(&self) -> f64 {
        self.layers
            .iter()
            .map(|layer| layer.weights.iter().map(|w| w * w).sum::<f64>())
            .sum()
    }
}

/// Per-parameter gradients, laid out exactly like the `ParameterSet` they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub layers: Vec<Layer>,
}

impl Gradients {
    pub fn zeros_like(params: &ParameterSet) -> Gradients {
        Gradients {
            layers: params.layers.iter().map(Layer::zeros_like).collect(),
        }
    }

    pub fn max_abs(&self) -> f64 {
        self.layers
            .iter()
            .flat_map(|layer| layer.weights.iter().chain(layer.bias.iter()))
            .fold(0.0f64, |acc, g| acc.max(g.abs()))
    }
}

/// Maps row-per-sample inputs to row-per-sample class probabilities.
pub trait ForwardModel {
    fn predict(&self, params: &ParameterSet, inputs: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    fn classify(&self, params: &ParameterSet, inputs: ArrayView2<'_, f64>) -> Result<Array1<usize>> {
        Ok(argmax_rows(self.predict(params, inputs)?.view()))
    }

    /// Fraction of rows whose predicted class equals the argmax of the one-hot target row.
    fn accuracy(
        &self,
        params: &ParameterSet,
        inputs: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
    ) -> Result<f64> {
        let predicted = self.classify(params, inputs)?;
        let expected = argmax_rows(targets);
        if predicted.len() != expected.len() {
            return Err(Error::shape("target rows", predicted.len(), expected.len()));
        }
        if predicted.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let correct = Zip::from(&predicted)
            .and(&expected)
            .fold(0usize, |n, p, e| n + usize::from(p == e));
        Ok(correct as f64 / predicted.len() as f64)
    }
}

/// Intermediate values of one forward pass, kept for backpropagation.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// `activations[0]` is the input, `activations[l]` the output of hidden layer `l`.
    pub activations: Vec<Array2<f64>>,
    /// Pre-activations of the hidden layers.
    pub pre_activations: Vec<Array2<f64>>,
    pub probabilities: Array2<f64>,
}

/// Fully connected network: hidden layers with a shared activation, softmax output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mlp;

impl Mlp {
    pub fn forward_pass(
        &self,
        params: &ParameterSet,
        inputs: ArrayView2<'_, f64>,
    ) -> Result<ForwardPass> {
        if inputs.ncols() != params.input_width() {
            return Err(Error::shape("input width", params.input_width(), inputs.ncols()));
        }

        let activation = params.hidden_activation();
        // The last layer feeds the softmax and never goes through the hidden activation.
        let (hidden, output) = params.layers.split_at(params.layers.len() - 1);

        // Feed forward, keeping each layer's input and pre-activation for backprop.
        let mut activations = Vec::with_capacity(params.layers.len());
        let mut pre_activations = Vec::with_capacity(hidden.len());
        let mut current = inputs.to_owned();
        for layer in hidden {
            let z = current.dot(&layer.weights) + &layer.bias;
            activations.push(current);
            current = z.mapv(|v| activation.apply(v));
            pre_activations.push(z);
        }

        // Output layer: logits for the softmax.
        let logits = current.dot(&output[0].weights) + &output[0].bias;
        activations.push(current);

        Ok(ForwardPass {
            activations,
            pre_activations,
            probabilities: softmax_rows(logits),
        })
    }
}

impl ForwardModel for Mlp {
    fn predict(&self, params: &ParameterSet, inputs: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        Ok(self.forward_pass(params, inputs)?.probabilities)
    }
}

/// Row-wise softmax, shifted by each row's maximum for numerical stability.
pub fn softmax_rows(mut logits: Array2<f64>) -> Array2<f64> {
    for mut row in logits.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row /= total;
    }
    logits
}

/// Mean categorical cross-entropy between predicted probabilities and one-hot targets.
pub fn cross_entropy(probabilities: ArrayView2<'_, f64>, targets: ArrayView2<'_, f64>) -> Result<f64> {
    if probabilities.dim() != targets.dim() {
        return Err(Error::shape(
            "targets",
            format!("{:?}", probabilities.dim()),
            format!("{:?}", targets.dim()),
        ));
    }
    if probabilities.nrows() == 0 {
        return Err(Error::EmptyDataset);
    }
    // Sum -t * ln(p) over every cell, then average over rows.
    let total = Zip::from(&probabilities)
        .and(&targets)
        .fold(0.0f64, |acc, &p, &t| acc - t * p.clamp(PROBABILITY_FLOOR, 1.0).ln());
    Ok(total / probabilities.len_of(Axis(0)) as f64)
}

/// Scalar training loss: mean cross-entropy plus `decay` times the sum of squared weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub decay: f64,
}

impl Objective {
    pub fn new(decay: f64) -> Objective {
        Objective { decay }
    }

    pub fn loss(
        &self,
        params: &ParameterSet,
        probabilities: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
    ) -> Result<f64> {
        Ok(cross_entropy(probabilities, targets)? + self.decay * params.weight_square_sum())
    }
}
