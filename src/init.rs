use crate::error::{Error, Result};
use ndarray::{Array, Array1, Array2};
use ndarray_rand::{RandomExt, rand::Rng, rand_distr::Uniform};

const LOGISTIC_SCALE: f64 = 4.0;

/// Glorot-uniform bound `b = sqrt(6 / (fan_in + fan_out))`. Weights are drawn from `U(-b, b)`;
/// weights feeding a logistic unit are scaled by 4 because the sigmoid's slope at the origin is
/// 1/4.
pub fn glorot_bound(fan_in: usize, fan_out: usize) -> f64 {
    (6.0 / (fan_in + fan_out) as f64).sqrt()
}

/// Largest magnitude `init_weights` can produce for the given layer.
pub fn weight_limit(fan_in: usize, fan_out: usize, logistic: bool) -> f64 {
    let bound = glorot_bound(fan_in, fan_out);
    if logistic { bound * LOGISTIC_SCALE } else { bound }
}

/// A `[fan_in x fan_out]` weight matrix drawn fresh from `rng` on every call, so a row-per-sample
/// input `X` maps through `X.dot(W)`.
pub fn init_weights<R: Rng + ?Sized>(
    fan_in: usize,
    fan_out: usize,
    logistic: bool,
    rng: &mut R,
) -> Result<Array2<f64>> {
    check_fans(fan_in, fan_out)?;
    let bound = glorot_bound(fan_in, fan_out);
    let mut weights = Array::random_using((fan_in, fan_out), Uniform::new(-bound, bound), rng);
    if logistic {
        weights *= LOGISTIC_SCALE;
    }
    Ok(weights)
}

pub fn init_bias(size: usize) -> Array1<f64> {
    Array1::zeros(size)
}

fn check_fans(fan_in: usize, fan_out: usize) -> Result<()> {
    if fan_in == 0 || fan_out == 0 {
        return Err(Error::shape(
            "layer fans",
            "non-zero fan_in and fan_out",
            format!("{fan_in} x {fan_out}"),
        ));
    }
    Ok(())
}
