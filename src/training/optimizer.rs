//! Plain gradient steps.

use crate::error::Result;
use crate::nn::Network;

/// `parameter -= rate * gradient` for every weight and bias.
pub fn gradient_descent(net: &mut Network, grad: &Network, rate: f32) -> Result<()> {
    step(net, grad, -rate)
}

/// `parameter += rate * gradient` for every weight and bias.
pub fn gradient_ascent(net: &mut Network, grad: &Network, rate: f32) -> Result<()> {
    step(net, grad, rate)
}

fn step(net: &mut Network, grad: &Network, scale: f32) -> Result<()> {
    net.ensure_same_shape(grad)?;
    for (p, g) in net.parameters_mut().zip(grad.parameters()) {
        *p += scale * g;
    }
    Ok(())
}
