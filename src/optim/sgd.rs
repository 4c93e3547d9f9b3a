use crate::error::ComputationError;
use crate::network::network::Network;

/// Plain stochastic gradient descent: `p ← p - lr · ∂L/∂p`, no momentum.
///
/// An `Sgd` is bound to the parameter layout of the network it was created
/// for; stepping a network with a different layout is an error.
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
    bound_shapes: Vec<Vec<usize>>,
}

impl Sgd {
    pub fn new(network: &Network, learning_rate: f64) -> Sgd {
        Sgd {
            learning_rate,
            bound_shapes: network.parameter_shapes(),
        }
    }

    /// Applies one update to every parameter that has a gradient, then clears the gradients.
    pub fn step(&self, network: &mut Network) -> Result<(), ComputationError> {
        let shapes = network.parameter_shapes();
        if shapes != self.bound_shapes {
            return Err(ComputationError::ParameterMismatch {
                expected: self.bound_shapes.clone(),
                found: shapes,
            });
        }
        for param in network.parameters_mut() {
            if let Some(grad) = param.grad.take() {
                param.value.add_scaled(&grad, -self.learning_rate);
            }
        }
        Ok(())
    }
}
