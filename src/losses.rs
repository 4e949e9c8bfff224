//! Loss functions as graph builders.
//!
//! Each function takes symbolic tensors and appends the nodes that compute
//! the loss, returning the scalar loss node.

use crate::tensor::Tensor;

/// Sum of squared errors: `sum((y_pred - y_true)^2)`.
pub fn mse_loss(y_pred: &Tensor, y_true: &Tensor) -> Tensor {
    (y_pred - y_true).square().sum()
}

/// Mean squared error: `mean((y_pred - y_true)^2)`.
pub fn mse_loss_mean(y_pred: &Tensor, y_true: &Tensor) -> Tensor {
    (y_pred - y_true).square().mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asg::Value;
    use crate::runtime::backend::{bind_inputs, Backend};
    use crate::runtime::cpu_backend::CpuBackend;
    use crate::tensor::GraphContext;
    use ndarray::array;
    use std::collections::HashMap;

    fn eval(build: fn(&Tensor, &Tensor) -> Tensor) -> f32 {
        let ctx = GraphContext::shared();
        let pred = Tensor::new_input(&ctx, "pred");
        let target = Tensor::new_input(&ctx, "target");
        let loss = build(&pred, &target);
        ctx.borrow_mut().main_graph_mut().set_output(loss.node_id);

        let graph = ctx.borrow().main_graph().clone();
        let data = HashMap::from([
            ("pred".to_string(), Value::Tensor(array![1.0_f32, 2.0, 4.0].into_dyn())),
            ("target".to_string(), Value::Tensor(array![1.0_f32, 0.0, 1.0].into_dyn())),
        ]);
        let memo = bind_inputs(&graph, &data).unwrap();
        let (outputs, _) = CpuBackend::new().run(&graph, memo).unwrap();
        outputs[0].clone().into_array().sum()
    }

    #[test]
    fn sum_and_mean_of_squared_errors() {
        assert!((eval(mse_loss) - 13.0).abs() < 1e-6);
        assert!((eval(mse_loss_mean) - 13.0 / 3.0).abs() < 1e-6);
    }
}
