use super::*;
use crate::nn::layers::Linear;
use ndarray::{array, ArrayView1, ArrayViewMut1};
use rand::rngs::StdRng;
use rand::SeedableRng;

// y = x², element-wise; `honest` toggles a correct backward.
#[derive(Debug)]
struct Square {
    honest: bool,
    output: Array2<f64>,
}

impl Layer<f64> for Square {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>, GlimpseError> {
        self.output = input.mapv(|v| v * v);
        Ok(self.output.clone())
    }

    fn backward(
        &mut self,
        input: &Array2<f64>,
        output_grad: &Array2<f64>,
    ) -> Result<Array2<f64>, GlimpseError> {
        if self.honest {
            Ok(input * output_grad * 2.0)
        } else {
            Ok(output_grad.clone())
        }
    }

    fn gradient(
        &mut self,
        _input: &Array2<f64>,
        _error: &Array2<f64>,
        _gradient: ArrayViewMut1<'_, f64>,
    ) -> Result<(), GlimpseError> {
        Ok(())
    }

    fn output(&self) -> &Array2<f64> {
        &self.output
    }

    fn set_output(&mut self, output: Array2<f64>) {
        self.output = output;
    }

    fn parameters(&self) -> Array1<f64> {
        Array1::zeros(0)
    }

    fn set_parameters(&mut self, _parameters: ArrayView1<'_, f64>) -> Result<(), GlimpseError> {
        Ok(())
    }
}

#[test]
fn test_check_input_grad_accepts_correct_backward() {
    let mut layer = Square {
        honest: true,
        output: Array2::zeros((0, 0)),
    };
    let input = array![[1.0, -2.0], [0.5, 3.0]];
    let output_grad = array![[1.0, 0.5], [-1.0, 2.0]];
    check_input_grad(&mut layer, &input, &output_grad, 1e-5, 1e-6).unwrap();
}

#[test]
fn test_check_input_grad_detects_wrong_backward() {
    let mut layer = Square {
        honest: false,
        output: Array2::zeros((0, 0)),
    };
    let input = array![[1.0, -2.0]];
    let output_grad = array![[1.0, 1.0]];
    let err = check_input_grad(&mut layer, &input, &output_grad, 1e-5, 1e-6).unwrap_err();
    match err {
        GradCheckError::GradientMismatch {
            target,
            element_index,
            ..
        } => {
            assert_eq!(target, "input");
            assert_eq!(element_index, 0);
        }
        other => panic!("Expected GradientMismatch, got {:?}", other),
    }
}

#[test]
fn test_check_parameter_grad_restores_parameters() -> Result<(), GradCheckError> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut layer: Linear<f64> = Linear::with_rng(3, 2, true, &mut rng)?;
    let before = layer.parameters();
    let input = array![[0.1, 0.2], [0.3, -0.4], [0.5, 0.6]];
    let output_grad = array![[1.0, -1.0], [0.5, 0.25]];

    check_parameter_grad(&mut layer, &input, &output_grad, 1e-6, 1e-6)?;
    assert_eq!(layer.parameters(), before);
    Ok(())
}

#[test]
fn test_layer_errors_are_wrapped() {
    let mut layer: Linear<f64> = Linear::with_rng(3, 2, false, &mut StdRng::seed_from_u64(1)).unwrap();
    let wrong_input = array![[1.0], [2.0]];
    let err = check_input_grad(&mut layer, &wrong_input, &array![[1.0], [1.0]], 1e-6, 1e-6)
        .unwrap_err();
    assert!(matches!(err, GradCheckError::LayerError(GlimpseError::ShapeMismatch { .. })));
}
