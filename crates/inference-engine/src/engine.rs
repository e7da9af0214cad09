//! Classifier adapters

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use metrics::histogram;
use ndarray::ArrayViewD;
use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::contract::InputContract;
use crate::InferenceError;

/// A binary fatigue classifier: input tensor in, probability out
pub trait Classifier: Send + Sync {
    /// Run one synchronous inference
    fn classify(&self, input: ArrayViewD<'_, f32>) -> Result<f32, InferenceError>;

    /// Short identifier for logs and health reports
    fn name(&self) -> &str;

    /// Whether this is a stand-in rather than a trained model
    fn is_mock(&self) -> bool {
        false
    }
}

/// Reject outputs that are not a probability in [0, 1]
pub fn checked_probability(p: f32) -> Result<f32, InferenceError> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(InferenceError::InvalidOutput(p))
    }
}

fn check_shape(expected: &[usize], actual: &[usize]) -> Result<(), InferenceError> {
    if expected != actual {
        return Err(InferenceError::InvalidInputShape {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        });
    }
    Ok(())
}

/// ONNX classifier executed with tract
pub struct TractClassifier {
    model: TypedRunnableModel<TypedModel>,
    input_shape: Vec<usize>,
    model_path: String,
}

impl TractClassifier {
    /// Load and optimize an ONNX model for the given input contract
    pub fn load(model_path: &str, contract: &InputContract) -> Result<Self, InferenceError> {
        contract.validate()?;
        let input_shape = contract.input_shape();
        info!("Loading classifier model {} with input {:?}", model_path, input_shape);

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|m| m.with_input_fact(0, f32::fact(input_shape.clone()).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| InferenceError::ModelLoadError(format!("{}: {}", model_path, e)))?;

        info!("Model loaded successfully");
        Ok(Self {
            model,
            input_shape,
            model_path: model_path.to_string(),
        })
    }

    /// Get model path
    pub fn model_path(&self) -> &str {
        &self.model_path
    }
}

impl Classifier for TractClassifier {
    fn classify(&self, input: ArrayViewD<'_, f32>) -> Result<f32, InferenceError> {
        check_shape(&self.input_shape, input.shape())?;
        let start = std::time::Instant::now();

        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_shape(input.shape(), &data)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::InferenceFailed("model produced no outputs".into()))?;
        let values = output
            .as_slice::<f32>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let p = values
            .first()
            .copied()
            .ok_or_else(|| InferenceError::InferenceFailed("empty output tensor".into()))?;

        let elapsed = start.elapsed();
        histogram!("fatigue_inference_seconds").record(elapsed.as_secs_f64());
        debug!("Inference completed in {}ms (p={:.4})", elapsed.as_millis(), p);

        checked_probability(p)
    }

    fn name(&self) -> &str {
        &self.model_path
    }
}

enum MockMode {
    Constant(f32),
    Scripted(Mutex<VecDeque<Result<f32, String>>>),
}

/// Stand-in classifier for development and tests
pub struct MockClassifier {
    mode: MockMode,
    expected_shape: Option<Vec<usize>>,
    calls: AtomicUsize,
}

impl MockClassifier {
    /// Always answer `p`
    pub fn constant(p: f32) -> Self {
        info!("Creating mock classifier (constant p={})", p);
        Self {
            mode: MockMode::Constant(p),
            expected_shape: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer from a script, one entry per call; `Err` entries simulate
    /// inference failures
    pub fn scripted<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<f32, String>>,
    {
        let script: VecDeque<_> = script.into_iter().collect();
        info!("Creating mock classifier ({} scripted outputs)", script.len());
        Self {
            mode: MockMode::Scripted(Mutex::new(script)),
            expected_shape: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Also enforce the input shape of `contract`
    pub fn expecting(mut self, contract: &InputContract) -> Self {
        self.expected_shape = Some(contract.input_shape());
        self
    }

    /// Number of classify calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Classifier for MockClassifier {
    fn classify(&self, input: ArrayViewD<'_, f32>) -> Result<f32, InferenceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(expected) = &self.expected_shape {
            check_shape(expected, input.shape())?;
        }

        let p = match &self.mode {
            MockMode::Constant(p) => *p,
            MockMode::Scripted(script) => {
                let mut script = script
                    .lock()
                    .map_err(|_| InferenceError::InferenceFailed("mock script poisoned".into()))?;
                match script.pop_front() {
                    Some(Ok(p)) => p,
                    Some(Err(msg)) => return Err(InferenceError::InferenceFailed(msg)),
                    None => return Err(InferenceError::InferenceFailed("mock script exhausted".into())),
                }
            }
        };
        checked_probability(p)
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn is_mock(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ChannelOrder, InputLayout, Normalization};
    use ndarray::{ArrayD, IxDyn};

    fn contract() -> InputContract {
        InputContract {
            width: 4,
            height: 4,
            channel_order: ChannelOrder::Rgb,
            normalization: Normalization::UnitScale,
            layout: InputLayout::Single,
        }
    }

    #[test]
    fn test_constant_mock() {
        let mock = MockClassifier::constant(0.7);
        let input = ArrayD::<f32>::zeros(IxDyn(&[1, 4, 4, 3]));

        assert_eq!(mock.classify(input.view()), Ok(0.7));
        assert_eq!(mock.calls(), 1);
        assert!(mock.is_mock());
    }

    #[test]
    fn test_scripted_mock() {
        let mock = MockClassifier::scripted(vec![Ok(0.9), Err("boom".to_string()), Ok(0.1)]);
        let input = ArrayD::<f32>::zeros(IxDyn(&[1, 4, 4, 3]));

        assert_eq!(mock.classify(input.view()), Ok(0.9));
        assert_eq!(
            mock.classify(input.view()),
            Err(InferenceError::InferenceFailed("boom".into()))
        );
        assert_eq!(mock.classify(input.view()), Ok(0.1));
        assert!(mock.classify(input.view()).is_err());
        assert_eq!(mock.calls(), 4);
    }

    #[test]
    fn test_mock_enforces_shape() {
        let mock = MockClassifier::constant(0.5).expecting(&contract());
        let wrong = ArrayD::<f32>::zeros(IxDyn(&[1, 8, 8, 3]));

        assert!(matches!(
            mock.classify(wrong.view()),
            Err(InferenceError::InvalidInputShape { .. })
        ));
    }

    #[test]
    fn test_out_of_range_output_rejected() {
        assert_eq!(checked_probability(1.5), Err(InferenceError::InvalidOutput(1.5)));
        assert!(checked_probability(f32::NAN).is_err());
        assert_eq!(checked_probability(0.0), Ok(0.0));

        let mock = MockClassifier::constant(-0.1);
        let input = ArrayD::<f32>::zeros(IxDyn(&[1]));
        assert!(mock.classify(input.view()).is_err());
    }

    #[test]
    fn test_missing_model_fails_to_load() {
        let result = TractClassifier::load("/nonexistent/model.onnx", &contract());
        assert!(matches!(result, Err(InferenceError::ModelLoadError(_))));
    }
}
