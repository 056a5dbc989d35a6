use std::sync::Arc;

use ndarray::{s, Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::config::SequenceConfig;
use crate::error::ModelError;
use crate::returns::ReturnSeries;

use super::{
    Forecast, ForecastModel, ForecastOrigin, ModelUnavailable, ScalarModel, VolatilityForecaster,
};

/// Weights of one recurrent layer as stored in `lstm_vol_model.json`.
///
/// Gate rows are stacked in input, forget, cell, output order, so every
/// matrix has `4 * hidden_size` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayerArtifact {
    pub weight_ih: Vec<Vec<f64>>,
    pub weight_hh: Vec<Vec<f64>>,
    pub bias_ih: Vec<f64>,
    pub bias_hh: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearArtifact {
    pub weight: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmArtifact {
    pub input_size: usize,
    pub hidden_size: usize,
    pub layers: Vec<LstmLayerArtifact>,
    pub head: LinearArtifact,
}

#[derive(Debug, Clone)]
struct LstmLayer {
    weight_ih: Array2<f64>,
    weight_hh: Array2<f64>,
    bias: Array1<f64>,
}

/// Stacked LSTM with a linear head applied to the last hidden state.
#[derive(Debug, Clone)]
pub struct LstmModel {
    hidden_size: usize,
    layers: Vec<LstmLayer>,
    head_weight: Array1<f64>,
    head_bias: f64,
}

fn matrix(
    rows: &[Vec<f64>],
    shape: (usize, usize),
    name: &str,
    path: &str,
) -> Result<Array2<f64>, ModelError> {
    let malformed = |message: String| ModelError::Malformed {
        path: path.to_owned(),
        message,
    };

    if rows.len() != shape.0 || rows.iter().any(|row| row.len() != shape.1) {
        return Err(malformed(format!(
            "{name} must be {}x{}, got {} rows",
            shape.0,
            shape.1,
            rows.len()
        )));
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    if flat.iter().any(|value| !value.is_finite()) {
        return Err(malformed(format!("{name} contains non-finite weights")));
    }
    Array2::from_shape_vec(shape, flat).map_err(|error| malformed(error.to_string()))
}

fn vector(values: &[f64], len: usize, name: &str, path: &str) -> Result<Array1<f64>, ModelError> {
    if values.len() != len || values.iter().any(|value| !value.is_finite()) {
        return Err(ModelError::Malformed {
            path: path.to_owned(),
            message: format!("{name} must hold {len} finite values, got {}", values.len()),
        });
    }
    Ok(Array1::from(values.to_vec()))
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl LstmModel {
    /// Validate artifact shapes; `path` is only used in error messages.
    pub fn from_artifact(artifact: &LstmArtifact, path: &str) -> Result<Self, ModelError> {
        let hidden = artifact.hidden_size;
        if hidden == 0 || artifact.input_size == 0 || artifact.layers.is_empty() {
            return Err(ModelError::Malformed {
                path: path.to_owned(),
                message: String::from(
                    "lstm needs a positive input/hidden size and at least one layer",
                ),
            });
        }

        let layers = artifact
            .layers
            .iter()
            .enumerate()
            .map(|(index, layer)| {
                let input = if index == 0 { artifact.input_size } else { hidden };
                let bias_ih = vector(&layer.bias_ih, 4 * hidden, "bias_ih", path)?;
                let bias_hh = vector(&layer.bias_hh, 4 * hidden, "bias_hh", path)?;
                Ok(LstmLayer {
                    weight_ih: matrix(&layer.weight_ih, (4 * hidden, input), "weight_ih", path)?,
                    weight_hh: matrix(&layer.weight_hh, (4 * hidden, hidden), "weight_hh", path)?,
                    bias: bias_ih + bias_hh,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let head = matrix(&artifact.head.weight, (1, hidden), "head.weight", path)?;
        let head_bias = vector(&artifact.head.bias, 1, "head.bias", path)?;

        Ok(Self {
            hidden_size: hidden,
            layers,
            head_weight: head.row(0).to_owned(),
            head_bias: head_bias[0],
        })
    }

    fn input_size(&self) -> usize {
        self.layers.first().map_or(1, |layer| layer.weight_ih.ncols())
    }
}

impl ScalarModel for LstmModel {
    /// `input` is a univariate window, oldest first.
    fn predict(&self, input: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        if self.input_size() != 1 {
            return Err(ModelError::InputShape {
                expected: self.input_size(),
                actual: 1,
            });
        }

        let h = self.hidden_size;
        let mut hidden = vec![Array1::<f64>::zeros(h); self.layers.len()];
        let mut cell = vec![Array1::<f64>::zeros(h); self.layers.len()];

        for &x in input.iter() {
            let mut layer_input = Array1::from(vec![x]);
            for (index, layer) in self.layers.iter().enumerate() {
                let gates = layer.weight_ih.dot(&layer_input)
                    + layer.weight_hh.dot(&hidden[index])
                    + &layer.bias;

                let input_gate = gates.slice(s![0..h]).mapv(sigmoid);
                let forget_gate = gates.slice(s![h..2 * h]).mapv(sigmoid);
                let candidate = gates.slice(s![2 * h..3 * h]).mapv(f64::tanh);
                let output_gate = gates.slice(s![3 * h..4 * h]).mapv(sigmoid);

                let next_cell = &forget_gate * &cell[index] + &input_gate * &candidate;
                let next_hidden = &output_gate * &next_cell.mapv(f64::tanh);
                cell[index] = next_cell;
                hidden[index] = next_hidden.clone();
                layer_input = next_hidden;
            }
        }

        let last = hidden.last().ok_or(ModelError::NonFinite)?;
        let output = self.head_weight.dot(last) + self.head_bias;
        if !output.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(output)
    }
}

/// Pretrained recurrent forecaster over the last `seq_len` returns.
#[derive(Clone)]
pub struct SequenceForecaster {
    config: SequenceConfig,
    model: Result<Arc<dyn ScalarModel>, ModelUnavailable>,
}

impl Default for SequenceForecaster {
    fn default() -> Self {
        Self::new(
            SequenceConfig::default(),
            Err(ModelUnavailable::ArtifactMissing {
                path: String::from("lstm_vol_model.json"),
            }),
        )
    }
}

impl SequenceForecaster {
    pub fn new(
        config: SequenceConfig,
        model: Result<Arc<dyn ScalarModel>, ModelUnavailable>,
    ) -> Self {
        Self { config, model }
    }
}

impl VolatilityForecaster for SequenceForecaster {
    fn model(&self) -> ForecastModel {
        ForecastModel::Lstm
    }

    fn forecast(&self, returns: &ReturnSeries) -> Result<Forecast, ModelUnavailable> {
        let values = returns.values();
        let seq_len = self.config.seq_len.max(1);
        if values.len() < seq_len {
            return Err(ModelUnavailable::InsufficientHistory {
                required: seq_len,
                available: values.len(),
            });
        }

        let model = self.model.as_ref().map_err(Clone::clone)?;
        let window = ArrayView1::from(&values[values.len() - seq_len..]);
        let prediction = model
            .predict(window)
            .map_err(|error| match error {
                ModelError::NonFinite => ModelUnavailable::NonFiniteOutput,
                other => ModelUnavailable::Evaluation(other),
            })?;

        Forecast::from_per_period_pct(prediction, returns, ForecastOrigin::Pretrained)
    }
}
