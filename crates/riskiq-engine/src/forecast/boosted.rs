use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::BoostedConfig;
use crate::error::ModelError;
use crate::returns::ReturnSeries;
use crate::stats::{mean, sample_std};

use super::{
    Forecast, ForecastModel, ForecastOrigin, ModelUnavailable, ScalarModel, VolatilityForecaster,
};

/// Column order of the feature vector, shared with pretrained artifacts.
pub const FEATURE_NAMES: [&str; 5] = [
    "rolling_volatility",
    "rolling_mean",
    "lag1",
    "lag2",
    "lag3",
];

const MAX_LAG: usize = 3;
const MIN_GAIN: f64 = 1e-12;

/// Features at return index `t`: rolling std and mean over the `window`
/// returns ending at `t`, and the three returns before `t`.
fn feature_row(values: &[f64], t: usize, window: usize) -> Option<[f64; 5]> {
    if window < 2 || t + 1 < window || t < MAX_LAG || t >= values.len() {
        return None;
    }
    let slice = &values[t + 1 - window..=t];
    Some([
        sample_std(slice)?,
        mean(slice)?,
        values[t - 1],
        values[t - 2],
        values[t - 3],
    ])
}

/// Feature vector for the latest return, or `None` when the history is too short.
pub fn feature_vector(values: &[f64], window: usize) -> Option<Array1<f64>> {
    let t = values.len().checked_sub(1)?;
    feature_row(values, t, window).map(|row| Array1::from(row.to_vec()))
}

/// Training rows whose target is the std of the next `horizon` returns.
fn training_set(values: &[f64], window: usize, horizon: usize) -> (Vec<[f64; 5]>, Vec<f64>) {
    let mut rows = Vec::new();
    let mut targets = Vec::new();
    let first = window.max(MAX_LAG + 1) - 1;
    for t in first..values.len() {
        let end = t + horizon;
        if end >= values.len() {
            break;
        }
        let (Some(row), Some(target)) = (
            feature_row(values, t, window),
            sample_std(&values[t + 1..=end]),
        ) else {
            continue;
        };
        rows.push(row);
        targets.push(target);
    }
    (rows, targets)
}

/// Node of a binary regression tree; the root is `nodes[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `x[feature] < threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict(&self, x: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        let mut index = 0;
        // A well-formed tree reaches a leaf in fewer hops than it has nodes.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = x.get(*feature).ok_or(ModelError::InputShape {
                        expected: feature + 1,
                        actual: x.len(),
                    })?;
                    index = if *value < *threshold { *left } else { *right };
                }
                None => break,
            }
        }
        Err(ModelError::Malformed {
            path: String::from("<tree>"),
            message: format!("tree with {} nodes has a dangling or cyclic link", self.nodes.len()),
        })
    }

    fn fit(
        x: ArrayView2<'_, f64>,
        residuals: &[f64],
        rows: Vec<usize>,
        config: &BoostedConfig,
    ) -> Self {
        let mut nodes = Vec::new();
        grow(&mut nodes, x, residuals, rows, 0, config);
        Self { nodes }
    }
}

fn grow(
    nodes: &mut Vec<TreeNode>,
    x: ArrayView2<'_, f64>,
    residuals: &[f64],
    rows: Vec<usize>,
    depth: usize,
    config: &BoostedConfig,
) -> usize {
    let sum: f64 = rows.iter().map(|&row| residuals[row]).sum();
    let value = if rows.is_empty() {
        0.0
    } else {
        config.learning_rate * sum / rows.len() as f64
    };

    let index = nodes.len();
    nodes.push(TreeNode::Leaf { value });
    if depth >= config.max_depth || rows.len() < 2 {
        return index;
    }

    let Some((feature, threshold)) = best_split(x, residuals, &rows) else {
        return index;
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .into_iter()
        .partition(|&row| x[[row, feature]] < threshold);

    let left = grow(nodes, x, residuals, left_rows, depth + 1, config);
    let right = grow(nodes, x, residuals, right_rows, depth + 1, config);
    nodes[index] = TreeNode::Split {
        feature,
        threshold,
        left,
        right,
    };
    index
}

/// Split maximizing the reduction of squared error, if any improves it.
fn best_split(x: ArrayView2<'_, f64>, residuals: &[f64], rows: &[usize]) -> Option<(usize, f64)> {
    let count = rows.len() as f64;
    let total: f64 = rows.iter().map(|&row| residuals[row]).sum();
    let baseline = total * total / count;

    let mut best: Option<(usize, f64, f64)> = None;
    for feature in 0..x.ncols() {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|a, b| x[[*a, feature]].total_cmp(&x[[*b, feature]]));

        let mut left_sum = 0.0;
        for split in 0..sorted.len() - 1 {
            left_sum += residuals[sorted[split]];
            let here = x[[sorted[split], feature]];
            let next = x[[sorted[split + 1], feature]];
            if here == next {
                continue;
            }

            let left_n = (split + 1) as f64;
            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / left_n + right_sum * right_sum / (count - left_n)
                - baseline;
            if gain > MIN_GAIN && best.map_or(true, |(_, _, best_gain)| gain > best_gain) {
                best = Some((feature, 0.5 * (here + next), gain));
            }
        }
    }
    best.map(|(feature, threshold, _)| (feature, threshold))
}

/// Additive tree ensemble: `base_score + sum(tree(x))`, leaves already shrunk.
///
/// This is also the JSON layout of `xgb_vol_model.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedModel {
    pub base_score: f64,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedModel {
    /// Squared-loss gradient boosting with row subsampling.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        config: &BoostedConfig,
    ) -> Result<Self, ModelUnavailable> {
        let n_rows = x.nrows();
        if n_rows == 0 || n_rows != y.len() {
            return Err(ModelUnavailable::FitFailed {
                reason: format!("{n_rows} feature rows for {} targets", y.len()),
            });
        }

        let base_score = y.mean().unwrap_or(0.0);
        let mut predictions = vec![base_score; n_rows];
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut trees = Vec::with_capacity(config.n_trees);

        for _ in 0..config.n_trees {
            let residuals: Vec<f64> = y
                .iter()
                .zip(&predictions)
                .map(|(target, prediction)| target - prediction)
                .collect();

            let mut sample: Vec<usize> = (0..n_rows)
                .filter(|_| rng.gen::<f64>() < config.subsample)
                .collect();
            if sample.len() < 2 {
                sample = (0..n_rows).collect();
            }

            let tree = RegressionTree::fit(x, &residuals, sample, config);
            for (row, prediction) in predictions.iter_mut().enumerate() {
                *prediction += tree.predict(x.row(row)).map_err(|error| {
                    ModelUnavailable::FitFailed {
                        reason: error.to_string(),
                    }
                })?;
            }
            trees.push(tree);
        }

        Ok(Self {
            base_score,
            n_features: x.ncols(),
            trees,
        })
    }
}

impl ScalarModel for GradientBoostedModel {
    fn predict(&self, input: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        if input.len() != self.n_features {
            return Err(ModelError::InputShape {
                expected: self.n_features,
                actual: input.len(),
            });
        }

        let mut total = self.base_score;
        for tree in &self.trees {
            total += tree.predict(input)?;
        }
        if !total.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(total)
    }
}

/// Gradient-boosted volatility forecaster.
///
/// Uses the pretrained ensemble when one was loaded, otherwise fits a fresh
/// ensemble on the request's own history.
#[derive(Clone, Default)]
pub struct BoostedForecaster {
    config: BoostedConfig,
    pretrained: Option<Arc<dyn ScalarModel>>,
}

impl BoostedForecaster {
    pub fn new(config: BoostedConfig, pretrained: Option<Arc<dyn ScalarModel>>) -> Self {
        Self { config, pretrained }
    }

    fn min_features_history(&self) -> usize {
        self.config.window.max(MAX_LAG + 1)
    }

    fn min_fit_history(&self) -> usize {
        self.min_features_history() - 1 + self.config.min_training_rows + self.config.horizon
    }

    fn fit_in_process(&self, values: &[f64]) -> Result<GradientBoostedModel, ModelUnavailable> {
        let (rows, targets) = training_set(values, self.config.window, self.config.horizon);
        if rows.len() < self.config.min_training_rows {
            return Err(ModelUnavailable::InsufficientHistory {
                required: self.min_fit_history(),
                available: values.len(),
            });
        }

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let x = Array2::from_shape_vec((rows.len(), FEATURE_NAMES.len()), flat).map_err(
            |error| ModelUnavailable::FitFailed {
                reason: error.to_string(),
            },
        )?;
        let y = Array1::from(targets);
        GradientBoostedModel::fit(x.view(), y.view(), &self.config)
    }
}

impl VolatilityForecaster for BoostedForecaster {
    fn model(&self) -> ForecastModel {
        ForecastModel::Xgboost
    }

    fn forecast(&self, returns: &ReturnSeries) -> Result<Forecast, ModelUnavailable> {
        let values = returns.values();
        let features = feature_vector(values, self.config.window).ok_or(
            ModelUnavailable::InsufficientHistory {
                required: self.min_features_history(),
                available: values.len(),
            },
        )?;

        let (prediction, origin) = match &self.pretrained {
            Some(model) => (
                model
                    .predict(features.view())
                    .map_err(ModelUnavailable::Evaluation)?,
                ForecastOrigin::Pretrained,
            ),
            None => {
                let model = self.fit_in_process(values)?;
                (
                    model
                        .predict(features.view())
                        .map_err(ModelUnavailable::Evaluation)?,
                    ForecastOrigin::InProcessFit,
                )
            }
        };

        if !prediction.is_finite() {
            return Err(ModelUnavailable::NonFiniteOutput);
        }
        Forecast::from_per_period_pct(prediction, returns, origin)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use riskiq_core::{Interval, PriceSeries, Symbol, UtcDateTime};

    use super::*;

    fn return_series(returns: &[f64]) -> ReturnSeries {
        let mut closes = vec![100.0];
        for r in returns {
            let last = closes[closes.len() - 1];
            closes.push(last * (1.0 + r / 100.0));
        }
        let prices = PriceSeries::from_closes(
            Symbol::parse("XGB").expect("symbol"),
            "USD",
            Interval::OneDay,
            UtcDateTime::parse("2024-12-31T00:00:00Z").expect("ts"),
            &closes,
        )
        .expect("prices");
        ReturnSeries::from_prices(&prices).expect("returns")
    }

    fn wavy_returns(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let amplitude = 0.5 + (i as f64 / 15.0).sin().abs() * 2.0;
                if i % 2 == 0 {
                    amplitude
                } else {
                    -amplitude * 0.9
                }
            })
            .collect()
    }

    #[test]
    fn features_use_window_and_previous_lags() {
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        let features = feature_vector(&values, 20).expect("features");

        assert!((features[1] - 10.5).abs() < 1e-12);
        assert_eq!(features[2], 19.0);
        assert_eq!(features[3], 18.0);
        assert_eq!(features[4], 17.0);
        assert!(feature_vector(&values[..19], 20).is_none());
    }

    #[test]
    fn tree_routes_on_threshold() {
        let tree = RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: -1.0 },
                TreeNode::Leaf { value: 1.0 },
            ],
        };
        assert_eq!(tree.predict(array![0.5].view()), Ok(-1.0));
        assert_eq!(tree.predict(array![1.0].view()), Ok(1.0));
    }

    #[test]
    fn cyclic_tree_is_rejected_instead_of_looping() {
        let tree = RegressionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(matches!(
            tree.predict(array![0.0].view()),
            Err(ModelError::Malformed { .. })
        ));
    }

    #[test]
    fn boosting_reduces_training_error() {
        let x = Array2::from_shape_fn((40, 1), |(row, _)| row as f64);
        let y = Array1::from_shape_fn(40, |row| if row < 20 { 1.0 } else { 3.0 });
        let config = BoostedConfig {
            subsample: 1.0,
            ..BoostedConfig::default()
        };

        let model = GradientBoostedModel::fit(x.view(), y.view(), &config).expect("fit");
        let low = model.predict(array![5.0].view()).expect("predict");
        let high = model.predict(array![35.0].view()).expect("predict");

        assert_eq!(model.trees.len(), 50);
        assert!((low - 1.0).abs() < 0.05);
        assert!((high - 3.0).abs() < 0.05);
    }

    #[test]
    fn in_process_fit_needs_thirty_four_returns() {
        let forecaster = BoostedForecaster::default();

        let err = forecaster
            .forecast(&return_series(&wavy_returns(33)))
            .expect_err("must be unavailable");
        assert_eq!(
            err,
            ModelUnavailable::InsufficientHistory {
                required: 34,
                available: 33
            }
        );

        let forecast = forecaster
            .forecast(&return_series(&wavy_returns(34)))
            .expect("forecast");
        assert_eq!(forecast.origin, ForecastOrigin::InProcessFit);
        assert!(forecast.volatility >= 0.0);
    }

    #[test]
    fn in_process_fit_is_reproducible() {
        let returns = return_series(&wavy_returns(120));
        let first = BoostedForecaster::default().forecast(&returns).expect("forecast");
        let second = BoostedForecaster::default().forecast(&returns).expect("forecast");
        assert_eq!(first, second);
    }

    struct Constant(f64);

    impl ScalarModel for Constant {
        fn predict(&self, _input: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
            Ok(self.0)
        }
    }

    #[test]
    fn pretrained_model_is_preferred_and_negative_output_clamps() {
        let forecaster =
            BoostedForecaster::new(BoostedConfig::default(), Some(Arc::new(Constant(-0.4))));
        let forecast = forecaster
            .forecast(&return_series(&wavy_returns(25)))
            .expect("forecast");

        assert_eq!(forecast.origin, ForecastOrigin::Pretrained);
        assert_eq!(forecast.volatility, 0.0);
    }

    #[test]
    fn pretrained_path_needs_only_the_feature_window() {
        let forecaster =
            BoostedForecaster::new(BoostedConfig::default(), Some(Arc::new(Constant(1.0))));

        let err = forecaster
            .forecast(&return_series(&wavy_returns(19)))
            .expect_err("must be unavailable");
        assert!(matches!(
            err,
            ModelUnavailable::InsufficientHistory {
                required: 20,
                available: 19
            }
        ));
    }
}
