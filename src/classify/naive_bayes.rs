//! Gaussian Naive Bayes over dense feature rows.

use std::cmp::Ordering;
use std::f64::consts::PI;

use ndarray::{Array1, ArrayView1, Axis};

use crate::errors::{Result, SocialMeterError};
use crate::pipeline::traits::ClassifierBackend;

use super::{bad_param, training_matrix, ParamMap, ParamValue};

/// Per-class Gaussian statistics
#[derive(Debug, Clone)]
struct ClassStats {
    label: String,
    /// `ln P(class) - 0.5 * sum(ln(2 * pi * var))`
    log_norm: f64,
    means: Array1<f64>,
    variances: Array1<f64>,
}

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone)]
pub struct GaussianNaiveBayes {
    /// Sorted by label
    classes: Vec<ClassStats>,
    n_features: usize,
    /// Added to every variance; scaled by the largest feature variance
    var_smoothing: f64,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            n_features: 0,
            var_smoothing: 1e-9,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Class labels seen during fitting, sorted
    pub fn classes(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.label.as_str()).collect()
    }

    fn joint_log_likelihood(&self, stats: &ClassStats, row: ArrayView1<f64>) -> f64 {
        let diff = &row - &stats.means;
        stats.log_norm - 0.5 * (&diff * &diff / &stats.variances).sum()
    }
}

impl ClassifierBackend for GaussianNaiveBayes {
    fn name(&self) -> &str {
        "gaussian_nb"
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<()> {
        let x = training_matrix(features, labels)?;
        let (n_samples, n_features) = x.dim();

        let mut labels_sorted: Vec<&String> = labels.iter().collect();
        labels_sorted.sort();
        labels_sorted.dedup();

        // Floor the smoothing so constant features never give zero variance.
        let max_variance = x.var_axis(Axis(0), 0.0).fold(0.0, |m: f64, &v| m.max(v));
        let epsilon = (self.var_smoothing * max_variance).max(f64::MIN_POSITIVE.sqrt());

        let mut classes = Vec::with_capacity(labels_sorted.len());
        for label in labels_sorted {
            let rows: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, y)| *y == label)
                .map(|(i, _)| i)
                .collect();
            let class_x = x.select(Axis(0), &rows);
            let means = class_x
                .mean_axis(Axis(0))
                .ok_or_else(|| SocialMeterError::internal(format!("class '{label}' has no rows")))?;
            let variances = class_x.var_axis(Axis(0), 0.0) + epsilon;
            let log_prior = (rows.len() as f64 / n_samples as f64).ln();
            let log_norm = log_prior - 0.5 * variances.mapv(|v| (2.0 * PI * v).ln()).sum();
            classes.push(ClassStats {
                label: label.clone(),
                log_norm,
                means,
                variances,
            });
        }

        self.classes = classes;
        self.n_features = n_features;
        Ok(())
    }

    fn predict_one(&self, row: &[f64]) -> Result<String> {
        if self.classes.is_empty() {
            return Err(SocialMeterError::not_trained("gaussian_nb has not been fitted"));
        }
        if row.len() != self.n_features {
            return Err(SocialMeterError::data(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        let row = ArrayView1::from(row);
        let best = self
            .classes
            .iter()
            .map(|stats| (stats, self.joint_log_likelihood(stats, row)))
            .fold(None::<(&ClassStats, f64)>, |best, (stats, ll)| match best {
                Some((_, best_ll)) if ll.partial_cmp(&best_ll) != Some(Ordering::Greater) => best,
                _ => Some((stats, ll)),
            });
        best.map(|(stats, _)| stats.label.clone())
            .ok_or_else(|| SocialMeterError::backend("no class could be scored"))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "var_smoothing" => match value.as_f64() {
                Some(v) if v >= 0.0 => {
                    self.var_smoothing = v;
                    Ok(())
                }
                _ => Err(bad_param(self.name(), name, value, "a non-negative number")),
            },
            other => Err(SocialMeterError::invalid_config(format!(
                "gaussian_nb has no parameter '{other}'"
            ))),
        }
    }

    fn params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("var_smoothing".into(), ParamValue::Float(self.var_smoothing));
        params
    }

    fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }

    fn boxed_clone(&self) -> Box<dyn ClassifierBackend> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ls: &[&str]) -> Vec<String> {
        ls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_separable_classes() {
        let x = vec![
            vec![0.0, 1.0],
            vec![0.2, 1.1],
            vec![0.1, 0.9],
            vec![5.0, 7.0],
            vec![5.2, 7.1],
            vec![4.9, 6.8],
        ];
        let y = labels(&["0", "0", "0", "1", "1", "1"]);
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        assert!(nb.is_fitted());
        assert_eq!(nb.classes(), vec!["0", "1"]);
        assert_eq!(nb.predict_one(&[0.1, 1.0]).unwrap(), "0");
        assert_eq!(nb.predict_one(&[5.1, 7.0]).unwrap(), "1");
        assert_eq!(nb.score(&x, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_constant_feature_does_not_blow_up() {
        let x = vec![vec![1.0], vec![1.0], vec![2.0], vec![2.0]];
        let y = labels(&["a", "a", "b", "b"]);
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        assert_eq!(nb.predict_one(&[1.0]).unwrap(), "a");
        assert_eq!(nb.predict_one(&[2.0]).unwrap(), "b");
    }

    #[test]
    fn test_class_statistics() {
        let x = vec![vec![1.0, 10.0], vec![3.0, 10.0], vec![7.0, 0.0]];
        let y = labels(&["a", "a", "b"]);
        let mut nb = GaussianNaiveBayes::new().with_var_smoothing(0.0);
        nb.fit(&x, &y).unwrap();

        let a = &nb.classes[0];
        assert_eq!(a.means.to_vec(), vec![2.0, 10.0]);
        // population variance plus the smoothing floor
        assert!((a.variances[0] - 1.0).abs() < 1e-9);
        assert!(a.variances[1] > 0.0 && a.variances[1] < 1e-9);
        assert_eq!(nb.classes[1].means.to_vec(), vec![7.0, 0.0]);
    }

    #[test]
    fn test_predict_before_fit() {
        let nb = GaussianNaiveBayes::new();
        let err = nb.predict_one(&[1.0]).unwrap_err();
        assert!(matches!(err, SocialMeterError::NotTrained { .. }));
    }

    #[test]
    fn test_wrong_width_is_data_error() {
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&[vec![1.0, 2.0]], &labels(&["x"])).unwrap();
        assert!(nb.predict_one(&[1.0]).unwrap_err().is_data());
    }

    #[test]
    fn test_set_param() {
        let mut nb = GaussianNaiveBayes::new();
        nb.set_param("var_smoothing", &ParamValue::Float(1e-3)).unwrap();
        assert_eq!(nb.params()["var_smoothing"], ParamValue::Float(1e-3));
        assert!(nb.set_param("var_smoothing", &ParamValue::Float(-1.0)).is_err());
        assert!(nb.set_param("alpha", &ParamValue::Int(1)).is_err());
    }
}
