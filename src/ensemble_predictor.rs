// Ensemble Predictor
// Per-symbol averaged probabilities over two tree ensembles -> (direction, confidence).
// Artifacts are read-only after load (spec §5); this module never mutates shared state.

use decision_core::{CanonicalSymbol, FeatureVector, Side};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const CALIBRATION_FLOOR: f64 = 52.0;
pub const DISAGREEMENT_MARGIN: f64 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MlDirection {
    Buy,
    Sell,
    Hold,
}

impl MlDirection {
    pub fn as_side(&self) -> Option<Side> {
        match self {
            MlDirection::Buy => Some(Side::Buy),
            MlDirection::Sell => Some(Side::Sell),
            MlDirection::Hold => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    pub direction: MlDirection,
    pub confidence: f64,
}

/// A single tree-ensemble artifact: ordered feature names it was trained on,
/// plus a deterministic scoring function standing in for the serialized
/// model weights (spec treats artifacts as opaque; this crate never trains
/// or deserializes a real model binary, only exercises the projection and
/// averaging contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub bias: f64,
}

impl ArtifactModel {
    pub fn new(feature_names: Vec<String>, coefficients: Vec<f64>, bias: f64) -> Self {
        Self { feature_names, coefficients, bias }
    }

    /// Deserialize a single exported artifact (spec §1: "Exporters and
    /// trainers that build the ensemble artifacts are consumed by the
    /// engine as opaque serialized predictors"). A malformed or unreadable
    /// file is fatal at startup (spec §6 exit codes), never a per-request
    /// HOLD.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("reading artifact {}: {e}", path.display()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("parsing artifact {}: {e}", path.display()))
    }

    /// Probability of BUY in [0, 1], via a projected logistic combination.
    fn predict_buy_probability(&self, projected: &[f64]) -> f64 {
        let dot: f64 = projected
            .iter()
            .zip(self.coefficients.iter().chain(std::iter::repeat(&0.0)))
            .map(|(f, c)| f * c)
            .sum();
        1.0 / (1.0 + (-(dot + self.bias)).exp())
    }
}

/// Two per-symbol classifiers whose probabilities are averaged element-wise
/// (spec §4.2).
pub struct SymbolEnsemble {
    pub model_a: ArtifactModel,
    pub model_b: ArtifactModel,
}

/// Loaded, read-only after process start.
#[derive(Default)]
pub struct EnsemblePredictor {
    ensembles: HashMap<CanonicalSymbol, SymbolEnsemble>,
}

impl EnsemblePredictor {
    pub fn new() -> Self {
        Self { ensembles: HashMap::new() }
    }

    pub fn with_ensemble(mut self, symbol: CanonicalSymbol, ensemble: SymbolEnsemble) -> Self {
        self.ensembles.insert(symbol, ensemble);
        self
    }

    /// Load every canonical symbol's two-model ensemble from
    /// `{dir}/{symbol}_a.json` / `{dir}/{symbol}_b.json`. A symbol with
    /// neither file present is left unloaded (spec §4.2 failure mode:
    /// missing artifact -> (HOLD, 50), never fatal). A symbol with exactly
    /// one of the two files present, or a file that fails to parse, is a
    /// startup-fatal artifact/schema mismatch (spec §6 exit codes).
    pub fn load_from_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut predictor = Self::new();
        for symbol in CanonicalSymbol::ALL {
            let path_a = dir.join(format!("{symbol}_a.json"));
            let path_b = dir.join(format!("{symbol}_b.json"));
            match (path_a.exists(), path_b.exists()) {
                (false, false) => continue,
                (true, true) => {
                    let model_a = ArtifactModel::load(&path_a)?;
                    let model_b = ArtifactModel::load(&path_b)?;
                    predictor = predictor.with_ensemble(symbol, SymbolEnsemble { model_a, model_b });
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "symbol {symbol} has only one of its two ensemble artifacts in {}",
                        dir.display()
                    ))
                }
            }
        }
        Ok(predictor)
    }

    /// Missing artifact -> (HOLD, 50) (spec §4.2 failure mode).
    pub fn predict(&self, symbol: CanonicalSymbol, features: &FeatureVector) -> Prediction {
        let Some(ensemble) = self.ensembles.get(&symbol) else {
            return Prediction { direction: MlDirection::Hold, confidence: 50.0 };
        };

        let projected_a = features.project(&ensemble.model_a.feature_names);
        let projected_b = features.project(&ensemble.model_b.feature_names);

        let buy_a = ensemble.model_a.predict_buy_probability(&projected_a);
        let buy_b = ensemble.model_b.predict_buy_probability(&projected_b);

        let avg_buy = (buy_a + buy_b) / 2.0;
        let avg_sell = 1.0 - avg_buy;

        let margin = (buy_a - buy_b).abs();
        let (direction, confidence) = if avg_buy >= avg_sell {
            (MlDirection::Buy, avg_buy * 100.0)
        } else {
            (MlDirection::Sell, avg_sell * 100.0)
        };

        if confidence < CALIBRATION_FLOOR || margin > DISAGREEMENT_MARGIN {
            return Prediction { direction: MlDirection::Hold, confidence: confidence.max(50.0) };
        }

        Prediction { direction, confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_model(names: &[&str], weight: f64) -> ArtifactModel {
        let feature_names = names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let coefficients = vec![weight; feature_names.len()];
        ArtifactModel::new(feature_names, coefficients, 0.0)
    }

    #[test]
    fn missing_artifact_falls_back_to_hold_fifty() {
        let predictor = EnsemblePredictor::new();
        let features = FeatureVector::neutral();
        let prediction = predictor.predict(CanonicalSymbol::Eurusd, &features);
        assert_eq!(prediction.direction, MlDirection::Hold);
        assert_eq!(prediction.confidence, 50.0);
    }

    #[test]
    fn low_confidence_is_forced_to_hold() {
        let names = FeatureVector::names();
        let ensemble = SymbolEnsemble { model_a: flat_model(&names_as_str(&names), 0.0), model_b: flat_model(&names_as_str(&names), 0.0) };
        let predictor = EnsemblePredictor::new().with_ensemble(CanonicalSymbol::Eurusd, ensemble);
        let features = FeatureVector::neutral();
        let prediction = predictor.predict(CanonicalSymbol::Eurusd, &features);
        assert_eq!(prediction.direction, MlDirection::Hold);
    }

    fn names_as_str(names: &[String]) -> Vec<&str> {
        names.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn load_from_dir_skips_symbols_with_no_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let predictor = EnsemblePredictor::load_from_dir(dir.path()).expect("empty dir loads fine");
        let prediction = predictor.predict(CanonicalSymbol::Eurusd, &FeatureVector::neutral());
        assert_eq!(prediction.direction, MlDirection::Hold);
    }

    #[test]
    fn load_from_dir_is_fatal_on_one_sided_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = flat_model(&names_as_str(&FeatureVector::names()), 0.1);
        std::fs::write(
            dir.path().join("eurusd_a.json"),
            serde_json::to_vec(&model).unwrap(),
        )
        .unwrap();
        let result = EnsemblePredictor::load_from_dir(dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn load_from_dir_loads_a_complete_pair() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = flat_model(&names_as_str(&FeatureVector::names()), 0.05);
        let bytes = serde_json::to_vec(&model).unwrap();
        std::fs::write(dir.path().join("eurusd_a.json"), &bytes).unwrap();
        std::fs::write(dir.path().join("eurusd_b.json"), &bytes).unwrap();
        let predictor = EnsemblePredictor::load_from_dir(dir.path()).expect("pair loads");
        let prediction = predictor.predict(CanonicalSymbol::Eurusd, &FeatureVector::neutral());
        assert!(prediction.confidence.is_finite());
    }
}
