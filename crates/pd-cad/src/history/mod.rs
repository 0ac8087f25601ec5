//! Parametric History
//!
//! Manages the ordered list of features inside a body together with the
//! body's sketches and its tip, supporting suppression, reordering and
//! rebuild.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::feature::{Feature, FeatureError, FeatureResult, Suppressible};
use crate::kernel::{CadKernel, Solid, default_kernel};
use crate::sketch::Sketch;

/// An entry in the feature history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The feature
    pub feature: Feature,
    /// Shape produced by the last rebuild
    #[serde(skip)]
    pub shape: Option<Solid>,
    /// Error reported by the last rebuild
    #[serde(skip)]
    pub error: Option<String>,
}

impl HistoryEntry {
    /// Create a new history entry
    pub fn new(feature: Feature) -> Self {
        Self {
            feature,
            shape: None,
            error: None,
        }
    }
}

/// Manages the parametric feature history of one body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureHistory {
    /// Ordered list of features
    entries: Vec<HistoryEntry>,
    /// Feature representing the end-of-history state
    tip: Option<String>,
    /// Sketches in creation order
    sketches: Vec<Sketch>,
}

impl FeatureHistory {
    /// Create a new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of features
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a feature by index
    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.entries.get(index).map(|e| &e.feature)
    }

    /// Get a feature by name
    pub fn get_by_name(&self, name: &str) -> Option<&Feature> {
        self.entry(name).map(|e| &e.feature)
    }

    /// Get a mutable feature by name
    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut Feature> {
        self.entries
            .iter_mut()
            .find(|e| e.feature.name == name)
            .map(|e| &mut e.feature)
    }

    /// Get a history entry by feature name
    pub fn entry(&self, name: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.feature.name == name)
    }

    /// Get the index of a feature by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.feature.name == name)
    }

    /// Add a feature right after the tip and make it the new tip
    pub fn add_feature(&mut self, feature: Feature) -> usize {
        let index = self.tip_index().map_or(self.entries.len(), |tip| tip + 1);
        self.tip = Some(feature.name.clone());
        self.entries.insert(index, HistoryEntry::new(feature));
        index
    }

    /// Remove a feature from the history
    ///
    /// If the feature was the tip, the tip moves to the previous feature.
    pub fn remove_feature(&mut self, name: &str) -> Option<Feature> {
        let index = self.index_of(name)?;
        let entry = self.entries.remove(index);
        if self.tip.as_deref() == Some(name) {
            self.tip = index
                .checked_sub(1)
                .and_then(|i| self.entries.get(i))
                .map(|e| e.feature.name.clone());
        }
        Some(entry.feature)
    }

    /// Move a feature to a new position
    pub fn move_feature(&mut self, name: &str, new_index: usize) -> FeatureResult<()> {
        let old_index = self
            .index_of(name)
            .ok_or_else(|| FeatureError::FeatureNotFound(name.to_string()))?;

        if new_index >= self.entries.len() {
            return Err(FeatureError::InvalidFeature("Invalid new index".into()));
        }

        let entry = self.entries.remove(old_index);
        self.entries.insert(new_index, entry);

        if let Err(e) = self.validate() {
            let entry = self.entries.remove(new_index);
            self.entries.insert(old_index, entry);
            return Err(e);
        }
        Ok(())
    }

    /// Get all features
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.entries.iter().map(|e| &e.feature)
    }

    /// Get all history entries
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Features whose base shape is the named feature
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.features()
            .filter(|f| f.base_feature() == Some(name))
            .map(|f| f.name.as_str())
            .collect()
    }

    // ============== Sketch Management ==============

    /// Add a sketch
    pub fn add_sketch(&mut self, sketch: Sketch) {
        self.sketches.push(sketch);
    }

    /// Get a sketch by name
    pub fn get_sketch(&self, name: &str) -> Option<&Sketch> {
        self.sketches.iter().find(|s| s.name == name)
    }

    /// Get a mutable sketch by name
    pub fn get_sketch_mut(&mut self, name: &str) -> Option<&mut Sketch> {
        self.sketches.iter_mut().find(|s| s.name == name)
    }

    /// Remove a sketch
    pub fn remove_sketch(&mut self, name: &str) -> Option<Sketch> {
        let index = self.sketches.iter().position(|s| s.name == name)?;
        Some(self.sketches.remove(index))
    }

    /// Get all sketches
    pub fn sketches(&self) -> &[Sketch] {
        &self.sketches
    }

    /// Features that consume the named sketch
    pub fn consumers_of_sketch(&self, name: &str) -> Vec<&str> {
        self.features()
            .filter(|f| f.profile_sketch() == Some(name))
            .map(|f| f.name.as_str())
            .collect()
    }

    // ============== Tip ==============

    /// Name of the tip feature
    pub fn tip(&self) -> Option<&str> {
        self.tip.as_deref()
    }

    /// Index of the tip feature
    pub fn tip_index(&self) -> Option<usize> {
        self.tip.as_deref().and_then(|tip| self.index_of(tip))
    }

    /// Make a feature the tip (features after it are not computed)
    pub fn set_tip(&mut self, name: &str) -> FeatureResult<()> {
        if self.index_of(name).is_none() {
            return Err(FeatureError::FeatureNotFound(name.to_string()));
        }
        self.tip = Some(name.to_string());
        Ok(())
    }

    /// Get the effective number of features (up to and including the tip)
    pub fn effective_len(&self) -> usize {
        self.tip_index().map_or(0, |tip| tip + 1)
    }

    /// Iterate over effective features
    pub fn effective_features(&self) -> impl Iterator<Item = &Feature> {
        let end = self.effective_len();
        self.entries[..end].iter().map(|e| &e.feature)
    }

    /// Shape of the body: the tip's shape after the last rebuild
    pub fn shape(&self) -> Option<&Solid> {
        self.tip.as_deref().and_then(|tip| self.entry(tip)?.shape.as_ref())
    }

    // ============== Suppression ==============

    /// First feature, other than `skip`, that a rebuild would fail on
    fn first_failure(&self, kernel: &dyn CadKernel, skip: &str) -> Option<String> {
        let mut trial = self.clone();
        trial.rebuild(kernel).err()?;
        trial.entries[..trial.effective_len()]
            .iter()
            .find(|e| e.error.is_some() && e.feature.name != skip)
            .map(|e| e.feature.name.clone())
    }

    /// Suppress or unsuppress a feature, checked with the default kernel
    pub fn set_suppressed(&mut self, name: &str, value: bool) -> FeatureResult<()> {
        self.set_suppressed_with(name, value, default_kernel().as_ref())
    }

    /// Suppress or unsuppress a feature
    ///
    /// The change is tried on a rebuild first. It fails with
    /// [`FeatureError::Dependency`] and leaves the history unchanged when a
    /// later feature that rebuilt before would no longer rebuild, either
    /// because it loses its input shape or because the sub-elements it
    /// references are gone from that input.
    pub fn set_suppressed_with(
        &mut self,
        name: &str,
        value: bool,
        kernel: &dyn CadKernel,
    ) -> FeatureResult<()> {
        let feature = self
            .get_by_name(name)
            .ok_or_else(|| FeatureError::FeatureNotFound(name.to_string()))?;
        if feature.suppressible().is_none() {
            return Err(FeatureError::InvalidFeature(format!(
                "{name} cannot be suppressed"
            )));
        }
        let previous = feature.is_suppressed();
        if previous == value {
            return Ok(());
        }

        let failing_before = self.first_failure(kernel, name);
        if let Some(feature) = self.get_by_name_mut(name) {
            feature.set_suppressed_flag(value);
        }
        let failing_after = self.first_failure(kernel, name);

        if let Some(dependent) = failing_after
            && Some(&dependent) != failing_before.as_ref()
        {
            if let Some(feature) = self.get_by_name_mut(name) {
                feature.set_suppressed_flag(previous);
            }
            return Err(FeatureError::Dependency {
                feature: dependent,
                dependency: name.to_string(),
            });
        }

        tracing::debug!("{} suppressed = {}", name, value);
        Ok(())
    }

    // ============== Validation ==============

    /// Check that every reference inside the history resolves
    pub fn validate(&self) -> FeatureResult<()> {
        for (index, feature) in self.features().enumerate() {
            if let Some(base) = feature.base_feature() {
                match self.index_of(base) {
                    Some(base_index) if base_index < index => {}
                    _ => {
                        return Err(FeatureError::FeatureNotFound(format!(
                            "{base} (base of {})",
                            feature.name
                        )));
                    }
                }
            }
            if let Some(sketch) = feature.profile_sketch()
                && self.get_sketch(sketch).is_none()
            {
                return Err(FeatureError::SketchNotFound(sketch.to_string()));
            }
        }

        if let Some(tip) = &self.tip
            && self.index_of(tip).is_none()
        {
            return Err(FeatureError::FeatureNotFound(format!("{tip} (tip)")));
        }
        Ok(())
    }

    // ============== Rebuild ==============

    /// Rebuild all geometry from features
    ///
    /// Every feature up to the tip is executed; failures are logged and
    /// recorded on their entry, and the first one is returned.
    pub fn rebuild(&mut self, kernel: &dyn CadKernel) -> FeatureResult<()> {
        let end = self.effective_len();
        let mut outputs: HashMap<String, Option<Solid>> = HashMap::new();
        let mut running: Option<Solid> = None;
        let mut first_error = None;

        for entry in &mut self.entries {
            entry.shape = None;
            entry.error = None;
        }

        for entry in &mut self.entries[..end] {
            let input = match entry.feature.base_feature() {
                Some(base) => match outputs.get(base) {
                    Some(shape) => shape.as_ref(),
                    None => {
                        let e = FeatureError::FeatureNotFound(base.to_string());
                        tracing::warn!("Feature {} failed: {}", entry.feature.name, e);
                        entry.error = Some(e.to_string());
                        first_error.get_or_insert(e);
                        continue;
                    }
                },
                None => running.as_ref(),
            };

            match entry.feature.execute(kernel, &self.sketches, input) {
                Ok(shape) => {
                    entry.shape = shape.clone();
                    outputs.insert(entry.feature.name.clone(), shape.clone());
                    running = shape;
                }
                Err(e) => {
                    // Log error but continue with other features
                    tracing::warn!("Feature {} failed: {}", entry.feature.name, e);
                    entry.error = Some(e.to_string());
                    outputs.insert(entry.feature.name.clone(), None);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::ShapeRef;
    use crate::kernel::{AnalyticKernel, Plane};
    use approx::assert_relative_eq;
    use glam::DVec2;

    /// Pad on a 10x10 square, filleted and then chamfered
    fn dressed_pad() -> FeatureHistory {
        let mut history = FeatureHistory::new();
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        sketch
            .add_rectangle(DVec2::ZERO, DVec2::new(10.0, 10.0))
            .unwrap();
        history.add_sketch(sketch);
        history.add_feature(Feature::pad("Pad", "Sketch", 10.0));
        history.add_feature(Feature::fillet(
            "Fillet",
            ShapeRef::new("Pad", &["Edge1"]),
            1.0,
        ));
        history.add_feature(Feature::chamfer(
            "Chamfer",
            ShapeRef::new("Fillet", &["Edge2"]),
            0.5,
        ));
        history
    }

    #[test]
    fn test_add_feature_moves_tip() {
        let mut history = FeatureHistory::new();
        history.add_feature(Feature::additive_box("Box", 1.0, 1.0, 1.0));
        history.add_feature(Feature::additive_box("Box001", 1.0, 1.0, 1.0));
        assert_eq!(history.tip(), Some("Box001"));

        history.set_tip("Box").unwrap();
        history.add_feature(Feature::additive_box("Box002", 1.0, 1.0, 1.0));
        let names: Vec<_> = history.features().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Box", "Box002", "Box001"]);
        assert_eq!(history.tip(), Some("Box002"));
        assert_eq!(history.effective_len(), 2);
        assert!(history.set_tip("Missing").is_err());
    }

    #[test]
    fn test_remove_tip_moves_back() {
        let mut history = dressed_pad();
        assert!(history.remove_feature("Chamfer").is_some());
        assert_eq!(history.tip(), Some("Fillet"));
        assert!(history.remove_feature("Chamfer").is_none());
    }

    #[test]
    fn test_rebuild_dressed_pad() {
        let kernel = AnalyticKernel::new();
        let mut history = dressed_pad();
        history.rebuild(&kernel).unwrap();

        let pad = history.entry("Pad").unwrap().shape.as_ref().unwrap().volume;
        let fillet = history.entry("Fillet").unwrap().shape.as_ref().unwrap().volume;
        let body = history.shape().unwrap().volume;
        assert_relative_eq!(pad, 1000.0);
        assert!(fillet < pad);
        assert!(body < fillet);
        assert_eq!(history.shape().unwrap().face_count(), 8);
    }

    #[test]
    fn test_suppression_round_trip() {
        let kernel = AnalyticKernel::new();
        let mut history = dressed_pad();
        history.rebuild(&kernel).unwrap();
        let active = history.shape().unwrap().volume;

        history.set_suppressed("Fillet", true).unwrap();
        history.rebuild(&kernel).unwrap();
        let suppressed = history.shape().unwrap().volume;
        assert!((suppressed - active).abs() > 1e-2);

        history.set_suppressed("Fillet", false).unwrap();
        history.rebuild(&kernel).unwrap();
        assert_relative_eq!(history.shape().unwrap().volume, active, epsilon = 1e-9);
    }

    #[test]
    fn test_suppress_all_dressups() {
        let kernel = AnalyticKernel::new();
        let mut history = dressed_pad();
        history.set_suppressed("Fillet", true).unwrap();
        history.set_suppressed("Chamfer", true).unwrap();
        history.rebuild(&kernel).unwrap();
        assert_relative_eq!(history.shape().unwrap().volume, 1000.0);
    }

    #[test]
    fn test_suppressing_required_input_fails() {
        let mut history = dressed_pad();
        let err = history.set_suppressed("Pad", true).unwrap_err();
        match err {
            FeatureError::Dependency {
                feature,
                dependency,
            } => {
                assert_eq!(feature, "Fillet");
                assert_eq!(dependency, "Pad");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!history.get_by_name("Pad").unwrap().is_suppressed());
    }

    #[test]
    fn test_suppressing_referenced_edges_fails() {
        let kernel = AnalyticKernel::new();
        let mut history = FeatureHistory::new();
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        sketch
            .add_rectangle(DVec2::ZERO, DVec2::new(10.0, 10.0))
            .unwrap();
        history.add_sketch(sketch);
        history.add_feature(Feature::pad("Pad", "Sketch", 10.0));
        history.add_feature(Feature::chamfer(
            "Chamfer",
            ShapeRef::new("Pad", &["Edge1"]),
            1.0,
        ));
        // Edge13 only exists once the chamfer has added its boundary edges
        history.add_feature(Feature::fillet(
            "Fillet",
            ShapeRef::new("Chamfer", &["Edge13"]),
            0.5,
        ));
        history.rebuild(&kernel).unwrap();
        let volume = history.shape().unwrap().volume;

        let err = history.set_suppressed("Chamfer", true).unwrap_err();
        assert!(
            matches!(
                &err,
                FeatureError::Dependency { feature, dependency }
                    if feature == "Fillet" && dependency == "Chamfer"
            ),
            "unexpected error: {err}"
        );
        assert!(!history.get_by_name("Chamfer").unwrap().is_suppressed());

        history.rebuild(&kernel).unwrap();
        assert_relative_eq!(history.shape().unwrap().volume, volume);

        history.set_suppressed("Fillet", true).unwrap();
        history.set_suppressed("Chamfer", true).unwrap();
        history.rebuild(&kernel).unwrap();
        assert_relative_eq!(history.shape().unwrap().volume, 1000.0);
    }

    #[test]
    fn test_unchanged_flag_is_a_no_op() {
        let mut history = dressed_pad();
        history.set_suppressed("Fillet", false).unwrap();
        assert!(!history.get_by_name("Fillet").unwrap().is_suppressed());
        assert!(matches!(
            history.set_suppressed("Missing", true),
            Err(FeatureError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_validate_and_move() {
        let mut history = dressed_pad();
        history.validate().unwrap();

        assert!(history.move_feature("Fillet", 0).is_err());
        let names: Vec<_> = history.features().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Pad", "Fillet", "Chamfer"]);

        history.remove_sketch("Sketch");
        assert!(matches!(
            history.validate(),
            Err(FeatureError::SketchNotFound(_))
        ));
    }

    #[test]
    fn test_rebuild_reports_failure() {
        let kernel = AnalyticKernel::new();
        let mut history = dressed_pad();
        if let Some(crate::feature::FeatureKind::Fillet { radius, .. }) =
            history.get_by_name_mut("Fillet").map(|f| &mut f.kind)
        {
            *radius = 8.0;
        }
        assert!(history.rebuild(&kernel).is_err());
        assert!(history.entry("Fillet").unwrap().error.is_some());
        assert!(history.entry("Pad").unwrap().shape.is_some());
    }

    #[test]
    fn test_dependents() {
        let history = dressed_pad();
        assert_eq!(history.dependents_of("Pad"), vec!["Fillet"]);
        assert_eq!(history.consumers_of_sketch("Sketch"), vec!["Pad"]);
    }
}
