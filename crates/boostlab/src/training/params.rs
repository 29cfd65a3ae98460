//! Hyperparameter values, parameter sets and search grids.
//!
//! - [`ParamValue`]: a single untyped value as it appears in a request
//! - [`ParamSet`]: a name → value mapping with deterministic ordering
//! - [`ParamGrid`]: the user-facing grid, order-preserving and unvalidated
//! - [`SearchSpace`]: a validated grid that enumerates candidate param sets

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TrainingError;

// =============================================================================
// ParamValue
// =============================================================================

/// A hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric value for ints and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "string",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

// =============================================================================
// ParamSet
// =============================================================================

/// Name → value mapping. Serializes with sorted keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy of `self` with every entry of `overrides` applied on top.
    pub fn merged_with(&self, overrides: &ParamSet) -> ParamSet {
        let mut merged = self.clone();
        for (k, v) in &overrides.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        f.write_str("}")
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// =============================================================================
// Tunable parameter catalogue
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueRule {
    /// Number in (0, 1].
    UnitInterval,
    /// Number >= 0.
    NonNegative,
    /// Integer >= 0.
    NonNegativeInt,
}

/// Grid-searchable parameters: `(name, canonical name, rule)`.
const TUNABLE_PARAMS: &[(&str, &str, ValueRule)] = &[
    ("max_depth", "max_depth", ValueRule::NonNegativeInt),
    ("learning_rate", "learning_rate", ValueRule::UnitInterval),
    ("eta", "learning_rate", ValueRule::UnitInterval),
    ("subsample", "subsample", ValueRule::UnitInterval),
    ("colsample_bytree", "colsample_bytree", ValueRule::UnitInterval),
    ("min_child_weight", "min_child_weight", ValueRule::NonNegative),
    ("gamma", "gamma", ValueRule::NonNegative),
    ("min_split_loss", "gamma", ValueRule::NonNegative),
    ("alpha", "alpha", ValueRule::NonNegative),
    ("reg_alpha", "alpha", ValueRule::NonNegative),
    ("lambda", "lambda", ValueRule::NonNegative),
    ("reg_lambda", "lambda", ValueRule::NonNegative),
];

fn lookup(name: &str) -> Option<&'static (&'static str, &'static str, ValueRule)> {
    TUNABLE_PARAMS.iter().find(|(n, _, _)| *n == name)
}

/// Whether `name` may appear in a parameter grid.
pub fn is_tunable(name: &str) -> bool {
    lookup(name).is_some()
}

/// Canonical name of a tunable parameter (`eta` → `learning_rate`).
pub fn canonical_name(name: &str) -> Option<&'static str> {
    lookup(name).map(|(_, canonical, _)| *canonical)
}

/// All names accepted in a parameter grid, aliases included.
pub fn tunable_params() -> impl Iterator<Item = &'static str> {
    TUNABLE_PARAMS.iter().map(|(n, _, _)| *n)
}

/// Check one value against the rule for tunable parameter `name`.
pub fn validate_param_value(name: &str, value: &ParamValue) -> Result<(), String> {
    let Some((_, _, rule)) = lookup(name) else {
        return Err(format!("parameter '{name}' is not tunable"));
    };
    match rule {
        ValueRule::NonNegativeInt => match value.as_int() {
            Some(v) if v >= 0 => Ok(()),
            Some(v) => Err(format!("'{name}' must be >= 0, got {v}")),
            None => Err(format!("'{name}' must be an integer, got {} {value}", value.type_name())),
        },
        ValueRule::NonNegative => match value.as_f64() {
            Some(v) if v >= 0.0 && v.is_finite() => Ok(()),
            Some(v) => Err(format!("'{name}' must be a finite number >= 0, got {v}")),
            None => Err(format!("'{name}' must be a number, got {} {value}", value.type_name())),
        },
        ValueRule::UnitInterval => match value.as_f64() {
            Some(v) if v > 0.0 && v <= 1.0 => Ok(()),
            Some(v) => Err(format!("'{name}' must be in (0, 1], got {v}")),
            None => Err(format!("'{name}' must be a number, got {} {value}", value.type_name())),
        },
    }
}

// =============================================================================
// ParamGrid
// =============================================================================

/// Values given for one grid entry. Only lists of scalars are valid; the other
/// shapes are kept so validation can report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridValues {
    List(Vec<ParamValue>),
    Scalar(ParamValue),
    /// `null`, objects, and lists holding non-scalars.
    Other(serde_json::Value),
}

/// Unvalidated parameter grid, in the order the entries were given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamGrid {
    entries: Vec<(String, GridValues)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an entry with a list of values.
    pub fn with_values<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = GridValues::List(values.into_iter().map(Into::into).collect());
        self.set(name.into(), values);
        self
    }

    /// Add (or replace) an entry with raw grid values.
    pub fn with_entry(mut self, name: impl Into<String>, values: GridValues) -> Self {
        self.set(name.into(), values);
        self
    }

    fn set(&mut self, name: String, values: GridValues) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = values,
            None => self.entries.push((name, values)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &GridValues)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// The grid searched when a request enables tuning without supplying one.
    pub fn default_grid() -> Self {
        Self::new()
            .with_values("max_depth", [3, 4, 5])
            .with_values("learning_rate", [0.01, 0.1])
            .with_values("lambda", [0.0, 0.5, 1.0])
            .with_values("subsample", [0.8])
            .with_values("colsample_bytree", [0.8])
    }

    /// Validate every entry, collecting all problems.
    ///
    /// # Errors
    ///
    /// [`TrainingError::InvalidParameterGrid`] listing each entry that is not a
    /// tunable parameter, not a list, an empty list, or holds an out-of-range
    /// value. Aliases of the same parameter may not both appear.
    pub fn validate(&self) -> Result<SearchSpace, TrainingError> {
        let mut errors = Vec::new();
        let mut axes = Vec::with_capacity(self.entries.len());
        let mut seen: BTreeMap<&'static str, &str> = BTreeMap::new();

        for (name, values) in &self.entries {
            let Some(canonical) = canonical_name(name) else {
                errors.push(format!(
                    "parameter '{name}' is not allowed in the grid (allowed: {})",
                    tunable_params().collect::<Vec<_>>().join(", ")
                ));
                continue;
            };
            if let Some(previous) = seen.insert(canonical, name) {
                errors.push(format!("'{name}' duplicates '{previous}'"));
                continue;
            }
            let values = match values {
                GridValues::Scalar(v) => {
                    errors.push(format!("values for '{name}' must be a list, got {v}"));
                    continue;
                }
                GridValues::Other(serde_json::Value::Array(items)) => {
                    for item in items {
                        match serde_json::from_value::<ParamValue>(item.clone()) {
                            Ok(v) => errors.extend(validate_param_value(name, &v).err()),
                            Err(_) => errors.push(format!("values for '{name}' must be scalars, got {item}")),
                        }
                    }
                    continue;
                }
                GridValues::Other(other) => {
                    errors.push(format!("values for '{name}' must be a list, got {other}"));
                    continue;
                }
                GridValues::List(values) if values.is_empty() => {
                    errors.push(format!("values for '{name}' must be a non-empty list"));
                    continue;
                }
                GridValues::List(values) => values,
            };
            let before = errors.len();
            errors.extend(values.iter().filter_map(|v| validate_param_value(name, v).err()));
            if errors.len() == before {
                axes.push((name.clone(), values.clone()));
            }
        }

        if errors.is_empty() {
            Ok(SearchSpace { axes })
        } else {
            Err(TrainingError::InvalidParameterGrid(errors))
        }
    }
}

impl Serialize for ParamGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, values) in &self.entries {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParamGrid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GridVisitor;

        impl<'de> Visitor<'de> for GridVisitor {
            type Value = ParamGrid;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from parameter name to a list of values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParamGrid, A::Error> {
                let mut grid = ParamGrid::new();
                while let Some((name, values)) = access.next_entry::<String, GridValues>()? {
                    grid.set(name, values);
                }
                Ok(grid)
            }
        }

        deserializer.deserialize_map(GridVisitor)
    }
}

// =============================================================================
// SearchSpace
// =============================================================================

/// A validated grid: the Cartesian product of its axes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSpace {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl SearchSpace {
    /// A space with a single, empty candidate.
    pub fn single() -> Self {
        Self::default()
    }

    pub fn axes(&self) -> impl Iterator<Item = (&str, &[ParamValue])> {
        self.axes.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Product of the axis lengths (1 for an empty space).
    pub fn n_candidates(&self) -> usize {
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    /// Candidates in odometer order: the last axis varies fastest.
    pub fn candidates(&self) -> impl Iterator<Item = ParamSet> + '_ {
        (0..self.n_candidates()).map(move |mut index| {
            let mut set = ParamSet::new();
            for (name, values) in self.axes.iter().rev() {
                set.insert(name.clone(), values[index % values.len()].clone());
                index /= values.len();
            }
            set
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn grid_from_json(json: &str) -> ParamGrid {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn param_value_untagged() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[3, 0.1, true, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Int(3),
                ParamValue::Float(0.1),
                ParamValue::Bool(true),
                ParamValue::Text("x".into())
            ]
        );
    }

    #[test]
    fn merged_with_prefers_overrides() {
        let base = ParamSet::new().with("max_depth", 6).with("objective", "binary:logistic");
        let tuned = ParamSet::new().with("max_depth", 3);
        let merged = base.merged_with(&tuned);
        assert_eq!(merged.get("max_depth"), Some(&ParamValue::Int(3)));
        assert_eq!(merged.get("objective"), Some(&ParamValue::Text("binary:logistic".into())));
        assert_eq!(merged.to_string(), r#"{max_depth: 3, objective: "binary:logistic"}"#);
    }

    #[test]
    fn grid_preserves_order() {
        let grid = grid_from_json(r#"{"subsample": [1.0], "max_depth": [3, 5]}"#);
        let names: Vec<_> = grid.entries().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["subsample", "max_depth"]);
        let json = serde_json::to_string(&grid).unwrap();
        assert_eq!(json, r#"{"subsample":[1.0],"max_depth":[3,5]}"#);
    }

    #[test]
    fn default_grid_has_18_candidates() {
        let space = ParamGrid::default_grid().validate().unwrap();
        assert_eq!(space.n_candidates(), 18);
        assert_eq!(space.candidates().count(), 18);
    }

    #[test]
    fn candidates_enumerate_product_last_axis_fastest() {
        let space = ParamGrid::new()
            .with_values("max_depth", [3, 5])
            .with_values("learning_rate", [0.1, 0.2, 0.3])
            .validate()
            .unwrap();
        let candidates: Vec<_> = space.candidates().collect();
        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[0].get("max_depth"), Some(&ParamValue::Int(3)));
        assert_eq!(candidates[0].get("learning_rate"), Some(&ParamValue::Float(0.1)));
        assert_eq!(candidates[1].get("learning_rate"), Some(&ParamValue::Float(0.2)));
        assert_eq!(candidates[3].get("max_depth"), Some(&ParamValue::Int(5)));
        assert_eq!(candidates[5].get("learning_rate"), Some(&ParamValue::Float(0.3)));
    }

    #[test]
    fn empty_grid_is_single_candidate() {
        let space = ParamGrid::new().validate().unwrap();
        assert_eq!(space.n_candidates(), 1);
        let candidates: Vec<_> = space.candidates().collect();
        assert_eq!(candidates, vec![ParamSet::new()]);
    }

    #[test]
    fn reports_all_problems_together() {
        let grid = grid_from_json(
            r#"{"objective": ["binary:logistic"], "max_depth": 3, "learning_rate": [], "subsample": [0.5, 1.5]}"#,
        );
        let TrainingError::InvalidParameterGrid(errors) = grid.validate().unwrap_err() else {
            panic!("expected grid error");
        };
        assert_eq!(errors.len(), 4);
        assert!(errors[0].contains("'objective' is not allowed"));
        assert!(errors[1].contains("must be a list"));
        assert!(errors[2].contains("non-empty"));
        assert!(errors[3].contains("(0, 1]"));
    }

    #[rstest]
    #[case(r#"{"max_depth": null}"#, "must be a list, got null")]
    #[case(r#"{"max_depth": {"lo": 3}}"#, "must be a list, got {")]
    #[case(r#"{"max_depth": [[3]]}"#, "must be scalars, got [3]")]
    #[case(r#"{"max_depth": [3, null]}"#, "must be scalars, got null")]
    fn non_list_shapes_are_grid_errors(#[case] json: &str, #[case] message: &str) {
        let grid = grid_from_json(json);
        let TrainingError::InvalidParameterGrid(errors) = grid.validate().unwrap_err() else {
            panic!("expected grid error");
        };
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(message), "{}", errors[0]);
    }

    #[test]
    fn aliases_cannot_repeat() {
        let grid = ParamGrid::new()
            .with_values("eta", [0.1])
            .with_values("learning_rate", [0.2]);
        assert!(matches!(grid.validate(), Err(TrainingError::InvalidParameterGrid(e)) if e[0].contains("duplicates 'eta'")));
    }

    #[rstest]
    #[case("max_depth", ParamValue::Int(0), true)]
    #[case("max_depth", ParamValue::Int(-1), false)]
    #[case("max_depth", ParamValue::Float(3.0), false)]
    #[case("learning_rate", ParamValue::Float(1.0), true)]
    #[case("learning_rate", ParamValue::Float(0.0), false)]
    #[case("eta", ParamValue::Int(1), true)]
    #[case("gamma", ParamValue::Float(0.0), true)]
    #[case("reg_lambda", ParamValue::Float(-0.1), false)]
    #[case("colsample_bytree", ParamValue::Text("all".into()), false)]
    #[case("min_child_weight", ParamValue::Bool(true), false)]
    fn value_rules(#[case] name: &str, #[case] value: ParamValue, #[case] ok: bool) {
        assert_eq!(validate_param_value(name, &value).is_ok(), ok);
    }
}
