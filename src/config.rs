//! Named options loaded into the parameter structs.
//!
//! Values come from an application store as strings, booleans or floats.
//! Loaders read only the keys they know and leave defaults for missing ones.

use std::collections::BTreeMap;

use crate::error::{OperationError, Result};
use crate::operations::cut::CutParams;
use crate::operations::heal::HealParams;
use crate::shapes::FontProp;

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Str(String),
    Bool(bool),
    Float(f64),
}

impl OptionValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::Float(_) => "float",
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Key/value option store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    values: BTreeMap<String, OptionValue>,
}

fn wrong_type(key: &str, expected: &str, found: &OptionValue) -> OperationError {
    OperationError::InvalidInput(format!(
        "option `{key}` should be {expected}, found {}",
        found.type_name()
    ))
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] when the value is not a float.
    pub fn get_float(&self, key: &str) -> Result<Option<f64>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(OptionValue::Float(v)) => Ok(Some(*v)),
            Some(other) => Err(wrong_type(key, "a float", other).into()),
        }
    }

    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] when the value is not a bool.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(OptionValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(wrong_type(key, "a bool", other).into()),
        }
    }

    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] when the value is not a string.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(OptionValue::Str(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(wrong_type(key, "a string", other).into()),
        }
    }

    /// Float option holding a whole number.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] for a non float, a fraction or a
    /// value out of the `i32` range.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_int(&self, key: &str) -> Result<Option<i32>> {
        let Some(v) = self.get_float(key)? else {
            return Ok(None);
        };
        if v.fract().abs() > 0.0 || v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
            return Err(OperationError::InvalidInput(format!(
                "option `{key}` should be a whole number, found {v}"
            ))
            .into());
        }
        Ok(Some(v as i32))
    }
}

impl FontProp {
    /// Reads `size_in_mm`, `char_gap`, `line_gap`, `boldness` and `skew`.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] for a value of the wrong type or a
    /// size that is not positive.
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut prop = Self::default();
        if let Some(size) = options.get_float("size_in_mm")? {
            if size <= 0.0 {
                return Err(OperationError::InvalidInput(format!(
                    "font size must be positive, found {size}"
                ))
                .into());
            }
            prop.size_in_mm = size;
        }
        prop.char_gap = options.get_int("char_gap")?;
        prop.line_gap = options.get_int("line_gap")?;
        prop.boldness = options.get_float("boldness")?;
        prop.skew = options.get_float("skew")?;
        Ok(prop)
    }
}

impl CutParams {
    /// Reads `max_angle_deg` and `out_of_aoi_epsilon`.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] for a value of the wrong type.
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut params = Self::default();
        if let Some(angle) = options.get_float("max_angle_deg")? {
            params.max_angle_deg = angle;
        }
        if let Some(epsilon) = options.get_float("out_of_aoi_epsilon")? {
            params.out_of_aoi_epsilon = epsilon;
        }
        Ok(params)
    }
}

impl HealParams {
    /// Reads `max_heal_iterations`, `clean_distance`, `spike_bevel` and
    /// `spike_length`.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidInput`] for a value of the wrong type or a
    /// negative iteration count.
    #[allow(clippy::cast_sign_loss)]
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut params = Self::default();
        if let Some(iterations) = options.get_int("max_heal_iterations")? {
            if iterations < 0 {
                return Err(OperationError::InvalidInput(format!(
                    "heal iterations can not be negative, found {iterations}"
                ))
                .into());
            }
            params.max_iterations = iterations as u32;
        }
        if let Some(distance) = options.get_float("clean_distance")? {
            params.clean_distance = distance;
        }
        if let Some(bevel) = options.get_float("spike_bevel")? {
            params.spike_bevel = bevel;
        }
        if let Some(length) = options.get_float("spike_length")? {
            params.spike_length = length;
        }
        Ok(params)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::SurfcutError;

    #[test]
    fn missing_keys_keep_defaults() {
        let options = Options::new();
        assert_eq!(FontProp::from_options(&options).unwrap(), FontProp::default());
        assert_eq!(CutParams::from_options(&options).unwrap(), CutParams::default());
        assert_eq!(HealParams::from_options(&options).unwrap(), HealParams::default());
    }

    #[test]
    fn font_prop_is_loaded() {
        let mut options = Options::new();
        options
            .set("size_in_mm", 20.0)
            .set("char_gap", 3.0)
            .set("skew", 0.25)
            .set("font_file", "arial.ttf");
        let prop = FontProp::from_options(&options).unwrap();
        approx::assert_relative_eq!(prop.size_in_mm, 20.0);
        assert_eq!(prop.char_gap, Some(3));
        assert_eq!(prop.line_gap, None);
        assert_eq!(prop.skew, Some(0.25));
    }

    #[test]
    fn cut_params_are_loaded() {
        let mut options = Options::new();
        options.set("max_angle_deg", 45.0);
        let params = CutParams::from_options(&options).unwrap();
        approx::assert_relative_eq!(params.max_angle_deg, 45.0);
        approx::assert_relative_eq!(
            params.out_of_aoi_epsilon,
            CutParams::default().out_of_aoi_epsilon
        );
    }

    // ── invalid values ──

    #[test]
    fn wrong_type_is_rejected() {
        let mut options = Options::new();
        options.set("boldness", true);
        let err = FontProp::from_options(&options).unwrap_err();
        assert!(matches!(err, SurfcutError::Operation(OperationError::InvalidInput(_))));
        assert!(options.get_bool("boldness").unwrap().unwrap());
        assert!(options.get_str("boldness").is_err());
    }

    #[test]
    fn fraction_is_not_an_int() {
        let mut options = Options::new();
        options.set("char_gap", 1.5);
        assert!(FontProp::from_options(&options).is_err());
    }

    #[test]
    fn bad_ranges_are_rejected() {
        let mut options = Options::new();
        options.set("size_in_mm", 0.0);
        assert!(FontProp::from_options(&options).is_err());

        let mut options = Options::new();
        options.set("max_heal_iterations", -1.0);
        assert!(HealParams::from_options(&options).is_err());
    }
}
