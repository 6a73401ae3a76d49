use crate::domain::hanging::{HangingStrategy, DEFAULT_MAX_HANGING_DEPTH};

use json::JsonValue;
use std::fs;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read parameter file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parameter file is not valid JSON: {0}")]
    Json(#[from] json::Error),
    #[error("Parameter \"{key}\" has an invalid value: {value}")]
    InvalidValue { key: String, value: String },
}

/// Parameters shared by the physics instances and the solution loop
///
/// Every key is optional in the JSON description:
///
/// ```JSON
/// {
///     "peclet": 10.0,
///     "axisymmetric": false,
///     "omega": 1.0,
///     "fourier_wavenumber": 0,
///     "hanging_strategy": "auto",
///     "max_hanging_depth": 8,
///     "quadrature_boost": 1,
///     "parallel_assembly": true,
///     "newton_tolerance": 1e-10,
///     "max_newton_iterations": 10
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub peclet: f64,
    /// Weight integrals by `r = x`
    pub axisymmetric: bool,
    /// Angular frequency
    pub omega: f64,
    pub fourier_wavenumber: i32,
    pub hanging_strategy: HangingStrategy,
    pub max_hanging_depth: usize,
    /// Extra Gauss points (per direction) added to the default rule of each Elem
    pub quadrature_boost: usize,
    pub parallel_assembly: bool,
    pub newton_tolerance: f64,
    pub max_newton_iterations: usize,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            peclet: 0.0,
            axisymmetric: false,
            omega: 1.0,
            fourier_wavenumber: 0,
            hanging_strategy: HangingStrategy::Constrained,
            max_hanging_depth: DEFAULT_MAX_HANGING_DEPTH,
            quadrature_boost: 0,
            parallel_assembly: true,
            newton_tolerance: 1e-10,
            max_newton_iterations: 10,
        }
    }
}

impl SimParams {
    pub fn from_file(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let parsed = json::parse(contents)?;
        if !parsed.is_object() {
            return Err(invalid("<root>", &parsed));
        }

        let defaults = Self::default();
        Ok(Self {
            peclet: read_f64(&parsed, "peclet", defaults.peclet)?,
            axisymmetric: read_bool(&parsed, "axisymmetric", defaults.axisymmetric)?,
            omega: read_f64(&parsed, "omega", defaults.omega)?,
            fourier_wavenumber: match &parsed["fourier_wavenumber"] {
                JsonValue::Null => defaults.fourier_wavenumber,
                value => value
                    .as_i32()
                    .ok_or_else(|| invalid("fourier_wavenumber", value))?,
            },
            hanging_strategy: match &parsed["hanging_strategy"] {
                JsonValue::Null => defaults.hanging_strategy,
                value => value
                    .as_str()
                    .and_then(HangingStrategy::from_name)
                    .ok_or_else(|| invalid("hanging_strategy", value))?,
            },
            max_hanging_depth: read_usize(&parsed, "max_hanging_depth", defaults.max_hanging_depth)?,
            quadrature_boost: read_usize(&parsed, "quadrature_boost", defaults.quadrature_boost)?,
            parallel_assembly: read_bool(&parsed, "parallel_assembly", defaults.parallel_assembly)?,
            newton_tolerance: read_f64(&parsed, "newton_tolerance", defaults.newton_tolerance)?,
            max_newton_iterations: read_usize(
                &parsed,
                "max_newton_iterations",
                defaults.max_newton_iterations,
            )?,
        })
    }
}

fn invalid(key: &str, value: &JsonValue) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.dump(),
    }
}

fn read_f64(parsed: &JsonValue, key: &str, default: f64) -> Result<f64, ConfigError> {
    match &parsed[key] {
        JsonValue::Null => Ok(default),
        value => value.as_f64().ok_or_else(|| invalid(key, value)),
    }
}

fn read_usize(parsed: &JsonValue, key: &str, default: usize) -> Result<usize, ConfigError> {
    match &parsed[key] {
        JsonValue::Null => Ok(default),
        value => value.as_usize().ok_or_else(|| invalid(key, value)),
    }
}

fn read_bool(parsed: &JsonValue, key: &str, default: bool) -> Result<bool, ConfigError> {
    match &parsed[key] {
        JsonValue::Null => Ok(default),
        value => value.as_bool().ok_or_else(|| invalid(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_missing_keys() {
        let params = SimParams::from_json_str("{}").unwrap();
        assert_eq!(params, SimParams::default());
        assert_eq!(params.max_hanging_depth, 8);
        assert!(params.parallel_assembly);
    }

    #[test]
    fn parse_parameters() {
        let params = SimParams::from_json_str(
            r#"{ "peclet": 12.5, "axisymmetric": true, "fourier_wavenumber": -2,
                 "hanging_strategy": "Mortar", "quadrature_boost": 2, "parallel_assembly": false }"#,
        )
        .unwrap();

        assert_eq!(params.peclet, 12.5);
        assert!(params.axisymmetric);
        assert_eq!(params.fourier_wavenumber, -2);
        assert_eq!(params.hanging_strategy, HangingStrategy::Mortar);
        assert_eq!(params.quadrature_boost, 2);
        assert!(!params.parallel_assembly);
        assert_eq!(params.omega, 1.0);
    }

    #[test]
    fn invalid_parameters() {
        assert!(matches!(
            SimParams::from_json_str(r#"{ "hanging_strategy": "nearest" }"#),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            SimParams::from_json_str(r#"{ "peclet": "fast" }"#),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            SimParams::from_json_str("[1, 2]"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            SimParams::from_json_str("{ peclet: }"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    #[should_panic]
    fn missing_parameter_file() {
        SimParams::from_file("./test_input/does_not_exist.json").unwrap();
    }
}
