use serde::{Deserialize, Serialize};

/// A telemetry reading before it has been interpreted as a lamp state.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Absent,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<Option<f64>> for RawValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => RawValue::Number(v),
            None => RawValue::Absent,
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// Discrete display state of a signal: off, on, or the extended/paged state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    #[default]
    Off,
    On,
    Extended,
}

impl TriState {
    pub fn as_u8(self) -> u8 {
        match self {
            TriState::Off => 0,
            TriState::On => 1,
            TriState::Extended => 2,
        }
    }

    pub fn is_on(self) -> bool {
        self == TriState::On
    }
}

/// Maps any raw reading onto a [`TriState`]. Total: malformed input is `Off`.
pub fn normalize(raw: &RawValue) -> TriState {
    match raw {
        RawValue::Absent => TriState::Off,
        RawValue::Bool(true) => TriState::On,
        RawValue::Bool(false) => TriState::Off,
        RawValue::Number(value) => from_number(*value),
        RawValue::Text(text) => from_text(text),
    }
}

fn from_number(value: f64) -> TriState {
    if value.is_nan() || value < 0.5 {
        TriState::Off
    } else if value < 1.5 {
        TriState::On
    } else {
        TriState::Extended
    }
}

fn from_text(text: &str) -> TriState {
    let cleaned = text
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase();
    match cleaned.as_str() {
        "2" | "two" => TriState::Extended,
        "1" | "true" | "on" | "yes" | "y" => TriState::On,
        "0" | "false" | "off" | "no" | "n" | "" => TriState::Off,
        other => other
            .parse::<f64>()
            .map(from_number)
            .unwrap_or(TriState::Off),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_booleans() {
        assert_eq!(normalize(&RawValue::Absent), TriState::Off);
        assert_eq!(normalize(&true.into()), TriState::On);
        assert_eq!(normalize(&false.into()), TriState::Off);
        assert_eq!(normalize(&None.into()), TriState::Off);
    }

    #[test]
    fn numeric_thresholds() {
        assert_eq!(normalize(&0.4.into()), TriState::Off);
        assert_eq!(normalize(&0.5.into()), TriState::On);
        assert_eq!(normalize(&1.49.into()), TriState::On);
        assert_eq!(normalize(&1.5.into()), TriState::Extended);
        assert_eq!(normalize(&(-3.0).into()), TriState::Off);
        assert_eq!(normalize(&f64::NAN.into()), TriState::Off);
        assert_eq!(normalize(&f64::INFINITY.into()), TriState::Extended);
    }

    #[test]
    fn text_keywords_and_fallback() {
        assert_eq!(normalize(&"on".into()), TriState::On);
        assert_eq!(normalize(&"2".into()), TriState::Extended);
        assert_eq!(normalize(&"off".into()), TriState::Off);
        assert_eq!(normalize(&"garbage".into()), TriState::Off);
        assert_eq!(normalize(&" \"TRUE\" ".into()), TriState::On);
        assert_eq!(normalize(&"'Two'".into()), TriState::Extended);
        assert_eq!(normalize(&"".into()), TriState::Off);
        assert_eq!(normalize(&"0.9".into()), TriState::On);
        assert_eq!(normalize(&"7".into()), TriState::Extended);
    }

    #[test]
    fn numeric_codes() {
        assert_eq!(TriState::Off.as_u8(), 0);
        assert_eq!(TriState::On.as_u8(), 1);
        assert_eq!(TriState::Extended.as_u8(), 2);
    }
}
