//! Handler return values and their JSON normalisation.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Number, Value};

use crate::error::UnsupportedTypeError;

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// How byte strings become JSON text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ByteEncoding {
    /// Interpret as UTF-8, replacing invalid sequences.
    #[default]
    Utf8,
    /// Standard base64 with padding.
    Base64,
}

/// Value returned by a method handler.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float; non-finite values become strings.
    Float(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Calendar date and wall-clock time.
    DateTime(NaiveDateTime),
    /// Calendar date.
    Date(NaiveDate),
    /// Wall-clock time.
    Time(NaiveTime),
    /// Elapsed time. Has no JSON form.
    Duration(Duration),
    /// Sequence.
    List(Vec<NativeValue>),
    /// String-keyed mapping.
    Map(BTreeMap<String, NativeValue>),
    /// Already-JSON value, passed through.
    Json(Value),
}

impl NativeValue {
    /// Maps the value onto JSON.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedTypeError`] when the value, or anything nested in
    /// it, is a [`NativeValue::Duration`].
    pub fn normalise(&self, encoding: ByteEncoding) -> Result<Value, UnsupportedTypeError> {
        self.to_json(encoding, Strictness::Strict)
    }

    /// Like [`NativeValue::normalise`], but values without a JSON form are
    /// replaced by their textual representation.
    #[must_use]
    pub fn normalise_lossy(&self, encoding: ByteEncoding) -> Value {
        match self.to_json(encoding, Strictness::Lossy) {
            Ok(value) => value,
            Err(error) => Value::String(error.to_string()),
        }
    }

    fn to_json(
        &self,
        encoding: ByteEncoding,
        strictness: Strictness,
    ) -> Result<Value, UnsupportedTypeError> {
        let value = match self {
            Self::Null => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Int(number) => Value::from(*number),
            Self::Float(number) => Number::from_f64(*number)
                .map_or_else(|| Value::String(number.to_string()), Value::Number),
            Self::Text(text) => Value::String(text.clone()),
            Self::Bytes(bytes) => Value::String(match encoding {
                ByteEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
                ByteEncoding::Base64 => STANDARD.encode(bytes),
            }),
            Self::DateTime(stamp) => Value::String(stamp.format(DATE_TIME_FORMAT).to_string()),
            Self::Date(date) => Value::String(date.format(DATE_FORMAT).to_string()),
            Self::Time(time) => Value::String(time.format(TIME_FORMAT).to_string()),
            Self::Duration(duration) => match strictness {
                Strictness::Strict => {
                    return Err(UnsupportedTypeError {
                        type_name: "duration",
                    });
                }
                Strictness::Lossy => Value::String(duration_text(*duration)),
            },
            Self::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json(encoding, strictness))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), item.to_json(encoding, strictness)?)))
                    .collect::<Result<Map<String, Value>, UnsupportedTypeError>>()?,
            ),
            Self::Json(value) => value.clone(),
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy)]
enum Strictness {
    Strict,
    Lossy,
}

/// `H:MM:SS` with a microsecond fraction when one is present.
fn duration_text(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
    match duration.subsec_micros() {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        micros => format!("{hours}:{minutes:02}:{seconds:02}.{micros:06}"),
    }
}

impl From<()> for NativeValue {
    fn from((): ()) -> Self {
        Self::Null
    }
}

impl From<bool> for NativeValue {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<i64> for NativeValue {
    fn from(number: i64) -> Self {
        Self::Int(number)
    }
}

impl From<f64> for NativeValue {
    fn from(number: f64) -> Self {
        Self::Float(number)
    }
}

impl From<String> for NativeValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for NativeValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for NativeValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Vec<Self>> for NativeValue {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}
