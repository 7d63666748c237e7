// src/readers/validators.rs

//! Line predicates that decide if a scanned line is returned.
//!
//! A [`Validator`] is a predicate over the bytes of one line. A
//! [`Validators`] pipeline accepts a line only if every `Validator` accepts
//! it.
//!
//! [`validate_json_fields`] evaluates many [`JsonFieldValidator`]s over one
//! parse of a JSON object: fields no validator wants are skipped without
//! being decoded, a wanted field is decoded once no matter how many
//! validators want it, and parsing stops once every validator is done.
//! A line missing a wanted field is rejected.

use std::fmt;
use std::sync::Arc;

use ::serde::de::{
    self,
    DeserializeSeed,
    Deserializer,
    IgnoredAny,
    MapAccess,
    Visitor,
};
use ::serde_json::Value;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::data::datetime::{DateTime, DateTimeU, Utc};
use crate::readers::signal::CancelToken;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// line validators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returns `true` if the line passes.
pub type Validator = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// JSON field name of the event type.
pub const FIELD_TYPE: &str = "type";

/// JSON field name of the event creation datetime.
pub const FIELD_CREATED_AT: &str = "created_at";

/// Suffix of every event type name, e.g. `PushEvent`.
const EVENT_SUFFIX: &str = "Event";

/// `true` for the bytes treated as whitespace: space, `'\r'`, `'\n'`,
/// `'\t'`.
#[inline(always)]
const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\r' | b'\n' | b'\t')
}

/// A line passes if it has a byte that is not whitespace.
pub fn validate_not_empty() -> Validator {
    Arc::new(|line: &[u8]| line.iter().any(|b| !is_whitespace(*b)))
}

/// A line passes if the first byte that is not whitespace is `'{'`.
pub fn validate_is_json_object() -> Validator {
    Arc::new(|line: &[u8]| {
        line.iter()
            .find(|b| !is_whitespace(**b))
            .map_or(false, |b| *b == b'{')
    })
}

/// A line passes if it is one well-formed JSON value, surrounding
/// whitespace allowed. The value is not materialized.
pub fn validate_json() -> Validator {
    Arc::new(|line: &[u8]| ::serde_json::from_slice::<IgnoredAny>(line).is_ok())
}

/// An ordered pipeline of [`Validator`]s joined by logical AND.
#[derive(Clone, Default)]
pub struct Validators {
    validators: Vec<Validator>,
}

impl fmt::Debug for Validators {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Validators")
            .field("len", &self.validators.len())
            .finish()
    }
}

impl From<Vec<Validator>> for Validators {
    fn from(validators: Vec<Validator>) -> Self {
        Validators { validators }
    }
}

impl Validators {
    pub fn new() -> Validators {
        Validators::default()
    }

    pub fn push(&mut self, validator: Validator) {
        self.validators.push(validator);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// `true` if every validator accepts `line`. Stops at the first
    /// rejection.
    #[inline]
    pub fn validate(&self, line: &[u8]) -> bool {
        self.validators
            .iter()
            .all(|validator| validator(line))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON field validators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returns `true` if the decoded JSON value passes.
pub type JsonValueValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A [`JsonValueValidator`] for the value of top-level field `field`.
#[derive(Clone)]
pub struct JsonFieldValidator {
    pub field: String,
    pub validator: JsonValueValidator,
}

impl fmt::Debug for JsonFieldValidator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("JsonFieldValidator")
            .field("field", &self.field)
            .finish()
    }
}

impl JsonFieldValidator {
    pub fn new(field: &str, validator: JsonValueValidator) -> JsonFieldValidator {
        JsonFieldValidator {
            field: field.to_string(),
            validator,
        }
    }
}

/// Message of the error that stops parsing once the outcome is known.
const STOP_PARSE: &str = "validation complete";

/// Per-line progress of the field validators.
struct FieldsState {
    /// `done[i]` is `true` once `validators[i]` was evaluated
    done: Vec<bool>,
    /// count of `false` in `done`
    pending: usize,
    /// `false` once any validator failed
    passed: bool,
}

/// Deserializes an object key into the index of the first pending
/// validator that wants it, without allocating.
struct FieldKey<'a> {
    validators: &'a [JsonFieldValidator],
    done: &'a [bool],
}

impl<'de, 'a> DeserializeSeed<'de> for FieldKey<'a> {
    type Value = Option<usize>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(self)
    }
}

impl<'de, 'a> Visitor<'de> for FieldKey<'a> {
    type Value = Option<usize>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object key")
    }

    fn visit_str<E>(self, key: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(self
            .validators
            .iter()
            .zip(self.done.iter())
            .position(|(validator, done)| !done && validator.field == key))
    }
}

/// Walks the top-level fields of one JSON object.
struct FieldsVisitor<'a> {
    validators: &'a [JsonFieldValidator],
    state: &'a mut FieldsState,
}

impl<'de, 'a> Visitor<'de> for FieldsVisitor<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let validators = self.validators;
        let state = self.state;
        loop {
            let seed = FieldKey {
                validators,
                done: state.done.as_slice(),
            };
            let index: usize = match map.next_key_seed(seed)? {
                None => return Ok(()),
                Some(None) => {
                    map.next_value::<IgnoredAny>()?;
                    continue;
                }
                Some(Some(index)) => index,
            };
            let value: Value = map.next_value()?;
            let field: &str = validators[index].field.as_str();
            for (validator, done) in validators[index..]
                .iter()
                .zip(state.done[index..].iter_mut())
            {
                if *done || validator.field != field {
                    continue;
                }
                *done = true;
                state.pending -= 1;
                if !(validator.validator)(&value) {
                    state.passed = false;
                    return Err(de::Error::custom(STOP_PARSE));
                }
            }
            if state.pending == 0 {
                return Err(de::Error::custom(STOP_PARSE));
            }
        }
    }
}

/// A [`Validator`] that evaluates `validators` over one parse of a line
/// holding a JSON object.
///
/// Each validator is evaluated at most once, on the first occurrence of its
/// field. The line passes only if every validator was evaluated and
/// passed. A missing field, an undecodable value, or a line that is not a
/// JSON object fails.
pub fn validate_json_fields(validators: Vec<JsonFieldValidator>) -> Validator {
    let validators: Arc<[JsonFieldValidator]> = validators.into();
    Arc::new(move |line: &[u8]| {
        if validators.is_empty() {
            return true;
        }
        let mut state = FieldsState {
            done: vec![false; validators.len()],
            pending: validators.len(),
            passed: true,
        };
        let mut deserializer = ::serde_json::Deserializer::from_slice(line);
        let visitor = FieldsVisitor {
            validators: &validators,
            state: &mut state,
        };
        // `Err` is expected; the state holds the outcome
        _ = deserializer.deserialize_map(visitor);

        state.pending == 0 && state.passed
    })
}

/// A [`JsonValueValidator`] that passes a JSON string to `validate`.
/// A value that is not a string fails.
pub fn string_value_validator<F>(validate: F) -> JsonValueValidator
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    Arc::new(move |value: &Value| match value.as_str() {
        Some(s) => validate(s),
        None => false,
    })
}

/// A [`JsonValueValidator`] that passes an RFC 3339 datetime string to
/// `validate`. A value that is not such a string fails.
pub fn time_value_validator<F>(validate: F) -> JsonValueValidator
where
    F: Fn(&DateTimeU) -> bool + Send + Sync + 'static,
{
    string_value_validator(move |s: &str| match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => validate(&dt.with_timezone(&Utc)),
        Err(_) => false,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// event validators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Append `Event` to a user-passed event type name unless it already ends
/// with `event` in any case, e.g. `push` becomes `pushEvent`.
pub fn event_type_normalize(name: &str) -> String {
    if name
        .to_lowercase()
        .ends_with(&EVENT_SUFFIX.to_lowercase())
    {
        return name.to_string();
    }

    format!("{}{}", name, EVENT_SUFFIX)
}

fn event_types_normalize(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| event_type_normalize(name))
        .collect()
}

/// Field `type` must be one of `names` (normalized, ASCII case-insensitive).
pub fn validate_event_type_in(names: &[String]) -> JsonFieldValidator {
    let names = event_types_normalize(names);
    defñ!("{:?}", names);
    JsonFieldValidator::new(
        FIELD_TYPE,
        string_value_validator(move |s: &str| {
            names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(s))
        }),
    )
}

/// Field `type` must not be any of `names` (normalized, ASCII
/// case-insensitive).
pub fn validate_event_type_not_in(names: &[String]) -> JsonFieldValidator {
    let names = event_types_normalize(names);
    defñ!("{:?}", names);
    JsonFieldValidator::new(
        FIELD_TYPE,
        string_value_validator(move |s: &str| {
            !names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(s))
        }),
    )
}

/// Field `created_at` must be within `[start, end]`.
///
/// A value after `end` fails and, if `cancel` is passed, cancels it;
/// the archive is in chronological order so no later line can pass.
pub fn validate_created_at_window(
    start: DateTimeU,
    end: DateTimeU,
    cancel: Option<CancelToken>,
) -> JsonFieldValidator {
    JsonFieldValidator::new(
        FIELD_CREATED_AT,
        time_value_validator(move |dt: &DateTimeU| {
            if dt > &end {
                if let Some(cancel) = cancel.as_ref() {
                    defñ!("{} after end {}, cancel", dt, end);
                    cancel.cancel();
                }
                return false;
            }
            if dt == &start || dt == &end {
                return true;
            }

            &start < dt && dt < &end
        }),
    )
}
