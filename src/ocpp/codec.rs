//! The codec contract shared by every OCPP message type.
//!
//! A type describes its fields once through [`FieldCodec`]; [`OcppCodec`] turns that single
//! schema into XML and JSON decoders and encoders. Mandatory fields that are missing, of the
//! wrong shape or rejected by their value parser fail the whole decode with a field-level
//! [`DecodeError`]. Absent optional fields decode to their default.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::borrow::Cow;
use std::str::FromStr;
use strum::{Display, EnumString};
use thiserror::Error;

use super::ids::{IdError, WireId};
use super::xml::{QName, XmlElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum WireFormat {
    #[strum(serialize = "XML")]
    Xml,
    #[strum(serialize = "JSON")]
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing mandatory field `{field}` (expected {expected})")]
    Missing { field: String, expected: &'static str },
    #[error("field `{field}` is not a valid {expected}: `{found}`")]
    Invalid {
        field: String,
        expected: &'static str,
        found: String,
    },
    #[error("field `{field}` violates a constraint: {reason}")]
    Constraint { field: String, reason: String },
    #[error("expected element `{expected}`, found `{found}`")]
    UnexpectedElement { expected: String, found: String },
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("malformed {format} text: {reason}")]
    Syntax { format: WireFormat, reason: String },
}

impl DecodeError {
    pub fn missing(field: &str, expected: &'static str) -> Self {
        DecodeError::Missing {
            field: field.to_owned(),
            expected,
        }
    }

    pub fn invalid(field: &str, expected: &'static str, found: impl Into<String>) -> Self {
        DecodeError::Invalid {
            field: field.to_owned(),
            expected,
            found: found.into(),
        }
    }

    pub fn constraint(field: &str, reason: impl Into<String>) -> Self {
        DecodeError::Constraint {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field, when the failure is attributable to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            DecodeError::Missing { field, .. }
            | DecodeError::Invalid { field, .. }
            | DecodeError::Constraint { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Prefixes the field path with the enclosing field, e.g. `chargingSchedule.duration`.
    fn within(self, parent: &str) -> Self {
        let nest = |field: String| format!("{parent}.{field}");
        match self {
            DecodeError::Missing { field, expected } => DecodeError::Missing {
                field: nest(field),
                expected,
            },
            DecodeError::Invalid {
                field,
                expected,
                found,
            } => DecodeError::Invalid {
                field: nest(field),
                expected,
                found,
            },
            DecodeError::Constraint { field, reason } => DecodeError::Constraint {
                field: nest(field),
                reason,
            },
            other => other,
        }
    }
}

/// Read access to the fields of one XML element or JSON object.
#[derive(Debug, Clone, Copy)]
pub enum Fields<'a> {
    Xml(&'a XmlElement),
    Json(&'a Map<String, Value>),
}

impl<'a> Fields<'a> {
    pub fn format(&self) -> WireFormat {
        match self {
            Fields::Xml(_) => WireFormat::Xml,
            Fields::Json(_) => WireFormat::Json,
        }
    }

    fn scalar(&self, name: &str) -> Result<Option<Cow<'a, str>>, DecodeError> {
        match *self {
            Fields::Xml(element) => Ok(element.child_local(name).map(|c| Cow::Borrowed(c.text()))),
            Fields::Json(map) => match map.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(Cow::Borrowed(s.as_str()))),
                Some(Value::Number(n)) => Ok(Some(Cow::Owned(n.to_string()))),
                Some(other) => Err(DecodeError::invalid(name, "scalar value", json_kind(other))),
            },
        }
    }

    /// Like `scalar`, but a JSON value must be a string.
    fn text_scalar(&self, name: &str) -> Result<Option<Cow<'a, str>>, DecodeError> {
        match *self {
            Fields::Xml(_) => self.scalar(name),
            Fields::Json(map) => match map.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(Cow::Borrowed(s.as_str()))),
                Some(other) => Err(DecodeError::invalid(name, "string", json_kind(other))),
            },
        }
    }

    pub fn mandatory<T>(
        &self,
        name: &str,
        expected: &'static str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Result<T, DecodeError> {
        self.optional(name, expected, parse)?
            .ok_or_else(|| DecodeError::missing(name, expected))
    }

    pub fn optional<T>(
        &self,
        name: &str,
        expected: &'static str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Result<Option<T>, DecodeError> {
        match self.scalar(name)? {
            None => Ok(None),
            Some(text) => parse(&text)
                .map(Some)
                .ok_or_else(|| DecodeError::invalid(name, expected, text.into_owned())),
        }
    }

    /// Mandatory field parsed through `FromStr` (enum string tables and similar).
    pub fn mandatory_parsed<T: FromStr>(&self, name: &str, expected: &'static str) -> Result<T, DecodeError> {
        self.mandatory(name, expected, |text| text.trim().parse().ok())
    }

    pub fn optional_parsed<T: FromStr>(&self, name: &str, expected: &'static str) -> Result<Option<T>, DecodeError> {
        self.optional(name, expected, |text| text.trim().parse().ok())
    }

    /// Mandatory identifier. Empty or over-long text is a constraint failure, anything
    /// else the identifier rejects is a type failure.
    pub fn mandatory_id<T: WireId>(&self, name: &str, expected: &'static str) -> Result<T, DecodeError> {
        self.optional_id(name, expected)?
            .ok_or_else(|| DecodeError::missing(name, expected))
    }

    pub fn optional_id<T: WireId>(&self, name: &str, expected: &'static str) -> Result<Option<T>, DecodeError> {
        let text = if T::TEXTUAL {
            self.text_scalar(name)?
        } else {
            self.scalar(name)?
        };
        let Some(text) = text else {
            return Ok(None);
        };
        match text.parse::<T>() {
            Ok(id) => Ok(Some(id)),
            Err(err @ (IdError::Empty { .. } | IdError::TooLong { .. })) => {
                Err(DecodeError::constraint(name, err.to_string()))
            }
            Err(IdError::NotNumeric { .. }) => Err(DecodeError::invalid(name, expected, text.into_owned())),
        }
    }

    /// Free text; may be empty unless `max_len` says otherwise.
    pub fn mandatory_text(&self, name: &str, max_len: Option<usize>) -> Result<String, DecodeError> {
        self.optional_text(name, max_len)?
            .ok_or_else(|| DecodeError::missing(name, "text"))
    }

    pub fn optional_text(&self, name: &str, max_len: Option<usize>) -> Result<Option<String>, DecodeError> {
        let Some(text) = self.text_scalar(name)? else {
            return Ok(None);
        };
        if let Some(max) = max_len {
            let len = text.chars().count();
            if len > max {
                return Err(DecodeError::constraint(
                    name,
                    format!("at most {max} characters allowed, got {len}"),
                ));
            }
        }
        Ok(Some(text.into_owned()))
    }

    /// Text that must not be empty after trimming.
    pub fn mandatory_non_empty(&self, name: &str, max_len: Option<usize>) -> Result<String, DecodeError> {
        let text = self.mandatory_text(name, max_len)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DecodeError::constraint(name, "must not be empty"));
        }
        Ok(trimmed.to_owned())
    }

    pub fn mandatory_timestamp(&self, name: &str) -> Result<DateTime<Utc>, DecodeError> {
        self.mandatory(name, "RFC 3339 timestamp", parse_timestamp)
    }

    pub fn optional_timestamp(&self, name: &str) -> Result<Option<DateTime<Utc>>, DecodeError> {
        self.optional(name, "RFC 3339 timestamp", parse_timestamp)
    }

    pub fn mandatory_decimal(&self, name: &str) -> Result<f64, DecodeError> {
        self.mandatory(name, "decimal number", parse_decimal)
    }

    pub fn optional_decimal(&self, name: &str) -> Result<Option<f64>, DecodeError> {
        self.optional(name, "decimal number", parse_decimal)
    }

    pub fn mandatory_object<T: FieldCodec>(&self, name: &str) -> Result<T, DecodeError> {
        self.optional_object(name)?
            .ok_or_else(|| DecodeError::missing(name, "object"))
    }

    pub fn optional_object<T: FieldCodec>(&self, name: &str) -> Result<Option<T>, DecodeError> {
        match *self {
            Fields::Xml(element) => element
                .child_local(name)
                .map(|child| T::decode_fields(&Fields::Xml(child)).map_err(|e| e.within(name)))
                .transpose(),
            Fields::Json(map) => match map.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Object(inner)) => T::decode_fields(&Fields::Json(inner))
                    .map(Some)
                    .map_err(|e| e.within(name)),
                Some(other) => Err(DecodeError::invalid(name, "object", json_kind(other))),
            },
        }
    }

    /// Repeated child elements in XML, an array of objects in JSON. Absent means empty.
    pub fn list<T: FieldCodec>(&self, name: &str) -> Result<Vec<T>, DecodeError> {
        match *self {
            Fields::Xml(element) => element
                .children_local(name)
                .map(|child| T::decode_fields(&Fields::Xml(child)).map_err(|e| e.within(name)))
                .collect(),
            Fields::Json(map) => match map.get(name) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| match item {
                        Value::Object(inner) => {
                            T::decode_fields(&Fields::Json(inner)).map_err(|e| e.within(name))
                        }
                        other => Err(DecodeError::invalid(name, "array of objects", json_kind(other))),
                    })
                    .collect(),
                Some(other) => Err(DecodeError::invalid(name, "array", json_kind(other))),
            },
        }
    }
}

/// Write access used by [`FieldCodec::encode_fields`].
pub trait FieldSink {
    fn format(&self) -> WireFormat;
    fn text(&mut self, name: &str, value: &str);
    fn number(&mut self, name: &str, value: Number);
    fn nested(&mut self, name: &str, encode: &dyn Fn(&mut dyn FieldSink));
    fn nested_list(&mut self, name: &str, len: usize, encode: &dyn Fn(usize, &mut dyn FieldSink));
}

impl<'s> dyn FieldSink + 's {
    pub fn integer(&mut self, name: &str, value: impl Into<i64>) {
        self.number(name, Number::from(value.into()));
    }

    pub fn unsigned(&mut self, name: &str, value: impl Into<u64>) {
        self.number(name, Number::from(value.into()));
    }

    /// Non-finite values have no wire representation and are skipped.
    pub fn decimal(&mut self, name: &str, value: f64) {
        if let Some(number) = Number::from_f64(value) {
            self.number(name, number);
        }
    }

    pub fn timestamp(&mut self, name: &str, value: &DateTime<Utc>) {
        self.text(name, &format_timestamp(value));
    }

    pub fn object<T: FieldCodec>(&mut self, name: &str, value: &T) {
        self.nested(name, &|sink: &mut dyn FieldSink| value.encode_fields(sink));
    }

    pub fn list<T: FieldCodec>(&mut self, name: &str, values: &[T]) {
        self.nested_list(name, values.len(), &|i: usize, sink: &mut dyn FieldSink| {
            values[i].encode_fields(sink)
        });
    }
}

struct XmlSink {
    element: XmlElement,
}

impl XmlSink {
    fn child(&self, name: &str) -> XmlElement {
        XmlElement::new(QName {
            namespace: self.element.name.namespace.clone(),
            local: name.to_owned(),
        })
    }
}

impl FieldSink for XmlSink {
    fn format(&self) -> WireFormat {
        WireFormat::Xml
    }

    fn text(&mut self, name: &str, value: &str) {
        let child = self.child(name).with_text(value);
        self.element.push(child);
    }

    fn number(&mut self, name: &str, value: Number) {
        self.text(name, &value.to_string());
    }

    fn nested(&mut self, name: &str, encode: &dyn Fn(&mut dyn FieldSink)) {
        let mut inner = XmlSink {
            element: self.child(name),
        };
        encode(&mut inner);
        self.element.push(inner.element);
    }

    fn nested_list(&mut self, name: &str, len: usize, encode: &dyn Fn(usize, &mut dyn FieldSink)) {
        for i in 0..len {
            self.nested(name, &|sink: &mut dyn FieldSink| encode(i, sink));
        }
    }
}

#[derive(Default)]
struct JsonSink {
    map: Map<String, Value>,
}

impl FieldSink for JsonSink {
    fn format(&self) -> WireFormat {
        WireFormat::Json
    }

    fn text(&mut self, name: &str, value: &str) {
        self.map.insert(name.to_owned(), Value::String(value.to_owned()));
    }

    fn number(&mut self, name: &str, value: Number) {
        self.map.insert(name.to_owned(), Value::Number(value));
    }

    fn nested(&mut self, name: &str, encode: &dyn Fn(&mut dyn FieldSink)) {
        let mut inner = JsonSink::default();
        encode(&mut inner);
        self.map.insert(name.to_owned(), Value::Object(inner.map));
    }

    fn nested_list(&mut self, name: &str, len: usize, encode: &dyn Fn(usize, &mut dyn FieldSink)) {
        let items = (0..len)
            .map(|i| {
                let mut inner = JsonSink::default();
                encode(i, &mut inner);
                Value::Object(inner.map)
            })
            .collect();
        self.map.insert(name.to_owned(), Value::Array(items));
    }
}

/// One field schema, used for both wire formats.
pub trait FieldCodec: Sized {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError>;
    fn encode_fields(&self, sink: &mut dyn FieldSink);
}

/// A top-level message body with a namespace-qualified XML element name.
pub trait OcppCodec: FieldCodec {
    /// camelCase element name, e.g. `reserveNowRequest`.
    const XML_NAME: &'static str;
    const NAMESPACE: &'static str;

    fn decode_xml(element: &XmlElement) -> Result<Self, DecodeError> {
        if element.name.local != Self::XML_NAME {
            return Err(DecodeError::UnexpectedElement {
                expected: Self::XML_NAME.to_owned(),
                found: element.name.local.clone(),
            });
        }
        Self::decode_fields(&Fields::Xml(element))
    }

    fn decode_json(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Object(map) => Self::decode_fields(&Fields::Json(map)),
            other => Err(DecodeError::NotAnObject {
                found: json_kind(other),
            }),
        }
    }

    /// Auto-detects the format: text starting with `{` is tried as JSON first, anything
    /// else as XML first. The other format is tried when the first attempt fails; the
    /// first attempt's error is reported when both fail.
    fn decode_text(text: &str) -> Result<Self, DecodeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DecodeError::Syntax {
                format: WireFormat::Json,
                reason: "empty input".into(),
            });
        }
        let (first, second) = if text.starts_with('{') {
            (WireFormat::Json, WireFormat::Xml)
        } else {
            (WireFormat::Xml, WireFormat::Json)
        };
        decode_text_as::<Self>(text, first).or_else(|err| decode_text_as::<Self>(text, second).map_err(|_| err))
    }

    fn encode_xml(&self) -> XmlElement {
        let mut sink = XmlSink {
            element: XmlElement::qualified(Self::NAMESPACE, Self::XML_NAME),
        };
        self.encode_fields(&mut sink);
        sink.element
    }

    fn encode_json(&self) -> Value {
        fields_to_json(self)
    }
}

/// JSON object for any field schema, nested types included.
pub fn fields_to_json<T: FieldCodec>(value: &T) -> Value {
    let mut sink = JsonSink::default();
    value.encode_fields(&mut sink);
    Value::Object(sink.map)
}

fn decode_text_as<T: OcppCodec>(text: &str, format: WireFormat) -> Result<T, DecodeError> {
    match format {
        WireFormat::Json => {
            let value: Value = serde_json::from_str(text).map_err(|e| DecodeError::Syntax {
                format,
                reason: e.to_string(),
            })?;
            T::decode_json(&value)
        }
        WireFormat::Xml => {
            let element = XmlElement::parse(text).map_err(|e| DecodeError::Syntax {
                format,
                reason: e.to_string(),
            })?;
            T::decode_xml(&element)
        }
    }
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::ids::ConnectorId;
    use serde_json::json;

    const NS: &str = "urn:test";

    #[derive(Debug, Clone, PartialEq)]
    struct Sample {
        connector_id: ConnectorId,
        label: Option<String>,
        limit: f64,
    }

    impl FieldCodec for Sample {
        fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
            Ok(Self {
                connector_id: fields.mandatory_id("connectorId", "connector id")?,
                label: fields.optional_text("label", Some(5))?,
                limit: fields.mandatory_decimal("limit")?,
            })
        }

        fn encode_fields(&self, sink: &mut dyn FieldSink) {
            sink.unsigned("connectorId", self.connector_id.value());
            if let Some(label) = &self.label {
                sink.text("label", label);
            }
            sink.decimal("limit", self.limit);
        }
    }

    impl OcppCodec for Sample {
        const XML_NAME: &'static str = "sampleRequest";
        const NAMESPACE: &'static str = NS;
    }

    #[test]
    fn json_accepts_numbers_and_numeric_strings() {
        let a = Sample::decode_json(&json!({"connectorId": 2, "limit": 16.5})).unwrap();
        let b = Sample::decode_json(&json!({"connectorId": "2", "limit": "16.5"})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.label, None);
    }

    #[test]
    fn missing_and_malformed_fields_name_the_field() {
        let err = Sample::decode_json(&json!({"limit": 1})).unwrap_err();
        assert_eq!(err, DecodeError::missing("connectorId", "connector id"));

        let err = Sample::decode_json(&json!({"connectorId": -1, "limit": 1})).unwrap_err();
        assert_eq!(err.field(), Some("connectorId"));

        let err = Sample::decode_json(&json!({"connectorId": 1, "limit": [1]})).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { ref field, .. } if field == "limit"));

        let err = Sample::decode_json(&json!({"connectorId": 1, "limit": 1, "label": "toolong"}))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Constraint { .. }));
    }

    #[test]
    fn json_text_fields_must_be_strings() {
        for label in [json!(12345), json!(true)] {
            let err = Sample::decode_json(&json!({"connectorId": 1, "limit": 1, "label": label})).unwrap_err();
            assert!(
                matches!(err, DecodeError::Invalid { ref field, expected: "string", .. } if field == "label"),
                "{err:?}"
            );
        }
        let err = Sample::decode_json(&json!({"connectorId": true, "limit": 1})).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { .. }));
    }

    #[test]
    fn json_encoding_omits_absent_optionals() {
        let sample = Sample {
            connector_id: ConnectorId::new(1),
            label: None,
            limit: 32.0,
        };
        assert_eq!(sample.encode_json(), json!({"connectorId": 1, "limit": 32.0}));
        assert_eq!(Sample::decode_json(&sample.encode_json()).unwrap(), sample);
    }

    #[test]
    fn xml_encoding_qualifies_children_with_the_body_namespace() {
        let sample = Sample {
            connector_id: ConnectorId::new(3),
            label: Some("x".into()),
            limit: 6.0,
        };
        let xml = sample.encode_xml();
        assert!(xml.is(NS, "sampleRequest"));
        assert_eq!(xml.child(NS, "connectorId").unwrap().text(), "3");
        assert_eq!(Sample::decode_xml(&xml).unwrap(), sample);
    }

    #[test]
    fn decode_xml_checks_the_element_name() {
        let wrong = XmlElement::qualified(NS, "otherRequest");
        assert!(matches!(
            Sample::decode_xml(&wrong),
            Err(DecodeError::UnexpectedElement { .. })
        ));
    }

    #[test]
    fn decode_text_detects_the_format() {
        let json = r#"  {"connectorId": 1, "limit": 10}  "#;
        let xml = r#"<t:sampleRequest xmlns:t="urn:test"><t:connectorId>1</t:connectorId><t:limit>10</t:limit></t:sampleRequest>"#;
        assert_eq!(Sample::decode_text(json).unwrap(), Sample::decode_text(xml).unwrap());
    }

    #[test]
    fn decode_text_reports_the_first_attempt_when_both_fail() {
        let err = Sample::decode_text("{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { format: WireFormat::Json, .. }));

        let err = Sample::decode_text("<t:sampleRequest xmlns:t=\"urn:test\"/>").unwrap_err();
        assert_eq!(err.field(), Some("connectorId"));

        assert!(Sample::decode_text("   ").is_err());
    }

    #[test]
    fn timestamps_keep_sub_second_precision() {
        let t = parse_timestamp("2020-01-02T03:04:05.123Z").unwrap();
        assert_eq!(format_timestamp(&t), "2020-01-02T03:04:05.123Z");
        assert!(parse_timestamp("yesterday").is_none());
    }
}
