//! A `serde::Serializer` that records a struct's fields instead of producing text.
//!
//! The root serializer only accepts structs (optionally behind `Option` or a newtype);
//! field values are captured as [`FieldValue`] trees so the encoder can tell an unset
//! `Option` apart from a set-but-zero one.

use std::borrow::Cow;

use serde::Serialize;
use serde::ser::{
    self, Impossible, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant,
};
use serde_json::{Map, Number, Value};

use crate::error::EncodeError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    /// `None` or unit.
    Null,
    /// A present `Option`; never zero, whatever it holds.
    Some(Box<FieldValue>),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Seq(Vec<FieldValue>),
    Map(Vec<(String, FieldValue)>),
}

impl FieldValue {
    pub(crate) fn is_zero(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Some(_) => false,
            FieldValue::Bool(b) => !b,
            FieldValue::Int(n) => *n == 0,
            FieldValue::UInt(n) => *n == 0,
            FieldValue::Float(f) => *f == 0.0,
            FieldValue::Str(s) => s.is_empty(),
            FieldValue::Seq(items) => items.is_empty(),
            FieldValue::Map(entries) => entries.iter().all(|(_, v)| v.is_zero()),
        }
    }

    /// Flat string form for query and form-data targets; sequences are comma-joined.
    pub(crate) fn into_param_string(self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Some(inner) => inner.into_param_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Int(n) => n.to_string(),
            FieldValue::UInt(n) => n.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Str(s) => s,
            FieldValue::Seq(items) => items
                .into_iter()
                .map(FieldValue::into_param_string)
                .collect::<Vec<_>>()
                .join(","),
            map @ FieldValue::Map(_) => map.into_json().to_string(),
        }
    }

    pub(crate) fn into_json(self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Some(inner) => inner.into_json(),
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Int(n) => Value::from(n),
            FieldValue::UInt(n) => Value::from(n),
            FieldValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            FieldValue::Str(s) => Value::String(s),
            FieldValue::Seq(items) => {
                Value::Array(items.into_iter().map(FieldValue::into_json).collect())
            }
            FieldValue::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

/// Captured top-level fields in declaration order, or `None` for an empty root.
///
/// Names are borrowed for plain struct fields and owned when they arrive as map keys, which is
/// how serde emits a struct containing `#[serde(flatten)]` fields.
pub(crate) type Captured = Option<Vec<(Cow<'static, str>, FieldValue)>>;

pub(crate) fn capture_fields<T: Serialize + ?Sized>(value: &T) -> Result<Captured, EncodeError> {
    value.serialize(RootSerializer)
}

struct RootSerializer;

fn unsupported<T>(kind: &'static str) -> Result<T, EncodeError> {
    Err(EncodeError::UnsupportedType(kind))
}

impl ser::Serializer for RootSerializer {
    type Ok = Captured;
    type Error = EncodeError;
    type SerializeSeq = Impossible<Captured, EncodeError>;
    type SerializeTuple = Impossible<Captured, EncodeError>;
    type SerializeTupleStruct = Impossible<Captured, EncodeError>;
    type SerializeTupleVariant = Impossible<Captured, EncodeError>;
    type SerializeMap = RootMap;
    type SerializeStruct = RootStruct;
    type SerializeStructVariant = Impossible<Captured, EncodeError>;

    fn serialize_bool(self, _v: bool) -> Result<Captured, EncodeError> {
        unsupported("bool")
    }
    fn serialize_i8(self, _v: i8) -> Result<Captured, EncodeError> {
        unsupported("integer")
    }
    fn serialize_i16(self, _v: i16) -> Result<Captured, EncodeError> {
        unsupported("integer")
    }
    fn serialize_i32(self, _v: i32) -> Result<Captured, EncodeError> {
        unsupported("integer")
    }
    fn serialize_i64(self, _v: i64) -> Result<Captured, EncodeError> {
        unsupported("integer")
    }
    fn serialize_u8(self, _v: u8) -> Result<Captured, EncodeError> {
        unsupported("integer")
    }
    fn serialize_u16(self, _v: u16) -> Result<Captured, EncodeError> {
        unsupported("integer")
    }
    fn serialize_u32(self, _v: u32) -> Result<Captured, EncodeError> {
        unsupported("integer")
    }
    fn serialize_u64(self, _v: u64) -> Result<Captured, EncodeError> {
        unsupported("integer")
    }
    fn serialize_f32(self, _v: f32) -> Result<Captured, EncodeError> {
        unsupported("float")
    }
    fn serialize_f64(self, _v: f64) -> Result<Captured, EncodeError> {
        unsupported("float")
    }
    fn serialize_char(self, _v: char) -> Result<Captured, EncodeError> {
        unsupported("char")
    }
    fn serialize_str(self, _v: &str) -> Result<Captured, EncodeError> {
        unsupported("string")
    }
    fn serialize_bytes(self, _v: &[u8]) -> Result<Captured, EncodeError> {
        unsupported("bytes")
    }

    fn serialize_none(self) -> Result<Captured, EncodeError> {
        Ok(None)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Captured, EncodeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Captured, EncodeError> {
        Ok(None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Captured, EncodeError> {
        Ok(Some(Vec::new()))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<Captured, EncodeError> {
        unsupported("enum")
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Captured, EncodeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Captured, EncodeError> {
        unsupported("enum")
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, EncodeError> {
        unsupported("sequence")
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, EncodeError> {
        unsupported("tuple")
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, EncodeError> {
        unsupported("tuple struct")
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, EncodeError> {
        unsupported("enum")
    }

    /// Flattened structs serialize as a map of unknown length; real maps always report theirs.
    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, EncodeError> {
        match len {
            None => Ok(RootMap {
                fields: Vec::new(),
                pending: None,
            }),
            Some(_) => unsupported("map"),
        }
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, EncodeError> {
        Ok(RootStruct {
            fields: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, EncodeError> {
        unsupported("enum")
    }
}

struct RootStruct {
    fields: Vec<(Cow<'static, str>, FieldValue)>,
}

impl SerializeStruct for RootStruct {
    type Ok = Captured;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.fields
            .push((Cow::Borrowed(key), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Captured, EncodeError> {
        Ok(Some(self.fields))
    }
}

struct RootMap {
    fields: Vec<(Cow<'static, str>, FieldValue)>,
    pending: Option<String>,
}

impl SerializeMap for RootMap {
    type Ok = Captured;
    type Error = EncodeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EncodeError> {
        match key.serialize(ValueSerializer)? {
            FieldValue::Str(name) => {
                self.pending = Some(name);
                Ok(())
            }
            _ => unsupported("map with non-string keys"),
        }
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        let name = self
            .pending
            .take()
            .ok_or_else(|| EncodeError::Custom("map value without a key".to_string()))?;
        self.fields
            .push((Cow::Owned(name), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Captured, EncodeError> {
        Ok(Some(self.fields))
    }
}

struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = FieldValue;
    type Error = EncodeError;
    type SerializeSeq = SeqCollector;
    type SerializeTuple = SeqCollector;
    type SerializeTupleStruct = SeqCollector;
    type SerializeTupleVariant = SeqCollector;
    type SerializeMap = MapCollector;
    type SerializeStruct = MapCollector;
    type SerializeStructVariant = MapCollector;

    fn serialize_bool(self, v: bool) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Bool(v))
    }
    fn serialize_i8(self, v: i8) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Int(v.into()))
    }
    fn serialize_i16(self, v: i16) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Int(v.into()))
    }
    fn serialize_i32(self, v: i32) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Int(v.into()))
    }
    fn serialize_i64(self, v: i64) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Int(v))
    }
    fn serialize_u8(self, v: u8) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::UInt(v.into()))
    }
    fn serialize_u16(self, v: u16) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::UInt(v.into()))
    }
    fn serialize_u32(self, v: u32) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::UInt(v.into()))
    }
    fn serialize_u64(self, v: u64) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::UInt(v))
    }
    fn serialize_f32(self, v: f32) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Float(v.into()))
    }
    fn serialize_f64(self, v: f64) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Float(v))
    }
    fn serialize_char(self, v: char) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Str(v.to_string()))
    }
    fn serialize_str(self, v: &str) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Str(v.to_string()))
    }
    fn serialize_bytes(self, v: &[u8]) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Seq(
            v.iter().map(|b| FieldValue::UInt((*b).into())).collect(),
        ))
    }

    fn serialize_none(self) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Some(Box::new(value.serialize(self)?)))
    }

    fn serialize_unit(self) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Str(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<FieldValue, EncodeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<FieldValue, EncodeError> {
        Ok(FieldValue::Map(vec![(
            variant.to_string(),
            value.serialize(self)?,
        )]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqCollector, EncodeError> {
        Ok(SeqCollector::new(len.unwrap_or(0), None))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqCollector, EncodeError> {
        Ok(SeqCollector::new(len, None))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqCollector, EncodeError> {
        Ok(SeqCollector::new(len, None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqCollector, EncodeError> {
        Ok(SeqCollector::new(len, Some(variant)))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapCollector, EncodeError> {
        Ok(MapCollector::new(len.unwrap_or(0), None))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<MapCollector, EncodeError> {
        Ok(MapCollector::new(len, None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<MapCollector, EncodeError> {
        Ok(MapCollector::new(len, Some(variant)))
    }
}

/// Wraps `value` as `{variant: value}` the way externally tagged enums serialize.
fn tagged(variant: Option<&'static str>, value: FieldValue) -> FieldValue {
    match variant {
        Some(variant) => FieldValue::Map(vec![(variant.to_string(), value)]),
        None => value,
    }
}

struct SeqCollector {
    items: Vec<FieldValue>,
    variant: Option<&'static str>,
}

impl SeqCollector {
    fn new(len: usize, variant: Option<&'static str>) -> Self {
        Self {
            items: Vec::with_capacity(len),
            variant,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn finish(self) -> FieldValue {
        tagged(self.variant, FieldValue::Seq(self.items))
    }
}

impl SerializeSeq for SeqCollector {
    type Ok = FieldValue;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<FieldValue, EncodeError> {
        Ok(self.finish())
    }
}

impl SerializeTuple for SeqCollector {
    type Ok = FieldValue;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<FieldValue, EncodeError> {
        Ok(self.finish())
    }
}

impl SerializeTupleStruct for SeqCollector {
    type Ok = FieldValue;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<FieldValue, EncodeError> {
        Ok(self.finish())
    }
}

impl SerializeTupleVariant for SeqCollector {
    type Ok = FieldValue;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<FieldValue, EncodeError> {
        Ok(self.finish())
    }
}

struct MapCollector {
    entries: Vec<(String, FieldValue)>,
    pending_key: Option<String>,
    variant: Option<&'static str>,
}

impl MapCollector {
    fn new(len: usize, variant: Option<&'static str>) -> Self {
        Self {
            entries: Vec::with_capacity(len),
            pending_key: None,
            variant,
        }
    }

    fn insert<T: Serialize + ?Sized>(&mut self, key: String, value: &T) -> Result<(), EncodeError> {
        self.entries.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn finish(self) -> FieldValue {
        tagged(self.variant, FieldValue::Map(self.entries))
    }
}

impl SerializeMap for MapCollector {
    type Ok = FieldValue;
    type Error = EncodeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EncodeError> {
        self.pending_key = Some(key.serialize(ValueSerializer)?.into_param_string());
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| EncodeError::Custom("map value serialized before its key".into()))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<FieldValue, EncodeError> {
        Ok(self.finish())
    }
}

impl SerializeStruct for MapCollector {
    type Ok = FieldValue;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<FieldValue, EncodeError> {
        Ok(self.finish())
    }
}

impl SerializeStructVariant for MapCollector {
    type Ok = FieldValue;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<FieldValue, EncodeError> {
        Ok(self.finish())
    }
}
