//! JSON encoding of forms.
//!
//! The verbose encoding writes every attribute. The compact encoding omits
//! defaults and writes a child `NumpyForm` with no extra attributes as its
//! bare primitive name, e.g. `"content": "float64"`.

use super::{
    BitMaskedForm, ByteMaskedForm, EmptyForm, Form, FormInfo, IndexedForm, IndexedOptionForm,
    ListForm, ListOffsetForm, NumpyForm, Parameters, RecordForm, RegularForm, UnionForm,
    UnmaskedForm, VirtualForm,
};
use crate::datatypes::{IndexType, PrimitiveType};
use crate::error::{Error, Result};
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

impl Form {
    /// Encodes the form as a JSON string.
    #[must_use]
    pub fn to_json(&self, verbose: bool, pretty: bool) -> String {
        let value = self.to_value(verbose);
        if pretty {
            format!("{:#}", value)
        } else {
            value.to_string()
        }
    }

    /// Encodes the form as a JSON object.
    #[must_use]
    pub fn to_value(&self, verbose: bool) -> Value {
        let mut out = Map::new();
        out.insert("class".to_string(), Value::String(self.class_name()));
        match self {
            Self::Empty(_) => {}
            Self::Numpy(f) => {
                if verbose || !f.inner_shape.is_empty() {
                    out.insert("inner_shape".to_string(), Value::from(f.inner_shape.clone()));
                }
                out.insert("itemsize".to_string(), Value::from(f.itemsize()));
                out.insert("format".to_string(), Value::from(f.format()));
                out.insert("primitive".to_string(), Value::from(f.primitive.to_string()));
            }
            Self::Regular(f) => {
                out.insert("content".to_string(), child(&f.content, verbose));
                out.insert("size".to_string(), Value::from(f.size));
            }
            Self::ListOffset(f) => {
                out.insert("offsets".to_string(), index_value(f.offsets));
                out.insert("content".to_string(), child(&f.content, verbose));
            }
            Self::List(f) => {
                out.insert("starts".to_string(), index_value(f.starts));
                out.insert("stops".to_string(), index_value(f.stops));
                out.insert("content".to_string(), child(&f.content, verbose));
            }
            Self::Indexed(f) => {
                out.insert("index".to_string(), index_value(f.index));
                out.insert("content".to_string(), child(&f.content, verbose));
            }
            Self::IndexedOption(f) => {
                out.insert("index".to_string(), index_value(f.index));
                out.insert("content".to_string(), child(&f.content, verbose));
            }
            Self::ByteMasked(f) => {
                out.insert("mask".to_string(), index_value(f.mask));
                out.insert("content".to_string(), child(&f.content, verbose));
                out.insert("valid_when".to_string(), Value::Bool(f.valid_when));
            }
            Self::BitMasked(f) => {
                out.insert("mask".to_string(), index_value(f.mask));
                out.insert("content".to_string(), child(&f.content, verbose));
                out.insert("valid_when".to_string(), Value::Bool(f.valid_when));
                out.insert("lsb_order".to_string(), Value::Bool(f.lsb_order));
            }
            Self::Unmasked(f) => {
                out.insert("content".to_string(), child(&f.content, verbose));
            }
            Self::Record(f) => {
                let contents = match &f.keys {
                    Some(keys) => Value::Object(
                        keys.iter()
                            .zip(&f.contents)
                            .map(|(k, c)| (k.clone(), child(c, verbose)))
                            .collect(),
                    ),
                    None => Value::Array(f.contents.iter().map(|c| child(c, verbose)).collect()),
                };
                out.insert("contents".to_string(), contents);
            }
            Self::Union(f) => {
                out.insert("tags".to_string(), index_value(f.tags));
                out.insert("index".to_string(), index_value(f.index));
                out.insert(
                    "contents".to_string(),
                    Value::Array(f.contents.iter().map(|c| child(c, verbose)).collect()),
                );
            }
            Self::Virtual(f) => {
                let form = f.form().map_or(Value::Null, |inner| child(inner, verbose));
                out.insert("form".to_string(), form);
                out.insert("has_length".to_string(), Value::Bool(f.has_length));
            }
        }

        let info = self.info();
        if verbose || info.has_identities {
            out.insert("has_identities".to_string(), Value::Bool(info.has_identities));
        }
        if verbose || !info.parameters.is_empty() {
            out.insert(
                "parameters".to_string(),
                Value::Object(info.parameters.clone()),
            );
        }
        if verbose || info.form_key.is_some() {
            out.insert(
                "form_key".to_string(),
                info.form_key.clone().map_or(Value::Null, Value::String),
            );
        }
        Value::Object(out)
    }

    /// Decodes a form from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or does not describe a form.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::Decode {
            message: e.to_string(),
            fragment: text.to_string(),
        })?;
        Self::from_value(&value)
    }

    /// Decodes a form from a JSON value.
    ///
    /// Accepts both encodings, class names with or without index suffixes,
    /// and a bare primitive name for a `NumpyForm`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not describe a form.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::String(name) => {
                let primitive = name
                    .parse::<PrimitiveType>()
                    .map_err(|_| Error::decode("unknown primitive type", value))?;
                return Ok(NumpyForm::new(primitive).into());
            }
            Value::Object(map) => map,
            _ => return Err(Error::decode("expected an object or a primitive name", value)),
        };
        let class = map
            .get("class")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::decode("missing \"class\"", value))?;
        let info = decode_info(map, value)?;

        let form: Form = if class == "EmptyArray" {
            EmptyForm { info }.into()
        } else if class == "NumpyArray" {
            decode_numpy(map, value, info)?.into()
        } else if class == "RegularArray" {
            let size = map
                .get("size")
                .and_then(Value::as_u64)
                .and_then(|s| usize::try_from(s).ok())
                .ok_or_else(|| Error::decode("missing or invalid \"size\"", value))?;
            RegularForm {
                content: Box::new(decode_content(map, value)?),
                size,
                info,
            }
            .into()
        } else if let Some(suffix) = class.strip_prefix("ListOffsetArray") {
            ListOffsetForm {
                offsets: list_index(suffix, map, "offsets", value)?,
                content: Box::new(decode_content(map, value)?),
                info,
            }
            .into()
        } else if let Some(suffix) = class.strip_prefix("ListArray") {
            let starts = list_index(suffix, map, "starts", value)?;
            let stops = match map.get("stops") {
                Some(_) => restricted(decode_index(map, "stops", value)?, value)?,
                None => starts,
            };
            ListForm {
                starts,
                stops,
                content: Box::new(decode_content(map, value)?),
                info,
            }
            .into()
        } else if let Some(suffix) = class.strip_prefix("IndexedOptionArray") {
            let index = class_index(suffix, map, "index", value)?;
            if !index.is_option_index() {
                return Err(Error::decode("unsupported option index type", value));
            }
            IndexedOptionForm {
                index,
                content: Box::new(decode_content(map, value)?),
                info,
            }
            .into()
        } else if let Some(suffix) = class.strip_prefix("IndexedArray") {
            IndexedForm {
                index: list_index(suffix, map, "index", value)?,
                content: Box::new(decode_content(map, value)?),
                info,
            }
            .into()
        } else if class == "ByteMaskedArray" {
            ByteMaskedForm {
                mask: decode_index(map, "mask", value)?,
                content: Box::new(decode_content(map, value)?),
                valid_when: decode_bool(map, "valid_when", value)?,
                info,
            }
            .into()
        } else if class == "BitMaskedArray" {
            BitMaskedForm {
                mask: decode_index(map, "mask", value)?,
                content: Box::new(decode_content(map, value)?),
                valid_when: decode_bool(map, "valid_when", value)?,
                lsb_order: decode_bool(map, "lsb_order", value)?,
                info,
            }
            .into()
        } else if class == "UnmaskedArray" {
            UnmaskedForm {
                content: Box::new(decode_content(map, value)?),
                info,
            }
            .into()
        } else if class == "RecordArray" {
            decode_record(map, value, info)?.into()
        } else if let Some(suffix) = class.strip_prefix("UnionArray") {
            let (tags, index) = match suffix.split_once('_') {
                Some((tags, index)) => (
                    class_index(tags, map, "tags", value)?,
                    class_index(index, map, "index", value)?,
                ),
                None if suffix.is_empty() => (
                    decode_index(map, "tags", value)?,
                    decode_index(map, "index", value)?,
                ),
                None => return Err(Error::decode("unknown union class", value)),
            };
            let contents = map
                .get("contents")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::decode("missing or invalid \"contents\"", value))?
                .iter()
                .map(Form::from_value)
                .collect::<Result<_>>()?;
            UnionForm {
                tags,
                index,
                contents,
                info,
            }
            .into()
        } else if class == "VirtualArray" {
            let form = match map.get("form") {
                None | Some(Value::Null) => None,
                Some(inner) => Some(Box::new(Form::from_value(inner)?)),
            };
            VirtualForm {
                form,
                has_length: decode_bool(map, "has_length", value)?,
                info,
            }
            .into()
        } else {
            return Err(Error::decode(format!("unknown class {:?}", class), value));
        };
        Ok(form)
    }
}

fn child(form: &Form, verbose: bool) -> Value {
    match form {
        Form::Numpy(f) if !verbose && form.is_plain_primitive() => {
            Value::String(f.primitive.to_string())
        }
        _ => form.to_value(verbose),
    }
}

fn index_value(index: IndexType) -> Value {
    Value::String(index.to_string())
}

fn decode_info(map: &Map<String, Value>, value: &Value) -> Result<FormInfo> {
    let has_identities = match map.get("has_identities") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(Error::decode("\"has_identities\" must be a boolean", value)),
    };
    let parameters: Parameters = match map.get("parameters") {
        None | Some(Value::Null) => Parameters::new(),
        Some(Value::Object(p)) => p.clone(),
        Some(_) => return Err(Error::decode("\"parameters\" must be an object", value)),
    };
    let form_key = match map.get("form_key") {
        None | Some(Value::Null) => None,
        Some(Value::String(k)) => Some(k.clone()),
        Some(_) => return Err(Error::decode("\"form_key\" must be a string or null", value)),
    };
    Ok(FormInfo {
        has_identities,
        parameters,
        form_key,
    })
}

fn decode_numpy(map: &Map<String, Value>, value: &Value, info: FormInfo) -> Result<NumpyForm> {
    let inner_shape = match map.get("inner_shape") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(dims)) => dims
            .iter()
            .map(|d| d.as_u64().and_then(|d| usize::try_from(d).ok()))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::decode("invalid \"inner_shape\"", value))?,
        Some(_) => return Err(Error::decode("invalid \"inner_shape\"", value)),
    };
    let primitive = if let Some(primitive) = map.get("primitive") {
        primitive
            .as_str()
            .and_then(|p| p.parse::<PrimitiveType>().ok())
            .ok_or_else(|| Error::decode("unknown primitive type", value))?
    } else {
        let format = map.get("format").and_then(Value::as_str);
        let itemsize = map
            .get("itemsize")
            .and_then(Value::as_u64)
            .and_then(|s| usize::try_from(s).ok());
        match (format, itemsize) {
            (Some(format), Some(itemsize)) => PrimitiveType::from_format(format, itemsize)
                .ok_or_else(|| Error::decode("unsupported format and itemsize", value))?,
            _ => return Err(Error::decode("missing \"primitive\" or \"format\"", value)),
        }
    };
    Ok(NumpyForm {
        inner_shape,
        primitive,
        info,
    })
}

fn decode_record(map: &Map<String, Value>, value: &Value, info: FormInfo) -> Result<RecordForm> {
    match map.get("contents") {
        Some(Value::Object(fields)) => {
            let mut keys = Vec::with_capacity(fields.len());
            let mut contents = Vec::with_capacity(fields.len());
            for (key, content) in fields {
                keys.push(key.clone());
                contents.push(Form::from_value(content)?);
            }
            Ok(RecordForm {
                keys: Some(keys),
                contents,
                info,
            })
        }
        Some(Value::Array(items)) => Ok(RecordForm {
            keys: None,
            contents: items.iter().map(Form::from_value).collect::<Result<_>>()?,
            info,
        }),
        _ => Err(Error::decode("missing or invalid \"contents\"", value)),
    }
}

fn decode_content(map: &Map<String, Value>, value: &Value) -> Result<Form> {
    let content = map
        .get("content")
        .ok_or_else(|| Error::decode("missing \"content\"", value))?;
    Form::from_value(content)
}

fn decode_bool(map: &Map<String, Value>, field: &str, value: &Value) -> Result<bool> {
    map.get(field)
        .and_then(Value::as_bool)
        .ok_or_else(|| Error::decode(format!("missing or invalid {:?}", field), value))
}

fn decode_index(map: &Map<String, Value>, field: &str, value: &Value) -> Result<IndexType> {
    map.get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<IndexType>().ok())
        .ok_or_else(|| Error::decode(format!("missing or invalid {:?}", field), value))
}

/// Reads the index type from the class suffix, or from `field` if the class
/// has none.
fn class_index(
    suffix: &str,
    map: &Map<String, Value>,
    field: &str,
    value: &Value,
) -> Result<IndexType> {
    if suffix.is_empty() {
        decode_index(map, field, value)
    } else {
        IndexType::from_class_suffix(suffix)
            .ok_or_else(|| Error::decode("unknown class suffix", value))
    }
}

/// Like `class_index`, restricted to the types lists and indexes accept.
fn list_index(
    suffix: &str,
    map: &Map<String, Value>,
    field: &str,
    value: &Value,
) -> Result<IndexType> {
    restricted(class_index(suffix, map, field, value)?, value)
}

fn restricted(index: IndexType, value: &Value) -> Result<IndexType> {
    if index.is_list_index() {
        Ok(index)
    } else {
        Err(Error::decode("unsupported index type", value))
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value(false))
    }
}

impl Serialize for Form {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value(true).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Form {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Form::from_value(&value).map_err(de::Error::custom)
    }
}
