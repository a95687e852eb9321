//! Schemas describing the shape and type of a `Content` without its values.

mod json;

use crate::datatypes::{IndexType, PrimitiveType};
use crate::error::{Error, Result};
use crate::selector::FieldKey;
use crate::types::Type;
use itertools::Itertools;
use serde_json::Value;

/// Generic key-value parameters attached to every node.
pub type Parameters = serde_json::Map<String, Value>;

/// Attributes shared by every form node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormInfo {
    pub has_identities: bool,
    pub parameters: Parameters,
    pub form_key: Option<String>,
}

impl FormInfo {
    /// Returns `true` if nothing but defaults is set.
    #[must_use]
    pub fn is_default(&self) -> bool {
        !self.has_identities && self.parameters.is_empty() && self.form_key.is_none()
    }

    /// Drops the form key, keeping identities and parameters.
    fn without_key(&self) -> Self {
        Self {
            has_identities: self.has_identities,
            parameters: self.parameters.clone(),
            form_key: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmptyForm {
    info: FormInfo,
}

impl EmptyForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NumpyForm {
    inner_shape: Vec<usize>,
    primitive: PrimitiveType,
    info: FormInfo,
}

impl NumpyForm {
    #[must_use]
    pub fn new(primitive: PrimitiveType) -> Self {
        Self {
            inner_shape: Vec::new(),
            primitive,
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn with_inner_shape(mut self, inner_shape: Vec<usize>) -> Self {
        self.inner_shape = inner_shape;
        self
    }

    #[must_use]
    pub fn inner_shape(&self) -> &[usize] {
        &self.inner_shape
    }

    #[must_use]
    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    #[must_use]
    pub fn itemsize(&self) -> usize {
        self.primitive.itemsize()
    }

    #[must_use]
    pub fn format(&self) -> &'static str {
        self.primitive.format()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegularForm {
    content: Box<Form>,
    size: usize,
    info: FormInfo,
}

impl RegularForm {
    #[must_use]
    pub fn new(content: Form, size: usize) -> Self {
        Self {
            content: Box::new(content),
            size,
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn content(&self) -> &Form {
        &self.content
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListOffsetForm {
    offsets: IndexType,
    content: Box<Form>,
    info: FormInfo,
}

impl ListOffsetForm {
    /// # Errors
    ///
    /// Returns an error if `offsets` is not a 32 or 64 bit index type.
    pub fn new(offsets: IndexType, content: Form) -> Result<Self> {
        check_index("ListOffsetArray", offsets, IndexType::is_list_index)?;
        Ok(Self::new_unchecked(offsets, content))
    }

    pub(crate) fn new_unchecked(offsets: IndexType, content: Form) -> Self {
        Self {
            offsets,
            content: Box::new(content),
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn offsets(&self) -> IndexType {
        self.offsets
    }

    #[must_use]
    pub fn content(&self) -> &Form {
        &self.content
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListForm {
    starts: IndexType,
    stops: IndexType,
    content: Box<Form>,
    info: FormInfo,
}

impl ListForm {
    /// # Errors
    ///
    /// Returns an error if `starts` or `stops` is not a 32 or 64 bit index
    /// type.
    pub fn new(starts: IndexType, stops: IndexType, content: Form) -> Result<Self> {
        check_index("ListArray", starts, IndexType::is_list_index)?;
        check_index("ListArray", stops, IndexType::is_list_index)?;
        Ok(Self::new_unchecked(starts, stops, content))
    }

    pub(crate) fn new_unchecked(starts: IndexType, stops: IndexType, content: Form) -> Self {
        Self {
            starts,
            stops,
            content: Box::new(content),
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn starts(&self) -> IndexType {
        self.starts
    }

    #[must_use]
    pub fn stops(&self) -> IndexType {
        self.stops
    }

    #[must_use]
    pub fn content(&self) -> &Form {
        &self.content
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexedForm {
    index: IndexType,
    content: Box<Form>,
    info: FormInfo,
}

impl IndexedForm {
    /// # Errors
    ///
    /// Returns an error if `index` is not a 32 or 64 bit index type.
    pub fn new(index: IndexType, content: Form) -> Result<Self> {
        check_index("IndexedArray", index, IndexType::is_list_index)?;
        Ok(Self::new_unchecked(index, content))
    }

    pub(crate) fn new_unchecked(index: IndexType, content: Form) -> Self {
        Self {
            index,
            content: Box::new(content),
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn index(&self) -> IndexType {
        self.index
    }

    #[must_use]
    pub fn content(&self) -> &Form {
        &self.content
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexedOptionForm {
    index: IndexType,
    content: Box<Form>,
    info: FormInfo,
}

impl IndexedOptionForm {
    /// # Errors
    ///
    /// Returns an error if `index` is not `i32` or `i64`.
    pub fn new(index: IndexType, content: Form) -> Result<Self> {
        check_index("IndexedOptionArray", index, IndexType::is_option_index)?;
        Ok(Self::new_unchecked(index, content))
    }

    pub(crate) fn new_unchecked(index: IndexType, content: Form) -> Self {
        Self {
            index,
            content: Box::new(content),
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn index(&self) -> IndexType {
        self.index
    }

    #[must_use]
    pub fn content(&self) -> &Form {
        &self.content
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ByteMaskedForm {
    mask: IndexType,
    content: Box<Form>,
    valid_when: bool,
    info: FormInfo,
}

impl ByteMaskedForm {
    #[must_use]
    pub fn new(mask: IndexType, content: Form, valid_when: bool) -> Self {
        Self {
            mask,
            content: Box::new(content),
            valid_when,
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn mask(&self) -> IndexType {
        self.mask
    }

    #[must_use]
    pub fn content(&self) -> &Form {
        &self.content
    }

    #[must_use]
    pub fn valid_when(&self) -> bool {
        self.valid_when
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BitMaskedForm {
    mask: IndexType,
    content: Box<Form>,
    valid_when: bool,
    lsb_order: bool,
    info: FormInfo,
}

impl BitMaskedForm {
    #[must_use]
    pub fn new(mask: IndexType, content: Form, valid_when: bool, lsb_order: bool) -> Self {
        Self {
            mask,
            content: Box::new(content),
            valid_when,
            lsb_order,
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn mask(&self) -> IndexType {
        self.mask
    }

    #[must_use]
    pub fn content(&self) -> &Form {
        &self.content
    }

    #[must_use]
    pub fn valid_when(&self) -> bool {
        self.valid_when
    }

    #[must_use]
    pub fn lsb_order(&self) -> bool {
        self.lsb_order
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnmaskedForm {
    content: Box<Form>,
    info: FormInfo,
}

impl UnmaskedForm {
    #[must_use]
    pub fn new(content: Form) -> Self {
        Self {
            content: Box::new(content),
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn content(&self) -> &Form {
        &self.content
    }
}

/// A record of named fields, or a tuple when `keys` is `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordForm {
    keys: Option<Vec<String>>,
    contents: Vec<Form>,
    info: FormInfo,
}

impl RecordForm {
    /// Creates a record form with named fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a key repeats.
    pub fn new<K: Into<String>>(fields: Vec<(K, Form)>) -> Result<Self> {
        let (keys, contents): (Vec<String>, Vec<Form>) =
            fields.into_iter().map(|(k, f)| (k.into(), f)).unzip();
        if let Some(key) = keys.iter().duplicates().next() {
            return Err(Error::InvalidLayout(format!("duplicate field {:?}", key)));
        }
        Ok(Self::new_unchecked(keys, contents))
    }

    /// Callers guarantee that `keys` are distinct.
    pub(crate) fn new_unchecked(keys: Vec<String>, contents: Vec<Form>) -> Self {
        Self {
            keys: Some(keys),
            contents,
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn tuple(contents: Vec<Form>) -> Self {
        Self {
            keys: None,
            contents,
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn keys(&self) -> Option<&[String]> {
        self.keys.as_deref()
    }

    #[must_use]
    pub fn is_tuple(&self) -> bool {
        self.keys.is_none()
    }

    #[must_use]
    pub fn contents(&self) -> &[Form] {
        &self.contents
    }

    /// Returns the field names, using positions for tuples.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        match &self.keys {
            Some(keys) => keys.clone(),
            None => (0..self.contents.len()).map(|i| i.to_string()).collect(),
        }
    }

    /// Looks up a field by name or position.
    ///
    /// # Errors
    ///
    /// Returns an error if the record has no such field.
    pub fn content(&self, key: &FieldKey) -> Result<&Form> {
        let i = key.resolve(self.keys(), self.contents.len())?;
        Ok(&self.contents[i])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnionForm {
    tags: IndexType,
    index: IndexType,
    contents: Vec<Form>,
    info: FormInfo,
}

impl UnionForm {
    #[must_use]
    pub fn new(tags: IndexType, index: IndexType, contents: Vec<Form>) -> Self {
        Self {
            tags,
            index,
            contents,
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn tags(&self) -> IndexType {
        self.tags
    }

    #[must_use]
    pub fn index(&self) -> IndexType {
        self.index
    }

    #[must_use]
    pub fn contents(&self) -> &[Form] {
        &self.contents
    }
}

/// The form of a lazily generated array; `form` is `None` until known.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualForm {
    form: Option<Box<Form>>,
    has_length: bool,
    info: FormInfo,
}

impl VirtualForm {
    #[must_use]
    pub fn new(form: Option<Form>, has_length: bool) -> Self {
        Self {
            form: form.map(Box::new),
            has_length,
            info: FormInfo::default(),
        }
    }

    #[must_use]
    pub fn form(&self) -> Option<&Form> {
        self.form.as_deref()
    }

    #[must_use]
    pub fn has_length(&self) -> bool {
        self.has_length
    }
}

fn check_index(node: &str, kind: IndexType, valid: fn(IndexType) -> bool) -> Result<()> {
    if valid(kind) {
        Ok(())
    } else {
        Err(Error::InvalidLayout(format!(
            "{} does not support {} indexes",
            node, kind
        )))
    }
}

/// A schema node; one variant per kind of `Content`.
#[derive(Clone, Debug, PartialEq)]
pub enum Form {
    Empty(EmptyForm),
    Numpy(NumpyForm),
    Regular(RegularForm),
    ListOffset(ListOffsetForm),
    List(ListForm),
    Indexed(IndexedForm),
    IndexedOption(IndexedOptionForm),
    ByteMasked(ByteMaskedForm),
    BitMasked(BitMaskedForm),
    Unmasked(UnmaskedForm),
    Record(RecordForm),
    Union(UnionForm),
    Virtual(VirtualForm),
}

macro_rules! form_from {
    ($($variant:ident($form:ident)),* $(,)?) => {
        $(
            impl From<$form> for Form {
                fn from(form: $form) -> Self {
                    Self::$variant(form)
                }
            }
        )*
    };
}

form_from!(
    Empty(EmptyForm),
    Numpy(NumpyForm),
    Regular(RegularForm),
    ListOffset(ListOffsetForm),
    List(ListForm),
    Indexed(IndexedForm),
    IndexedOption(IndexedOptionForm),
    ByteMasked(ByteMaskedForm),
    BitMasked(BitMaskedForm),
    Unmasked(UnmaskedForm),
    Record(RecordForm),
    Union(UnionForm),
    Virtual(VirtualForm),
);

impl Form {
    #[must_use]
    pub fn info(&self) -> &FormInfo {
        match self {
            Self::Empty(f) => &f.info,
            Self::Numpy(f) => &f.info,
            Self::Regular(f) => &f.info,
            Self::ListOffset(f) => &f.info,
            Self::List(f) => &f.info,
            Self::Indexed(f) => &f.info,
            Self::IndexedOption(f) => &f.info,
            Self::ByteMasked(f) => &f.info,
            Self::BitMasked(f) => &f.info,
            Self::Unmasked(f) => &f.info,
            Self::Record(f) => &f.info,
            Self::Union(f) => &f.info,
            Self::Virtual(f) => &f.info,
        }
    }

    fn info_mut(&mut self) -> &mut FormInfo {
        match self {
            Self::Empty(f) => &mut f.info,
            Self::Numpy(f) => &mut f.info,
            Self::Regular(f) => &mut f.info,
            Self::ListOffset(f) => &mut f.info,
            Self::List(f) => &mut f.info,
            Self::Indexed(f) => &mut f.info,
            Self::IndexedOption(f) => &mut f.info,
            Self::ByteMasked(f) => &mut f.info,
            Self::BitMasked(f) => &mut f.info,
            Self::Unmasked(f) => &mut f.info,
            Self::Record(f) => &mut f.info,
            Self::Union(f) => &mut f.info,
            Self::Virtual(f) => &mut f.info,
        }
    }

    #[must_use]
    pub fn with_info(mut self, info: FormInfo) -> Self {
        *self.info_mut() = info;
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.info_mut().parameters = parameters;
        self
    }

    #[must_use]
    pub fn with_form_key(mut self, form_key: impl Into<String>) -> Self {
        self.info_mut().form_key = Some(form_key.into());
        self
    }

    #[must_use]
    pub fn with_identities(mut self, has_identities: bool) -> Self {
        self.info_mut().has_identities = has_identities;
        self
    }

    #[must_use]
    pub fn has_identities(&self) -> bool {
        self.info().has_identities
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.info().parameters
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.info().parameters.get(name)
    }

    #[must_use]
    pub fn form_key(&self) -> Option<&str> {
        self.info().form_key.as_deref()
    }

    /// Returns the class tag used in JSON, e.g. `ListOffsetArray64`.
    #[must_use]
    pub fn class_name(&self) -> String {
        match self {
            Self::Empty(_) => "EmptyArray".to_string(),
            Self::Numpy(_) => "NumpyArray".to_string(),
            Self::Regular(_) => "RegularArray".to_string(),
            Self::ListOffset(f) => format!("ListOffsetArray{}", f.offsets.class_suffix()),
            Self::List(f) => format!("ListArray{}", f.starts.class_suffix()),
            Self::Indexed(f) => format!("IndexedArray{}", f.index.class_suffix()),
            Self::IndexedOption(f) => format!("IndexedOptionArray{}", f.index.class_suffix()),
            Self::ByteMasked(_) => "ByteMaskedArray".to_string(),
            Self::BitMasked(_) => "BitMaskedArray".to_string(),
            Self::Unmasked(_) => "UnmaskedArray".to_string(),
            Self::Record(_) => "RecordArray".to_string(),
            Self::Union(f) => format!(
                "UnionArray{}_{}",
                f.tags.class_suffix(),
                f.index.class_suffix()
            ),
            Self::Virtual(_) => "VirtualArray".to_string(),
        }
    }

    /// Returns the single child of a wrapping node.
    #[must_use]
    pub fn content(&self) -> Option<&Form> {
        match self {
            Self::Regular(f) => Some(&f.content),
            Self::ListOffset(f) => Some(&f.content),
            Self::List(f) => Some(&f.content),
            Self::Indexed(f) => Some(&f.content),
            Self::IndexedOption(f) => Some(&f.content),
            Self::ByteMasked(f) => Some(&f.content),
            Self::BitMasked(f) => Some(&f.content),
            Self::Unmasked(f) => Some(&f.content),
            Self::Virtual(f) => f.form(),
            Self::Empty(_) | Self::Numpy(_) | Self::Record(_) | Self::Union(_) => None,
        }
    }

    /// Returns the children of a record or union.
    #[must_use]
    pub fn contents(&self) -> &[Form] {
        match self {
            Self::Record(f) => &f.contents,
            Self::Union(f) => &f.contents,
            _ => &[],
        }
    }

    /// Returns the `i`-th child of a record or union.
    #[must_use]
    pub fn content_at(&self, i: usize) -> Option<&Form> {
        self.contents().get(i)
    }

    /// Returns `true` if this is a `NumpyForm` with nothing but its type.
    fn is_plain_primitive(&self) -> bool {
        match self {
            Self::Numpy(f) => f.inner_shape.is_empty() && f.info.is_default(),
            _ => false,
        }
    }

    /// Returns the form of field `key` seen through lists, options and
    /// indirections, as produced by projecting that field.
    ///
    /// # Errors
    ///
    /// Returns an error if no record below this node has the field.
    pub fn field_form(&self, key: &FieldKey) -> Result<Form> {
        let projected = match self {
            Self::Record(f) => f.content(key)?.clone(),
            Self::Regular(f) => Self::Regular(RegularForm {
                content: Box::new(f.content.field_form(key)?),
                size: f.size,
                info: f.info.clone(),
            }),
            Self::ListOffset(f) => Self::ListOffset(ListOffsetForm {
                offsets: f.offsets,
                content: Box::new(f.content.field_form(key)?),
                info: f.info.clone(),
            }),
            Self::List(f) => Self::List(ListForm {
                starts: f.starts,
                stops: f.stops,
                content: Box::new(f.content.field_form(key)?),
                info: f.info.clone(),
            }),
            Self::Indexed(f) => Self::Indexed(IndexedForm {
                index: f.index,
                content: Box::new(f.content.field_form(key)?),
                info: f.info.clone(),
            }),
            Self::IndexedOption(f) => Self::IndexedOption(IndexedOptionForm {
                index: f.index,
                content: Box::new(f.content.field_form(key)?),
                info: f.info.clone(),
            }),
            Self::ByteMasked(f) => Self::ByteMasked(ByteMaskedForm {
                mask: f.mask,
                content: Box::new(f.content.field_form(key)?),
                valid_when: f.valid_when,
                info: f.info.clone(),
            }),
            Self::BitMasked(f) => Self::BitMasked(BitMaskedForm {
                mask: f.mask,
                content: Box::new(f.content.field_form(key)?),
                valid_when: f.valid_when,
                lsb_order: f.lsb_order,
                info: f.info.clone(),
            }),
            Self::Unmasked(f) => Self::Unmasked(UnmaskedForm {
                content: Box::new(f.content.field_form(key)?),
                info: f.info.clone(),
            }),
            Self::Union(f) => Self::Union(UnionForm {
                tags: f.tags,
                index: f.index,
                contents: f
                    .contents
                    .iter()
                    .map(|c| c.field_form(key))
                    .collect::<Result<_>>()?,
                info: f.info.clone(),
            }),
            Self::Virtual(f) => Self::Virtual(VirtualForm {
                form: match &f.form {
                    Some(inner) => Some(Box::new(inner.field_form(key)?)),
                    None => None,
                },
                has_length: f.has_length,
                info: FormInfo::default(),
            }),
            Self::Empty(_) => self.clone(),
            Self::Numpy(_) => return Err(Error::FieldNotFound(key.to_string())),
        };
        Ok(projected)
    }

    /// Returns the form of this node after gathering arbitrary positions.
    ///
    /// Mirrors what `Content::carry` builds: list offsets become
    /// starts/stops, bit masks become an option index, and nodes without an
    /// index of their own gather their children.
    #[must_use]
    pub fn carried(&self) -> Form {
        match self {
            Self::ListOffset(f) => Self::List(ListForm {
                starts: f.offsets,
                stops: f.offsets,
                content: f.content.clone(),
                info: f.info.without_key(),
            }),
            Self::BitMasked(f) => Self::IndexedOption(IndexedOptionForm {
                index: IndexType::I64,
                content: f.content.clone(),
                info: f.info.without_key(),
            }),
            Self::Regular(f) => Self::Regular(RegularForm {
                content: Box::new(f.content.carried()),
                size: f.size,
                info: f.info.clone(),
            }),
            Self::ByteMasked(f) => Self::ByteMasked(ByteMaskedForm {
                mask: f.mask,
                content: Box::new(f.content.carried()),
                valid_when: f.valid_when,
                info: f.info.clone(),
            }),
            Self::Unmasked(f) => Self::Unmasked(UnmaskedForm {
                content: Box::new(f.content.carried()),
                info: f.info.clone(),
            }),
            Self::Record(f) => Self::Record(RecordForm {
                keys: f.keys.clone(),
                contents: f.contents.iter().map(Form::carried).collect(),
                info: f.info.clone(),
            }),
            Self::Virtual(f) => Self::Virtual(VirtualForm {
                form: f.form.as_ref().map(|inner| Box::new(inner.carried())),
                has_length: f.has_length,
                info: f.info.clone(),
            }),
            Self::Empty(_)
            | Self::Numpy(_)
            | Self::List(_)
            | Self::Indexed(_)
            | Self::IndexedOption(_)
            | Self::Union(_) => self.clone(),
        }
    }

    /// Returns the high-level type this form describes.
    #[must_use]
    pub fn to_type(&self) -> Type {
        match self {
            Self::Empty(_) => Type::Unknown,
            Self::Numpy(f) => f
                .inner_shape
                .iter()
                .rev()
                .fold(Type::Primitive(f.primitive), |inner, size| {
                    Type::Regular(Box::new(inner), *size)
                }),
            Self::Regular(f) => Type::Regular(Box::new(f.content.to_type()), f.size),
            Self::ListOffset(f) => Type::List(Box::new(f.content.to_type())),
            Self::List(f) => Type::List(Box::new(f.content.to_type())),
            Self::Indexed(f) => f.content.to_type(),
            Self::IndexedOption(f) => Type::option(f.content.to_type()),
            Self::ByteMasked(f) => Type::option(f.content.to_type()),
            Self::BitMasked(f) => Type::option(f.content.to_type()),
            Self::Unmasked(f) => Type::option(f.content.to_type()),
            Self::Record(f) => Type::Record {
                keys: f.keys.clone(),
                contents: f.contents.iter().map(Form::to_type).collect(),
            },
            Self::Union(f) => Type::Union(f.contents.iter().map(Form::to_type).collect()),
            Self::Virtual(f) => f.form.as_ref().map_or(Type::Unknown, |inner| inner.to_type()),
        }
    }

    /// Returns `true` if an array of form `other` can stand in for one
    /// declared with this form: same structure and leaf types, ignoring
    /// parameters, form keys, index types, and the choice between
    /// equivalent node kinds.
    #[must_use]
    pub fn is_compatible(&self, other: &Form) -> bool {
        self.to_type().is_compatible(&other.to_type())
    }
}
