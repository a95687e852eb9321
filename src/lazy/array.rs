use super::cache::ArrayCache;
use super::generator::{check_contract, derive_contract, ArrayGenerator};
use crate::content::{Content, ContentIter, Value};
use crate::error::{Error, Result};
use crate::form::{Form, Parameters, VirtualForm};
use crate::selector::{FieldKey, Selector};
use crate::types::ArrayType;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CACHE_KEY: AtomicU64 = AtomicU64::new(0);

fn next_cache_key() -> String {
    format!("va{}", NEXT_CACHE_KEY.fetch_add(1, Ordering::Relaxed))
}

/// A layout node whose content is produced on demand.
///
/// Length, form and shape-preserving slices are answered from the declared
/// contract whenever possible. Reading values materializes the generator,
/// going through the cache if one is attached. Cloning is cheap and clones
/// share the cache key.
#[derive(Clone)]
pub struct VirtualArray {
    inner: Arc<Inner>,
}

struct Inner {
    generator: ArrayGenerator,
    cache: Option<Arc<dyn ArrayCache>>,
    cache_key: String,
    form: Option<Form>,
    length: Option<usize>,
    parameters: Parameters,
    learned_length: OnceCell<usize>,
    learned_form: OnceCell<Form>,
}

impl VirtualArray {
    /// Creates a virtual array with a fresh cache key.
    #[must_use]
    pub fn new(generator: ArrayGenerator, cache: Option<Arc<dyn ArrayCache>>) -> Self {
        let mut builder = Self::builder(generator);
        builder.cache = cache;
        builder.build()
    }

    #[must_use]
    pub fn builder(generator: ArrayGenerator) -> VirtualArrayBuilder {
        VirtualArrayBuilder {
            generator,
            cache: None,
            form: None,
            length: None,
            cache_key: None,
            parameters: Parameters::new(),
        }
    }

    #[must_use]
    pub fn generator(&self) -> &ArrayGenerator {
        &self.inner.generator
    }

    #[must_use]
    pub fn cache(&self) -> Option<&Arc<dyn ArrayCache>> {
        self.inner.cache.as_ref()
    }

    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.inner.cache_key
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.inner.parameters
    }

    /// Returns the declared form: the instance override, else the
    /// generator's.
    #[must_use]
    pub fn declared_form(&self) -> Option<&Form> {
        self.inner.form.as_ref().or_else(|| self.inner.generator.form())
    }

    #[must_use]
    pub fn declared_length(&self) -> Option<usize> {
        self.inner.length.or_else(|| self.inner.generator.length())
    }

    /// Returns the length if it is declared or was learned by an earlier
    /// materialization of this instance.
    #[must_use]
    pub fn known_length(&self) -> Option<usize> {
        self.declared_length()
            .or_else(|| self.inner.learned_length.get().copied())
    }

    fn known_form(&self) -> Option<&Form> {
        self.declared_form().or_else(|| self.inner.learned_form.get())
    }

    /// Returns the cached content, if any, without running the generator.
    #[must_use]
    pub fn peek(&self) -> Option<Content> {
        let cache = self.inner.cache.as_ref()?;
        let hit = cache.get(&self.inner.cache_key);
        log::trace!(
            "cache {} for {}",
            if hit.is_some() { "hit" } else { "miss" },
            self.inner.cache_key
        );
        hit
    }

    /// Returns the content, from the cache if possible, else by running the
    /// generator and storing its result.
    ///
    /// # Errors
    ///
    /// Returns the generator's error, or a mismatch error if the result
    /// breaks the declared length or form.
    pub fn materialize(&self) -> Result<Content> {
        if let Some(content) = self.peek() {
            return Ok(content);
        }
        let content = self.inner.generator.materialize()?;
        check_contract(self.inner.form.as_ref(), self.inner.length, &content)?;
        let length = content.length()?;
        self.inner.learned_length.get_or_init(|| length);
        self.inner.learned_form.get_or_init(|| content.form());
        if let Some(cache) = &self.inner.cache {
            log::debug!("caching {} ({} elements)", self.inner.cache_key, length);
            cache.set(&self.inner.cache_key, content.clone());
        }
        Ok(content)
    }

    /// Returns the number of elements, materializing only if the length is
    /// neither declared nor already known.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization fails.
    pub fn length(&self) -> Result<usize> {
        match self.known_length() {
            Some(length) => Ok(length),
            None => self.materialize()?.length(),
        }
    }

    /// Returns the form of this node. Never materializes.
    ///
    /// The inner form is absent unless one was declared.
    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(VirtualForm::new(
            self.declared_form().cloned(),
            self.declared_length().is_some(),
        ))
        .with_parameters(self.inner.parameters.clone())
    }

    /// Returns the form of the content, materializing if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization fails.
    pub fn content_form(&self) -> Result<Form> {
        match self.known_form() {
            Some(form) => Ok(form.clone()),
            None => Ok(self.materialize()?.form()),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the length or form is unknown and
    /// materialization fails.
    pub fn array_type(&self) -> Result<ArrayType> {
        let length = self.length()?;
        Ok(ArrayType::new(length, self.content_form()?.to_type()))
    }

    /// Applies a shape-preserving selector without materializing the
    /// content.
    ///
    /// Ranges, integer lists and masks need the length, which is
    /// materialized if unknown. Field projection never materializes.
    /// Integer selectors drop a dimension, so they are rejected here with
    /// `NotShapePreserving`; `getitem_at` and `getitem` materialize and
    /// select from the content instead.
    ///
    /// # Errors
    ///
    /// Returns an error for an integer selector, a selector that is invalid
    /// for the known length or form, or a failed materialization.
    pub fn slice(&self, selector: &Selector) -> Result<VirtualArray> {
        match selector {
            Selector::At(_) => Err(Error::NotShapePreserving),
            Selector::Field(key) => self.getitem_field(key),
            _ => {
                let length = self.length()?;
                let (form, length) = derive_contract(self.known_form(), Some(length), selector)?;
                let selector = selector.clone();
                Ok(self.derive(form, length, self.inner.parameters.clone(), move |content| {
                    content.slice(&selector)
                }))
            }
        }
    }

    /// Materializes and returns one element.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization fails or `at` is out of bounds.
    pub fn getitem_at(&self, at: i64) -> Result<Value> {
        self.materialize()?.getitem_at(at)
    }

    /// Applies a multi-dimensional selection. Leading shape-preserving
    /// selectors stay lazy.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is invalid.
    pub fn getitem(&self, selectors: &[Selector]) -> Result<Value> {
        Content::Virtual(self.clone()).getitem(selectors)
    }

    /// Materializes once and iterates over the elements.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization fails.
    pub fn iter(&self) -> Result<ContentIter> {
        Content::Virtual(self.clone()).iter()
    }

    pub(crate) fn range_nowrap(&self, start: usize, stop: usize) -> VirtualArray {
        self.derive(
            self.known_form().cloned(),
            Some(stop - start),
            self.inner.parameters.clone(),
            move |content| {
                check_bound(stop, content.length()?)?;
                content.range_nowrap(start, stop)
            },
        )
    }

    pub(crate) fn carry(&self, positions: &[usize]) -> VirtualArray {
        let positions = positions.to_vec();
        self.derive(
            self.known_form().map(Form::carried),
            Some(positions.len()),
            self.inner.parameters.clone(),
            move |content| {
                if let Some(&max) = positions.iter().max() {
                    check_bound(max + 1, content.length()?)?;
                }
                content.carry(&positions)
            },
        )
    }

    pub(crate) fn getitem_field(&self, key: &FieldKey) -> Result<VirtualArray> {
        let form = self.known_form().map(|f| f.field_form(key)).transpose()?;
        let key = key.clone();
        Ok(self.derive(form, self.known_length(), Parameters::new(), move |content| {
            content.getitem_field(&key)
        }))
    }

    /// Wraps `op` applied to this array's content in a new virtual array
    /// that shares this array's cache.
    fn derive<F>(
        &self,
        form: Option<Form>,
        length: Option<usize>,
        parameters: Parameters,
        op: F,
    ) -> VirtualArray
    where
        F: Fn(Content) -> Result<Content> + Send + Sync + 'static,
    {
        let parent = self.clone();
        let generator =
            ArrayGenerator::derived(move || op(parent.materialize()?), form, length);
        let derived = VirtualArrayBuilder {
            generator,
            cache: self.inner.cache.clone(),
            form: None,
            length: None,
            cache_key: None,
            parameters,
        }
        .build();
        log::trace!(
            "derived {} from {}",
            derived.inner.cache_key,
            self.inner.cache_key
        );
        derived
    }
}

/// Positions up to `required` must exist in an array of `length`.
fn check_bound(required: usize, length: usize) -> Result<()> {
    if required > length {
        return Err(Error::IndexOutOfBounds {
            index: i64::try_from(required - 1).unwrap_or(i64::MAX),
            length,
        });
    }
    Ok(())
}

impl fmt::Debug for VirtualArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualArray")
            .field("cache_key", &self.inner.cache_key)
            .field("form", &self.declared_form().map(ToString::to_string))
            .field("length", &self.known_length())
            .field("cached", &self.inner.cache.is_some())
            .finish()
    }
}

/// Configures a `VirtualArray`.
#[must_use]
pub struct VirtualArrayBuilder {
    generator: ArrayGenerator,
    cache: Option<Arc<dyn ArrayCache>>,
    form: Option<Form>,
    length: Option<usize>,
    cache_key: Option<String>,
    parameters: Parameters,
}

impl VirtualArrayBuilder {
    pub fn cache(mut self, cache: Arc<dyn ArrayCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Declares the form, taking precedence over the generator's.
    pub fn form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    /// Declares the length, taking precedence over the generator's.
    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Uses `key` instead of a generated cache key. Arrays sharing a key and
    /// a cache share materialized content.
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn build(self) -> VirtualArray {
        VirtualArray {
            inner: Arc::new(Inner {
                generator: self.generator,
                cache: self.cache,
                cache_key: self.cache_key.unwrap_or_else(next_cache_key),
                form: self.form,
                length: self.length,
                parameters: self.parameters,
                learned_length: OnceCell::new(),
                learned_form: OnceCell::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ListOffsetArray, NumpyArray, RecordArray};
    use crate::datatypes::{IndexType, PrimitiveType};
    use crate::form::{ListOffsetForm, NumpyForm, RecordForm};
    use crate::index::Index;
    use crate::lazy::MemoryCache;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counted(calls: &Arc<AtomicUsize>) -> ArrayGenerator {
        let calls = calls.clone();
        ArrayGenerator::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let x = NumpyArray::from(vec![0.0, 1.1, 2.2]);
            let y = ListOffsetArray::new(
                Index::from(vec![0_i64, 1, 3, 3]),
                NumpyArray::from(vec![1_i64, 2, 3]).into(),
            )?;
            Ok(RecordArray::new(vec![("x", x.into()), ("y", y.into())])?.into())
        })
    }

    #[test]
    fn cache_keys_are_unique() {
        let calls = Arc::new(AtomicUsize::new(0));
        let a = VirtualArray::new(counted(&calls), None);
        let b = VirtualArray::new(counted(&calls), None);
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.clone().cache_key(), a.cache_key());
        let named = VirtualArray::builder(counted(&calls)).cache_key("points").build();
        assert_eq!(named.cache_key(), "points");
    }

    #[test]
    fn learns_length_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let array = VirtualArray::new(counted(&calls), None);
        assert_eq!(array.known_length(), None);
        assert_eq!(array.length().unwrap(), 3);
        assert_eq!(array.length().unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(array.form(), Form::from(VirtualForm::new(None, false)));
        assert_eq!(
            array.array_type().unwrap().to_string(),
            "3 * {x: float64, y: var * int64}"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn overrides_take_precedence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let array = VirtualArray::builder(counted(&calls).with_length(5))
            .length(3)
            .build();
        assert_eq!(array.length().unwrap(), 3);
        assert!(matches!(
            array.materialize(),
            Err(Error::LengthMismatch { expected: 5, .. })
        ));

        let array = VirtualArray::builder(counted(&calls)).length(4).build();
        assert_eq!(array.length().unwrap(), 4);
        assert!(matches!(
            array.materialize(),
            Err(Error::LengthMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    fn record_form(fields: Vec<(&str, Form)>) -> Form {
        RecordForm::new(fields).unwrap().into()
    }

    #[test]
    fn builder_form_overrides_generator_form() {
        let float64: Form = NumpyForm::new(PrimitiveType::Float64).into();
        let int64: Form = NumpyForm::new(PrimitiveType::Int64).into();
        let ys: Form = ListOffsetForm::new(IndexType::I64, int64.clone()).unwrap().into();
        let produced = record_form(vec![("x", float64.clone()), ("y", ys.clone())]);
        let overridden = record_form(vec![("x", float64.clone()), ("z", int64.clone())]);

        let calls = Arc::new(AtomicUsize::new(0));
        let array = VirtualArray::builder(counted(&calls).with_form(produced.clone()))
            .form(overridden.clone())
            .length(3)
            .build();
        assert_eq!(array.declared_form(), Some(&overridden));
        assert_eq!(
            array.form(),
            Form::from(VirtualForm::new(Some(overridden.clone()), true))
        );

        let z = array.slice(&Selector::field("z")).unwrap();
        assert_eq!(z.declared_form(), Some(&int64));
        assert!(matches!(
            array.slice(&Selector::field("y")),
            Err(Error::FieldNotFound(_))
        ));
        let tail = array.slice(&Selector::range(Some(1), None)).unwrap();
        assert_eq!(tail.declared_form(), Some(&overridden));
        assert_eq!(tail.known_length(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // The generator's own form matches, the override does not.
        match array.materialize() {
            Err(Error::FormMismatch { expected, .. }) => assert!(expected.contains(r#""z""#)),
            other => panic!("expected a form mismatch, got {:?}", other),
        }
        assert!(z.materialize().is_err());

        // The override matches, the generator's own form does not.
        let wrong = record_form(vec![("x", int64.clone()), ("y", ys)]);
        let array = VirtualArray::builder(counted(&calls).with_form(wrong))
            .form(produced.clone())
            .build();
        assert_eq!(array.declared_form(), Some(&produced));
        match array.materialize() {
            Err(Error::FormMismatch { expected, .. }) => {
                assert!(expected.contains(r#""x":"int64""#));
            }
            other => panic!("expected a form mismatch, got {:?}", other),
        }

        let array = VirtualArray::builder(counted(&calls).with_form(produced.clone()))
            .form(produced)
            .build();
        assert_eq!(array.materialize().unwrap().length().unwrap(), 3);
    }

    #[test]
    fn field_projection_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache: Arc<dyn ArrayCache> = Arc::new(MemoryCache::new());
        let array = VirtualArray::builder(counted(&calls)).cache(cache.clone()).build();
        let y = array.slice(&Selector::field("y")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_ne!(y.cache_key(), array.cache_key());
        assert_eq!(
            Content::Virtual(y.clone()).to_list().unwrap(),
            json!([[1], [2, 3], []])
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(array.materialize().unwrap().length().unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn out_of_range_derivations_fail_on_materialize() {
        let calls = Arc::new(AtomicUsize::new(0));
        let array = VirtualArray::new(counted(&calls), None);
        let too_far = array.carry(&[0, 7]);
        assert_eq!(too_far.length().unwrap(), 2);
        assert!(too_far.materialize().unwrap_err().is_index_error());
        let too_long = array.range_nowrap(1, 9);
        assert!(too_long.materialize().unwrap_err().is_index_error());
    }

    #[test]
    fn integer_selectors_are_not_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let array = VirtualArray::new(counted(&calls), None);
        assert!(matches!(
            array.slice(&Selector::At(0)),
            Err(Error::NotShapePreserving)
        ));
        let record = array.getitem_at(-1).unwrap();
        assert_eq!(record.to_json().unwrap(), json!({"x": 2.2, "y": []}));
        assert!(format!("{:?}", array).contains("VirtualArray"));
    }
}
