use crate::content::Content;
use crate::error::{Error, Result};
use crate::form::Form;
use crate::selector::{self, Selector};
use std::fmt;
use std::sync::Arc;

type GenerateFn = dyn Fn() -> Result<Content> + Send + Sync;

/// A deferred computation of a `Content`, with an optional declared length
/// and form.
///
/// Declared values are a contract: `materialize` fails if the produced
/// array disagrees with them.
#[derive(Clone)]
pub struct ArrayGenerator {
    func: Arc<GenerateFn>,
    form: Option<Form>,
    length: Option<usize>,
}

impl ArrayGenerator {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> Result<Content> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            form: None,
            length: None,
        }
    }

    #[must_use]
    pub fn with_form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    #[must_use]
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub fn form(&self) -> Option<&Form> {
        self.form.as_ref()
    }

    #[must_use]
    pub fn length(&self) -> Option<usize> {
        self.length
    }

    /// Runs the production function once and checks the result against the
    /// declared length and form. Nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns the error raised by the production function, or a mismatch
    /// error if the result breaks the declared contract.
    pub fn materialize(&self) -> Result<Content> {
        log::debug!(
            "invoking array generator (declared length: {:?})",
            self.length
        );
        let content = (self.func)()?;
        check_contract(self.form.as_ref(), self.length, &content)?;
        Ok(content)
    }

    /// Returns a generator producing this generator's array with `selector`
    /// applied. The new length and form are computed from the declared ones,
    /// so the production function is not called.
    ///
    /// # Errors
    ///
    /// Returns an error if `selector` drops a dimension, or if it is invalid
    /// for the declared length or form.
    pub fn derive(&self, selector: &Selector) -> Result<ArrayGenerator> {
        let (form, length) = derive_contract(self.form.as_ref(), self.length, selector)?;
        let parent = self.clone();
        let selector = selector.clone();
        log::trace!("deriving array generator with selector {}", selector);
        Ok(Self::derived(
            move || parent.materialize()?.slice(&selector),
            form,
            length,
        ))
    }

    pub(super) fn derived<F>(func: F, form: Option<Form>, length: Option<usize>) -> Self
    where
        F: Fn() -> Result<Content> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            form,
            length,
        }
    }
}

impl fmt::Debug for ArrayGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayGenerator")
            .field("form", &self.form.as_ref().map(ToString::to_string))
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Checks a produced array against a declared form and length.
pub(crate) fn check_contract(
    form: Option<&Form>,
    length: Option<usize>,
    content: &Content,
) -> Result<()> {
    if let Some(expected) = length {
        let actual = content.length()?;
        if actual != expected {
            return Err(Error::LengthMismatch { expected, actual });
        }
    }
    if let Some(declared) = form {
        let actual = content.form();
        if !declared.is_compatible(&actual) {
            return Err(Error::FormMismatch {
                expected: declared.to_json(false, false),
                actual: actual.to_json(false, false),
            });
        }
    }
    Ok(())
}

/// Computes the form and length of an array after `selector` from those of
/// the array before it.
pub(crate) fn derive_contract(
    form: Option<&Form>,
    length: Option<usize>,
    selector: &Selector,
) -> Result<(Option<Form>, Option<usize>)> {
    match selector {
        Selector::At(_) => Err(Error::NotShapePreserving),
        Selector::Field(key) => Ok((form.map(|f| f.field_form(key)).transpose()?, length)),
        Selector::Range(range) => {
            if range.step == Some(0) {
                return Err(Error::ZeroStep);
            }
            let length = length
                .map(|n| range.resolve(n).map(|resolved| resolved.len()))
                .transpose()?;
            let form = if range.step.unwrap_or(1) == 1 {
                form.cloned()
            } else {
                form.map(Form::carried)
            };
            Ok((form, length))
        }
        Selector::Take(indices) => {
            if let Some(n) = length {
                for &i in indices {
                    selector::wrap_index(i, n)?;
                }
            }
            Ok((form.map(Form::carried), Some(indices.len())))
        }
        Selector::Mask(mask) => {
            if let Some(n) = length {
                if mask.len() != n {
                    return Err(Error::MaskLength {
                        mask: mask.len(),
                        length: n,
                    });
                }
            }
            let selected = mask.iter().filter(|keep| **keep).count();
            Ok((form.map(Form::carried), Some(selected)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ListOffsetArray, NumpyArray};
    use crate::datatypes::PrimitiveType;
    use crate::form::{ListOffsetForm, NumpyForm};
    use crate::index::Index;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn jagged() -> Result<Content> {
        let content = NumpyArray::from(vec![1.1, 2.2, 3.3, 4.4, 5.5]);
        Ok(ListOffsetArray::new(Index::from(vec![0_i64, 3, 3, 5]), content.into())?.into())
    }

    fn jagged_form() -> Form {
        ListOffsetForm::new(
            crate::datatypes::IndexType::I64,
            NumpyForm::new(PrimitiveType::Float64).into(),
        )
        .unwrap()
        .into()
    }

    #[test]
    fn materialize_checks_contract() {
        let generator = ArrayGenerator::new(jagged)
            .with_length(3)
            .with_form(jagged_form());
        assert_eq!(generator.length(), Some(3));
        assert_eq!(generator.form(), Some(&jagged_form()));
        assert_eq!(generator.materialize().unwrap().length().unwrap(), 3);

        let wrong_length = ArrayGenerator::new(jagged).with_length(4);
        assert!(matches!(
            wrong_length.materialize(),
            Err(Error::LengthMismatch {
                expected: 4,
                actual: 3
            })
        ));

        let wrong_form = ArrayGenerator::new(jagged).with_form(NumpyForm::new(PrimitiveType::Int64).into());
        match wrong_form.materialize() {
            Err(Error::FormMismatch { expected, actual }) => {
                assert!(expected.contains(r#""primitive":"int64""#));
                assert!(actual.contains("ListOffsetArray64"));
            }
            other => panic!("expected a form mismatch, got {:?}", other),
        }
    }

    #[test]
    fn materialize_runs_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let generator = ArrayGenerator::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            jagged()
        });
        generator.materialize().unwrap();
        generator.materialize().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn derive_is_analytic() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let generator = ArrayGenerator::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            jagged()
        })
        .with_length(3)
        .with_form(jagged_form());

        let tail = generator.derive(&Selector::range(Some(1), None)).unwrap();
        assert_eq!(tail.length(), Some(2));
        assert_eq!(tail.form(), Some(&jagged_form()));

        let taken = generator.derive(&Selector::Take(vec![2, 2, 0, 1])).unwrap();
        assert_eq!(taken.length(), Some(4));
        assert_eq!(taken.form(), Some(&jagged_form().carried()));

        let masked = generator
            .derive(&Selector::Mask(vec![true, false, true]))
            .unwrap();
        assert_eq!(masked.length(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(
            taken.materialize().unwrap().to_list().unwrap(),
            json!([[4.4, 5.5], [4.4, 5.5], [1.1, 2.2, 3.3], []])
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn derive_rejects_invalid_selectors() {
        let generator = ArrayGenerator::new(jagged).with_length(3);
        assert!(matches!(
            generator.derive(&Selector::At(0)),
            Err(Error::NotShapePreserving)
        ));
        assert!(generator
            .derive(&Selector::Take(vec![3]))
            .unwrap_err()
            .is_index_error());
        assert!(generator
            .derive(&Selector::Mask(vec![true]))
            .unwrap_err()
            .is_index_error());
        assert!(generator.derive(&Selector::field("x")).is_ok());
        assert!(ArrayGenerator::new(jagged)
            .with_form(jagged_form())
            .derive(&Selector::field("x"))
            .is_err());
    }

    #[test]
    fn generator_errors_propagate() {
        let generator = ArrayGenerator::new(|| Err(Error::generator("no data")));
        let err = generator.materialize().unwrap_err();
        assert_eq!(err.to_string(), "generator failed: no data");
    }
}
