use nestarray::content::{ListOffsetArray, NumpyArray, RecordArray};
use nestarray::form::VirtualForm;
use nestarray::{
    ArrayCache, ArrayGenerator, BoundedCache, Content, Error, Form, Index, MemoryCache, Selector,
    Value, VirtualArray,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const JAGGED_FORM: &str = r#"{
    "class": "ListOffsetArray64",
    "offsets": "i64",
    "content": "float64"
}"#;

fn jagged() -> nestarray::Result<Content> {
    let content = NumpyArray::from(vec![1.1, 2.2, 3.3, 4.4, 5.5]);
    Ok(ListOffsetArray::new(Index::from(vec![0_i64, 3, 3, 5]), content.into())?.into())
}

fn points() -> nestarray::Result<Content> {
    let x = NumpyArray::from(vec![0.0, 1.1, 2.2]);
    let y = ListOffsetArray::new(
        Index::from(vec![0_i64, 1, 3, 6]),
        NumpyArray::from(vec![1_i64, 2, 2, 3, 3, 3]).into(),
    )?;
    Ok(RecordArray::new(vec![("x", x.into()), ("y", y.into())])?.into())
}

/// Wraps `make` in a generator that counts its invocations.
fn counting<F>(make: F) -> (ArrayGenerator, Arc<AtomicUsize>)
where
    F: Fn() -> nestarray::Result<Content> + Send + Sync + 'static,
{
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let generator = ArrayGenerator::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        make()
    });
    (generator, calls)
}

fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

fn jagged_form() -> Form {
    Form::from_json(JAGGED_FORM).unwrap()
}

#[test]
fn declared_contract_needs_no_materialization() {
    let (generator, counter) = counting(jagged);
    let generator = generator.with_length(3).with_form(jagged_form());
    let array = VirtualArray::new(generator, Some(Arc::new(MemoryCache::new())));
    assert_eq!(array.length().unwrap(), 3);
    assert_eq!(
        array.form(),
        Form::from(VirtualForm::new(Some(jagged_form()), true))
    );
    assert_eq!(array.array_type().unwrap().to_string(), "3 * var * float64");
    assert_eq!(calls(&counter), 0);

    let content = Content::from(array);
    assert!(content.is_virtual());
    assert_eq!(content.length().unwrap(), 3);
    assert_eq!(
        content.array_type().unwrap().to_string(),
        "3 * var * float64"
    );
    assert_eq!(calls(&counter), 0);
}

#[test]
fn materialize_with_cache() {
    let (generator, counter) = counting(jagged);
    let cache = Arc::new(MemoryCache::new());
    let array = VirtualArray::builder(generator.with_length(3))
        .cache(cache.clone())
        .build();
    assert!(array.peek().is_none());

    let first = array.materialize().unwrap();
    let second = array.materialize().unwrap();
    assert_eq!(first.to_list().unwrap(), second.to_list().unwrap());
    assert_eq!(calls(&counter), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.keys(), vec![array.cache_key().to_string()]);
    assert!(array.peek().is_some());

    cache.clear();
    assert!(array.peek().is_none());
    array.materialize().unwrap();
    assert_eq!(calls(&counter), 2);
}

#[test]
fn materialize_without_cache() {
    let (generator, counter) = counting(jagged);
    let array = VirtualArray::new(generator, None);
    assert!(array.cache().is_none());
    array.materialize().unwrap();
    assert!(array.peek().is_none());
    array.materialize().unwrap();
    assert_eq!(calls(&counter), 2);
}

#[test]
fn bounded_cache_backend() {
    let (generator, counter) = counting(jagged);
    let cache: Arc<dyn ArrayCache> = Arc::new(BoundedCache::with_capacity(4));
    let array = VirtualArray::new(generator, Some(cache.clone()));
    array.materialize().unwrap();
    array.materialize().unwrap();
    assert_eq!(calls(&counter), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn slice_without_declared_form() {
    let (generator, counter) = counting(jagged);
    let array = VirtualArray::new(generator.with_length(3), None);
    let head = array.slice(&Selector::range(None, Some(-1))).unwrap();
    assert_eq!(head.length().unwrap(), 2);
    assert_eq!(head.form(), Form::from(VirtualForm::new(None, true)));
    assert_eq!(calls(&counter), 0);

    let second = head.getitem_at(1).unwrap().into_content().unwrap();
    assert!(matches!(second, Content::Numpy(_)));
    assert_eq!(second.to_list().unwrap(), json!([]));
    assert_eq!(calls(&counter), 1);
}

#[test]
fn slice_learns_an_undeclared_length() {
    let (generator, counter) = counting(jagged);
    let cache = Arc::new(MemoryCache::new());
    let array = VirtualArray::builder(generator).cache(cache).build();
    let tail = array.slice(&Selector::range(Some(1), None)).unwrap();
    assert_eq!(calls(&counter), 1);
    assert_eq!(tail.known_length(), Some(2));
    assert_eq!(
        Content::Virtual(tail).to_list().unwrap(),
        json!([[], [4.4, 5.5]])
    );
    assert_eq!(calls(&counter), 1);
}

#[test]
fn shape_preserving_selectors_stay_lazy() {
    let (generator, counter) = counting(jagged);
    let array = VirtualArray::new(generator.with_length(3).with_form(jagged_form()), None);

    let taken = array.slice(&Selector::Take(vec![2, 0, 2])).unwrap();
    let masked = array
        .slice(&Selector::Mask(vec![false, true, true]))
        .unwrap();
    let stepped = array
        .slice(&Selector::Range(nestarray::SliceRange::new(
            None,
            None,
            Some(-2),
        )))
        .unwrap();
    assert_eq!(taken.known_length(), Some(3));
    assert_eq!(masked.known_length(), Some(2));
    assert_eq!(stepped.known_length(), Some(2));
    assert_eq!(
        taken.declared_form(),
        Some(&jagged_form().carried())
    );
    assert_eq!(masked.array_type().unwrap().to_string(), "2 * var * float64");
    assert_eq!(calls(&counter), 0);

    assert_eq!(
        Content::Virtual(taken).to_list().unwrap(),
        json!([[4.4, 5.5], [1.1, 2.2, 3.3], [4.4, 5.5]])
    );
    assert_eq!(
        Content::Virtual(masked).to_list().unwrap(),
        json!([[], [4.4, 5.5]])
    );
    assert_eq!(
        Content::Virtual(stepped).to_list().unwrap(),
        json!([[4.4, 5.5], [1.1, 2.2, 3.3]])
    );
    assert_eq!(calls(&counter), 3);
}

#[test]
fn invalid_selectors_fail_before_materializing() {
    let (generator, counter) = counting(jagged);
    let array = VirtualArray::new(generator.with_length(3).with_form(jagged_form()), None);
    assert!(array
        .slice(&Selector::Take(vec![0, 3]))
        .unwrap_err()
        .is_index_error());
    assert!(array
        .slice(&Selector::Mask(vec![true, false]))
        .unwrap_err()
        .is_index_error());
    assert!(matches!(
        array.slice(&Selector::field("x")),
        Err(Error::FieldNotFound(_))
    ));
    assert!(matches!(
        array.slice(&Selector::At(1)),
        Err(Error::NotShapePreserving)
    ));
    assert_eq!(calls(&counter), 0);

    assert!(array.getitem_at(3).unwrap_err().is_index_error());
    assert_eq!(calls(&counter), 1);
}

#[test]
fn field_projection() {
    let form = Form::from_json(
        r#"{
            "class": "RecordArray",
            "contents": {
                "x": "float64",
                "y": {"class": "ListOffsetArray64", "offsets": "i64", "content": "int64"}
            }
        }"#,
    )
    .unwrap();
    let (generator, counter) = counting(points);
    let array = VirtualArray::new(generator.with_length(3).with_form(form), None);

    let y = array.slice(&Selector::field("y")).unwrap();
    assert_eq!(y.array_type().unwrap().to_string(), "3 * var * int64");
    let x = Content::Virtual(array.clone())
        .getitem(&[Selector::field("x")])
        .unwrap()
        .into_content()
        .unwrap();
    assert!(x.is_virtual());
    assert_eq!(x.array_type().unwrap().to_string(), "3 * float64");
    assert_eq!(calls(&counter), 0);

    assert_eq!(
        Content::Virtual(y).to_list().unwrap(),
        json!([[1], [2, 2], [3, 3, 3]])
    );
    assert_eq!(x.to_list().unwrap(), json!([0.0, 1.1, 2.2]));
    assert_eq!(calls(&counter), 2);

    let lasts = array
        .getitem(&[Selector::field("y"), Selector::range(None, None), Selector::At(-1)])
        .unwrap();
    assert_eq!(lasts.to_json().unwrap(), json!([1, 2, 3]));
}

#[test]
fn integer_selection_returns_concrete_values() {
    let (generator, counter) = counting(jagged);
    let array = VirtualArray::new(generator.with_length(3), None);
    let element = array.getitem(&[Selector::At(2)]).unwrap();
    match &element {
        Value::Array(content) => assert!(!content.is_virtual()),
        other => panic!("expected an array, got {:?}", other),
    }
    assert_eq!(element.to_json().unwrap(), json!([4.4, 5.5]));
    assert_eq!(calls(&counter), 1);

    let scalar = array.getitem(&[Selector::At(0), Selector::At(-1)]).unwrap();
    assert_eq!(scalar.as_f64(), Some(3.3));
    let column = array
        .getitem(&[Selector::Take(vec![0, 2]), Selector::At(0)])
        .unwrap();
    assert_eq!(column.to_json().unwrap(), json!([1.1, 4.4]));
    assert_eq!(calls(&counter), 3);
}

#[test]
fn iteration_materializes_once_per_iterator() {
    let (generator, counter) =
        counting(|| Ok(NumpyArray::from(vec![1_i64, 2, 3, 4, 5]).into()));
    let array = VirtualArray::new(generator.with_length(5), None);
    let values = |iter: nestarray::content::ContentIter| {
        iter.map(|v| v.unwrap().to_json().unwrap())
            .collect::<Vec<_>>()
    };
    let first = values(array.iter().unwrap());
    assert_eq!(first, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
    assert_eq!(calls(&counter), 1);
    let second = values(array.iter().unwrap());
    assert_eq!(first, second);
    assert_eq!(calls(&counter), 2);

    let (generator, counter) =
        counting(|| Ok(NumpyArray::from(vec![1_i64, 2, 3, 4, 5]).into()));
    let cached = VirtualArray::new(generator, Some(Arc::new(MemoryCache::new())));
    assert_eq!(cached.iter().unwrap().count(), 5);
    assert_eq!(cached.iter().unwrap().count(), 5);
    assert_eq!(calls(&counter), 1);
}

#[test]
fn nested_virtual_arrays_materialize_independently() {
    let (inner, inner_calls) =
        counting(|| Ok(NumpyArray::from(vec![1.1, 2.2, 3.3, 4.4, 5.5]).into()));
    let inner = VirtualArray::new(inner.with_length(5), None);
    let (outer, outer_calls) = counting(move || {
        Ok(ListOffsetArray::new(
            Index::from(vec![0_i64, 3, 3, 5]),
            Content::Virtual(inner.clone()),
        )?
        .into())
    });
    let outer = VirtualArray::new(outer.with_length(3), None);

    let row = outer.getitem_at(2).unwrap();
    assert_eq!((calls(&outer_calls), calls(&inner_calls)), (1, 0));
    let row = row.into_content().unwrap();
    assert!(row.is_virtual());
    assert_eq!(row.length().unwrap(), 2);
    assert_eq!((calls(&outer_calls), calls(&inner_calls)), (1, 0));

    let value = row.getitem_at(1).unwrap();
    assert_eq!(value.as_f64(), Some(5.5));
    assert_eq!((calls(&outer_calls), calls(&inner_calls)), (1, 1));
}

#[test]
fn length_and_count_with_and_without_cache() {
    let (generator, counter) = counting(jagged);
    let generator = generator.with_length(3);

    let array = VirtualArray::new(generator.clone(), None);
    assert_eq!(array.length().unwrap(), 3);
    assert_eq!(calls(&counter), 0);
    assert_eq!(
        array.getitem_at(2).unwrap().to_json().unwrap(),
        json!([4.4, 5.5])
    );
    assert_eq!(calls(&counter), 1);
    let fresh = VirtualArray::new(generator.clone(), None);
    assert_eq!(
        fresh.getitem_at(2).unwrap().to_json().unwrap(),
        json!([4.4, 5.5])
    );
    assert_eq!(calls(&counter), 2);

    let (generator, counter) = counting(jagged);
    let cached = VirtualArray::new(generator.with_length(3), Some(Arc::new(MemoryCache::new())));
    assert_eq!(cached.length().unwrap(), 3);
    assert_eq!(
        cached.getitem_at(2).unwrap().to_json().unwrap(),
        json!([4.4, 5.5])
    );
    assert_eq!(
        cached.getitem_at(2).unwrap().to_json().unwrap(),
        json!([4.4, 5.5])
    );
    assert_eq!(calls(&counter), 1);
}

#[test]
fn contract_violations() {
    let array = VirtualArray::new(ArrayGenerator::new(jagged).with_length(2), None);
    assert_eq!(array.length().unwrap(), 2);
    assert!(matches!(
        array.getitem_at(0),
        Err(Error::LengthMismatch {
            expected: 2,
            actual: 3
        })
    ));

    let equivalent = ArrayGenerator::new(jagged).with_form(jagged_form().carried());
    assert!(equivalent.materialize().is_ok());

    let wrong_form = Form::from_json(
        r#"{"class": "ListOffsetArray64", "offsets": "i64", "content": "int64"}"#,
    )
    .unwrap();
    let array = VirtualArray::builder(ArrayGenerator::new(jagged))
        .form(wrong_form)
        .build();
    assert!(matches!(
        array.materialize(),
        Err(Error::FormMismatch { .. })
    ));
}

#[test]
fn generator_errors_are_not_cached() {
    let (generator, counter) = counting(|| Err(Error::generator("source unavailable")));
    let cache = Arc::new(MemoryCache::new());
    let array = VirtualArray::new(generator, Some(cache.clone()));
    for _ in 0..2 {
        match array.materialize() {
            Err(Error::Generator(source)) => assert_eq!(source.to_string(), "source unavailable"),
            other => panic!("expected a generator error, got {:?}", other),
        }
    }
    assert_eq!(calls(&counter), 2);
    assert!(cache.is_empty());
}

#[test]
fn distinct_arrays_materialize_concurrently() {
    let cache: Arc<dyn ArrayCache> = Arc::new(MemoryCache::new());
    let arrays: Vec<VirtualArray> = (0..4)
        .map(|_| VirtualArray::new(ArrayGenerator::new(jagged), Some(cache.clone())))
        .collect();
    std::thread::scope(|scope| {
        for array in &arrays {
            scope.spawn(move || array.materialize().unwrap());
        }
    });
    assert_eq!(cache.len(), 4);
}
