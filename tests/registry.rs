pub mod common;

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use common::init_logger;
use common::models::{Barn, Farm, Link, Pig, tumbleweed};
use xml_mapper::XmlMapper;
use xml_mapper::core::{
    ComplexSchema, Member, SerializationState, SerializerOptions, TypeInfo, TypeKey,
    TypeSerializerRegistry, TypeShape, XmlType,
};
use xml_mapper::error::{XmlError, XmlResult};
use xml_mapper::serializer::{CustomSerializer, SerializerContext, TextSerializer, TypeSerializer};
use xml_mapper::xml::{XmlReader, XmlWriter};

/// A collection mapped to an attribute, which has no text form.
#[derive(Default)]
struct Broken {
    tags: Vec<u32>,
}

impl XmlType for Broken {
    fn shape() -> TypeShape {
        ComplexSchema::<Broken>::new()
            .member(Member::new("Tags", |b: &Broken| &b.tags, |b: &mut Broken, v| b.tags = v).attribute())
            .build()
    }
}

#[derive(Default)]
struct Yard {
    pigs: Vec<Pig>,
    boars: Vec<Pig>,
}

impl XmlType for Yard {
    fn shape() -> TypeShape {
        ComplexSchema::<Yard>::new()
            .member(
                Member::new("Pigs", |y: &Yard| &y.pigs, |y: &mut Yard, v| y.pigs = v)
                    .element()
                    .item::<Pig>("pig"),
            )
            .member(
                Member::new("Boars", |y: &Yard| &y.boars, |y: &mut Yard, v| y.boars = v)
                    .element()
                    .item::<Pig>("boar"),
            )
            .build()
    }
}

static SLOW_STARTED: AtomicBool = AtomicBool::new(false);
static SLOW_CREATED: AtomicBool = AtomicBool::new(false);

/// A `u32` serializer that takes its time to construct.
struct Slow;

impl TextSerializer for Slow {
    fn format(&self, value: &dyn Any) -> XmlResult<String> {
        value
            .downcast_ref::<u32>()
            .map(u32::to_string)
            .ok_or_else(|| XmlError::unexpected_value("u32"))
    }

    fn parse(&self, text: &str) -> XmlResult<Box<dyn Any>> {
        text.trim()
            .parse::<u32>()
            .map(|v| Box::new(v) as Box<dyn Any>)
            .map_err(|e| XmlError::conversion(text, "u32", e.to_string()))
    }
}

impl TypeSerializer for Slow {
    fn supported_type(&self) -> TypeKey {
        TypeKey::of::<u32>()
    }

    fn serialize(
        &self,
        value: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        self.write_text_element(value, writer, state)
    }

    fn deserialize(
        &self,
        reader: &mut XmlReader<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>> {
        self.read_text_element(reader, state)
    }

    fn as_text(&self) -> Option<&dyn TextSerializer> {
        Some(self)
    }
}

impl CustomSerializer for Slow {
    fn target_type() -> TypeKey {
        TypeKey::of::<u32>()
    }

    fn create(_context: &SerializerContext<'_>) -> XmlResult<Self> {
        SLOW_STARTED.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));
        SLOW_CREATED.store(true, Ordering::SeqCst);
        Ok(Slow)
    }
}

#[derive(Default)]
struct Alpha {
    beta: Beta,
    slow: u32,
}

impl XmlType for Alpha {
    fn shape() -> TypeShape {
        ComplexSchema::<Alpha>::new()
            .member(Member::new("Beta", |a: &Alpha| &a.beta, |a: &mut Alpha, v| a.beta = v).element())
            .member(
                Member::new("Slow", |a: &Alpha| &a.slow, |a: &mut Alpha, v| a.slow = v)
                    .element()
                    .serializer::<Slow>(),
            )
            .build()
    }
}

#[derive(Default)]
struct Beta {
    alpha: Option<Box<Alpha>>,
}

impl XmlType for Beta {
    fn shape() -> TypeShape {
        ComplexSchema::<Beta>::new()
            .member(Member::new("Alpha", |b: &Beta| &b.alpha, |b: &mut Beta, v| b.alpha = v).element())
            .build()
    }
}

#[test]
fn same_type_and_options_share_one_serializer() {
    let registry = TypeSerializerRegistry::new();
    let options = SerializerOptions::default();

    let first = registry
        .get_by_supported_type(TypeInfo::of::<Barn>(), &options, None)
        .unwrap();
    let second = registry
        .get_by_supported_type(TypeInfo::of::<Barn>(), &options, None)
        .unwrap();

    assert_eq!(first, second);
    assert!(Arc::ptr_eq(
        &registry.serializer(first).unwrap(),
        &registry.serializer(second).unwrap()
    ));
}

#[test]
fn collection_serializers_are_built_per_member() {
    let mapper = XmlMapper::new();
    let yard = Yard {
        pigs: vec![Pig {
            name: "Babe".to_string(),
            weight: 1,
        }],
        boars: vec![Pig {
            name: "Ham".to_string(),
            weight: 2,
        }],
    };

    let xml = mapper.to_string(&yard).unwrap();

    assert_eq!(
        xml,
        concat!(
            r#"<Yard><Pigs><pig Name="Babe" Weight="1"/></Pigs>"#,
            r#"<Boars><boar Name="Ham" Weight="2"/></Boars></Yard>"#
        )
    );
}

#[test]
fn self_referencing_types_build_and_round_trip() {
    init_logger();
    let mapper = XmlMapper::new();
    let chain = Link {
        value: 1,
        next: Some(Box::new(Link {
            value: 2,
            next: Some(Box::new(Link {
                value: 3,
                next: None,
            })),
        })),
    };

    let xml = mapper.to_string(&chain).unwrap();
    assert_eq!(
        xml,
        r#"<Link Value="1"><Next Value="2"><Next Value="3"/></Next></Link>"#
    );
    assert_eq!(mapper.from_str::<Link>(&xml).unwrap(), chain);
}

#[test]
fn failed_construction_leaves_nothing_behind() {
    init_logger();
    let mapper = XmlMapper::new();

    let result = mapper.serializer_for::<Broken>();

    assert!(matches!(result, Err(XmlError::Configuration { .. })));
    assert_eq!(mapper.registry().len(), 0);

    // the failure is reported again rather than cached
    assert!(mapper.serializer_for::<Broken>().is_err());
    assert!(mapper.registry().is_empty());
}

#[test]
fn registry_is_shared_across_threads() {
    init_logger();
    let registry = Arc::new(TypeSerializerRegistry::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                let mapper = XmlMapper::builder().registry(registry).build();
                let xml = mapper.to_string(&tumbleweed()).unwrap();
                let farm = mapper.from_str::<Farm>(&xml).unwrap();
                farm.animals.len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }
    let built = registry.len();
    XmlMapper::builder()
        .registry(registry.clone())
        .build()
        .to_string(&tumbleweed())
        .unwrap();
    assert_eq!(registry.len(), built);
}

#[test]
fn dependencies_are_visible_to_other_threads_only_once_built() {
    init_logger();
    let registry = Arc::new(TypeSerializerRegistry::new());

    let builder = {
        let registry = registry.clone();
        thread::spawn(move || {
            registry
                .get_by_supported_type(TypeInfo::of::<Alpha>(), &SerializerOptions::default(), None)
                .map(|_| ())
        })
    };
    while !SLOW_STARTED.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    // Beta is filled by now but still refers to the Alpha under construction
    registry
        .get_by_supported_type(TypeInfo::of::<Beta>(), &SerializerOptions::default(), None)
        .unwrap();
    assert!(SLOW_CREATED.load(Ordering::SeqCst));
    builder.join().unwrap().unwrap();

    let beta = Beta {
        alpha: Some(Box::new(Alpha::default())),
    };
    let xml = XmlMapper::builder()
        .registry(registry)
        .build()
        .to_string(&beta)
        .unwrap();
    assert!(xml.contains("<Slow>0</Slow>"));
}
