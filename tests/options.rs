pub mod common;

use std::any::Any;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::NamedTempFile;

use common::init_logger;
use common::models::Barn;
use xml_mapper::XmlMapper;
use xml_mapper::core::{
    ComplexSchema, Member, SerializationHooks, SerializationState, SerializerOptions, TypeKey,
    TypeShape, XmlType,
};
use xml_mapper::error::{XmlError, XmlResult};
use xml_mapper::serializer::{CustomSerializer, SerializerContext, TextSerializer, TypeSerializer};
use xml_mapper::xml::{XmlReader, XmlWriter};

#[derive(Default, Debug, PartialEq)]
struct Shed {
    size: u32,
    owner: String,
    color: Option<String>,
    note: Option<String>,
}

impl XmlType for Shed {
    fn shape() -> TypeShape {
        ComplexSchema::<Shed>::new()
            .root("shed")
            .root("compact-shed")
            .when("mode", "compact")
            .member(
                Member::new("Size", |s: &Shed| &s.size, |s: &mut Shed, v| s.size = v)
                    .attribute()
                    .when("mode", "compact")
                    .element(),
            )
            .member(
                Member::new("Owner", |s: &Shed| &s.owner, |s: &mut Shed, v| s.owner = v)
                    .element()
                    .default_as_null(),
            )
            .member(Member::new("Color", |s: &Shed| &s.color, |s: &mut Shed, v| s.color = v).attribute())
            .member(
                Member::new("Note", |s: &Shed| &s.note, |s: &mut Shed, v| s.note = v)
                    .element()
                    .serialize_if_null(),
            )
            .build()
    }
}

#[derive(Default, Debug, PartialEq)]
struct Loose {
    name: String,
    weight: u32,
}

impl XmlType for Loose {
    fn shape() -> TypeShape {
        ComplexSchema::<Loose>::new()
            .member(Member::new("Name", |l: &Loose| &l.name, |l: &mut Loose, v| l.name = v).attribute())
            .member(Member::new("Weight", |l: &Loose| &l.weight, |l: &mut Loose, v| l.weight = v))
            .build()
    }
}

#[derive(Default, Debug, PartialEq)]
struct Coop {
    name: String,
    hens: u32,
}

impl XmlType for Coop {
    fn shape() -> TypeShape {
        ComplexSchema::<Coop>::new()
            .root_qualified("urn:farm", "coop")
            .member(
                Member::new("Name", |c: &Coop| &c.name, |c: &mut Coop, v| c.name = v)
                    .attribute()
                    .namespace("urn:tags"),
            )
            .member(
                Member::new("Hens", |c: &Coop| &c.hens, |c: &mut Coop, v| c.hens = v)
                    .element()
                    .namespace("urn:farm"),
            )
            .build()
    }
}

/// Writes booleans as `yes`/`no`.
struct YesNo;

impl TextSerializer for YesNo {
    fn format(&self, value: &dyn Any) -> XmlResult<String> {
        match value.downcast_ref::<bool>() {
            Some(true) => Ok("yes".to_string()),
            Some(false) => Ok("no".to_string()),
            None => Err(XmlError::unexpected_value("bool")),
        }
    }

    fn parse(&self, text: &str) -> XmlResult<Box<dyn Any>> {
        match text.trim() {
            "yes" => Ok(Box::new(true)),
            "no" => Ok(Box::new(false)),
            other => Err(XmlError::conversion(other, "bool", "expected yes or no")),
        }
    }
}

impl TypeSerializer for YesNo {
    fn supported_type(&self) -> TypeKey {
        TypeKey::of::<bool>()
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

impl CustomSerializer for YesNo {
    fn target_type() -> TypeKey {
        TypeKey::of::<bool>()
    }

    fn create(_context: &SerializerContext<'_>) -> XmlResult<Self> {
        Ok(YesNo)
    }
}

static WRITES: AtomicUsize = AtomicUsize::new(0);

#[derive(Default, Debug, PartialEq)]
struct Pasture {
    fenced: bool,
    grazed: bool,
    loaded: bool,
}

impl SerializationHooks for Pasture {
    fn before_serialize(&self) {
        WRITES.fetch_add(1, Ordering::SeqCst);
    }

    fn after_deserialize(&mut self) {
        self.loaded = true;
    }
}

impl XmlType for Pasture {
    fn shape() -> TypeShape {
        ComplexSchema::<Pasture>::new()
            .hooks()
            .member(
                Member::new("Fenced", |p: &Pasture| &p.fenced, |p: &mut Pasture, v| p.fenced = v)
                    .attribute()
                    .serializer::<YesNo>(),
            )
            .member(
                Member::new("Grazed", |p: &Pasture| &p.grazed, |p: &mut Pasture, v| p.grazed = v)
                    .element()
                    .serializer::<YesNo>(),
            )
            .build()
    }
}

/// Declares a `u32` serializer on a `bool` member.
#[derive(Default)]
struct Mismatched {
    flag: bool,
}

struct Counting;

impl TypeSerializer for Counting {
    fn supported_type(&self) -> TypeKey {
        TypeKey::of::<u32>()
    }

    fn serialize(
        &self,
        _value: &dyn Any,
        _writer: &mut XmlWriter<'_>,
        _state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        Ok(())
    }

    fn deserialize(
        &self,
        _reader: &mut XmlReader<'_>,
        _state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>> {
        Ok(Box::new(0u32))
    }
}

impl CustomSerializer for Counting {
    fn target_type() -> TypeKey {
        TypeKey::of::<u32>()
    }

    fn create(_context: &SerializerContext<'_>) -> XmlResult<Self> {
        Ok(Counting)
    }
}

impl XmlType for Mismatched {
    fn shape() -> TypeShape {
        ComplexSchema::<Mismatched>::new()
            .member(
                Member::new("Flag", |m: &Mismatched| &m.flag, |m: &mut Mismatched, v| m.flag = v)
                    .element()
                    .serializer::<Counting>(),
            )
            .build()
    }
}

fn shed() -> Shed {
    Shed {
        size: 12,
        owner: String::new(),
        color: None,
        note: None,
    }
}

#[test]
fn conditional_tags_follow_the_options() {
    init_logger();
    let plain = XmlMapper::new();
    let compact = XmlMapper::builder()
        .options(SerializerOptions::builder().condition("mode", "compact").build())
        .build();

    assert_eq!(
        plain.to_string(&shed()).unwrap(),
        "<shed><Size>12</Size><Note/></shed>"
    );
    assert_eq!(
        compact.to_string(&shed()).unwrap(),
        r#"<compact-shed Size="12"><Note/></compact-shed>"#
    );
    assert_eq!(
        compact
            .from_str::<Shed>(r#"<compact-shed Size="12"><Note/></compact-shed>"#)
            .unwrap(),
        shed()
    );
}

#[test]
fn serialize_nulls_writes_every_null_member() {
    let mapper = XmlMapper::builder()
        .options(SerializerOptions::builder().serialize_nulls(true).build())
        .build();

    let xml = mapper.to_string(&shed()).unwrap();

    assert_eq!(xml, r#"<shed Color=""><Size>12</Size><Owner/><Note/></shed>"#);
    let decoded = mapper.from_str::<Shed>(&xml).unwrap();
    assert_eq!(decoded.color, None);
    assert_eq!(decoded.note, None);
}

#[test]
fn empty_optional_strings_survive_only_as_elements() {
    let mapper = XmlMapper::new();
    let shed = Shed {
        color: Some(String::new()),
        note: Some(String::new()),
        ..shed()
    };

    let xml = mapper.to_string(&shed).unwrap();

    assert_eq!(xml, r#"<shed Color=""><Size>12</Size><Note></Note></shed>"#);
    let decoded = mapper.from_str::<Shed>(&xml).unwrap();
    assert_eq!(decoded.color, None);
    assert_eq!(decoded.note, Some(String::new()));
}

#[test]
fn present_values_are_written() {
    let mapper = XmlMapper::new();
    let shed = Shed {
        size: 3,
        owner: "Tum".to_string(),
        color: Some("red".to_string()),
        note: Some("leaky".to_string()),
    };

    let xml = mapper.to_string(&shed).unwrap();

    assert_eq!(
        xml,
        r#"<shed Color="red"><Size>3</Size><Owner>Tum</Owner><Note>leaky</Note></shed>"#
    );
    assert_eq!(mapper.from_str::<Shed>(&xml).unwrap(), shed);
}

#[test]
fn lowercase_names_apply_to_derived_names_only() {
    let mapper = XmlMapper::builder()
        .options(SerializerOptions::builder().lowercase_names(true).build())
        .build();
    let barn = Barn {
        name: "Tum".to_string(),
    };

    assert_eq!(mapper.to_string(&barn).unwrap(), "<barn><name>Tum</name></barn>");
    assert_eq!(mapper.to_string(&shed()).unwrap(), "<shed><size>12</size><note/></shed>");
}

#[test]
fn untagged_members_need_include_unattributed() {
    let loose = Loose {
        name: "Babe".to_string(),
        weight: 120,
    };
    let strict = XmlMapper::new();
    let inclusive = XmlMapper::builder()
        .options(SerializerOptions::builder().include_unattributed(true).build())
        .build();

    assert_eq!(strict.to_string(&loose).unwrap(), r#"<Loose Name="Babe"/>"#);
    assert_eq!(
        inclusive.to_string(&loose).unwrap(),
        r#"<Loose Name="Babe"><Weight>120</Weight></Loose>"#
    );
}

#[test]
fn namespaces_get_generated_or_preferred_prefixes() {
    let coop = Coop {
        name: "North".to_string(),
        hens: 7,
    };
    let generated = XmlMapper::new();
    let preferred = XmlMapper::builder()
        .options(
            SerializerOptions::builder()
                .namespace_prefix("urn:farm", "f")
                .namespace_prefix("urn:tags", "t")
                .build(),
        )
        .build();

    let xml = generated.to_string(&coop).unwrap();
    assert_eq!(
        xml,
        r#"<ns0:coop xmlns:ns0="urn:farm" xmlns:ns1="urn:tags" ns1:Name="North"><ns0:Hens>7</ns0:Hens></ns0:coop>"#
    );
    assert_eq!(generated.from_str::<Coop>(&xml).unwrap(), coop);

    let xml = preferred.to_string(&coop).unwrap();
    assert_eq!(
        xml,
        r#"<f:coop xmlns:f="urn:farm" xmlns:t="urn:tags" t:Name="North"><f:Hens>7</f:Hens></f:coop>"#
    );
    assert_eq!(preferred.from_str::<Coop>(&xml).unwrap(), coop);
}

#[test]
fn namespace_must_match_on_read() {
    let mapper = XmlMapper::new();

    let coop = mapper
        .from_str::<Coop>(r#"<coop xmlns="urn:farm"><Hens xmlns="urn:other">7</Hens></coop>"#)
        .unwrap();

    assert_eq!(coop.hens, 0);
}

#[test]
fn custom_serializer_and_hooks_run() {
    init_logger();
    let mapper = XmlMapper::new();
    let pasture = Pasture {
        fenced: true,
        grazed: false,
        loaded: false,
    };
    let before = WRITES.load(Ordering::SeqCst);

    let xml = mapper.to_string(&pasture).unwrap();
    assert_eq!(xml, r#"<Pasture Fenced="yes"><Grazed>no</Grazed></Pasture>"#);
    assert_eq!(WRITES.load(Ordering::SeqCst), before + 1);

    let decoded = mapper.from_str::<Pasture>(&xml).unwrap();
    assert!(decoded.fenced);
    assert!(!decoded.grazed);
    assert!(decoded.loaded);
}

#[test]
fn custom_serializer_must_support_the_member_type() {
    let mapper = XmlMapper::new();

    let result = mapper.serializer_for::<Mismatched>();

    assert!(matches!(result, Err(XmlError::Configuration { .. })));
}

#[test]
fn options_load_from_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "conditions": {{ "mode": "compact" }} }}"#).unwrap();
    let options = SerializerOptions::from_path(file.path()).unwrap();
    let mapper = XmlMapper::builder().options(options).build();

    let xml = mapper.to_string(&shed()).unwrap();

    assert!(xml.starts_with(r#"<compact-shed Size="12">"#));
}
