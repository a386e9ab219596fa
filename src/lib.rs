#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # XML Mapper for Rust

 An object ↔ XML mapping engine. A type declares its mapping once, as an
 explicit schema, and the engine encodes object graphs to XML and decodes
 them back without hand-written marshalling code.

 ## Core Concepts

- **XmlType:** A type taking part in the mapping. Its `shape()` describes how it is mapped: as text, enum, date/time, sequence, map, trait object or complex object.
- **ComplexSchema / Member:** Builders of the schema of a struct: its members, their accessors and their tags (attribute, element, text, CDATA, value node, item types, custom serializer...).
- **Tag:** One declarative setting of a member or type, optionally guarded by a condition on the options.
- **TypeSerializerRegistry:** Builds and memoizes one serializer per type, member and options. Self-referencing types are supported.
- **XmlMapper:** Front end encoding values to documents and decoding them back.

 ## Features

| **Feature** | **Description**                                                        |
|-------------|------------------------------------------------------------------------|
| chrono      | Date/time mapping for `chrono` types (enabled by default)              |

 ## Getting Started

```rust
use xml_mapper::XmlMapper;
use xml_mapper::core::{ComplexSchema, Member, TypeShape, XmlType};

#[derive(Default, Debug, PartialEq)]
struct Farm {
    name: String,
    pigs: Vec<Pig>,
}

#[derive(Default, Debug, PartialEq)]
struct Pig {
    name: String,
}

impl XmlType for Farm {
    fn shape() -> TypeShape {
        ComplexSchema::<Farm>::new()
            .root("farm")
            .member(Member::new("Name", |f: &Farm| &f.name, |f: &mut Farm, v| f.name = v).attribute())
            .member(Member::new("Pigs", |f: &Farm| &f.pigs, |f: &mut Farm, v| f.pigs = v).element().item::<Pig>("pig"))
            .build()
    }
}

impl XmlType for Pig {
    fn shape() -> TypeShape {
        ComplexSchema::<Pig>::new()
            .member(Member::new("Name", |p: &Pig| &p.name, |p: &mut Pig, v| p.name = v).attribute())
            .build()
    }
}

let farm = Farm {
    name: "Tumbleweed".to_string(),
    pigs: vec![Pig { name: "Babe".to_string() }],
};

let mapper = XmlMapper::new();
let xml = mapper.to_string(&farm).unwrap();
assert_eq!(xml, r#"<farm Name="Tumbleweed"><Pigs><pig Name="Babe"/></Pigs></farm>"#);
assert_eq!(mapper.from_str::<Farm>(&xml).unwrap(), farm);
```

 ## License
 Licensed under either of Apache License, Version 2.0 or MIT license at your option.
 */

pub mod core;

pub mod error;

pub use error::*;

pub mod mapper;

pub use mapper::{XmlMapper, XmlMapperBuilder};

pub mod serializer;

pub mod types;

pub mod xml;
