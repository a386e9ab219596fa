use std::collections::BTreeMap;
use std::fmt;

use xml_mapper::core::{
    AsAny, ComplexSchema, Member, PolymorphicShape, TypeShape, XmlType,
};

pub trait Animal: AsAny + fmt::Debug {
    fn name(&self) -> &str;
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Pig {
    pub name: String,
    pub weight: u32,
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Cow {
    pub name: String,
    pub milk: f64,
}

/// Known to the animal hierarchy but never declared as an item type.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Goat {
    pub name: String,
}

impl Animal for Pig {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Animal for Cow {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Animal for Goat {
    fn name(&self) -> &str {
        &self.name
    }
}

impl XmlType for Pig {
    fn shape() -> TypeShape {
        ComplexSchema::<Pig>::new()
            .member(Member::new("Name", |p: &Pig| &p.name, |p: &mut Pig, v| p.name = v).attribute())
            .member(
                Member::new("Weight", |p: &Pig| &p.weight, |p: &mut Pig, v| p.weight = v)
                    .attribute(),
            )
            .build()
    }
}

impl XmlType for Cow {
    fn shape() -> TypeShape {
        ComplexSchema::<Cow>::new()
            .member(Member::new("Name", |c: &Cow| &c.name, |c: &mut Cow, v| c.name = v).attribute())
            .member(Member::new("Milk", |c: &Cow| &c.milk, |c: &mut Cow, v| c.milk = v).element())
            .build()
    }
}

impl XmlType for Goat {
    fn shape() -> TypeShape {
        ComplexSchema::<Goat>::new()
            .member(Member::new("Name", |g: &Goat| &g.name, |g: &mut Goat, v| g.name = v).attribute())
            .build()
    }
}

impl XmlType for Box<dyn Animal> {
    fn shape() -> TypeShape {
        TypeShape::Polymorphic(
            PolymorphicShape::boxed::<dyn Animal>()
                .variant_aliased("pig", |p: Pig| Box::new(p) as Box<dyn Animal>)
                .variant_aliased("cow", |c: Cow| Box::new(c) as Box<dyn Animal>)
                .variant_aliased("goat", |g: Goat| Box::new(g) as Box<dyn Animal>),
        )
    }
}

pub fn as_pig(animal: &dyn Animal) -> Option<&Pig> {
    animal.as_any().downcast_ref::<Pig>()
}

pub fn as_cow(animal: &dyn Animal) -> Option<&Cow> {
    animal.as_any().downcast_ref::<Cow>()
}

pub fn as_goat(animal: &dyn Animal) -> Option<&Goat> {
    animal.as_any().downcast_ref::<Goat>()
}

#[derive(Default, Debug)]
pub struct Farm {
    pub name: String,
    pub animals: Vec<Box<dyn Animal>>,
    pub stock: BTreeMap<String, u32>,
    pub weights: Box<[u32]>,
}

impl XmlType for Farm {
    fn shape() -> TypeShape {
        ComplexSchema::<Farm>::new()
            .root("farm")
            .member(Member::new("Name", |f: &Farm| &f.name, |f: &mut Farm, v| f.name = v).attribute())
            .member(
                Member::new("Animals", |f: &Farm| &f.animals, |f: &mut Farm, v| f.animals = v)
                    .element()
                    .item::<Pig>("pig")
                    .item::<Cow>("cow"),
            )
            .member(Member::new("Stock", |f: &Farm| &f.stock, |f: &mut Farm, v| f.stock = v).element())
            .member(
                Member::new("Weights", |f: &Farm| &f.weights, |f: &mut Farm, v| f.weights = v)
                    .element(),
            )
            .build()
    }
}

pub fn tumbleweed() -> Farm {
    let mut stock = BTreeMap::new();
    stock.insert("hay".to_string(), 40);
    stock.insert("corn".to_string(), 12);
    Farm {
        name: "Tumbleweed".to_string(),
        animals: vec![
            Box::new(Pig {
                name: "Babe".to_string(),
                weight: 120,
            }),
            Box::new(Cow {
                name: "Daisy".to_string(),
                milk: 21.5,
            }),
        ],
        stock,
        weights: vec![1, 2, 3].into_boxed_slice(),
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Barn {
    pub name: String,
}

impl XmlType for Barn {
    fn shape() -> TypeShape {
        ComplexSchema::<Barn>::new()
            .member(Member::new("Name", |b: &Barn| &b.name, |b: &mut Barn, v| b.name = v).element())
            .build()
    }
}

/// A single slot of the animal hierarchy, resolved without declared items.
#[derive(Default, Debug)]
pub struct Stall {
    pub number: u8,
    pub occupant: Option<Box<dyn Animal>>,
}

impl XmlType for Stall {
    fn shape() -> TypeShape {
        ComplexSchema::<Stall>::new()
            .member(
                Member::new("Number", |s: &Stall| &s.number, |s: &mut Stall, v| s.number = v)
                    .attribute(),
            )
            .member(
                Member::new("Occupant", |s: &Stall| &s.occupant, |s: &mut Stall, v| s.occupant = v)
                    .element(),
            )
            .build()
    }
}

/// Self-referencing chain of nodes.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Link {
    pub value: u32,
    pub next: Option<Box<Link>>,
}

impl XmlType for Link {
    fn shape() -> TypeShape {
        ComplexSchema::<Link>::new()
            .member(Member::new("Value", |l: &Link| &l.value, |l: &mut Link, v| l.value = v).attribute())
            .member(Member::new("Next", |l: &Link| &l.next, |l: &mut Link, v| l.next = v).element())
            .build()
    }
}
