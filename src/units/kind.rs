//! The closed set of base unit kinds and their SI decompositions.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Ampere,
    Avogadro,
    Becquerel,
    Candela,
    Celsius,
    Coulomb,
    Dimensionless,
    Farad,
    Gram,
    Gray,
    Henry,
    Hertz,
    Item,
    Joule,
    Katal,
    Kelvin,
    Kilogram,
    Litre,
    Lumen,
    Lux,
    Metre,
    Mole,
    Newton,
    Ohm,
    Pascal,
    Radian,
    Second,
    Siemens,
    Sievert,
    Steradian,
    Tesla,
    Volt,
    Watt,
    Weber,
}

use UnitKind::*;

const ALL: [UnitKind; 34] = [
    Ampere, Avogadro, Becquerel, Candela, Celsius, Coulomb, Dimensionless, Farad, Gram, Gray, Henry, Hertz, Item,
    Joule, Katal, Kelvin, Kilogram, Litre, Lumen, Lux, Metre, Mole, Newton, Ohm, Pascal, Radian, Second, Siemens,
    Sievert, Steradian, Tesla, Volt, Watt, Weber,
];

impl UnitKind {
    pub fn name(&self) -> &'static str {
        match self {
            Ampere => "ampere",
            Avogadro => "avogadro",
            Becquerel => "becquerel",
            Candela => "candela",
            Celsius => "celsius",
            Coulomb => "coulomb",
            Dimensionless => "dimensionless",
            Farad => "farad",
            Gram => "gram",
            Gray => "gray",
            Henry => "henry",
            Hertz => "hertz",
            Item => "item",
            Joule => "joule",
            Katal => "katal",
            Kelvin => "kelvin",
            Kilogram => "kilogram",
            Litre => "litre",
            Lumen => "lumen",
            Lux => "lux",
            Metre => "metre",
            Mole => "mole",
            Newton => "newton",
            Ohm => "ohm",
            Pascal => "pascal",
            Radian => "radian",
            Second => "second",
            Siemens => "siemens",
            Sievert => "sievert",
            Steradian => "steradian",
            Tesla => "tesla",
            Volt => "volt",
            Watt => "watt",
            Weber => "weber",
        }
    }

    /// Parses a kind name. The American spellings `meter` and `liter` are
    /// accepted here; whether the document's level allows them is a
    /// separate question answered by [`UnitKind::is_valid_name`].
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "meter" => Some(Metre),
            "liter" => Some(Litre),
            _ => ALL.iter().copied().find(|k| k.name() == name),
        }
    }

    /// Is `name` a legal base unit kind at this level and version?
    pub fn is_valid_name(name: &str, level: u32, version: u32) -> bool {
        let Some(kind) = Self::parse(name) else {
            return false;
        };
        match (name, kind) {
            ("meter" | "liter", _) => level == 1,
            (_, Celsius) => level == 1 || (level == 2 && version == 1),
            (_, Avogadro) => level >= 3,
            _ => true,
        }
    }

    /// The base SI decomposition used for equivalence tests. Scale and
    /// multiplier differences (gram vs kilogram) are not part of it.
    pub fn si_expansion(&self) -> &'static [(UnitKind, i32)] {
        match self {
            Ampere => &[(Ampere, 1)],
            Avogadro | Dimensionless | Radian | Steradian => &[(Dimensionless, 1)],
            Becquerel | Hertz => &[(Second, -1)],
            Candela | Lumen => &[(Candela, 1)],
            Celsius | Kelvin => &[(Kelvin, 1)],
            Coulomb => &[(Ampere, 1), (Second, 1)],
            Farad => &[(Metre, -2), (Kilogram, -1), (Second, 4), (Ampere, 2)],
            Gram | Kilogram => &[(Kilogram, 1)],
            Gray | Sievert => &[(Metre, 2), (Second, -2)],
            Henry => &[(Metre, 2), (Kilogram, 1), (Second, -2), (Ampere, -2)],
            Item => &[(Item, 1)],
            Joule => &[(Metre, 2), (Kilogram, 1), (Second, -2)],
            Katal => &[(Mole, 1), (Second, -1)],
            Litre => &[(Metre, 3)],
            Lux => &[(Candela, 1), (Metre, -2)],
            Metre => &[(Metre, 1)],
            Mole => &[(Mole, 1)],
            Newton => &[(Metre, 1), (Kilogram, 1), (Second, -2)],
            Ohm => &[(Metre, 2), (Kilogram, 1), (Second, -3), (Ampere, -2)],
            Pascal => &[(Metre, -1), (Kilogram, 1), (Second, -2)],
            Second => &[(Second, 1)],
            Siemens => &[(Metre, -2), (Kilogram, -1), (Second, 3), (Ampere, 2)],
            Tesla => &[(Kilogram, 1), (Second, -2), (Ampere, -1)],
            Volt => &[(Metre, 2), (Kilogram, 1), (Second, -3), (Ampere, -1)],
            Watt => &[(Metre, 2), (Kilogram, 1), (Second, -3)],
            Weber => &[(Metre, 2), (Kilogram, 1), (Second, -2), (Ampere, -1)],
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Names a unit definition may not take because they are base kinds.
pub fn is_reserved_unit_id(id: &str) -> bool {
    UnitKind::parse(id).is_some()
}

/// Built-in unit names of levels 1 and 2 that a document may redefine.
pub const BUILTIN_UNIT_IDS: [&str; 5] = ["substance", "volume", "area", "length", "time"];
