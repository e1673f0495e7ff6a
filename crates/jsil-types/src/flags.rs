//! Base-type flag sets.
//!
//! A `TypeFlags` value is a set of primitive atoms. The lattice uses two such
//! sets per type: the *definite* set (capabilities a value certainly has, all
//! at once) and the *possible* set (the union of atoms the value may turn out
//! to be). See `types::Type` for how the two sets combine.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// The primitive atoms of the type lattice.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        const UNDEFINED = 1 << 0;
        const NULL = 1 << 1;
        const BOOLEAN = 1 << 2;
        const STRING = 1 << 3;
        const INTEGER = 1 << 4;
        const FLOAT = 1 << 5;
        const BIGINT = 1 << 6;
        const REGEXP = 1 << 7;
        const ITERABLE = 1 << 8;
        const FUNCTION = 1 << 9;
        const CONSTRUCTOR = 1 << 10;
        const OBJECT = 1 << 11;

        // Wasm value and bookkeeping atoms
        const WASM_I32 = 1 << 12;
        const WASM_I64 = 1 << 13;
        const WASM_F32 = 1 << 14;
        const WASM_F64 = 1 << 15;
        const WASM_SIMD128 = 1 << 16;
        const WASM_REF = 1 << 17;
        const WASM_LABEL = 1 << 18;
        const WASM_EXCEPTION_LABEL = 1 << 19;
        const WASM_EXNREF = 1 << 20;

        // Composites
        const NUMBER = Self::INTEGER.bits() | Self::FLOAT.bits();
        const PRIMITIVE = Self::NUMBER.bits()
            | Self::BIGINT.bits()
            | Self::STRING.bits()
            | Self::BOOLEAN.bits()
            | Self::UNDEFINED.bits()
            | Self::NULL.bits();
        const WASM_NUMERICAL = Self::WASM_I32.bits()
            | Self::WASM_I64.bits()
            | Self::WASM_F32.bits()
            | Self::WASM_F64.bits();
    }
}

impl TypeFlags {
    /// Number of atoms in the set.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.bits().count_ones()
    }

    /// Name of a single-atom set, used by the type formatter.
    pub(crate) fn atom_name(self) -> &'static str {
        const NAMES: &[(TypeFlags, &str)] = &[
            (TypeFlags::UNDEFINED, "undefined"),
            (TypeFlags::NULL, "null"),
            (TypeFlags::BOOLEAN, "boolean"),
            (TypeFlags::STRING, "string"),
            (TypeFlags::INTEGER, "integer"),
            (TypeFlags::FLOAT, "float"),
            (TypeFlags::BIGINT, "bigint"),
            (TypeFlags::REGEXP, "regexp"),
            (TypeFlags::ITERABLE, "iterable"),
            (TypeFlags::FUNCTION, "function"),
            (TypeFlags::CONSTRUCTOR, "constructor"),
            (TypeFlags::OBJECT, "object"),
            (TypeFlags::WASM_I32, "i32"),
            (TypeFlags::WASM_I64, "i64"),
            (TypeFlags::WASM_F32, "f32"),
            (TypeFlags::WASM_F64, "f64"),
            (TypeFlags::WASM_SIMD128, "simd128"),
            (TypeFlags::WASM_REF, "ref"),
            (TypeFlags::WASM_LABEL, "label"),
            (TypeFlags::WASM_EXCEPTION_LABEL, "exceptionLabel"),
            (TypeFlags::WASM_EXNREF, "exnref"),
        ];
        NAMES
            .iter()
            .find(|(flag, _)| self == *flag)
            .map_or("?", |(_, name)| name)
    }
}

impl fmt::Display for TypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for atom in self.iter() {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{}", atom.atom_name())?;
            first = false;
        }
        if first {
            write!(f, "∅")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composites_cover_their_atoms() {
        assert!(TypeFlags::NUMBER.contains(TypeFlags::INTEGER));
        assert!(TypeFlags::NUMBER.contains(TypeFlags::FLOAT));
        assert!(TypeFlags::PRIMITIVE.contains(TypeFlags::NUMBER));
        assert!(TypeFlags::PRIMITIVE.contains(TypeFlags::BIGINT));
        assert!(TypeFlags::PRIMITIVE.contains(TypeFlags::NULL));
        assert!(!TypeFlags::PRIMITIVE.contains(TypeFlags::OBJECT));
    }

    #[test]
    fn test_all_contains_wasm_atoms() {
        assert!(TypeFlags::all().contains(TypeFlags::WASM_SIMD128));
        assert!(TypeFlags::all().contains(TypeFlags::WASM_EXNREF));
    }
}
