//! Structural attributes of object types.
//!
//! A `TypeExtension` records what is known about an object's shape: the set
//! of property and method names, an optional nominal group name, and optional
//! call/construct signatures. Extensions are shared behind `Rc`; every
//! structural operation produces a new extension.

use crate::signature::Signature;
use indexmap::IndexSet;

/// Structural attributes attached to a type's `object` (or other) atom.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeExtension {
    /// Known property names.
    pub properties: IndexSet<String>,
    /// Known method names.
    pub methods: IndexSet<String>,
    /// Nominal group name, when the shape matches a registered group.
    pub group: Option<String>,
    /// Signature when the value is callable.
    pub call_signature: Option<Signature>,
    /// Signature when the value is constructible.
    pub construct_signature: Option<Signature>,
}

impl TypeExtension {
    /// An extension carrying only a group name.
    #[must_use]
    pub fn of_group(name: impl Into<String>) -> Self {
        Self {
            group: Some(name.into()),
            ..Self::default()
        }
    }

    /// Whether this extension carries no information at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.methods.is_empty()
            && self.group.is_none()
            && self.call_signature.is_none()
            && self.construct_signature.is_none()
    }

    /// The union of two extensions: the least common structure.
    ///
    /// Property and method sets are intersected, the group name survives only
    /// when equal on both sides, and each signature survives only when equal
    /// on both sides.
    #[must_use]
    pub fn union(a: &Self, b: &Self) -> Self {
        let properties = a
            .properties
            .iter()
            .filter(|p| b.properties.contains(*p))
            .cloned()
            .collect();
        let methods = a
            .methods
            .iter()
            .filter(|m| b.methods.contains(*m))
            .cloned()
            .collect();
        let keep_if_equal = |x: &Option<Signature>, y: &Option<Signature>| {
            if x == y { x.clone() } else { None }
        };
        Self {
            properties,
            methods,
            group: if a.group == b.group { a.group.clone() } else { None },
            call_signature: keep_if_equal(&a.call_signature, &b.call_signature),
            construct_signature: keep_if_equal(&a.construct_signature, &b.construct_signature),
        }
    }

    /// The capability sum of two extensions: everything either side knows.
    ///
    /// Sets are unioned; for group and signatures the left side wins when
    /// both carry one.
    #[must_use]
    pub fn intersection(a: &Self, b: &Self) -> Self {
        let mut properties = a.properties.clone();
        properties.extend(b.properties.iter().cloned());
        let mut methods = a.methods.clone();
        methods.extend(b.methods.iter().cloned());
        Self {
            properties,
            methods,
            group: a.group.clone().or_else(|| b.group.clone()),
            call_signature: a
                .call_signature
                .clone()
                .or_else(|| b.call_signature.clone()),
            construct_signature: a
                .construct_signature
                .clone()
                .or_else(|| b.construct_signature.clone()),
        }
    }

    /// Whether `self`'s structural requirements generalize `other`'s.
    ///
    /// A more general extension requires less: its property and method sets
    /// must be subsets of the other's, and its group/signatures must either
    /// be absent or match.
    #[must_use]
    pub fn subsumes(&self, other: &Self) -> bool {
        let subset =
            |small: &IndexSet<String>, big: &IndexSet<String>| small.iter().all(|x| big.contains(x));
        let generalizes = |a: &Option<Signature>, b: &Option<Signature>| match (a, b) {
            (None, _) => true,
            (Some(x), Some(y)) => x == y,
            (Some(_), None) => false,
        };
        subset(&self.properties, &other.properties)
            && subset(&self.methods, &other.methods)
            && match (&self.group, &other.group) {
                (None, _) => true,
                (Some(g), Some(h)) => g == h,
                (Some(_), None) => false,
            }
            && generalizes(&self.call_signature, &other.call_signature)
            && generalizes(&self.construct_signature, &other.construct_signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn ext(props: &[&str], methods: &[&str], group: Option<&str>) -> TypeExtension {
        TypeExtension {
            properties: props.iter().map(|s| s.to_string()).collect(),
            methods: methods.iter().map(|s| s.to_string()).collect(),
            group: group.map(str::to_string),
            call_signature: None,
            construct_signature: None,
        }
    }

    #[test]
    fn test_union_intersects_sets() {
        let a = ext(&["x", "y"], &["m"], None);
        let b = ext(&["y", "z"], &["m", "n"], None);
        let u = TypeExtension::union(&a, &b);
        assert_eq!(u.properties.len(), 1);
        assert!(u.properties.contains("y"));
        assert_eq!(u.methods.len(), 1);
    }

    #[test]
    fn test_union_drops_mismatched_group() {
        let a = ext(&[], &[], Some("A"));
        let b = ext(&[], &[], Some("B"));
        assert_eq!(TypeExtension::union(&a, &b).group, None);
        assert_eq!(
            TypeExtension::union(&a, &a.clone()).group,
            Some("A".to_string())
        );
    }

    #[test]
    fn test_union_keeps_equal_signature_only() {
        let sig = Signature::new([], Type::INTEGER);
        let mut a = ext(&[], &[], None);
        a.call_signature = Some(sig.clone());
        let mut b = ext(&[], &[], None);
        b.call_signature = Some(sig.clone());
        assert_eq!(TypeExtension::union(&a, &b).call_signature, Some(sig));
        b.call_signature = Some(Signature::new([], Type::STRING));
        assert_eq!(TypeExtension::union(&a, &b).call_signature, None);
    }

    #[test]
    fn test_subsumption_is_subset_based() {
        let general = ext(&["x"], &[], None);
        let specific = ext(&["x", "y"], &["m"], Some("G"));
        assert!(general.subsumes(&specific));
        assert!(!specific.subsumes(&general));
    }
}
