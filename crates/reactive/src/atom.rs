//! Value cells.
//!
//! An `Atom` caches the last observed value at exactly one property path.
//! Its reference count tracks how many live accessors use the path; the
//! owning cache evicts the atom when the count drops to zero.

use alloc::rc::Rc;
use strata_jsonb::JsonbValue;

/// Cached value at one property path.
///
/// `None` means the path did not resolve in the state tree when last read.
#[derive(Clone, Debug, Default)]
pub struct Atom {
    value: Option<Rc<JsonbValue>>,
    ref_count: usize,
}

impl Atom {
    /// Creates an atom holding `value` with no references yet.
    pub fn new(value: Option<Rc<JsonbValue>>) -> Self {
        Self {
            value,
            ref_count: 0,
        }
    }

    /// Returns the cached value.
    #[inline]
    pub fn value(&self) -> Option<&Rc<JsonbValue>> {
        self.value.as_ref()
    }

    /// Overwrites the cached value unconditionally.
    #[inline]
    pub fn set_value(&mut self, value: Option<Rc<JsonbValue>>) {
        self.value = value;
    }

    /// Returns the number of accessors holding this atom.
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    /// Registers one more accessor and returns the new count.
    #[inline]
    pub fn retain(&mut self) -> usize {
        self.ref_count += 1;
        self.ref_count
    }

    /// Releases one accessor and returns the remaining count.
    #[inline]
    pub fn release(&mut self) -> usize {
        self.ref_count = self.ref_count.saturating_sub(1);
        self.ref_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_new() {
        let atom = Atom::new(Some(Rc::new(JsonbValue::Number(1.0))));
        assert_eq!(atom.ref_count(), 0);
        assert_eq!(atom.value().map(|v| v.as_ref()), Some(&JsonbValue::Number(1.0)));
    }

    #[test]
    fn test_atom_set_value_overwrites() {
        let mut atom = Atom::new(None);
        assert!(atom.value().is_none());

        let shared = Rc::new(JsonbValue::Bool(true));
        atom.set_value(Some(shared.clone()));
        assert!(Rc::ptr_eq(atom.value().unwrap(), &shared));

        // no dirty-check: an equal value still replaces the instance
        let equal = Rc::new(JsonbValue::Bool(true));
        atom.set_value(Some(equal.clone()));
        assert!(Rc::ptr_eq(atom.value().unwrap(), &equal));
    }

    #[test]
    fn test_atom_retain_release() {
        let mut atom = Atom::default();
        assert_eq!(atom.retain(), 1);
        assert_eq!(atom.retain(), 2);
        assert_eq!(atom.release(), 1);
        assert_eq!(atom.release(), 0);
        assert_eq!(atom.release(), 0);
    }
}
