#![forbid(unsafe_code)]

//! Class specifications and their normalization into atomic class names.
//!
//! A binding may hand a class observer a string, a list of nested
//! specifications, or a map of class name to boolean. [`ClassValue`] is the
//! tagged union over those shapes; [`ClassValue::normalize`] flattens any of
//! them into the ordered list of names to apply.
//!
//! # Change detection
//!
//! Observers compare values with [`ClassValue::same_as`], which is an
//! identity check: text compares by content, sequences and flag maps by
//! allocation. Two separately built sequences with equal contents are
//! always "changed". Cloning a value keeps its identity.

use std::fmt;
use std::rc::Rc;

/// A class specification bound to an element's `class` attribute.
#[derive(Clone)]
pub enum ClassValue {
    /// Whitespace separated class names.
    Text(Rc<str>),
    /// Nested specifications, normalized in order and concatenated.
    Sequence(Rc<[ClassValue]>),
    /// Class names keyed to a toggle; only `true` entries apply.
    Flags(Rc<[(String, bool)]>),
    /// A value with no class names (null, undefined, numbers...).
    Empty,
}

impl ClassValue {
    /// Text specification.
    #[must_use]
    pub fn text(text: impl AsRef<str>) -> Self {
        Self::Text(Rc::from(text.as_ref()))
    }

    /// Sequence specification from any iterator of values.
    #[must_use]
    pub fn sequence(items: impl IntoIterator<Item = ClassValue>) -> Self {
        Self::Sequence(items.into_iter().collect())
    }

    /// Flag-map specification; entry order is preserved.
    #[must_use]
    pub fn flags<K: Into<String>>(entries: impl IntoIterator<Item = (K, bool)>) -> Self {
        Self::Flags(
            entries
                .into_iter()
                .map(|(name, on)| (name.into(), on))
                .collect(),
        )
    }

    /// Identity comparison used for change detection.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => Rc::ptr_eq(a, b),
            (Self::Flags(a), Self::Flags(b)) => Rc::ptr_eq(a, b),
            (Self::Empty, Self::Empty) => true,
            _ => false,
        }
    }

    /// Flatten into atomic class names, in order. Duplicates are kept.
    #[must_use]
    pub fn normalize(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Self::Text(text) => out.extend(text.split_whitespace().map(str::to_owned)),
            Self::Sequence(items) => {
                for item in items.iter() {
                    item.collect_names(out);
                }
            }
            Self::Flags(entries) => {
                for (name, _) in entries.iter().filter(|(_, on)| *on) {
                    out.extend(name.split_whitespace().map(str::to_owned));
                }
            }
            Self::Empty => {}
        }
    }
}

impl Default for ClassValue {
    /// The empty string, which is also every observer's initial value.
    fn default() -> Self {
        Self::text("")
    }
}

impl fmt::Debug for ClassValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(&&**text).finish(),
            Self::Sequence(items) => f.debug_tuple("Sequence").field(&&**items).finish(),
            Self::Flags(entries) => f.debug_tuple("Flags").field(&&**entries).finish(),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl From<&str> for ClassValue {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for ClassValue {
    fn from(text: String) -> Self {
        Self::Text(Rc::from(text))
    }
}

impl From<Vec<ClassValue>> for ClassValue {
    fn from(items: Vec<ClassValue>) -> Self {
        Self::Sequence(Rc::from(items))
    }
}

impl<T: Into<ClassValue>> From<Option<T>> for ClassValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(value: &ClassValue) -> Vec<String> {
        value.normalize()
    }

    #[test]
    fn text_splits_on_whitespace_runs() {
        assert_eq!(names(&"foo bar".into()), ["foo", "bar"]);
        assert_eq!(names(&"  foo\t\nbar  ".into()), ["foo", "bar"]);
        assert!(names(&"   ".into()).is_empty());
        assert!(names(&ClassValue::default()).is_empty());
    }

    #[test]
    fn sequence_concatenates_recursively() {
        let value = ClassValue::sequence([
            ClassValue::from("foo"),
            ClassValue::from("bar baz"),
            ClassValue::sequence([ClassValue::Empty, ClassValue::from("qux")]),
        ]);
        assert_eq!(names(&value), ["foo", "bar", "baz", "qux"]);
        assert!(names(&ClassValue::sequence([])).is_empty());
    }

    #[test]
    fn flags_keep_truthy_keys_and_resplit() {
        let value = ClassValue::flags([("foo", true), ("bar baz", true), ("qux", false)]);
        assert_eq!(names(&value), ["foo", "bar", "baz"]);
    }

    #[test]
    fn empty_and_none_yield_nothing() {
        assert!(ClassValue::Empty.normalize().is_empty());
        assert!(ClassValue::from(None::<&str>).normalize().is_empty());
        assert_eq!(ClassValue::from(Some("a")).normalize(), ["a"]);
    }

    #[test]
    fn same_as_is_identity_for_composites() {
        let a = ClassValue::sequence([ClassValue::from("x")]);
        let b = ClassValue::sequence([ClassValue::from("x")]);
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));

        let f = ClassValue::flags([("x", true)]);
        assert!(f.same_as(&f.clone()));
        assert!(!f.same_as(&ClassValue::flags([("x", true)])));
    }

    #[test]
    fn same_as_compares_text_by_content() {
        assert!(ClassValue::text("a b").same_as(&ClassValue::from(String::from("a b"))));
        assert!(!ClassValue::text("a b").same_as(&ClassValue::text("a  b")));
        assert!(!ClassValue::text("").same_as(&ClassValue::Empty));
        assert!(ClassValue::Empty.same_as(&ClassValue::Empty));
    }
}
