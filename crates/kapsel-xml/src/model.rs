#![forbid(unsafe_code)]

//! Typed XML vocabulary elements.
//!
//! Every xenc/ds type implements [`XmlElement`]: it knows its qualified name,
//! how to read itself from an [`Element`] (checking name and child
//! cardinality) and how to write itself back.

use crate::element::Element;
use kapsel_core::{Error, Result};

/// A typed element of a fixed XML vocabulary.
pub trait XmlElement: Sized {
    const NAMESPACE: &'static str;
    const LOCAL_NAME: &'static str;
    const PREFIX: &'static str;

    /// Build the typed value from a generic element.
    fn from_xml(element: &Element) -> Result<Self>;

    /// Serialize into a fresh, detached element.
    fn to_element(&self) -> Element;

    /// Serialize, append to `parent`, and return the appended element.
    fn to_xml<'p>(&self, parent: &'p mut Element) -> &'p mut Element {
        parent.append_child(self.to_element())
    }

    /// An empty element carrying this type's qualified name.
    fn new_element() -> Element {
        Element::new_ns(Self::NAMESPACE, Some(Self::PREFIX), Self::LOCAL_NAME)
    }

    /// Parse markup whose document element is this type.
    fn parse(xml: &str) -> Result<Self> {
        Self::from_xml(&Element::parse(xml)?)
    }

    /// Fail with `InvalidElement` unless `element` has this type's name.
    fn check_name(element: &Element) -> Result<()> {
        if element.is(Self::NAMESPACE, Self::LOCAL_NAME) {
            Ok(())
        } else {
            Err(Error::InvalidElement(format!(
                "expected {{{}}}{}, found {{{}}}{}",
                Self::NAMESPACE,
                Self::LOCAL_NAME,
                element.namespace().unwrap_or(""),
                element.local_name()
            )))
        }
    }

    /// The canonical serialization that equality is defined over.
    fn canonical_bytes(&self) -> Vec<u8> {
        self.to_element().to_xml_string().into_bytes()
    }
}

/// Implement `PartialEq`/`Eq` through the canonical serialization.
#[macro_export]
macro_rules! impl_canonical_eq {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    $crate::XmlElement::canonical_bytes(self)
                        == $crate::XmlElement::canonical_bytes(other)
                }
            }
            impl Eq for $ty {}
        )+
    };
}

// ── Cardinality helpers ──────────────────────────────────────────────

/// The single child `{namespace}local_name`; zero or several is an error.
pub fn exactly_one<'a>(parent: &'a Element, namespace: &str, local_name: &str) -> Result<&'a Element> {
    let mut iter = parent.children_named(namespace, local_name);
    let first = iter
        .next()
        .ok_or_else(|| Error::MissingElement(format!("{local_name} in {}", parent.local_name())))?;
    if iter.next().is_some() {
        return Err(Error::TooManyElements(format!(
            "{local_name} in {}",
            parent.local_name()
        )));
    }
    Ok(first)
}

/// The optional child `{namespace}local_name`; several is an error.
pub fn at_most_one<'a>(
    parent: &'a Element,
    namespace: &str,
    local_name: &str,
) -> Result<Option<&'a Element>> {
    let mut iter = parent.children_named(namespace, local_name);
    let first = iter.next();
    if iter.next().is_some() {
        return Err(Error::TooManyElements(format!(
            "{local_name} in {}",
            parent.local_name()
        )));
    }
    Ok(first)
}

/// All `{namespace}local_name` children; none is an error.
pub fn one_or_more<'a>(
    parent: &'a Element,
    namespace: &str,
    local_name: &str,
) -> Result<Vec<&'a Element>> {
    let found: Vec<&Element> = parent.children_named(namespace, local_name).collect();
    if found.is_empty() {
        return Err(Error::MissingElement(format!(
            "{local_name} in {}",
            parent.local_name()
        )));
    }
    Ok(found)
}

/// A required unqualified attribute.
pub fn required_attribute<'a>(element: &'a Element, name: &str) -> Result<&'a str> {
    element
        .attribute(name)
        .ok_or_else(|| Error::MissingAttribute(format!("{name} on {}", element.local_name())))
}
