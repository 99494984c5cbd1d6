#![forbid(unsafe_code)]

//! The ds:Reference vocabulary.
//!
//! ```text
//! Reference { Id?, URI?, Type? }
//!   Transforms?     (at most one)
//!     Transform { Algorithm }+
//!       ds:XPath?               only for the XPath filter
//!       ec:InclusiveNamespaces? only for exclusive C14N
//!   DigestMethod { Algorithm }  (exactly one)
//!   DigestValue                 (exactly one, base64)
//! ```

use base64::Engine;
use kapsel_c14n::C14nMode;
use kapsel_core::{algorithm, ns, Error, Result};
use kapsel_transforms::TransformParams;
use kapsel_xml::model::{at_most_one, exactly_one, one_or_more, required_attribute};
use kapsel_xml::{impl_canonical_eq, Element, XmlElement};

fn base64_engine() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

// ── DigestMethod / DigestValue ───────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DigestMethod {
    pub algorithm: String,
}

impl DigestMethod {
    pub fn new(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_owned(),
        }
    }
}

impl XmlElement for DigestMethod {
    const NAMESPACE: &'static str = ns::DSIG;
    const LOCAL_NAME: &'static str = ns::node::DIGEST_METHOD;
    const PREFIX: &'static str = ns::prefix::DSIG;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        Ok(Self::new(required_attribute(element, ns::attr::ALGORITHM)?))
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        element.set_attribute(ns::attr::ALGORITHM, &self.algorithm);
        element
    }
}

/// The decoded bytes of `ds:DigestValue`.
#[derive(Debug, Clone)]
pub struct DigestValue(pub Vec<u8>);

impl XmlElement for DigestValue {
    const NAMESPACE: &'static str = ns::DSIG;
    const LOCAL_NAME: &'static str = ns::node::DIGEST_VALUE;
    const PREFIX: &'static str = ns::prefix::DSIG;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        let clean: String = element.text().chars().filter(|c| !c.is_whitespace()).collect();
        base64_engine()
            .decode(clean)
            .map(DigestValue)
            .map_err(|e| Error::Base64(format!("DigestValue: {e}")))
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        element.append_text(&base64_engine().encode(&self.0));
        element
    }
}

// ── Transform parameters ─────────────────────────────────────────────

/// `ds:XPath` with the prefixes in scope where it appears.
#[derive(Debug, Clone)]
pub struct XPath {
    pub expression: String,
    pub namespaces: Vec<(String, String)>,
}

impl XmlElement for XPath {
    const NAMESPACE: &'static str = ns::DSIG;
    const LOCAL_NAME: &'static str = ns::node::XPATH;
    const PREFIX: &'static str = ns::prefix::DSIG;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        let namespaces = element
            .namespace_declarations()
            .iter()
            .filter_map(|(prefix, uri)| prefix.as_ref().map(|p| (p.clone(), uri.clone())))
            .collect();
        Ok(Self {
            expression: element.text().trim().to_owned(),
            namespaces,
        })
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        for (prefix, uri) in &self.namespaces {
            element.declare_namespace(Some(prefix), uri);
        }
        element.append_text(&self.expression);
        element
    }
}

/// `ec:InclusiveNamespaces`.
#[derive(Debug, Clone)]
pub struct InclusiveNamespaces {
    pub prefix_list: Vec<String>,
}

impl XmlElement for InclusiveNamespaces {
    const NAMESPACE: &'static str = ns::EXC_C14N;
    const LOCAL_NAME: &'static str = ns::node::INCLUSIVE_NAMESPACES;
    const PREFIX: &'static str = ns::prefix::EXC_C14N;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        let prefix_list = element
            .attribute_or(ns::attr::PREFIX_LIST, "")
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        Ok(Self { prefix_list })
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        element.set_attribute(ns::attr::PREFIX_LIST, &self.prefix_list.join(" "));
        element
    }
}

// ── Transform / Transforms ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Transform {
    pub algorithm: String,
    pub xpath: Option<XPath>,
    pub inclusive_namespaces: Option<InclusiveNamespaces>,
}

impl Transform {
    pub fn new(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_owned(),
            xpath: None,
            inclusive_namespaces: None,
        }
    }

    pub fn xpath(expression: &str, namespaces: Vec<(String, String)>) -> Self {
        Self {
            xpath: Some(XPath {
                expression: expression.to_owned(),
                namespaces,
            }),
            ..Self::new(algorithm::XPATH)
        }
    }

    pub fn exclusive_c14n(algorithm: &str, prefix_list: Vec<String>) -> Self {
        Self {
            inclusive_namespaces: Some(InclusiveNamespaces { prefix_list }),
            ..Self::new(algorithm)
        }
    }

    /// The parameters handed to the transform registry.
    pub fn params(&self) -> TransformParams {
        if let Some(xpath) = &self.xpath {
            TransformParams::XPath {
                expression: xpath.expression.clone(),
                namespaces: xpath.namespaces.clone(),
            }
        } else if let Some(inclusive) = &self.inclusive_namespaces {
            TransformParams::InclusiveNamespaces(inclusive.prefix_list.clone())
        } else {
            TransformParams::None
        }
    }
}

impl XmlElement for Transform {
    const NAMESPACE: &'static str = ns::DSIG;
    const LOCAL_NAME: &'static str = ns::node::TRANSFORM;
    const PREFIX: &'static str = ns::prefix::DSIG;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        let algorithm = required_attribute(element, ns::attr::ALGORITHM)?.to_owned();

        let xpath = at_most_one(element, ns::DSIG, ns::node::XPATH)?
            .map(XPath::from_xml)
            .transpose()?;
        let is_xpath = algorithm == algorithm::XPATH;
        if xpath.is_some() && !is_xpath {
            return Err(Error::InvalidElement(format!(
                "XPath is only allowed in the XPath transform, not {algorithm}"
            )));
        }
        if xpath.is_none() && is_xpath {
            return Err(Error::MissingElement("XPath in XPath Transform".into()));
        }

        let inclusive_namespaces =
            at_most_one(element, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)?
                .map(InclusiveNamespaces::from_xml)
                .transpose()?;
        let is_exclusive = C14nMode::from_uri(&algorithm).is_some_and(|m| m.is_exclusive());
        if inclusive_namespaces.is_some() && !is_exclusive {
            return Err(Error::InvalidElement(format!(
                "InclusiveNamespaces requires exclusive canonicalization, not {algorithm}"
            )));
        }

        Ok(Self {
            algorithm,
            xpath,
            inclusive_namespaces,
        })
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        element.set_attribute(ns::attr::ALGORITHM, &self.algorithm);
        if let Some(xpath) = &self.xpath {
            xpath.to_xml(&mut element);
        }
        if let Some(inclusive) = &self.inclusive_namespaces {
            inclusive.to_xml(&mut element);
        }
        element
    }
}

/// `ds:Transforms`: a non-empty ordered chain.
#[derive(Debug, Clone)]
pub struct Transforms(pub Vec<Transform>);

impl XmlElement for Transforms {
    const NAMESPACE: &'static str = ns::DSIG;
    const LOCAL_NAME: &'static str = ns::node::TRANSFORMS;
    const PREFIX: &'static str = ns::prefix::DSIG;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        one_or_more(element, ns::DSIG, ns::node::TRANSFORM)?
            .into_iter()
            .map(Transform::from_xml)
            .collect::<Result<Vec<_>>>()
            .map(Transforms)
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        for transform in &self.0 {
            transform.to_xml(&mut element);
        }
        element
    }
}

// ── Reference ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Reference {
    pub id: Option<String>,
    pub type_: Option<String>,
    /// Absent and empty both select the whole document.
    pub uri: Option<String>,
    pub transforms: Option<Transforms>,
    pub digest_method: DigestMethod,
    pub digest_value: DigestValue,
}

impl Reference {
    pub fn uri(&self) -> &str {
        self.uri.as_deref().unwrap_or("")
    }

    pub fn transform_chain(&self) -> &[Transform] {
        match &self.transforms {
            Some(t) => &t.0,
            None => &[],
        }
    }
}

impl XmlElement for Reference {
    const NAMESPACE: &'static str = ns::DSIG;
    const LOCAL_NAME: &'static str = ns::node::REFERENCE;
    const PREFIX: &'static str = ns::prefix::DSIG;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        let transforms = at_most_one(element, ns::DSIG, ns::node::TRANSFORMS)?
            .map(Transforms::from_xml)
            .transpose()?;
        let digest_method =
            DigestMethod::from_xml(exactly_one(element, ns::DSIG, ns::node::DIGEST_METHOD)?)?;
        let digest_value =
            DigestValue::from_xml(exactly_one(element, ns::DSIG, ns::node::DIGEST_VALUE)?)?;
        Ok(Self {
            id: element.attribute(ns::attr::ID).map(str::to_owned),
            type_: element.attribute(ns::attr::TYPE).map(str::to_owned),
            uri: element.attribute(ns::attr::URI).map(str::to_owned),
            transforms,
            digest_method,
            digest_value,
        })
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        for (name, value) in [
            (ns::attr::ID, &self.id),
            (ns::attr::URI, &self.uri),
            (ns::attr::TYPE, &self.type_),
        ] {
            if let Some(value) = value {
                element.set_attribute(name, value);
            }
        }
        if let Some(transforms) = &self.transforms {
            transforms.to_xml(&mut element);
        }
        self.digest_method.to_xml(&mut element);
        self.digest_value.to_xml(&mut element);
        element
    }
}

impl_canonical_eq!(
    DigestMethod,
    DigestValue,
    XPath,
    InclusiveNamespaces,
    Transform,
    Transforms,
    Reference
);
