#![forbid(unsafe_code)]

//! XPath filter transform.
//!
//! Only the expression shapes that appear in signed documents are
//! understood:
//! - `self::node()`, `true()`, `1`: keep everything
//! - `ancestor-or-self::p:Name`: keep nodes inside a `p:Name` element
//! - `not(ancestor-or-self::p:Name)`: drop nodes inside a `p:Name` element
//! - the enveloped-signature expression built on `here()`, matched exactly

use crate::pipeline::{Transform, TransformContext, TransformData};
use kapsel_core::{algorithm, ns, Error, Result};
use kapsel_xml::nodeset::is_ancestor_or_self;
use roxmltree::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    All,
    AncestorOrSelf {
        namespace: Option<String>,
        local_name: String,
        negate: bool,
    },
    Enveloped,
}

#[derive(Debug, Clone)]
pub struct XPathFilterTransform {
    filter: Filter,
}

impl XPathFilterTransform {
    /// Compile `expression`, resolving prefixes through `namespaces`
    /// (prefix, URI pairs in scope on the XPath element).
    pub fn new(expression: &str, namespaces: &[(String, String)]) -> Result<Self> {
        let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
        let filter = match compact.as_str() {
            "self::node()" | "true()" | "1" => Filter::All,
            s if s.starts_with("count(") && s.contains("here()") => {
                let prefix = enveloped_prefix(s).ok_or_else(|| {
                    Error::Transform(format!("unsupported XPath expression: {expression}"))
                })?;
                if !namespaces.iter().any(|(p, uri)| p == prefix && uri == ns::DSIG) {
                    return Err(Error::Transform(format!(
                        "XPath prefix {prefix} is not bound to the signature namespace"
                    )));
                }
                Filter::Enveloped
            }
            s => {
                let (negate, inner) = match s.strip_prefix("not(").and_then(|r| r.strip_suffix(')')) {
                    Some(inner) => (true, inner),
                    None => (false, s),
                };
                let qname = inner.strip_prefix("ancestor-or-self::").ok_or_else(|| {
                    Error::Transform(format!("unsupported XPath expression: {expression}"))
                })?;
                let (namespace, local_name) = match qname.split_once(':') {
                    Some((prefix, local)) => {
                        let uri = namespaces
                            .iter()
                            .find(|(p, _)| p == prefix)
                            .map(|(_, uri)| uri.clone())
                            .ok_or_else(|| {
                                Error::Transform(format!("unbound XPath prefix: {prefix}"))
                            })?;
                        (Some(uri), local.to_owned())
                    }
                    None => (None, qname.to_owned()),
                };
                Filter::AncestorOrSelf {
                    namespace,
                    local_name,
                    negate,
                }
            }
        };
        Ok(Self { filter })
    }

    /// Whether this filter is the `not(ancestor-or-self::ds:Signature)` form.
    pub fn is_enveloped(&self) -> bool {
        match &self.filter {
            Filter::Enveloped => true,
            Filter::AncestorOrSelf {
                namespace,
                local_name,
                negate,
            } => *negate && namespace.as_deref() == Some(ns::DSIG) && local_name == "Signature",
            Filter::All => false,
        }
    }
}

/// The prefix `P` when `compact` is exactly
/// `count(ancestor-or-self::P:Signature|here()/ancestor::P:Signature[1])>count(ancestor-or-self::P:Signature)`.
fn enveloped_prefix(compact: &str) -> Option<&str> {
    let rest = compact.strip_prefix("count(ancestor-or-self::")?;
    let (prefix, _) = rest.split_once(':')?;
    let expected = format!(
        "count(ancestor-or-self::{prefix}:Signature|here()/ancestor::{prefix}:Signature[1])>count(ancestor-or-self::{prefix}:Signature)"
    );
    (!prefix.is_empty() && compact == expected).then_some(prefix)
}

fn has_name(node: &Node<'_, '_>, namespace: Option<&str>, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace() == namespace
}

impl Transform for XPathFilterTransform {
    fn uri(&self) -> &str {
        algorithm::XPATH
    }

    fn execute(
        &self,
        input: TransformData,
        ctx: &TransformContext<'_, '_, '_>,
    ) -> Result<TransformData> {
        let mut set = input.require_node_set(self.uri())?;
        let doc = ctx.document.document();
        match &self.filter {
            Filter::All => {}
            Filter::AncestorOrSelf {
                namespace,
                local_name,
                negate,
            } => set.retain(doc, |n| {
                let inside = n
                    .ancestors()
                    .any(|a| has_name(&a, namespace.as_deref(), local_name));
                inside != *negate
            }),
            Filter::Enveloped => {
                let signature = ctx.document.signature().ok_or_else(|| {
                    Error::Transform("here() used outside a signature".into())
                })?;
                set.retain(doc, |n| !is_ancestor_or_self(signature, n));
            }
        }
        Ok(TransformData::NodeSet(set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kapsel_c14n::DefaultCanonicalizer;
    use kapsel_xml::{DocumentContext, NodeSet};

    const XML: &str = r#"<doc xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><keep>k</keep><ds:Signature><ds:x/></ds:Signature></doc>"#;

    fn run(expression: &str) -> Vec<u8> {
        let doc = kapsel_xml::parse_document(XML).unwrap();
        let document = DocumentContext::new(&doc, &[]).with_signature_element(ns::DSIG, "Signature");
        let ctx = TransformContext {
            document: &document,
            canonicalizer: &DefaultCanonicalizer,
        };
        let namespaces = vec![("ds".to_owned(), ns::DSIG.to_owned())];
        XPathFilterTransform::new(expression, &namespaces)
            .unwrap()
            .execute(TransformData::NodeSet(NodeSet::all(&doc, false)), &ctx)
            .unwrap()
            .into_octets(&ctx)
            .unwrap()
    }

    #[test]
    fn test_not_ancestor_or_self_signature() {
        let out = run("not(ancestor-or-self::ds:Signature)");
        assert_eq!(
            out,
            br#"<doc xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><keep>k</keep></doc>"#
        );
    }

    #[test]
    fn test_here_based_enveloped_expression() {
        let expr = "count(ancestor-or-self::ds:Signature | here()/ancestor::ds:Signature[1]) > count(ancestor-or-self::ds:Signature)";
        assert_eq!(run(expr), run("not(ancestor-or-self::ds:Signature)"));
    }

    #[test]
    fn test_ancestor_or_self_selects_subtree() {
        assert_eq!(
            run("ancestor-or-self::keep"),
            br#"<keep xmlns:ds="http://www.w3.org/2000/09/xmldsig#">k</keep>"#
        );
    }

    #[test]
    fn test_keep_all() {
        assert_eq!(run("self::node()"), run("true()"));
    }

    #[test]
    fn test_is_enveloped() {
        let ns = vec![("ds".to_owned(), ns::DSIG.to_owned())];
        assert!(XPathFilterTransform::new("not(ancestor-or-self::ds:Signature)", &ns)
            .unwrap()
            .is_enveloped());
        assert!(!XPathFilterTransform::new("ancestor-or-self::ds:Signature", &ns)
            .unwrap()
            .is_enveloped());
    }

    #[test]
    fn test_here_expression_must_match_exactly() {
        let ns = vec![("ds".to_owned(), ns::DSIG.to_owned())];
        for expr in [
            // equality keeps only the signature, the opposite of enveloped
            "count(ancestor-or-self::ds:Signature | here()/ancestor::ds:Signature[1]) = count(ancestor-or-self::ds:Signature)",
            "count(ancestor-or-self::ds:Object | here()/ancestor::ds:Signature[1]) > count(ancestor-or-self::ds:Signature)",
            "count(ancestor-or-self::ds:Signature | here()/ancestor::ds:Signature[1]) > count(ancestor-or-self::ds:Signature) or true()",
            "count(ancestor-or-self::ds:Signature | here()/ancestor::ds:Signature)",
        ] {
            assert!(
                matches!(XPathFilterTransform::new(expr, &ns), Err(Error::Transform(_))),
                "{expr}"
            );
        }
    }

    #[test]
    fn test_here_expression_needs_signature_namespace() {
        let expr = "count(ancestor-or-self::x:Signature | here()/ancestor::x:Signature[1]) > count(ancestor-or-self::x:Signature)";
        let other = vec![("x".to_owned(), "urn:not-dsig".to_owned())];
        assert!(XPathFilterTransform::new(expr, &other).is_err());
        assert!(XPathFilterTransform::new(expr, &[]).is_err());
        let dsig = vec![("x".to_owned(), ns::DSIG.to_owned())];
        assert!(XPathFilterTransform::new(expr, &dsig).unwrap().is_enveloped());
    }

    #[test]
    fn test_rejects_unknown_shapes() {
        assert!(XPathFilterTransform::new("//foo[@bar]", &[]).is_err());
        assert!(XPathFilterTransform::new("ancestor-or-self::q:x", &[]).is_err());
    }
}
