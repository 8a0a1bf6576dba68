// Generic response documents
//
// Opsview answers in XML or JSON depending on the endpoint and server
// version. Both are lowered into the same `Element` tree so the status
// parser only has one shape to walk.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;

/// Wire format a document was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BodyFormat {
    Xml,
    Json,
}

impl BodyFormat {
    /// `<` means XML; anything else is treated as JSON.
    pub fn sniff(body: &str) -> Self {
        if body.trim_start().starts_with('<') {
            Self::Xml
        } else {
            Self::Json
        }
    }
}

/// One element of a parsed response.
///
/// Attributes keep document order. For JSON documents, scalar members are
/// attributes and object members are child elements named by their key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every descendant (not self) in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Every descendant named `name`, in document order, at any depth.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.descendants().filter(move |el| el.name == name)
    }

    /// First descendant named `name` in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.descendants().find(|el| el.name == name)
    }
}

/// Pre-order walk over an element's subtree.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// A parsed response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub format: BodyFormat,
    /// The document element for XML, an unnamed wrapper object for JSON.
    pub root: Element,
}

impl Document {
    /// Parse a body, sniffing the format from its first character.
    pub fn parse(body: &str) -> Result<Self, Error> {
        let format = BodyFormat::sniff(body);
        debug!(%format, len = body.len(), "parsing response body");
        let root = match format {
            BodyFormat::Xml => parse_xml(body)?,
            BodyFormat::Json => parse_json(body)?,
        };
        Ok(Self { format, root })
    }

    /// The root itself when it is named `name`, else its first such descendant.
    pub fn find_element(&self, name: &str) -> Option<&Element> {
        if self.root.name == name {
            Some(&self.root)
        } else {
            self.root.find(name)
        }
    }
}

fn parse_error(message: impl std::fmt::Display, body: &str) -> Error {
    Error::Parse {
        message: message.to_string(),
        body: body.to_owned(),
    }
}

// ── XML ─────────────────────────────────────────────────────────────

fn parse_xml(body: &str) -> Result<Element, Error> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| parse_error(format!("invalid XML: {e}"), body))?;

        match event {
            Event::Start(start) => {
                stack.push(start_element(&start).map_err(|e| parse_error(e, body))?);
            }
            Event::Empty(start) => {
                let element = start_element(&start).map_err(|e| parse_error(e, body))?;
                attach(&mut stack, &mut root, element, body)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| parse_error("closing tag without an open element", body))?;
                attach(&mut stack, &mut root, element, body)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| parse_error(e, body))?;
                push_text(&mut stack, &text, body)?;
            }
            Event::CData(data) => {
                let data = data.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&data), body)?;
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(parse_error(format!("unclosed element <{}>", open.name), body));
    }
    root.ok_or_else(|| parse_error("document has no root element", body))
}

fn start_element(start: &BytesStart<'_>) -> Result<Element, quick_xml::Error> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Hang a finished element under the innermost open one, or make it the root.
fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    body: &str,
) -> Result<(), Error> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(parse_error("more than one root element", body))
    }
}

fn push_text(stack: &mut [Element], text: &str, body: &str) -> Result<(), Error> {
    match stack.last_mut() {
        Some(open) => {
            open.text.push_str(text);
            Ok(())
        }
        None => Err(parse_error("text outside of the root element", body)),
    }
}

// ── JSON ────────────────────────────────────────────────────────────

fn parse_json(body: &str) -> Result<Element, Error> {
    let value: Value = serde_json::from_str(body).map_err(|e| parse_error(e, body))?;
    let mut root = Element::new("");
    match value {
        Value::Object(map) => fill_object(&mut root, map),
        Value::Array(items) => fill_member(&mut root, "", Value::Array(items)),
        scalar => root.text = scalar_text(&scalar).into_owned(),
    }
    Ok(root)
}

fn fill_object(element: &mut Element, map: serde_json::Map<String, Value>) {
    for (key, value) in map {
        fill_member(element, &key, value);
    }
}

fn fill_member(element: &mut Element, key: &str, value: Value) {
    match value {
        Value::Object(map) => {
            let mut child = Element::new(key);
            fill_object(&mut child, map);
            element.children.push(child);
        }
        Value::Array(items) if items.iter().all(Value::is_object) => {
            for item in items {
                if let Value::Object(map) = item {
                    let mut child = Element::new(key);
                    fill_object(&mut child, map);
                    element.children.push(child);
                }
            }
        }
        Value::Array(items) => {
            element
                .attributes
                .push((key.to_owned(), Value::Array(items).to_string()));
        }
        scalar => {
            element
                .attributes
                .push((key.to_owned(), scalar_text(&scalar).into_owned()));
        }
    }
}

fn scalar_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn xml_keeps_attribute_order_and_nesting() {
        let doc = Document::parse(
            r#"<?xml version="1.0"?>
            <data summary="x">
                <list name="web1" state="0"><services name="HTTP" state="2"/></list>
                <list name="db1" state="1"/>
            </data>"#,
        )
        .unwrap();

        assert_eq!(doc.format, BodyFormat::Xml);
        assert_eq!(doc.root.name, "data");
        assert_eq!(doc.root.children.len(), 2);
        let web1 = &doc.root.children[0];
        assert_eq!(
            web1.attributes,
            vec![("name".into(), "web1".into()), ("state".into(), "0".into())]
        );
        assert_eq!(web1.children[0].attribute("name"), Some("HTTP"));
    }

    #[test]
    fn xml_unescapes_attributes_and_text() {
        let doc = Document::parse(r#"<result msg="a &amp; b">done &lt;ok&gt;</result>"#).unwrap();
        assert_eq!(doc.root.attribute("msg"), Some("a & b"));
        assert_eq!(doc.root.text, "done <ok>");
    }

    #[test]
    fn mismatched_tags_are_a_parse_error() {
        let err = Document::parse("<data><list></data>").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "got: {err:?}");
    }

    #[test]
    fn unclosed_root_is_a_parse_error() {
        let err = Document::parse("<data><list/>").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "got: {err:?}");
    }

    #[test]
    fn plain_text_is_a_parse_error() {
        let err = Document::parse("Internal Server Error").unwrap_err();
        match err {
            Error::Parse { body, .. } => assert_eq!(body, "Internal Server Error"),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn json_objects_become_elements() {
        let doc = Document::parse(
            r#"{"service": {"summary": {"total": 3}, "list": [
                {"name": "web1", "state": 0, "services": [{"name": "HTTP", "state": "2"}]},
                {"name": "db1", "downtime": null, "tags": ["a", "b"]}
            ]}}"#,
        )
        .unwrap();

        assert_eq!(doc.format, BodyFormat::Json);
        assert_eq!(doc.root.name, "");
        let service = doc.find_element("service").unwrap();
        let hosts: Vec<_> = service.find_all("list").collect();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].attribute("state"), Some("0"));
        assert_eq!(hosts[1].attribute("downtime"), Some(""));
        assert_eq!(hosts[1].attribute("tags"), Some(r#"["a","b"]"#));
        assert_eq!(service.find("summary").unwrap().attribute("total"), Some("3"));
    }

    #[test]
    fn json_members_keep_their_order() {
        let doc = Document::parse(r#"{"zeta": {"b": 1, "a": 2}, "alpha": {}}"#).unwrap();
        let names: Vec<_> = doc.root.children.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        let keys: Vec<_> = doc.root.children[0]
            .attributes
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn descendants_walk_in_document_order() {
        let doc = Document::parse("<a><b><c/></b><d/></a>").unwrap();
        let names: Vec<_> = doc.root.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["b", "c", "d"]);
    }
}
