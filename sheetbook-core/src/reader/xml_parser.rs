//! Event-driven XML loading shared by both readers
//!
//! `parse_document` builds a lightweight element tree that keeps mixed content in order
//! (ODS paragraphs interleave text with `text:s` and `text:span`). `to_node` lifts a
//! SpreadsheetML element tree into typed [`Node`]s.

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;
use tracing::debug;

use crate::diagnostic::{DiagnosticKind, DiagnosticScope, Diagnostics};
use crate::node::{Node, NodeKind};

/// An XML element with qualified names as they appear in the source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub content: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Element(Element),
    Text(String),
}

impl Element {
    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute parsed as a count, 1 when absent or malformed
    pub fn count_attr(&self, name: &str) -> u32 {
        self.attr(name)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.content.iter().filter_map(|c| match c {
            Content::Element(e) => Some(e),
            Content::Text(_) => None,
        })
    }

    /// First child element with the qualified `name`
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    /// All character data below this element, in document order
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    /// Character data directly inside this element, ignoring child elements
    pub fn own_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::Text(text) => Some(text.as_str()),
                Content::Element(_) => None,
            })
            .collect()
    }

    fn collect_text(&self, out: &mut String) {
        for content in &self.content {
            match content {
                Content::Text(text) => out.push_str(text),
                Content::Element(e) => e.collect_text(out),
            }
        }
    }
}

pub fn local(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}

fn start_element(e: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .with_context(|| format!("Invalid value for attribute {} on <{}>", key, name))?
            .to_string();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        content: Vec::new(),
    })
}

/// Parse a whole document and return its root element
pub fn parse_document<R: BufRead>(source: R) -> Result<Element> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("XML parsing error at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => stack.push(start_element(&e)?),
            Event::Empty(e) => {
                let element = start_element(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.content.push(Content::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    anyhow::bail!("Unbalanced closing tag");
                };
                match stack.last_mut() {
                    Some(parent) => parent.content.push(Content::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = e.unescape().context("Invalid character data")?;
                    push_text(parent, &text);
                }
            }
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    push_text(parent, &String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        anyhow::bail!("Unexpected end of document inside <{}>", stack[stack.len() - 1].name);
    }
    root.context("Document has no root element")
}

fn push_text(parent: &mut Element, text: &str) {
    match parent.content.last_mut() {
        Some(Content::Text(existing)) => existing.push_str(text),
        _ => parent.content.push(Content::Text(text.to_string())),
    }
}

/// Lift a SpreadsheetML element into a [`Node`], dropping what the vocabulary lacks.
///
/// Attribute prefixes and `xmlns` declarations are stripped. Rich text inside `Data`
/// (`<B>`, `<Font>`, ...) is flattened into the node text.
pub fn to_node(element: &Element, diagnostics: &mut Diagnostics) -> Option<Node> {
    let Some(kind) = NodeKind::from_name(element.local_name()) else {
        debug!(element = %element.name, "skipping unknown element");
        diagnostics.info(
            DiagnosticKind::UnknownElement,
            DiagnosticScope::Book,
            format!("skipped <{}>", element.name),
        );
        return None;
    };

    let mut node = Node::new(kind);
    for (key, value) in &element.attrs {
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        node.set_attr(local(key), value);
    }

    if kind.carries_text() {
        if kind == NodeKind::Data {
            node.set_text(Some(element.text()));
        } else {
            let text = element.own_text();
            if !text.trim().is_empty() {
                node.set_text(Some(text.trim().to_string()));
            }
        }
    }

    // Data children are formatting runs, already folded into the text
    if kind != NodeKind::Data {
        for child in element.elements() {
            if let Some(child) = to_node(child, diagnostics) {
                node.push(child);
            }
        }
    }

    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_content() {
        let root = parse_document(
            r#"<text:p xmlns:text="t">a<text:s text:c="2"/>b<text:span>c</text:span></text:p>"#
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(root.local_name(), "p");
        assert_eq!(root.content.len(), 4);
        assert_eq!(root.text(), "abc");
        let space = root.child("text:s").unwrap();
        assert_eq!(space.count_attr("text:c"), 2);
    }

    #[test]
    fn test_entities_unescaped() {
        let root = parse_document(r#"<a v="1 &lt; 2">x &amp; y</a>"#.as_bytes()).unwrap();
        assert_eq!(root.attr("v"), Some("1 < 2"));
        assert_eq!(root.text(), "x & y");
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse_document("<a><b></a>".as_bytes()).is_err());
        assert!(parse_document("".as_bytes()).is_err());
    }

    #[test]
    fn test_to_node_strips_prefixes_and_flattens_rich_text() {
        let xml = r#"<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet"
              xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
            <Worksheet ss:Name="S"><Table><Row><Cell ss:Index="2">
              <ss:Data ss:Type="String" xmlns="http://www.w3.org/TR/REC-html40"><B>bold</B> text</ss:Data>
            </Cell></Row></Table></Worksheet>
            <Mystery/>
        </Workbook>"#;
        let root = parse_document(xml.as_bytes()).unwrap();
        let mut diagnostics = Diagnostics::new();
        let node = to_node(&root, &mut diagnostics).unwrap();

        assert_eq!(node.kind(), NodeKind::Workbook);
        assert_eq!(node.attrs().count(), 0);
        let sheet = node.child(NodeKind::Worksheet).unwrap();
        assert_eq!(sheet.attr("Name"), Some("S"));
        let cell = sheet
            .child(NodeKind::Table)
            .and_then(|t| t.child(NodeKind::Row))
            .and_then(|r| r.child(NodeKind::Cell))
            .unwrap();
        assert_eq!(cell.attr_parsed::<u32>("Index"), Some(2));
        assert_eq!(cell.child_text(NodeKind::Data), Some("bold text"));
        assert_eq!(diagnostics.of_kind(DiagnosticKind::UnknownElement).count(), 1);
    }
}
