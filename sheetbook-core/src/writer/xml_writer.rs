//! Event-level XML output shared by the writers, and SpreadsheetML serialization

use anyhow::Result;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use std::io::Write;

use crate::node::{Namespace, NodeKind, Node};

const OFFICE_NS: &str = "urn:schemas-microsoft-com:office:office";
const HTML_NS: &str = "http://www.w3.org/TR/REC-html40";

/// Ordered attribute list for an element being written
#[derive(Debug, Default, Clone)]
pub(crate) struct Attrs(Vec<(String, String)>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    pub fn set_opt<T: ToString>(mut self, key: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    pub fn push(&mut self, key: &str, value: impl ToString) {
        self.0.push((key.to_string(), value.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn extend(&mut self, other: Attrs) {
        self.0.extend(other.0);
    }

    fn start<'a>(&'a self, name: &'a str) -> BytesStart<'a> {
        BytesStart::new(name)
            .with_attributes(self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Thin element writer over `quick_xml::Writer`
pub(crate) struct XmlSink<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlSink<W> {
    /// Compact output, required wherever text content is whitespace-sensitive
    pub fn new(out: W) -> Self {
        Self {
            writer: Writer::new(out),
        }
    }

    pub fn indented(out: W) -> Self {
        Self {
            writer: Writer::new_with_indent(out, b' ', 1),
        }
    }

    pub fn declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(())
    }

    pub fn instruction(&mut self, content: &str) -> Result<()> {
        self.writer.write_event(Event::PI(BytesPI::new(content)))?;
        Ok(())
    }

    pub fn open(&mut self, name: &str, attrs: &Attrs) -> Result<()> {
        self.writer.write_event(Event::Start(attrs.start(name)))?;
        Ok(())
    }

    pub fn empty(&mut self, name: &str, attrs: &Attrs) -> Result<()> {
        self.writer.write_event(Event::Empty(attrs.start(name)))?;
        Ok(())
    }

    pub fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub fn text(&mut self, text: &str) -> Result<()> {
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    /// `<name ...>text</name>`
    pub fn leaf(&mut self, name: &str, attrs: &Attrs, text: &str) -> Result<()> {
        self.open(name, attrs)?;
        self.text(text)?;
        self.close(name)
    }

    /// Splice pre-rendered markup
    pub fn raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.get_mut().write_all(bytes)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Serialize a SpreadsheetML tree as an Excel 2003 XML document
pub fn write_markup<W: Write>(root: &Node, out: W) -> Result<W> {
    let mut sink = XmlSink::indented(out);
    sink.declaration()?;
    sink.instruction(r#"mso-application progid="Excel.Sheet""#)?;
    write_node(&mut sink, root, None)?;
    Ok(sink.into_inner())
}

/// Elements under an Excel-namespace subtree stay in it, including `Row`/`Column` break
/// positions; only the subtree root declares the switch.
fn write_node<W: Write>(
    sink: &mut XmlSink<W>,
    node: &Node,
    inherited: Option<Namespace>,
) -> Result<()> {
    let namespace = match inherited {
        Some(Namespace::Excel) => Namespace::Excel,
        _ => node.kind().namespace(),
    };

    let mut attrs = Attrs::new();
    match inherited {
        None => {
            attrs.push("xmlns", Namespace::Spreadsheet.uri());
            attrs.push("xmlns:o", OFFICE_NS);
            attrs.push("xmlns:x", Namespace::Excel.uri());
            attrs.push("xmlns:ss", Namespace::Spreadsheet.uri());
            attrs.push("xmlns:html", HTML_NS);
        }
        Some(parent) if parent != namespace => attrs.push("xmlns", namespace.uri()),
        Some(_) => {}
    }
    for (key, value) in node.attrs() {
        // Font's generic family and charset live in the Excel namespace
        let prefix = if node.kind() == NodeKind::Font && matches!(key, "Family" | "CharSet") {
            Namespace::Excel.prefix()
        } else {
            namespace.prefix()
        };
        attrs.push(&format!("{}:{}", prefix, key), value);
    }

    let name = node.kind().name();
    if node.text().is_none() && node.children().is_empty() {
        return sink.empty(name, &attrs);
    }
    sink.open(name, &attrs)?;
    if let Some(text) = node.text() {
        sink.text(text)?;
    }
    for child in node.children() {
        write_node(sink, child, Some(namespace))?;
    }
    sink.close(name)
}
