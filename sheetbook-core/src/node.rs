//! Generic ordered element tree mirroring the native spreadsheet markup
//!
//! Every element of the SpreadsheetML vocabulary the codec understands has a [`NodeKind`].
//! Children are owned by their parent, so a node always has exactly one parent and the
//! tree cannot contain cycles.

use std::str::FromStr;

/// XML namespace an element belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `urn:schemas-microsoft-com:office:spreadsheet` (`ss:` attributes)
    Spreadsheet,
    /// `urn:schemas-microsoft-com:office:excel` (`x:` attributes)
    Excel,
}

impl Namespace {
    pub fn uri(&self) -> &'static str {
        match self {
            Namespace::Spreadsheet => "urn:schemas-microsoft-com:office:spreadsheet",
            Namespace::Excel => "urn:schemas-microsoft-com:office:excel",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Spreadsheet => "ss",
            Namespace::Excel => "x",
        }
    }
}

macro_rules! node_kinds {
    ($($kind:ident => $name:literal, $ns:ident;)+) => {
        /// Closed set of element kinds in the native markup
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NodeKind {
            $($kind,)+
        }

        impl NodeKind {
            /// Local element name
            pub fn name(&self) -> &'static str {
                match self {
                    $(NodeKind::$kind => $name,)+
                }
            }

            pub fn namespace(&self) -> Namespace {
                match self {
                    $(NodeKind::$kind => Namespace::$ns,)+
                }
            }

            /// Look up a kind by local element name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(NodeKind::$kind),)+
                    _ => None,
                }
            }
        }
    };
}

node_kinds! {
    Workbook => "Workbook", Spreadsheet;
    Styles => "Styles", Spreadsheet;
    Style => "Style", Spreadsheet;
    Alignment => "Alignment", Spreadsheet;
    Borders => "Borders", Spreadsheet;
    Border => "Border", Spreadsheet;
    Font => "Font", Spreadsheet;
    Interior => "Interior", Spreadsheet;
    NumberFormat => "NumberFormat", Spreadsheet;
    Protection => "Protection", Spreadsheet;
    Worksheet => "Worksheet", Spreadsheet;
    Table => "Table", Spreadsheet;
    Column => "Column", Spreadsheet;
    Row => "Row", Spreadsheet;
    Cell => "Cell", Spreadsheet;
    Data => "Data", Spreadsheet;
    WorksheetOptions => "WorksheetOptions", Excel;
    PageSetup => "PageSetup", Excel;
    Layout => "Layout", Excel;
    Header => "Header", Excel;
    Footer => "Footer", Excel;
    PageMargins => "PageMargins", Excel;
    FitToPage => "FitToPage", Excel;
    Print => "Print", Excel;
    PaperSizeIndex => "PaperSizeIndex", Excel;
    FitWidth => "FitWidth", Excel;
    FitHeight => "FitHeight", Excel;
    Scale => "Scale", Excel;
    Gridlines => "Gridlines", Excel;
    Visible => "Visible", Excel;
    Selected => "Selected", Excel;
    PageBreaks => "PageBreaks", Excel;
    RowBreaks => "RowBreaks", Excel;
    RowBreak => "RowBreak", Excel;
    ColBreaks => "ColBreaks", Excel;
    ColBreak => "ColBreak", Excel;
}

impl NodeKind {
    /// Elements whose character data is meaningful
    pub fn carries_text(&self) -> bool {
        matches!(
            self,
            NodeKind::Data
                | NodeKind::PaperSizeIndex
                | NodeKind::FitWidth
                | NodeKind::FitHeight
                | NodeKind::Scale
                | NodeKind::Visible
                | NodeKind::Row
                | NodeKind::Column
        )
    }
}

/// A single element: kind, ordered attributes, optional text and ordered children.
///
/// Attribute names are stored without their namespace prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: NodeKind,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attrs: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute parsed into `T`; unparseable values read as absent
    pub fn attr_parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.attr(name).and_then(|value| value.trim().parse().ok())
    }

    /// `"1"` reads as true, anything else as false
    pub fn attr_flag(&self, name: &str) -> bool {
        matches!(self.attr(name), Some("1") | Some("true"))
    }

    /// Replace an existing attribute in place or append a new one
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let position = self.attrs.iter().position(|(key, _)| key == name)?;
        Some(self.attrs.remove(position).1)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: Option<String>) {
        self.text = text;
    }

    pub fn push_text(&mut self, text: &str) {
        self.text.get_or_insert_with(String::new).push_str(text);
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn push(&mut self, child: Node) {
        self.children.push(child);
    }

    /// First child of the given kind
    pub fn child(&self, kind: NodeKind) -> Option<&Node> {
        self.children.iter().find(|c| c.kind == kind)
    }

    pub fn children_of(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    pub fn child_text(&self, kind: NodeKind) -> Option<&str> {
        self.child(kind).and_then(|c| c.text())
    }

    pub fn has_child(&self, kind: NodeKind) -> bool {
        self.child(kind).is_some()
    }
}
