//! Format-preserving XML document snapshots

use crate::{DocumentError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::ops::Range;
use std::path::Path;

/// Handle to an element inside a [`Document`]
///
/// Ids are indices into the document's node table. They are only meaningful
/// for the document (or clones of the document) they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Markup,
    Whitespace,
    Text,
}

/// One reader event, stored as a byte span of the source text
#[derive(Debug, Clone)]
struct Token {
    span: Range<usize>,
    kind: TokenKind,
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// First token of the element (its start or empty tag)
    first: usize,
    /// Last token of the element (its end tag, or `first` for empty tags)
    last: usize,
    /// Decoded text of direct text/CDATA children
    text: String,
}

/// Parsed XML document
///
/// Removing an element tombstones its tokens instead of rebuilding the tree,
/// so every other [`NodeId`] keeps pointing at the same element.
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    bom: bool,
    tokens: Vec<Token>,
    removed: Vec<bool>,
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Parse a document from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let (bom, source) = match content.strip_prefix('\u{FEFF}') {
            Some(rest) => (true, rest),
            None => (false, content),
        };

        let mut reader = Reader::from_str(source);
        let mut tokens: Vec<Token> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();
        let mut open: Vec<NodeId> = Vec::new();

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader
                .read_event()
                .map_err(|e| DocumentError::malformed(start, e))?;
            let end = reader.buffer_position() as usize;
            let index = tokens.len();
            let span = start..end;

            let kind = match event {
                Event::Eof => break,
                Event::Start(tag) => {
                    let id = push_element(&mut nodes, &tag, open.last().copied(), index, start)?;
                    open.push(id);
                    TokenKind::Markup
                }
                Event::Empty(tag) => {
                    push_element(&mut nodes, &tag, open.last().copied(), index, start)?;
                    TokenKind::Markup
                }
                Event::End(_) => {
                    let id = open
                        .pop()
                        .ok_or_else(|| DocumentError::malformed(start, "unexpected closing tag"))?;
                    nodes[id.0].last = index;
                    TokenKind::Markup
                }
                Event::Text(_) => {
                    let raw = &source[span.clone()];
                    if let Some(parent) = open.last() {
                        let decoded = quick_xml::escape::unescape(raw)
                            .map_err(|e| DocumentError::malformed(start, e))?;
                        nodes[parent.0].text.push_str(&decoded);
                    }
                    if raw.trim().is_empty() {
                        TokenKind::Whitespace
                    } else {
                        TokenKind::Text
                    }
                }
                Event::CData(_) => {
                    let raw = &source[span.clone()];
                    if let Some(parent) = open.last() {
                        let inner = raw
                            .strip_prefix("<![CDATA[")
                            .and_then(|rest| rest.strip_suffix("]]>"))
                            .unwrap_or(raw);
                        nodes[parent.0].text.push_str(inner);
                    }
                    TokenKind::Text
                }
                _ => TokenKind::Markup,
            };

            tokens.push(Token { span, kind });
        }

        if let Some(unclosed) = open.last() {
            return Err(DocumentError::malformed(
                source.len(),
                format!("unclosed element <{}>", nodes[unclosed.0].name),
            ));
        }

        let root = nodes
            .iter()
            .position(|node| node.parent.is_none())
            .map(NodeId)
            .ok_or(DocumentError::MissingRoot)?;

        let removed = vec![false; tokens.len()];
        Ok(Self {
            source: source.to_string(),
            bom,
            tokens,
            removed,
            nodes,
            root,
        })
    }

    /// Load a document from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|error| DocumentError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_str(&content)
    }

    /// Serialize the document, skipping removed elements
    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self) -> String {
        let mut out = String::with_capacity(self.source.len() + 3);
        if self.bom {
            out.push('\u{FEFF}');
        }
        for (token, removed) in self.tokens.iter().zip(&self.removed) {
            if !removed {
                out.push_str(&self.source[token.span.clone()]);
            }
        }
        out
    }

    /// Overwrite `path` with the serialized document
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string()).map_err(|error| DocumentError::Write {
            path: path.to_path_buf(),
            error,
        })
    }

    /// The document element
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// All attached elements with the given local name, in document order
    pub fn find_all(&self, name: &str) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|&id| self.is_attached(id) && self.nodes[id.0].name == name)
            .collect()
    }

    /// Attached element children of `id`, in document order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| {
                node.children
                    .iter()
                    .copied()
                    .filter(|&child| self.is_attached(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Local name of the element (namespace prefix stripped)
    pub fn name(&self, id: NodeId) -> &str {
        self.node(id).map(|node| node.name.as_str()).unwrap_or("")
    }

    /// Unescaped value of the attribute with the given local name
    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id)?
            .attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Text content of the element's direct text children, trimmed
    pub fn text(&self, id: NodeId) -> &str {
        self.node(id).map(|node| node.text.trim()).unwrap_or("")
    }

    /// Text of the first attached child element named `name`
    pub fn child_text(&self, id: NodeId, name: &str) -> Option<&str> {
        self.children(id)
            .into_iter()
            .find(|&child| self.nodes[child.0].name == name)
            .map(|child| self.text(child))
    }

    /// Whether the element is still part of the document
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|node| !self.removed[node.first])
            .unwrap_or(false)
    }

    /// Detach an element (and the indentation in front of it)
    ///
    /// Returns `false` if the element was already detached.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if !self.is_attached(id) || id == self.root {
            return false;
        }
        let (first, last) = {
            let node = &self.nodes[id.0];
            (node.first, node.last)
        };
        self.removed[first..=last].fill(true);

        if first > 0 && self.tokens[first - 1].kind == TokenKind::Whitespace {
            self.removed[first - 1] = true;
        }
        true
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }
}

fn push_element(
    nodes: &mut Vec<Node>,
    tag: &BytesStart<'_>,
    parent: Option<NodeId>,
    index: usize,
    position: usize,
) -> Result<NodeId> {
    let name = std::str::from_utf8(tag.local_name().as_ref())
        .map_err(|e| DocumentError::malformed(position, e))?
        .to_string();

    let mut attributes = Vec::new();
    for attribute in tag.attributes() {
        let attribute = attribute.map_err(|e| DocumentError::malformed(position, e))?;
        let key = std::str::from_utf8(attribute.key.local_name().as_ref())
            .map_err(|e| DocumentError::malformed(position, e))?
            .to_string();
        let value = attribute
            .unescape_value()
            .map_err(|e| DocumentError::malformed(position, e))?
            .into_owned();
        attributes.push((key, value));
    }

    let id = NodeId(nodes.len());
    nodes.push(Node {
        name,
        attributes,
        parent,
        children: Vec::new(),
        first: index,
        last: index,
        text: String::new(),
    });
    if let Some(parent) = parent {
        nodes[parent.0].children.push(id);
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="14.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <!-- references -->
  <ItemGroup>
    <Reference Include="A" />
    <Reference Include="B">
      <HintPath>..\packages\B.1.0.0\lib\B.dll</HintPath>
    </Reference>
  </ItemGroup>
</Project>
"#;

    #[test]
    fn test_round_trip_is_byte_exact() {
        let doc = Document::from_str(PROJECT).unwrap();
        assert_eq!(doc.to_string(), PROJECT);
    }

    #[test]
    fn test_bom_is_preserved() {
        let content = format!("\u{FEFF}{}", PROJECT);
        let doc = Document::from_str(&content).unwrap();
        assert_eq!(doc.name(doc.root()), "Project");
        assert_eq!(doc.to_string(), content);
    }

    #[test]
    fn test_find_all_in_document_order() {
        let doc = Document::from_str(PROJECT).unwrap();
        let refs = doc.find_all("Reference");
        assert_eq!(refs.len(), 2);
        assert_eq!(doc.attribute(refs[0], "Include"), Some("A"));
        assert_eq!(doc.attribute(refs[1], "Include"), Some("B"));
    }

    #[test]
    fn test_child_text() {
        let doc = Document::from_str(PROJECT).unwrap();
        let refs = doc.find_all("Reference");
        assert_eq!(doc.child_text(refs[0], "HintPath"), None);
        assert_eq!(
            doc.child_text(refs[1], "HintPath"),
            Some(r"..\packages\B.1.0.0\lib\B.dll")
        );
    }

    #[test]
    fn test_remove_drops_element_and_indentation() {
        let mut doc = Document::from_str(PROJECT).unwrap();
        let b = doc.find_all("Reference")[1];
        assert!(doc.remove(b));

        let expected = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="14.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <!-- references -->
  <ItemGroup>
    <Reference Include="A" />
  </ItemGroup>
</Project>
"#;
        assert_eq!(doc.to_string(), expected);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut doc = Document::from_str(PROJECT).unwrap();
        let a = doc.find_all("Reference")[0];
        assert!(doc.remove(a));
        assert!(!doc.remove(a));
        assert!(!doc.is_attached(a));
    }

    #[test]
    fn test_descendants_of_removed_element_are_detached() {
        let mut doc = Document::from_str(PROJECT).unwrap();
        let group = doc.find_all("ItemGroup")[0];
        let hint = doc.find_all("HintPath")[0];
        doc.remove(group);
        assert!(!doc.is_attached(hint));
        assert!(doc.find_all("Reference").is_empty());
    }

    #[test]
    fn test_ids_survive_removal_of_siblings() {
        let mut doc = Document::from_str(PROJECT).unwrap();
        let refs = doc.find_all("Reference");
        doc.remove(refs[0]);
        assert_eq!(doc.attribute(refs[1], "Include"), Some("B"));
        assert_eq!(doc.children(doc.find_all("ItemGroup")[0]), vec![refs[1]]);
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let mut doc = Document::from_str(PROJECT).unwrap();
        let root = doc.root();
        assert!(!doc.remove(root));
    }

    #[test]
    fn test_namespace_prefix_ignored() {
        let doc = Document::from_str(
            r#"<m:Project xmlns:m="urn:x"><m:ItemGroup><m:Reference m:Include="X"/></m:ItemGroup></m:Project>"#,
        )
        .unwrap();
        let group = doc.find_all("ItemGroup");
        assert_eq!(group.len(), 1);
        let entry = doc.children(group[0])[0];
        assert_eq!(doc.name(entry), "Reference");
        assert_eq!(doc.attribute(entry, "Include"), Some("X"));
    }

    #[test]
    fn test_escaped_text_and_cdata() {
        let doc = Document::from_str(
            "<a><b>x &amp; y</b><c><![CDATA[<raw>]]></c><d a=\"1 &lt; 2\"/></a>",
        )
        .unwrap();
        let root = doc.root();
        assert_eq!(doc.child_text(root, "b"), Some("x & y"));
        assert_eq!(doc.child_text(root, "c"), Some("<raw>"));
        let d = doc.find_all("d")[0];
        assert_eq!(doc.attribute(d, "a"), Some("1 < 2"));
    }

    #[rstest]
    #[case::empty("")]
    #[case::whitespace("   \n")]
    #[case::unclosed("<Project><ItemGroup></Project>")]
    #[case::mismatched("<a></b>")]
    #[case::stray_end("<a></a></b>")]
    #[case::truncated("<Project><ItemGroup>")]
    fn test_malformed_documents_rejected(#[case] content: &str) {
        assert!(Document::from_str(content).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Document::from_file(Path::new("/nonexistent/refprune/x.csproj")).unwrap_err();
        assert!(matches!(err, DocumentError::Read { .. }));
    }
}
