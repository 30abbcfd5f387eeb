// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Node abstraction over a roxmltree document
//!
//! roxmltree does not model attributes as tree nodes, while the path data
//! model does. `XmlNode` covers both.

use roxmltree::{Attribute, Node, NodeType};

/// A node in the path data model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XmlNode<'a, 'input> {
    /// Document, element, text, comment or processing-instruction node
    Tree(Node<'a, 'input>),
    /// Attribute `index` of the `owner` element
    Attribute {
        /// Element carrying the attribute
        owner: Node<'a, 'input>,
        /// Position of the attribute on its element
        index: usize,
    },
}

impl<'a, 'input> From<Node<'a, 'input>> for XmlNode<'a, 'input> {
    fn from(node: Node<'a, 'input>) -> Self {
        XmlNode::Tree(node)
    }
}

impl<'a, 'input> XmlNode<'a, 'input> {
    /// The document node of the tree this node belongs to
    pub fn document_root(&self) -> Self {
        XmlNode::Tree(self.tree_node().document().root())
    }

    /// Underlying tree node; for attributes, the owning element
    pub fn tree_node(&self) -> Node<'a, 'input> {
        match *self {
            XmlNode::Tree(node) => node,
            XmlNode::Attribute { owner, .. } => owner,
        }
    }

    /// The attribute this node stands for, if any
    pub fn attribute(&self) -> Option<Attribute<'a, 'input>> {
        match *self {
            XmlNode::Tree(_) => None,
            XmlNode::Attribute { owner, index } => owner.attributes().nth(index),
        }
    }

    /// Whether this is an attribute node
    pub fn is_attribute(&self) -> bool {
        matches!(self, XmlNode::Attribute { .. })
    }

    /// Whether this is an element node
    pub fn is_element(&self) -> bool {
        matches!(self, XmlNode::Tree(node) if node.is_element())
    }

    /// Sort key in document order: attributes follow their element and
    /// precede its children
    pub fn document_order_key(&self) -> (u32, usize) {
        match *self {
            XmlNode::Tree(node) => (node.id().get(), 0),
            XmlNode::Attribute { owner, index } => (owner.id().get(), index + 1),
        }
    }

    /// Parent node; the parent of an attribute is its element
    pub fn parent(&self) -> Option<Self> {
        match *self {
            XmlNode::Tree(node) => node.parent().map(XmlNode::Tree),
            XmlNode::Attribute { owner, .. } => Some(XmlNode::Tree(owner)),
        }
    }

    /// Local name of an element, attribute or processing instruction
    pub fn local_name(&self) -> &'a str {
        match *self {
            XmlNode::Tree(node) => match node.node_type() {
                NodeType::Element => node.tag_name().name(),
                NodeType::PI => node.pi().map(|pi| pi.target).unwrap_or(""),
                _ => "",
            },
            XmlNode::Attribute { .. } => self.attribute().map(|a| a.name()).unwrap_or(""),
        }
    }

    /// String-value of the node
    ///
    /// Elements and the document node yield the concatenation of all
    /// descendant text nodes.
    pub fn string_value(&self) -> String {
        match *self {
            XmlNode::Tree(node) => match node.node_type() {
                NodeType::Root | NodeType::Element => node
                    .descendants()
                    .filter(|n| n.is_text())
                    .filter_map(|n| n.text())
                    .collect(),
                NodeType::PI => node
                    .pi()
                    .and_then(|pi| pi.value)
                    .unwrap_or("")
                    .to_string(),
                NodeType::Text | NodeType::Comment => node.text().unwrap_or("").to_string(),
            },
            XmlNode::Attribute { .. } => self
                .attribute()
                .map(|a| a.value().to_string())
                .unwrap_or_default(),
        }
    }

    /// Short label for diagnostics: the tag for elements, `@name` for
    /// attributes, `#text`, `#comment` or `#document` otherwise
    pub fn label(&self) -> String {
        match *self {
            XmlNode::Tree(node) => match node.node_type() {
                NodeType::Element => node.tag_name().name().to_string(),
                NodeType::Root => "#document".to_string(),
                NodeType::Text => "#text".to_string(),
                NodeType::Comment => "#comment".to_string(),
                NodeType::PI => "#processing-instruction".to_string(),
            },
            XmlNode::Attribute { .. } => format!("@{}", self.local_name()),
        }
    }

    /// 1-based line of the node in the source text
    pub fn line(&self) -> u32 {
        let node = self.tree_node();
        node.document().text_pos_at(node.range().start).row
    }
}

/// Sort nodes into document order and drop duplicates
pub fn sort_document_order(nodes: &mut Vec<XmlNode<'_, '_>>) {
    nodes.sort_by_key(|n| n.document_order_key());
    nodes.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_value_concatenates_text() {
        let doc = roxmltree::Document::parse("<a>x<b>y</b>z</a>").unwrap();
        let node = XmlNode::from(doc.root_element());
        assert_eq!(node.string_value(), "xyz");
        assert_eq!(node.document_root().string_value(), "xyz");
    }

    #[test]
    fn test_attribute_nodes() {
        let doc = roxmltree::Document::parse(r#"<a id="1" kind="k"/>"#).unwrap();
        let owner = doc.root_element();
        let attr = XmlNode::Attribute { owner, index: 1 };
        assert_eq!(attr.local_name(), "kind");
        assert_eq!(attr.string_value(), "k");
        assert_eq!(attr.label(), "@kind");
        assert_eq!(attr.parent(), Some(XmlNode::Tree(owner)));
    }

    #[test]
    fn test_document_order() {
        let doc = roxmltree::Document::parse(r#"<a id="1"><b/><c/></a>"#).unwrap();
        let a = doc.root_element();
        let b = a.first_element_child().unwrap();
        let c = b.next_sibling_element().unwrap();
        let mut nodes = vec![
            XmlNode::Tree(c),
            XmlNode::Attribute { owner: a, index: 0 },
            XmlNode::Tree(b),
            XmlNode::Tree(c),
            XmlNode::Tree(a),
        ];
        sort_document_order(&mut nodes);
        assert_eq!(
            nodes,
            vec![
                XmlNode::Tree(a),
                XmlNode::Attribute { owner: a, index: 0 },
                XmlNode::Tree(b),
                XmlNode::Tree(c),
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let doc = roxmltree::Document::parse("<r>\n  <a/>\n</r>").unwrap();
        let a = doc.root_element().first_element_child().unwrap();
        assert_eq!(XmlNode::from(a).line(), 2);
    }
}
