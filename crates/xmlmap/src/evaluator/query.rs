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

//! Query adapter between the engine and location-path evaluation

use xmlmap_path::{CompiledPath, PathResult, PathValue, XmlNode};

/// Runs compiled paths relative to a context node
#[derive(Debug, Clone, Copy)]
pub struct QueryAdapter {
    trim_whitespace: bool,
}

impl QueryAdapter {
    pub fn new(trim_whitespace: bool) -> Self {
        Self { trim_whitespace }
    }

    /// Matching nodes in document order
    pub fn select_nodes<'a, 'input>(
        &self,
        path: &CompiledPath,
        context: XmlNode<'a, 'input>,
    ) -> PathResult<Vec<XmlNode<'a, 'input>>> {
        path.select(context)
    }

    /// A single string value
    ///
    /// A node-set yields the string-value of its first node in document
    /// order, or `None` when empty. Strings, numbers and booleans yield
    /// their string conversion.
    pub fn select_string(
        &self,
        path: &CompiledPath,
        context: XmlNode<'_, '_>,
    ) -> PathResult<Option<String>> {
        let value = match path.evaluate(context)? {
            PathValue::NodeSet(nodes) => match nodes.first() {
                Some(node) => node.string_value(),
                None => return Ok(None),
            },
            other => other.to_xpath_string(),
        };
        Ok(Some(if self.trim_whitespace {
            value.trim().to_string()
        } else {
            value
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const XML: &str = r#"<r>
  <a id=" 1 "><title>  first </title></a>
  <a id="2"><title>second</title></a>
</r>"#;

    fn select(adapter: QueryAdapter, source: &str) -> Option<String> {
        let doc = roxmltree::Document::parse(XML).unwrap();
        let path = CompiledPath::compile(source).unwrap();
        adapter.select_string(&path, XmlNode::from(doc.root())).unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let adapter = QueryAdapter::new(true);
        assert_eq!(select(adapter, "/r/a/title"), Some("first".to_string()));
        assert_eq!(select(adapter, "/r/a/@id"), Some("1".to_string()));
    }

    #[test]
    fn test_no_match_is_none() {
        assert_eq!(select(QueryAdapter::new(true), "/r/b"), None);
    }

    #[test]
    fn test_scalar_results() {
        let adapter = QueryAdapter::new(true);
        assert_eq!(select(adapter, "count(/r/a)"), Some("2".to_string()));
        assert_eq!(select(adapter, "boolean(/r/b)"), Some("false".to_string()));
        assert_eq!(select(adapter, "\"0\""), Some("0".to_string()));
    }

    #[test]
    fn test_untrimmed() {
        assert_eq!(
            select(QueryAdapter::new(false), "/r/a/title"),
            Some("  first ".to_string())
        );
    }

    #[test]
    fn test_select_nodes() {
        let doc = roxmltree::Document::parse(XML).unwrap();
        let adapter = QueryAdapter::new(true);
        let path = CompiledPath::compile("/r/a").unwrap();
        let nodes = adapter.select_nodes(&path, XmlNode::from(doc.root())).unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(adapter
            .select_nodes(&CompiledPath::compile("1").unwrap(), XmlNode::from(doc.root()))
            .is_err());
    }
}
