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

//! Evaluation tests for location paths against real documents

use pretty_assertions::assert_eq;
use rstest::rstest;
use xmlmap_path::{CompiledPath, PathError, PathValue, XmlNode};

const FEED: &str = r#"<feed>
    <events>
        <event id="10" price="True">
            <title>event1</title>
            <tags><tag>music</tag><tag>jazz</tag></tags>
        </event>
        <event id="11">
            <title>event2</title>
            <runtime>123</runtime>
        </event>
    </events>
    <places>
        <place id="p1">
            <persons>
                <person><name>Ann</name><role>host</role></person>
            </persons>
        </place>
    </places>
</feed>"#;

fn evaluate_string(xml: &str, expression: &str) -> String {
    let doc = roxmltree::Document::parse(xml).unwrap();
    let path = CompiledPath::compile(expression).unwrap();
    path.evaluate(XmlNode::from(doc.root()))
        .unwrap()
        .to_xpath_string()
}

fn select_labels(xml: &str, expression: &str) -> Vec<String> {
    let doc = roxmltree::Document::parse(xml).unwrap();
    let path = CompiledPath::compile(expression).unwrap();
    path.select(XmlNode::from(doc.root()))
        .unwrap()
        .iter()
        .map(|n| format!("{}={}", n.label(), n.string_value().trim()))
        .collect()
}

#[rstest]
#[case("/feed/events/event/title", vec!["title=event1", "title=event2"])]
#[case("feed/events/event/@id", vec!["@id=10", "@id=11"])]
#[case("//tag", vec!["tag=music", "tag=jazz"])]
#[case("//tag[2]", vec!["tag=jazz"])]
#[case("//tag[last()]", vec!["tag=jazz"])]
#[case("//event[runtime > 100]/@id", vec!["@id=11"])]
#[case("//event[@id = '10']/title", vec!["title=event1"])]
#[case("//event[not(@price)]/title", vec!["title=event2"])]
#[case("//person/name/../role", vec!["role=host"])]
#[case("//name/ancestor::place/@id", vec!["@id=p1"])]
#[case("//title | //role", vec!["title=event1", "title=event2", "role=host"])]
#[case("//event[1]/following-sibling::event/@id", vec!["@id=11"])]
#[case("//tag[2]/preceding-sibling::tag", vec!["tag=music"])]
#[case("/nothing/here", vec![])]
fn test_select(#[case] expression: &str, #[case] expected: Vec<&str>) {
    assert_eq!(select_labels(FEED, expression), expected);
}

#[rstest]
#[case("string(//event/@id)", "10")]
#[case("count(//event)", "2")]
#[case("boolean(//event[1]/@price)", "true")]
#[case("boolean(//event[2]/@price)", "false")]
#[case("concat(//event[1]/@id, '-', //event[2]/@id)", "10-11")]
#[case("normalize-space('  a   b ')", "a b")]
#[case("substring-before('2024-01-02', '-')", "2024")]
#[case("substring-after('2024-01-02', '-')", "01-02")]
#[case("string-length('abc')", "3")]
#[case("translate('abc', 'abc', 'ABC')", "ABC")]
#[case("sum(//runtime) * 2", "246")]
#[case("7 mod 3", "1")]
#[case("7 div 2", "3.5")]
#[case("-(3)", "-3")]
#[case("round(2.5)", "3")]
#[case("floor(-1.5)", "-2")]
#[case("number('abc')", "NaN")]
#[case("\"0\"", "0")]
#[case("1 = 1 and 2 != 3", "true")]
#[case("//tag = 'jazz'", "true")]
#[case("//tag != 'jazz'", "true")]
#[case("starts-with(local-name(/*), 'fe')", "true")]
fn test_scalar_results(#[case] expression: &str, #[case] expected: &str) {
    assert_eq!(evaluate_string(FEED, expression), expected);
}

#[test]
fn test_relative_to_context_node() {
    let doc = roxmltree::Document::parse(FEED).unwrap();
    let events = CompiledPath::compile("/feed/events/event")
        .unwrap()
        .select(XmlNode::from(doc.root()))
        .unwrap();
    assert_eq!(events.len(), 2);

    let title = CompiledPath::compile("title").unwrap();
    let titles: Vec<String> = events
        .iter()
        .map(|e| title.evaluate(*e).unwrap().to_xpath_string())
        .collect();
    assert_eq!(titles, vec!["event1", "event2"]);

    let position = CompiledPath::compile("count(preceding-sibling::event) + 1").unwrap();
    assert_eq!(
        position.evaluate(events[1]).unwrap(),
        PathValue::Number(2.0)
    );
}

#[test]
fn test_attribute_context() {
    let doc = roxmltree::Document::parse(r#"<a id="x"><b/></a>"#).unwrap();
    let attrs = CompiledPath::compile("/a/@id")
        .unwrap()
        .select(XmlNode::from(doc.root()))
        .unwrap();
    assert_eq!(attrs.len(), 1);
    let parent = CompiledPath::compile("..").unwrap().select(attrs[0]).unwrap();
    assert_eq!(parent[0].label(), "a");
    // attributes have no children
    let children = CompiledPath::compile("*").unwrap().select(attrs[0]).unwrap();
    assert!(children.is_empty());
}

#[test]
fn test_select_requires_node_set() {
    let doc = roxmltree::Document::parse("<a/>").unwrap();
    let path = CompiledPath::compile("'literal'").unwrap();
    assert_eq!(
        path.select(XmlNode::from(doc.root())),
        Err(PathError::NotANodeSet { actual: "string" })
    );
}

#[test]
fn test_runtime_type_errors() {
    let doc = roxmltree::Document::parse("<a/>").unwrap();
    let path = CompiledPath::compile("count('x')").unwrap();
    assert_eq!(
        path.evaluate(XmlNode::from(doc.root())),
        Err(PathError::NotANodeSet { actual: "string" })
    );
    let union = CompiledPath::compile("a | 1").unwrap();
    assert!(union.evaluate(XmlNode::from(doc.root())).is_err());
}

#[test]
fn test_display_keeps_source() {
    let path = CompiledPath::compile("id/@value").unwrap();
    assert_eq!(path.to_string(), "id/@value");
    assert_eq!(path.source(), "id/@value");
}
