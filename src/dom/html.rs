//! HTML bridge: parse trusted markup into detached arena nodes and
//! serialize arena subtrees back to markup.
//!
//! Parsing goes through `scraper` (html5ever) in fragment mode, so the
//! tree-building rules match a browser's `innerHTML` setter.

use super::document::Document;
use super::node::{NodeData, NodeId};
use scraper::{ElementRef, Html, Node};

/// Parse `html` into a sequence of detached top-level nodes.
///
/// The returned nodes belong to `doc` but are not attached anywhere.
pub fn parse_fragment(doc: &mut Document, html: &str) -> Vec<NodeId> {
    let fragment = Html::parse_fragment(html);
    import_children(doc, fragment.root_element())
}

fn import_children(doc: &mut Document, element: ElementRef<'_>) -> Vec<NodeId> {
    let mut imported = Vec::new();
    for child in element.children() {
        let id = match child.value() {
            Node::Text(text) => doc.create_text(&**text),
            Node::Comment(comment) => doc.create_comment(&**comment),
            Node::Element(_) => match ElementRef::wrap(child) {
                Some(child_element) => import_element(doc, child_element),
                None => continue,
            },
            _ => continue,
        };
        imported.push(id);
    }
    imported
}

fn import_element(doc: &mut Document, element: ElementRef<'_>) -> NodeId {
    let value = element.value();
    let id = doc.create_element_with(value.name(), value.attrs());
    for child in import_children(doc, element) {
        doc.append_child(id, child);
    }
    id
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

/// Append `value` escaped for a double-quoted attribute.
pub fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.data(id) {
        Some(NodeData::Text(text)) => escape_text(text, out),
        Some(NodeData::Comment(text)) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Some(NodeData::Element(element)) => {
            out.push('<');
            out.push_str(element.tag());
            for (name, value) in element.attrs() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');
            if element.is_void() {
                return;
            }
            for &child in doc.children(id) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(element.tag());
            out.push('>');
        }
        None => {}
    }
}

impl Document {
    /// Serialize the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            write_node(self, child, &mut out);
        }
        out
    }

    /// Serialize `id` itself, including its own tag.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        write_node(self, id, &mut out);
        out
    }

    /// Replace `target` with the nodes parsed from `html` (an outer swap).
    ///
    /// Returns `false` without touching anything if `target` is not
    /// attached to a parent.
    pub fn replace_with_html(&mut self, target: NodeId, html: &str) -> bool {
        let Some(parent) = self.parent(target) else {
            return false;
        };
        for node in parse_fragment(self, html) {
            self.insert_before(parent, node, Some(target));
        }
        self.remove(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_top_level_nodes() {
        let mut doc = Document::new();
        let nodes = parse_fragment(&mut doc, "<p>One</p>\n<p>Two <em>2</em></p>");
        assert_eq!(nodes.len(), 3);
        assert_eq!(doc.element(nodes[0]).unwrap().tag(), "p");
        assert_eq!(doc.text(nodes[1]), Some("\n"));
        assert_eq!(doc.text_content(nodes[2]), "Two 2");
        assert!(nodes.iter().all(|&n| !doc.is_connected(n)));
        assert_eq!(doc.mutation_count(), 0);
    }

    #[test]
    fn test_parse_keeps_attributes_and_comments() {
        let mut doc = Document::new();
        let nodes = parse_fragment(&mut doc, "<a href=\"/x\" title=\"t\">x</a><!-- note -->");
        let link = doc.element(nodes[0]).unwrap();
        assert_eq!(link.attr("href"), Some("/x"));
        assert_eq!(link.attr("title"), Some("t"));
        assert!(matches!(doc.data(nodes[1]), Some(NodeData::Comment(c)) if c == " note "));
    }

    #[test]
    fn test_inner_html_round_trip_shape() {
        let mut doc = Document::new();
        let root = doc.root();
        for node in parse_fragment(&mut doc, "<p>a &amp; b<br>c</p><pre><code>x &lt; y\n</code></pre>") {
            doc.append_child(root, node);
        }
        assert_eq!(
            doc.inner_html(root),
            "<p>a &amp; b<br>c</p><pre><code>x &lt; y\n</code></pre>"
        );
    }

    #[test]
    fn test_outer_html_escapes_attributes() {
        let mut doc = Document::new();
        let span = doc.create_element_with("span", [("title", "say \"hi\" & go")]);
        assert_eq!(
            doc.outer_html(span),
            "<span title=\"say &quot;hi&quot; &amp; go\"></span>"
        );
    }

    #[test]
    fn test_replace_with_html() {
        let mut doc = Document::new();
        let root = doc.root();
        let before = doc.create_text("A");
        let slot = doc.create_element_with("div", [("id", "chips")]);
        let after = doc.create_text("Z");
        doc.append_child(root, before);
        doc.append_child(root, slot);
        doc.append_child(root, after);

        assert!(doc.replace_with_html(slot, "<ul><li>chip</li></ul>"));
        assert_eq!(doc.inner_html(root), "A<ul><li>chip</li></ul>Z");
        assert!(!doc.contains(slot));
        assert!(!doc.replace_with_html(slot, "<p>late</p>"));
    }
}
