//! Markup parser – turns résumé HTML into an element tree.
//!
//! Only the subset a static résumé page uses is understood. Unknown tags are
//! kept and laid out as blocks; `<script>`, `<style>` and `<head>` content is
//! dropped; `<svg>` icons keep their attributes but lose their path data.

use std::collections::HashMap;

/// Tag name of a parsed element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Body,
    Div,
    Section,
    Header,
    Footer,
    Main,
    P,
    H1,
    H2,
    H3,
    H4,
    Ul,
    Ol,
    Li,
    Span,
    A,
    Strong,
    Em,
    Img,
    Svg,
    Br,
    Hr,
    Button,
    Other(String),
}

impl Tag {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "body" => Tag::Body,
            "div" => Tag::Div,
            "section" => Tag::Section,
            "header" => Tag::Header,
            "footer" => Tag::Footer,
            "main" => Tag::Main,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "span" => Tag::Span,
            "a" => Tag::A,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Em,
            "img" => Tag::Img,
            "svg" => Tag::Svg,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            "button" => Tag::Button,
            other => Tag::Other(other.to_string()),
        }
    }

    /// Elements that flow inside a line of text.
    pub fn is_inline(&self) -> bool {
        matches!(self, Tag::Span | Tag::A | Tag::Strong | Tag::Em | Tag::Br)
    }
}

/// A node in the element tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element with its attributes and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    /// Depth-first search for the element carrying `id`.
    pub fn find_by_id(&self, id: &str) -> Option<&ElementNode> {
        if self.id() == Some(id) {
            return Some(self);
        }
        find_by_id(&self.children, id)
    }
}

/// Search a forest for the element carrying `id`.
pub fn find_by_id<'a>(nodes: &'a [DomNode], id: &str) -> Option<&'a ElementNode> {
    nodes.iter().find_map(|node| match node {
        DomNode::Element(e) => e.find_by_id(id),
        DomNode::Text(_) => None,
    })
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

const VOID_ELEMENTS: &[&str] = &[
    "img", "br", "hr", "input", "meta", "link", "source", "area", "col", "wbr",
];

/// Elements whose content is skipped wholesale.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "title", "template"];

/// Parse an HTML document or fragment into a forest of nodes.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser { src: html, pos: 0 };
    let (nodes, _) = parser.parse_children(None);
    nodes
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Parse nodes until the closing tag of `open` (or EOF). Returns the
    /// nodes and whether the closing tag was consumed.
    fn parse_children(&mut self, open: Option<&str>) -> (Vec<DomNode>, bool) {
        let mut nodes = Vec::new();
        while self.pos < self.src.len() {
            let rest = self.rest();
            if let Some(after) = rest.strip_prefix("</") {
                let name_len = after
                    .find(|c: char| c == '>' || c.is_whitespace())
                    .unwrap_or(after.len());
                let name = after[..name_len].to_ascii_lowercase();
                match open {
                    Some(open) if open == name => {
                        self.skip_past('>');
                        return (nodes, true);
                    }
                    // A stray close for some ancestor ends this element too.
                    Some(_) => return (nodes, false),
                    None => {
                        self.skip_past('>');
                        continue;
                    }
                }
            }
            if rest.starts_with("<!--") {
                match rest.find("-->") {
                    Some(end) => self.pos += end + 3,
                    None => self.pos = self.src.len(),
                }
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past('>');
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                if let Some(node) = self.parse_element() {
                    nodes.push(node);
                }
            } else {
                let first = rest.chars().next().map_or(1, char::len_utf8);
                let len = rest[first..]
                    .find('<')
                    .map_or(rest.len(), |i| i + first);
                let text = &rest[..len];
                self.pos += len;
                if !text.trim().is_empty() {
                    nodes.push(DomNode::Text(decode_entities(text)));
                } else if !text.is_empty() && !nodes.is_empty() {
                    // Keep a single space between inline siblings.
                    nodes.push(DomNode::Text(" ".to_string()));
                }
            }
        }
        (nodes, false)
    }

    fn parse_element(&mut self) -> Option<DomNode> {
        self.pos += 1; // '<'
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':');
        let lower = name.to_ascii_lowercase();
        let mut element = ElementNode::new(Tag::parse(&lower));

        let mut self_closed = false;
        loop {
            self.take_while(char::is_whitespace);
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closed = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            let (key, value) = self.parse_attribute();
            if !key.is_empty() {
                element.attributes.entry(key).or_insert(value);
            }
        }

        if SKIPPED_ELEMENTS.contains(&lower.as_str()) {
            if !self_closed {
                self.skip_raw_content(&lower);
            }
            return None;
        }
        if self_closed || VOID_ELEMENTS.contains(&lower.as_str()) {
            return Some(DomNode::Element(element));
        }
        if element.tag == Tag::Svg {
            // Icon geometry is not rendered; only the box matters.
            self.skip_raw_content("svg");
            return Some(DomNode::Element(element));
        }

        let (children, _) = self.parse_children(Some(&lower));
        element.children = children;
        Some(DomNode::Element(element))
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self
            .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
            .to_ascii_lowercase();
        if key.is_empty() {
            // Unparseable byte; step over it.
            if let Some(c) = self.rest().chars().next() {
                self.pos += c.len_utf8();
            }
            return (key, String::new());
        }
        self.take_while(char::is_whitespace);
        if !self.rest().starts_with('=') {
            return (key, String::new());
        }
        self.pos += 1;
        self.take_while(char::is_whitespace);

        let rest = self.rest();
        let value = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let body = &rest[1..];
                let end = body.find(q).unwrap_or(body.len());
                self.pos += 1 + end + usize::from(end < body.len());
                decode_entities(&body[..end])
            }
            _ => self
                .take_while(|c| !c.is_whitespace() && c != '>')
                .to_string(),
        };
        (key, value)
    }

    fn skip_raw_content(&mut self, name: &str) {
        let needle = format!("</{name}");
        let lower = self.rest().to_ascii_lowercase();
        match lower.find(&needle) {
            Some(idx) => {
                self.pos += idx;
                self.skip_past('>');
            }
            None => self.pos = self.src.len(),
        }
    }

    fn skip_past(&mut self, c: char) {
        match self.rest().find(c) {
            Some(idx) => self.pos += idx + c.len_utf8(),
            None => self.pos = self.src.len(),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&nbsp;", "\u{00A0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&middot;", "\u{00B7}")
        .replace("&bull;", "\u{2022}")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(nodes: &[DomNode]) -> &ElementNode {
        match nodes.iter().find(|n| matches!(n, DomNode::Element(_))) {
            Some(DomNode::Element(e)) => e,
            _ => panic!("expected an element in {nodes:?}"),
        }
    }

    #[test]
    fn parses_nested_blocks_and_classes() {
        let nodes = parse_html(r#"<div class="flex gap-2"><p>Hi</p><p>There</p></div>"#);
        let div = first_element(&nodes);
        assert_eq!(div.tag, Tag::Div);
        assert_eq!(div.classes().collect::<Vec<_>>(), vec!["flex", "gap-2"]);
        assert_eq!(div.children.len(), 2);
    }

    #[test]
    fn finds_region_by_id() {
        let html = r#"<html><body><div class="x"><main id="resume"><h1>Name</h1></main></div></body></html>"#;
        let nodes = parse_html(html);
        let region = find_by_id(&nodes, "resume").expect("region");
        assert_eq!(region.tag, Tag::Main);
        assert!(find_by_id(&nodes, "missing").is_none());
    }

    #[test]
    fn drops_scripts_styles_and_comments() {
        let html = "<head><title>T</title></head><style>p{color:red}</style><!-- c --><script>let a = '<p>';</script><p>kept</p>";
        let nodes = parse_html(html);
        let elements: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                DomNode::Element(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].tag, Tag::P);
    }

    #[test]
    fn svg_keeps_size_attributes_only() {
        let nodes = parse_html(r#"<svg width="16" height="16"><path d="M0 0"/></svg><span>x</span>"#);
        let svg = first_element(&nodes);
        assert_eq!(svg.tag, Tag::Svg);
        assert_eq!(svg.attr("width"), Some("16"));
        assert!(svg.children.is_empty());
    }

    #[test]
    fn void_and_self_closing_elements() {
        let nodes = parse_html(r#"<img src="a.png"><br/><p>after</p>"#);
        let tags: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                DomNode::Element(e) => Some(e.tag.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(tags, vec![Tag::Img, Tag::Br, Tag::P]);
    }

    #[test]
    fn decodes_entities_in_text_and_attributes() {
        let nodes = parse_html(r#"<p title="a &amp; b">R&amp;D &lt;team&gt;</p>"#);
        let p = first_element(&nodes);
        assert_eq!(p.attr("title"), Some("a & b"));
        match &p.children[0] {
            DomNode::Text(t) => assert_eq!(t, "R&D <team>"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_child_is_closed_by_parent() {
        let nodes = parse_html("<ul><li>one<li>two</ul><p>x</p>");
        let ul = first_element(&nodes);
        assert_eq!(ul.tag, Tag::Ul);
        assert!(!ul.children.is_empty());
        assert!(nodes.len() >= 2);
    }
}
