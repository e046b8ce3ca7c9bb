/// A text run after a rewrite pass: either left as-is or wrapped in a
/// highlight marker element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    pub text: String,
    pub highlighted: bool,
}

impl TextSegment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: false,
        }
    }

    pub fn highlighted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: true,
        }
    }
}

/// What the widget needs from the page it is embedded in: body-level
/// class toggles, stylesheet injection, and a text-rewriting hook.
/// Keeping this a trait lets the session logic run against an in-memory
/// tree in tests and against a real DOM binding in a host.
pub trait DocumentSurface {
    fn add_body_class(&mut self, class: &str);
    fn remove_body_class(&mut self, class: &str);
    fn has_body_class(&self, class: &str) -> bool;
    fn inject_stylesheet(&mut self, css: &str);

    /// Visit every visible text node (script/style subtrees,
    /// widget-owned subtrees, and whitespace-only nodes are skipped)
    /// and replace the node with the returned segments; highlighted
    /// segments become marker elements. `None` leaves the node
    /// untouched.
    fn rewrite_text_nodes(&mut self, rewrite: &dyn Fn(&str) -> Option<Vec<TextSegment>>);
}

pub const HIGHLIGHT_CLASS: &str = "attune-highlight";

const WIDGET_OWNED_CLASSES: [&str; 2] = ["attune-widget-button", "attune-widget-panel"];
const SKIPPED_TAGS: [&str; 2] = ["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub classes: Vec<String>,
    pub children: Vec<Node>,
}

impl Default for Element {
    fn default() -> Self {
        Element::new("body")
    }
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|existing| existing == class)
    }

    /// Concatenated text of the subtree, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// All descendant elements (including self) carrying `class`.
    pub fn find_all_by_class<'a>(&'a self, class: &str, out: &mut Vec<&'a Element>) {
        if self.has_class(class) {
            out.push(self);
        }
        for child in &self.children {
            if let Node::Element(element) = child {
                element.find_all_by_class(class, out);
            }
        }
    }

    fn is_skipped(&self) -> bool {
        SKIPPED_TAGS.contains(&self.tag.as_str())
            || WIDGET_OWNED_CLASSES
                .iter()
                .any(|class| self.has_class(class))
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) => collect_text(child, out),
        }
    }
}

/// In-memory page tree. Tests and non-browser hosts drive the widget
/// against this; a browser host supplies its own `DocumentSurface`.
#[derive(Debug, Clone, Default)]
pub struct PageDocument {
    body: Element,
    stylesheets: Vec<String>,
}

impl PageDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(body: Element) -> Self {
        Self {
            body,
            stylesheets: Vec::new(),
        }
    }

    pub fn body(&self) -> &Element {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Element {
        &mut self.body
    }

    pub fn stylesheets(&self) -> &[String] {
        &self.stylesheets
    }

    pub fn highlight_count(&self) -> usize {
        let mut found = Vec::new();
        self.body.find_all_by_class(HIGHLIGHT_CLASS, &mut found);
        found.len()
    }
}

impl DocumentSurface for PageDocument {
    fn add_body_class(&mut self, class: &str) {
        if !self.body.has_class(class) {
            self.body.classes.push(class.to_string());
        }
    }

    fn remove_body_class(&mut self, class: &str) {
        self.body.classes.retain(|existing| existing != class);
    }

    fn has_body_class(&self, class: &str) -> bool {
        self.body.has_class(class)
    }

    fn inject_stylesheet(&mut self, css: &str) {
        self.stylesheets.push(css.to_string());
    }

    fn rewrite_text_nodes(&mut self, rewrite: &dyn Fn(&str) -> Option<Vec<TextSegment>>) {
        rewrite_element(&mut self.body, rewrite);
    }
}

fn rewrite_element(element: &mut Element, rewrite: &dyn Fn(&str) -> Option<Vec<TextSegment>>) {
    for child in &mut element.children {
        match child {
            Node::Element(child) => {
                if !child.is_skipped() {
                    rewrite_element(child, rewrite);
                }
            }
            Node::Text(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                if let Some(segments) = rewrite(text) {
                    *child = Node::Element(wrap_segments(&segments));
                }
            }
        }
    }
}

fn wrap_segments(segments: &[TextSegment]) -> Element {
    let mut wrapper = Element::new("span");
    for segment in segments {
        if segment.highlighted {
            wrapper.children.push(Node::Element(
                Element::new("span")
                    .with_class(HIGHLIGHT_CLASS)
                    .with_text(segment.text.clone()),
            ));
        } else {
            wrapper.children.push(Node::Text(segment.text.clone()));
        }
    }
    wrapper
}
