use ego_tree::iter::Edge;
use scraper::node::Node;
use scraper::{Html, Selector};

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub heading: Option<String>,
    pub text: String,
}

/// Pull the `<title>` and a flat text rendering out of an HTML document.
///
/// The text is every text node in document order, concatenated as-is.
/// Whitespace is not normalized; only the leading prefix is ever sent on.
pub fn extract_page(html: &str) -> ExtractedPage {
    let doc = Html::parse_document(html);
    ExtractedPage {
        heading: extract_title(&doc),
        text: extract_text(&doc),
    }
}

fn extract_title(doc: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").ok()?;
    doc.select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn extract_text(doc: &Html) -> String {
    let mut text = String::new();
    let mut hidden_depth = 0usize;

    for edge in doc.tree.root().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(element) if is_hidden(element.name()) => hidden_depth += 1,
                Node::Text(fragment) if hidden_depth == 0 => text.push_str(fragment),
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(element) = node.value() {
                    if is_hidden(element.name()) {
                        hidden_depth = hidden_depth.saturating_sub(1);
                    }
                }
            }
        }
    }

    text
}

fn is_hidden(name: &str) -> bool {
    HIDDEN_ELEMENTS
        .iter()
        .any(|hidden| hidden.eq_ignore_ascii_case(name))
}
