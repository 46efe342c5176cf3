//! Element locators used by the workflow

use std::fmt;

/// How an element is addressed on the page.
///
/// Most of the workflow runs on CSS selectors; the submission control can
/// only be reached by matching its text, which needs an XPath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

impl Locator {
    /// JavaScript expression that resolves this locator to an element or
    /// `null`, for use inside injected scripts.
    pub fn js_lookup(&self) -> String {
        match self {
            Locator::Css(selector) => {
                let literal = serde_json::to_string(selector)
                    .unwrap_or_else(|_| format!("\"{}\"", selector));
                format!("document.querySelector({literal})")
            }
            Locator::XPath(path) => {
                let literal =
                    serde_json::to_string(path).unwrap_or_else(|_| format!("\"{}\"", path));
                format!(
                    "document.evaluate({literal}, document, null, \
                     XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
                )
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css={selector}"),
            Locator::XPath(path) => write!(f, "xpath={path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_lookup_uses_query_selector() {
        let js = Locator::Css("#preview_start_button").js_lookup();
        assert!(js.contains("document.querySelector(\"#preview_start_button\")"));
    }

    #[test]
    fn xpath_lookup_uses_document_evaluate() {
        let js = Locator::XPath("//nobr[contains(text(), '提交')]/..").js_lookup();
        assert!(js.contains("document.evaluate"));
        assert!(js.contains("FIRST_ORDERED_NODE_TYPE"));
    }

    #[test]
    fn display_names_the_scheme() {
        assert_eq!(Locator::Css("#un").to_string(), "css=#un");
    }
}
