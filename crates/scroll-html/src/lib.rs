//! Scroll HTML Parser
//!
//! Turns the raw markup returned for a page into a detached
//! [`Fragment`](scroll_dom::Fragment), built on html5ever.

mod parser;

pub use parser::FragmentParser;

use scroll_dom::Fragment;

/// Parse a markup snippet into a detached fragment
pub fn parse_fragment(markup: &str) -> Fragment {
    FragmentParser::new().parse(markup)
}
