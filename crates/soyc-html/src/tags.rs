//! Static classification of HTML tag names.
//!
//! Dynamic names (`<{$tag}>`) are never void, optional or foreign. A dynamic
//! name on a close tag is a wildcard: it closes whatever is open.

use soyc_ast::TagName;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

const FOREIGN_CONTENT: &[&str] = &["svg", "math"];

const DEFINITELY_OPTIONAL: &[&str] = &[
    "li", "dt", "dd", "rb", "rt", "rtc", "rp", "optgroup", "option", "p", "thead", "tbody",
    "tfoot", "tr", "td", "th", "colgroup", "caption",
];

/// Elements whose start tag may be omitted, so a stray close is tolerated.
const EXCLUDED_OPTIONAL: &[&str] = &["html", "head", "body", "tbody", "colgroup"];

/// Block-level starts that close an open `<p>`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "dialog", "div", "dl", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hgroup", "hr", "main", "menu", "nav", "ol", "p", "pre", "section", "table", "ul",
];

/// Close tags that do *not* close an open `<p>`.
const KEEPS_P_OPEN: &[&str] = &["a", "audio", "del", "ins", "map", "noscript", "video"];

pub trait TagNameExt {
    /// Can never have content or a close tag.
    fn is_void(&self) -> bool;
    /// Close tag may be omitted because another tag implies it.
    fn is_definitely_optional(&self) -> bool;
    /// Opens an SVG or MathML subtree.
    fn is_foreign_content(&self) -> bool;
    /// A close tag with this name may appear without a matching open.
    fn is_excluded_optional(&self) -> bool;
    /// Only meaningful for close tags.
    fn is_wildcard(&self) -> bool;
}

impl TagNameExt for TagName {
    fn is_void(&self) -> bool {
        self.static_name()
            .is_some_and(|name| VOID_ELEMENTS.contains(&name))
    }

    fn is_definitely_optional(&self) -> bool {
        self.static_name()
            .is_some_and(|name| DEFINITELY_OPTIONAL.contains(&name))
    }

    fn is_foreign_content(&self) -> bool {
        self.static_name()
            .is_some_and(|name| FOREIGN_CONTENT.contains(&name))
    }

    fn is_excluded_optional(&self) -> bool {
        self.static_name()
            .is_some_and(|name| EXCLUDED_OPTIONAL.contains(&name))
    }

    fn is_wildcard(&self) -> bool {
        !self.is_static()
    }
}

/// Whether opening `open` implicitly closes the currently open `optional`.
#[must_use]
pub fn open_closes_optional(open: &TagName, optional: &TagName) -> bool {
    match (open.static_name(), optional.static_name()) {
        (Some(open), Some(optional)) => open_closes(open, optional),
        _ => false,
    }
}

/// Whether opening `open` would implicitly close some optional tag, were
/// one open.
#[must_use]
pub fn may_close_optional(open: &TagName) -> bool {
    open.static_name().is_some_and(|open| {
        DEFINITELY_OPTIONAL
            .iter()
            .any(|optional| open_closes(open, optional))
    })
}

fn open_closes(open: &str, optional: &str) -> bool {
    match optional {
        "li" => open == "li",
        "dt" | "dd" => matches!(open, "dt" | "dd"),
        "rb" | "rt" | "rtc" | "rp" => matches!(open, "rb" | "rt" | "rtc" | "rp"),
        "optgroup" => open == "optgroup",
        "option" => matches!(open, "option" | "optgroup"),
        "p" => CLOSES_P.contains(&open),
        "thead" | "tbody" | "tfoot" => matches!(open, "tbody" | "tfoot"),
        "tr" => matches!(open, "tr" | "tbody" | "tfoot"),
        "td" | "th" => matches!(open, "td" | "th" | "tr" | "tbody" | "tfoot"),
        "colgroup" | "caption" => matches!(open, "colgroup" | "thead" | "tbody" | "tfoot" | "tr"),
        _ => false,
    }
}

/// Whether closing `close` implicitly closes the currently open `optional`.
#[must_use]
pub fn close_closes_optional(close: &TagName, optional: &TagName) -> bool {
    let (Some(close), Some(optional)) = (close.static_name(), optional.static_name()) else {
        return false;
    };

    match optional {
        "li" => matches!(close, "ul" | "ol" | "menu"),
        "dt" | "dd" => close == "dl",
        "rb" | "rt" | "rtc" | "rp" => close == "ruby",
        "optgroup" => close == "select",
        "option" => matches!(close, "select" | "datalist" | "optgroup"),
        "p" => !KEEPS_P_OPEN.contains(&close),
        "thead" | "tbody" | "tfoot" | "colgroup" | "caption" => close == "table",
        "tr" => matches!(close, "table" | "thead" | "tbody" | "tfoot"),
        "td" | "th" => matches!(close, "tr" | "table" | "thead" | "tbody" | "tfoot"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use soyc_ast::Expr;

    use super::*;

    fn name(name: &str) -> TagName {
        TagName::new_static(name)
    }

    #[test]
    fn classifications() {
        assert!(name("BR").is_void());
        assert!(name("img").is_void());
        assert!(!name("div").is_void());
        assert!(name("li").is_definitely_optional());
        assert!(!name("ul").is_definitely_optional());
        assert!(name("svg").is_foreign_content());
        assert!(name("math").is_foreign_content());
        assert!(name("tbody").is_excluded_optional());
        assert!(!name("tr").is_excluded_optional());
    }

    #[test]
    fn dynamic_names_are_wildcards_only() {
        let dynamic = TagName::Dynamic(Expr::var("tag"));
        assert!(dynamic.is_wildcard());
        assert!(!dynamic.is_void());
        assert!(!dynamic.is_definitely_optional());
        assert!(!dynamic.is_foreign_content());
        assert!(!dynamic.is_excluded_optional());
        assert!(!name("div").is_wildcard());
        assert!(!open_closes_optional(&dynamic, &name("li")));
        assert!(!close_closes_optional(&dynamic, &name("p")));
    }

    #[test]
    fn open_tags_close_optional_siblings() {
        assert!(open_closes_optional(&name("li"), &name("li")));
        assert!(open_closes_optional(&name("dd"), &name("dt")));
        assert!(open_closes_optional(&name("tr"), &name("td")));
        assert!(open_closes_optional(&name("div"), &name("p")));
        assert!(open_closes_optional(&name("h3"), &name("p")));
        assert!(!open_closes_optional(&name("span"), &name("p")));
        assert!(!open_closes_optional(&name("td"), &name("tr")));
        assert!(!open_closes_optional(&name("li"), &name("div")));
    }

    #[test]
    fn some_opens_may_close_an_outer_optional() {
        assert!(may_close_optional(&name("li")));
        assert!(may_close_optional(&name("div")));
        assert!(may_close_optional(&name("tr")));
        assert!(!may_close_optional(&name("span")));
        assert!(!may_close_optional(&name("b")));
        assert!(!may_close_optional(&TagName::Dynamic(Expr::var("tag"))));
    }

    #[test]
    fn close_tags_close_optional_children() {
        assert!(close_closes_optional(&name("ul"), &name("li")));
        assert!(close_closes_optional(&name("table"), &name("td")));
        assert!(close_closes_optional(&name("div"), &name("p")));
        assert!(!close_closes_optional(&name("a"), &name("p")));
        assert!(!close_closes_optional(&name("div"), &name("li")));
    }
}
