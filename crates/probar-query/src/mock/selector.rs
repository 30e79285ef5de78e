//! Selector subset understood by [`super::MemoryTree`].
//!
//! Supported: type selectors and `*`, `.class`, `#id`, `[attr]`,
//! `[attr=value]` (value bare or quoted), compound selectors, the
//! descendant and `>` child combinators, and comma-separated groups.
//! Anything else fails to parse and matches nothing.

use std::sync::OnceLock;

use regex::Regex;

static SIMPLE: OnceLock<Regex> = OnceLock::new();

fn simple_selector() -> &'static Regex {
    SIMPLE.get_or_init(|| {
        Regex::new(
            r#"^(?:(?P<tag>\*|[A-Za-z][\w-]*)|\.(?P<class>[\w-]+)|#(?P<id>[\w-]+)|\[(?P<attr>[\w-]+)(?:=(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[\w-]+)))?\])"#,
        )
        .expect("simple selector pattern is valid")
    })
}

/// What the matcher needs to know about a node
pub(crate) trait Matchable: Copy {
    fn tag(&self) -> &str;
    fn attribute(&self, name: &str) -> Option<&str>;
    fn parent(&self) -> Option<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn parse(source: &str) -> Option<Self> {
        let mut compound = Self::default();
        let mut rest = source;
        let mut first = true;

        while !rest.is_empty() {
            let captures = simple_selector().captures(rest)?;
            if let Some(tag) = captures.name("tag") {
                if !first {
                    return None;
                }
                if tag.as_str() != "*" {
                    compound.tag = Some(tag.as_str().to_ascii_lowercase());
                }
            } else if let Some(class) = captures.name("class") {
                compound.classes.push(class.as_str().to_string());
            } else if let Some(id) = captures.name("id") {
                compound.ids.push(id.as_str().to_string());
            } else if let Some(attr) = captures.name("attr") {
                let value = captures
                    .name("dq")
                    .or_else(|| captures.name("sq"))
                    .or_else(|| captures.name("bare"))
                    .map(|m| m.as_str().to_string());
                compound.attributes.push((attr.as_str().to_string(), value));
            }
            rest = &rest[captures.get(0)?.end()..];
            first = false;
        }

        (!first).then_some(compound)
    }

    fn matches(&self, node: &impl Matchable) -> bool {
        if self
            .tag
            .as_deref()
            .is_some_and(|tag| !node.tag().eq_ignore_ascii_case(tag))
        {
            return false;
        }
        if !self.ids.iter().all(|id| node.attribute("id") == Some(id.as_str())) {
            return false;
        }
        let classes = node.attribute("class").unwrap_or_default();
        if !self
            .classes
            .iter()
            .all(|class| classes.split_whitespace().any(|c| c == class))
        {
            return false;
        }
        self.attributes.iter().all(|(name, expected)| {
            match (node.attribute(name), expected.as_deref()) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
            }
        })
    }
}

/// `a b > c`: compounds left to right, `combinators[i]` sits between
/// `compounds[i]` and `compounds[i + 1]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl Complex {
    fn parse(source: &str) -> Option<Self> {
        let spaced = source.replace('>', " > ");
        let mut compounds = Vec::new();
        let mut combinators = Vec::new();
        let mut pending = None;

        for token in spaced.split_whitespace() {
            if token == ">" {
                if compounds.is_empty() || pending.is_some() {
                    return None;
                }
                pending = Some(Combinator::Child);
                continue;
            }
            if !compounds.is_empty() {
                combinators.push(pending.take().unwrap_or(Combinator::Descendant));
            }
            compounds.push(Compound::parse(token)?);
        }

        if compounds.is_empty() || pending.is_some() {
            return None;
        }
        Some(Self {
            compounds,
            combinators,
        })
    }
}

/// A parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Selector {
    groups: Vec<Complex>,
}

impl Selector {
    /// Parse `source`; `None` if it uses anything outside the subset
    pub(crate) fn parse(source: &str) -> Option<Self> {
        let groups = source
            .split(',')
            .map(Complex::parse)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { groups })
    }

    /// Whether `node` matches
    pub(crate) fn matches(&self, node: impl Matchable) -> bool {
        self.groups
            .iter()
            .any(|complex| matches_at(node, &complex.compounds, &complex.combinators))
    }
}

fn matches_at<N: Matchable>(node: N, compounds: &[Compound], combinators: &[Combinator]) -> bool {
    let Some((last, init)) = compounds.split_last() else {
        return true;
    };
    if !last.matches(&node) {
        return false;
    }
    let Some((&combinator, outer)) = combinators.split_last() else {
        return true;
    };

    match combinator {
        Combinator::Child => {
            node.parent().is_some_and(|up| matches_at(up, init, outer))
        }
        Combinator::Descendant => {
            let mut ancestor = node.parent();
            while let Some(up) = ancestor {
                if matches_at(up, init, outer) {
                    return true;
                }
                ancestor = up.parent();
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Node in a fixed test chain: index 0 is the root
    #[derive(Clone, Copy)]
    struct Fixture<'a> {
        nodes: &'a [(&'a str, &'a [(&'a str, &'a str)])],
        index: usize,
    }

    impl Matchable for Fixture<'_> {
        fn tag(&self) -> &str {
            self.nodes[self.index].0
        }

        fn attribute(&self, name: &str) -> Option<&str> {
            self.nodes[self.index]
                .1
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
        }

        fn parent(&self) -> Option<Self> {
            self.index.checked_sub(1).map(|index| Self { index, ..*self })
        }
    }

    const CHAIN: &[(&str, &[(&str, &str)])] = &[
        ("body", &[]),
        ("form", &[("class", "login wide"), ("id", "f")]),
        ("div", &[("class", "row")]),
        ("input", &[("type", "text"), ("name", "user")]),
    ];

    fn matches(selector: &str, index: usize) -> bool {
        let node = Fixture {
            nodes: CHAIN,
            index,
        };
        Selector::parse(selector).is_some_and(|s| s.matches(node))
    }

    #[test]
    fn test_simple_selectors() {
        assert!(matches("input", 3));
        assert!(matches("INPUT", 3));
        assert!(matches("*", 2));
        assert!(matches(".login", 1));
        assert!(matches(".wide.login", 1));
        assert!(!matches(".log", 1));
        assert!(matches("#f", 1));
        assert!(matches("form#f.login", 1));
        assert!(matches("[type]", 3));
        assert!(matches("[type=text]", 3));
        assert!(matches("[name='user']", 3));
        assert!(matches("[name=\"user\"]", 3));
        assert!(!matches("[type=password]", 3));
    }

    #[test]
    fn test_combinators() {
        assert!(matches("form input", 3));
        assert!(matches("body form .row input", 3));
        assert!(matches(".row > input", 3));
        assert!(matches(".row>input", 3));
        assert!(!matches("form > input", 3));
        assert!(!matches("input form", 1));
    }

    #[test]
    fn test_groups() {
        assert!(matches("select, input", 3));
        assert!(!matches("select, textarea", 3));
    }

    #[test]
    fn test_unsupported_syntax_is_rejected() {
        assert!(Selector::parse("div:nth-child(1)").is_none());
        assert!(Selector::parse("div + p").is_none());
        assert!(Selector::parse("> div").is_none());
        assert!(Selector::parse("").is_none());
        assert!(Selector::parse("a,").is_none());
        assert!(Selector::parse(".a.b > #c [d=e]").is_some());
    }
}
