//! MathML normalization and LaTeX fallback rendering.
//!
//! Formula images carry their LaTeX in `data-xpm-latex`; they become
//! `<span data-formula>` with a readable plain-text rendition. Real MathML
//! stays, gains thin spaces after function names and drops its duplicated
//! plain-text copy.

use std::sync::LazyLock;

use anyhow::Result;
use kuchiki::iter::NodeIterator;
use kuchiki::NodeRef;
use regex::Regex;

use crate::sanitize::dom;
use crate::sanitize::text::normalize_text;

const MATH_THIN_SPACE: char = '\u{2009}';

const MATH_FUNCTIONS: &[&str] = &["log", "ln", "sin", "cos", "tan", "cot", "sec", "csc"];

/// MathML tags that can directly follow a function name.
const MATH_ATOMIC_TAGS: &[&str] = &[
    "mi", "mn", "mrow", "mfrac", "msup", "msub", "msubsup", "msqrt", "mroot", "mfenced", "mtext",
];

static FN_GLUED_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([A-Za-z0-9])(log|ln|sin|cos|tan|cot|sec|csc)([A-Za-z0-9])")
        .expect("fn glued before: hardcoded regex is valid")
});

static FN_GLUED_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(log|ln|sin|cos|tan|cot|sec|csc)([A-Za-z0-9])")
        .expect("fn glued after: hardcoded regex is valid")
});

static LATEX_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:text|operatorname)\{([^}]+)\}").expect("latex text: hardcoded regex is valid")
});

static LATEX_FRAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\frac\{([^}]+)\}\{([^}]+)\}").expect("latex frac: hardcoded regex is valid")
});

static LATEX_SQRT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\sqrt\{([^}]+)\}").expect("latex sqrt: hardcoded regex is valid"));

static LATEX_SUP_BRACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^\{([^}]+)\}").expect("latex sup braced: hardcoded regex is valid"));

static LATEX_SUP_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^([A-Za-z0-9+\-]+)").expect("latex sup bare: hardcoded regex is valid"));

static LATEX_SUB_BRACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\{([^}]+)\}").expect("latex sub braced: hardcoded regex is valid"));

static LATEX_SUB_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_([A-Za-z0-9+\-]+)").expect("latex sub bare: hardcoded regex is valid"));

static LATEX_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([a-zA-Z]+)").expect("latex command: hardcoded regex is valid"));

/// Converts formula images to text and normalizes MathML subtrees.
pub fn process_latex_formulas(container: &NodeRef) -> Result<()> {
    for link in dom::collect_matches(container, "link[href*=\"gstatic.com/external_hosted\"]")? {
        link.as_node().detach();
    }
    for annotation in dom::collect_matches(container, "annotation")? {
        annotation.as_node().detach();
    }

    for img in dom::collect_matches(container, "img[data-xpm-latex]")? {
        let node = img.as_node();
        let Some(latex) = dom::get_attr(node, "data-xpm-latex") else {
            continue;
        };
        if latex.is_empty() {
            continue;
        }
        let span = dom::create_element("<span data-formula=\"true\"></span>")?;
        span.append(NodeRef::new_text(format_latex(&latex)));
        dom::replace_node(node, &span);
    }

    for math in dom::collect_matches(container, "math")? {
        let node = math.as_node();
        let text = normalize_text(&node.text_contents());
        if text.is_empty() {
            node.detach();
            continue;
        }

        normalize_math_markup(node)?;

        if let Some(plain) = find_nearby_plain_formula(node) {
            plain.detach();
        }

        unwrap_formula_block_parents(node, container);
    }

    for formula in dom::collect_matches(container, "[data-formula]")? {
        let node = formula.as_node();
        if dom::local_name(node).as_deref() == Some("math") {
            continue;
        }

        let text = normalize_formula_fallback_text(&node.text_contents());
        if text.is_empty() {
            node.detach();
            continue;
        }
        dom::set_text(node, &text);
        unwrap_formula_block_parents(node, container);
    }

    Ok(())
}

/// Upright variants for multi-letter identifiers, thin spaces after
/// function names.
pub fn normalize_math_markup(math: &NodeRef) -> Result<()> {
    for mi in dom::collect_matches(math, "mi")? {
        let node = mi.as_node();
        let token = normalize_text(&node.text_contents());
        if token.is_empty() {
            node.detach();
            continue;
        }
        dom::set_text(node, &token);

        let lower = token.to_lowercase();
        if token.chars().count() > 1 || MATH_FUNCTIONS.contains(&lower.as_str()) {
            dom::set_attr(node, "mathvariant", "normal");
        }
    }

    insert_thin_spaces(math)
}

fn insert_thin_spaces(math: &NodeRef) -> Result<()> {
    for mi in dom::collect_matches(math, "mi")? {
        let node = mi.as_node();
        let token = normalize_text(&node.text_contents()).to_lowercase();
        if token.is_empty() {
            continue;
        }

        let Some(next) = node.following_siblings().elements().next() else {
            continue;
        };
        let next_node = next.as_node();
        if !needs_thin_space_after(&token, next_node) {
            continue;
        }

        let mspace = create_mspace()?;
        next_node.insert_before(mspace);
    }
    Ok(())
}

fn create_mspace() -> Result<NodeRef> {
    // Parse inside a math element so the node lands in the MathML namespace.
    let math = dom::create_element("<math><mspace width=\"0.14em\"></mspace></math>")?;
    math.first_child()
        .ok_or_else(|| anyhow::anyhow!("mspace fragment produced no child"))
}

fn needs_thin_space_after(token: &str, next: &NodeRef) -> bool {
    let Some(next_tag) = dom::local_name(next) else {
        return false;
    };
    if next_tag == "mspace" || next_tag == "mo" {
        return false;
    }
    if !MATH_ATOMIC_TAGS.contains(&next_tag.as_str()) {
        return false;
    }
    MATH_FUNCTIONS.contains(&token) || token.chars().count() > 1
}

/// Finds a plain-text duplicate of a MathML formula close by.
#[must_use]
pub fn find_nearby_plain_formula(math: &NodeRef) -> Option<NodeRef> {
    let mut parent = math.parent();
    for _ in 0..4 {
        let scope = parent?;
        if scope.as_element().is_none() {
            return None;
        }
        let formulas = dom::collect_matches(&scope, "[data-formula]").ok()?;
        for formula in formulas {
            let node = formula.as_node();
            if dom::node_key(node) == dom::node_key(math) {
                continue;
            }
            if dom::local_name(node).as_deref() == Some("math") {
                continue;
            }
            if dom::contains(node, math) || dom::contains(math, node) {
                continue;
            }
            return Some(node.clone());
        }
        parent = scope.parent();
    }
    None
}

/// Pulls an inline formula out of single-child div wrappers.
pub fn unwrap_formula_block_parents(formula: &NodeRef, root: &NodeRef) {
    let root_key = dom::node_key(root);
    for _ in 0..4 {
        let Some(parent) = formula.parent() else { break };
        if dom::node_key(&parent) == root_key {
            break;
        }
        if dom::local_name(&parent).as_deref() != Some("div") {
            break;
        }
        if dom::child_element_count(&parent) != 1 {
            break;
        }
        let Some(_grand) = parent.parent() else { break };

        parent.insert_before(formula.clone());
        parent.detach();
    }
}

/// Adds thin spaces where function names are glued to their arguments.
#[must_use]
pub fn normalize_formula_fallback_text(text: &str) -> String {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return String::new();
    }

    let spaced = FN_GLUED_BEFORE.replace_all(&normalized, |caps: &regex::Captures<'_>| {
        format!("{}{MATH_THIN_SPACE}{}{}", &caps[1], &caps[2], &caps[3])
    });
    let spaced = FN_GLUED_AFTER.replace_all(&spaced, |caps: &regex::Captures<'_>| {
        format!("{}{MATH_THIN_SPACE}{}", &caps[1], &caps[2])
    });

    spaced.trim().to_string()
}

/// Renders LaTeX source as readable plain text.
#[must_use]
pub fn format_latex(latex: &str) -> String {
    if latex.is_empty() {
        return String::new();
    }

    let mut value = latex.replace('\u{a0}', " ").replace("\\left", "").replace("\\right", "");

    value = LATEX_TEXT.replace_all(&value, "$1").into_owned();
    value = LATEX_FRAC.replace_all(&value, "($1)/($2)").into_owned();
    value = LATEX_SQRT.replace_all(&value, "sqrt($1)").into_owned();
    value = LATEX_SUP_BRACED
        .replace_all(&value, |caps: &regex::Captures<'_>| format_exponent(&caps[1]))
        .into_owned();
    value = LATEX_SUP_BARE
        .replace_all(&value, |caps: &regex::Captures<'_>| format_exponent(&caps[1]))
        .into_owned();
    value = LATEX_SUB_BRACED
        .replace_all(&value, |caps: &regex::Captures<'_>| format_subscript(&caps[1]))
        .into_owned();
    value = LATEX_SUB_BARE
        .replace_all(&value, |caps: &regex::Captures<'_>| format_subscript(&caps[1]))
        .into_owned();
    value = LATEX_COMMAND.replace_all(&value, "$1").into_owned();
    value = value.replace(['{', '}'], "");

    normalize_formula_fallback_text(&value)
}

fn format_exponent(value: &str) -> String {
    let normalized = normalize_text(value);
    if normalized.is_empty() {
        return String::new();
    }
    if normalized.chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-') {
        return to_superscript(&normalized);
    }
    format!("^({normalized})")
}

fn format_subscript(value: &str) -> String {
    let normalized = normalize_text(value);
    if normalized.is_empty() {
        return String::new();
    }
    if normalized.chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-') {
        return to_subscript(&normalized);
    }
    format!("_({normalized})")
}

fn to_superscript(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '0' => '⁰',
            '1' => '¹',
            '2' => '²',
            '3' => '³',
            '4' => '⁴',
            '5' => '⁵',
            '6' => '⁶',
            '7' => '⁷',
            '8' => '⁸',
            '9' => '⁹',
            '+' => '⁺',
            '-' => '⁻',
            other => other,
        })
        .collect()
}

fn to_subscript(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '0' => '₀',
            '1' => '₁',
            '2' => '₂',
            '3' => '₃',
            '4' => '₄',
            '5' => '₅',
            '6' => '₆',
            '7' => '₇',
            '8' => '₈',
            '9' => '₉',
            '+' => '₊',
            '-' => '₋',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::dom::parse_body_fragment;

    #[test]
    fn latex_fraction_and_superscript_render_readably() {
        assert_eq!(format_latex(r"\frac{a}{b}"), "(a)/(b)");
        assert_eq!(format_latex(r"x^{2}"), "x²");
        assert_eq!(format_latex(r"a_{10}"), "a₁₀");
        assert_eq!(format_latex(r"\sqrt{x+1}"), "sqrt(x+1)");
    }

    #[test]
    fn latex_non_numeric_scripts_keep_parens() {
        assert_eq!(format_latex(r"x^{n+k}"), "x^(n+k)");
        assert_eq!(format_latex(r"a_{ij}"), "a_(ij)");
    }

    #[test]
    fn fallback_text_gets_thin_spaces_after_functions() {
        let out = normalize_formula_fallback_text("2logn");
        assert_eq!(out, format!("2{MATH_THIN_SPACE}log{MATH_THIN_SPACE}n"));
    }

    #[test]
    fn formula_images_become_spans() {
        let body = parse_body_fragment(
            r#"<p><img data-xpm-latex="O(n \log n)" src="formula.png"></p>"#,
        )
        .unwrap();
        process_latex_formulas(&body).unwrap();

        let span = dom::select_first(&body, "span[data-formula]").unwrap().unwrap();
        let text = span.as_node().text_contents();
        assert!(text.starts_with("O(n"));
        assert!(dom::select_first(&body, "img").unwrap().is_none());
    }

    #[test]
    fn empty_math_nodes_are_dropped() {
        let body = parse_body_fragment("<p><math><mi></mi></math>kept</p>").unwrap();
        process_latex_formulas(&body).unwrap();
        assert!(dom::select_first(&body, "math").unwrap().is_none());
        assert_eq!(dom::normalized_text(&body), "kept");
    }

    #[test]
    fn multi_letter_identifiers_get_upright_variant() {
        let body = parse_body_fragment("<math><mi>log</mi><mn>2</mn></math>").unwrap();
        process_latex_formulas(&body).unwrap();
        let mi = dom::select_first(&body, "mi").unwrap().unwrap();
        assert_eq!(
            dom::get_attr(mi.as_node(), "mathvariant").as_deref(),
            Some("normal")
        );
        assert!(dom::select_first(&body, "mspace").unwrap().is_some());
    }

    #[test]
    fn plain_duplicate_next_to_mathml_is_removed() {
        let body = parse_body_fragment(
            "<div><math><mi>x</mi></math><span data-formula=\"true\">x</span></div>",
        )
        .unwrap();
        process_latex_formulas(&body).unwrap();
        assert!(dom::select_first(&body, "span[data-formula]").unwrap().is_none());
        assert!(dom::select_first(&body, "math").unwrap().is_some());
    }
}
