//! Taxonomy → GBNF grammar compiler.
//!
//! The grammar constrains the model to emit a JSON object with `title`,
//! `description` and `taxonomy` string fields, where `taxonomy` can only be a
//! path of category names from the vertical root down to some node, joined
//! by `" > "`.

use std::collections::HashMap;
use std::fmt;

use crate::models::taxonomy::TaxonomyNode;

/// Name of the rule that starts generation.
pub const ROOT_RULE: &str = "root";

/// Rule matching a full path starting at the vertical root.
const TAXONOMY_INNER: &str = "taxonomy-inner";

const RULE_PREFIX: &str = "taxonomy";

/// Fixed envelope rules, emitted before the taxonomy rules.
const PREAMBLE: &[(&str, &str)] = &[
    (
        ROOT_RULE,
        r#""{" ws "\"title\":" ws string ws "," ws "\"description\":" ws string ws "," ws "\"taxonomy\":" ws taxonomy ws "}""#,
    ),
    ("ws", r#"[ \t\n\r]*"#),
    ("string", r#""\"" char* "\"""#),
    ("char", r#"[^"\\] | "\\" ["\\/bfnrt]"#),
    ("separator", r#"" > ""#),
    (RULE_PREFIX, r#""\"" taxonomy-inner "\"""#),
];

/// Right-hand side of a production rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Production {
    /// Verbatim GBNF expression.
    Expr(String),
    /// Alternation over rule references, one per line when rendered.
    Alternation(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub body: Production,
}

/// A compiled grammar: ordered rules plus the designated root rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    pub root: String,
    pub rules: Vec<Rule>,
}

impl Grammar {
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// GBNF text of the grammar.
    pub fn to_gbnf(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            // Preamble rules are packed together; taxonomy rules get a blank line.
            if i >= PREAMBLE.len() {
                writeln!(f)?;
            }
            match &rule.body {
                Production::Expr(expr) => writeln!(f, "{} ::= {}", rule.name, expr)?,
                Production::Alternation(refs) => {
                    writeln!(f, "{} ::= (", rule.name)?;
                    for (j, r) in refs.iter().enumerate() {
                        if j + 1 < refs.len() {
                            writeln!(f, "\t{} |", r)?;
                        } else {
                            writeln!(f, "\t{}", r)?;
                        }
                    }
                    writeln!(f, ")")?;
                }
            }
        }
        Ok(())
    }
}

/// Transliterate a category name into a rule-name fragment.
///
/// ASCII letters are lower-cased and ASCII digits kept; every other run of
/// characters becomes a single `-`. Leading and trailing separators are dropped.
pub fn clean(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    if out.ends_with('-') {
        out.pop();
    }
    out
}

/// The characters of `name` as they appear inside a JSON string.
fn json_escape(name: &str) -> String {
    let quoted = serde_json::Value::String(name.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Quote a category name as a GBNF string literal.
///
/// The literal matches the JSON-escaped name, since it is generated inside
/// the quoted `taxonomy` field.
fn literal(name: &str) -> String {
    let escaped = json_escape(name);
    let mut out = String::with_capacity(escaped.len() + 2);
    out.push('"');
    for c in escaped.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Compile a taxonomy tree into its grammar.
pub fn compile(root: &TaxonomyNode) -> Result<Grammar, GrammarError> {
    let mut compiler = Compiler::default();
    for (name, expr) in PREAMBLE {
        compiler.define(name.to_string(), Production::Expr(expr.to_string()), name)?;
    }
    compiler.node(root, true)?;

    Ok(Grammar {
        root: ROOT_RULE.to_string(),
        rules: compiler.rules,
    })
}

#[derive(Default)]
struct Compiler {
    rules: Vec<Rule>,
    /// Rule name → what defined it, for collision reports.
    owners: HashMap<String, String>,
}

impl Compiler {
    fn define(&mut self, name: String, body: Production, owner: &str) -> Result<(), GrammarError> {
        if let Some(first) = self.owners.get(&name) {
            return Err(GrammarError::RuleNameCollision {
                rule: name,
                first: first.clone(),
                second: owner.to_string(),
            });
        }
        self.owners.insert(name.clone(), owner.to_string());
        self.rules.push(Rule { name, body });
        Ok(())
    }

    fn node(&mut self, node: &TaxonomyNode, is_root: bool) -> Result<(), GrammarError> {
        let own = fragment(node)?;
        let rule_name = if is_root {
            TAXONOMY_INNER.to_string()
        } else {
            format!("{RULE_PREFIX}-{own}")
        };

        let mut expr = literal(&node.name);
        if !node.is_leaf() {
            let children_rule = format!("{RULE_PREFIX}-{own}-children");
            expr.push_str(&format!(" (separator {children_rule})"));
            if !is_root {
                expr.push('?');
            }
            self.define(rule_name, Production::Expr(expr), &node.name)?;

            let refs = node
                .children
                .iter()
                .map(|child| fragment(child).map(|f| format!("{RULE_PREFIX}-{f}")))
                .collect::<Result<Vec<_>, _>>()?;
            self.define(children_rule, Production::Alternation(refs), &node.name)?;

            for child in &node.children {
                self.node(child, false)?;
            }
        } else {
            self.define(rule_name, Production::Expr(expr), &node.name)?;
        }
        Ok(())
    }
}

fn fragment(node: &TaxonomyNode) -> Result<String, GrammarError> {
    let fragment = clean(&node.name);
    if fragment.is_empty() {
        return Err(GrammarError::EmptyRuleName {
            id: node.id.clone(),
            name: node.name.clone(),
        });
    }
    Ok(fragment)
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("Category {id} ('{name}') has no usable characters for a rule name")]
    EmptyRuleName { id: String, name: String },

    #[error("Rule '{rule}' would be defined by both '{first}' and '{second}'")]
    RuleNameCollision {
        rule: String,
        first: String,
        second: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, name: &str, depth: u32, children: Vec<TaxonomyNode>) -> TaxonomyNode {
        TaxonomyNode {
            id: id.to_string(),
            name: name.to_string(),
            depth,
            children,
        }
    }

    fn sample_tree() -> TaxonomyNode {
        node(
            "aa",
            "Apparel & Accessories",
            0,
            vec![
                node(
                    "aa-1",
                    "Clothing",
                    1,
                    vec![
                        TaxonomyNode::leaf("aa-1-1", "Shirts & Tops", 2),
                        TaxonomyNode::leaf("aa-1-2", "Men's Shoes", 2),
                    ],
                ),
                TaxonomyNode::leaf("aa-2", "Jewelry", 1),
            ],
        )
    }

    #[test]
    fn test_clean_collapses_and_lowercases() {
        assert_eq!(clean("Men's Shoes"), "men-s-shoes");
        assert_eq!(clean("MEN'S SHOES"), "men-s-shoes");
        assert_eq!(clean("Apparel & Accessories"), "apparel-accessories");
        assert_eq!(clean("  (Kids) Boots 2 "), "kids-boots-2");
        assert_eq!(clean("Café"), "caf");
    }

    #[test]
    fn test_clean_is_idempotent_and_never_doubles_separator() {
        for name in ["Men's Shoes", "A -- B", "x&&&y", "Tops / Tees & Tanks", "---"] {
            let once = clean(name);
            assert_eq!(clean(&once), once);
            assert!(!once.contains("--"), "{once}");
        }
    }

    #[test]
    fn test_compile_is_deterministic() {
        let tree = sample_tree();
        assert_eq!(
            compile(&tree).unwrap().to_gbnf(),
            compile(&tree).unwrap().to_gbnf()
        );
    }

    #[test]
    fn test_root_rule_is_required_continuation() {
        let grammar = compile(&sample_tree()).unwrap();
        assert_eq!(grammar.root, "root");
        assert_eq!(
            grammar.rule("taxonomy-inner").unwrap().body,
            Production::Expr(
                r#""Apparel & Accessories" (separator taxonomy-apparel-accessories-children)"#
                    .to_string()
            )
        );
    }

    #[test]
    fn test_internal_node_continuation_is_optional() {
        let grammar = compile(&sample_tree()).unwrap();
        assert_eq!(
            grammar.rule("taxonomy-clothing").unwrap().body,
            Production::Expr(r#""Clothing" (separator taxonomy-clothing-children)?"#.to_string())
        );
    }

    #[test]
    fn test_leaf_has_no_continuation() {
        let grammar = compile(&sample_tree()).unwrap();
        assert_eq!(
            grammar.rule("taxonomy-jewelry").unwrap().body,
            Production::Expr(r#""Jewelry""#.to_string())
        );
        assert!(grammar.rule("taxonomy-jewelry-children").is_none());
    }

    #[test]
    fn test_children_alternation_follows_child_order() {
        let grammar = compile(&sample_tree()).unwrap();
        assert_eq!(
            grammar.rule("taxonomy-clothing-children").unwrap().body,
            Production::Alternation(vec![
                "taxonomy-shirts-tops".to_string(),
                "taxonomy-men-s-shoes".to_string(),
            ])
        );
    }

    #[test]
    fn test_one_rule_per_node_literal() {
        let grammar = compile(&sample_tree()).unwrap();
        for name in ["Apparel & Accessories", "Clothing", "Shirts & Tops", "Men's Shoes", "Jewelry"] {
            let lit = literal(name);
            let count = grammar
                .rules
                .iter()
                .filter(|r| matches!(&r.body, Production::Expr(e) if e.starts_with(&lit)))
                .count();
            assert_eq!(count, 1, "{name}");
        }
    }

    #[test]
    fn test_every_reference_is_defined_once() {
        let grammar = compile(&sample_tree()).unwrap();
        let mut names: Vec<&str> = grammar.rules.iter().map(|r| r.name.as_str()).collect();
        names.sort();
        let total = names.len();
        names.dedup();
        assert_eq!(names.len(), total);

        for rule in &grammar.rules {
            if let Production::Alternation(refs) = &rule.body {
                for r in refs {
                    assert!(grammar.rule(r).is_some(), "dangling reference {r}");
                }
            }
        }
    }

    #[test]
    fn test_collision_is_rejected() {
        let tree = node(
            "v",
            "Shoes",
            0,
            vec![
                TaxonomyNode::leaf("v-1", "Boots", 1),
                node("v-2", "Kids", 1, vec![TaxonomyNode::leaf("v-2-1", "BOOTS", 2)]),
            ],
        );
        let err = compile(&tree).unwrap_err();
        assert!(matches!(
            err,
            GrammarError::RuleNameCollision { ref rule, .. } if rule == "taxonomy-boots"
        ));
    }

    #[test]
    fn test_collision_with_generated_children_rule() {
        let tree = node(
            "v",
            "Root",
            0,
            vec![
                node("v-1", "Hats", 1, vec![TaxonomyNode::leaf("v-1-1", "Caps", 2)]),
                TaxonomyNode::leaf("v-2", "Hats Children", 1),
            ],
        );
        assert!(matches!(
            compile(&tree).unwrap_err(),
            GrammarError::RuleNameCollision { .. }
        ));
    }

    #[test]
    fn test_empty_rule_name_is_rejected() {
        let tree = node("v", "Root", 0, vec![TaxonomyNode::leaf("v-1", "&&", 1)]);
        assert!(matches!(
            compile(&tree).unwrap_err(),
            GrammarError::EmptyRuleName { .. }
        ));
    }

    #[test]
    fn test_rendered_text() {
        let tree = node(
            "v",
            "Bags",
            0,
            vec![TaxonomyNode::leaf("v-1", "Tote \"Bags\"", 1)],
        );
        let text = compile(&tree).unwrap().to_gbnf();
        assert!(text.starts_with("root ::= \"{\" ws"));
        assert!(text.contains("separator ::= \" > \"\n"));
        assert!(text.contains(
            "\ntaxonomy-inner ::= \"Bags\" (separator taxonomy-bags-children)\n"
        ));
        assert!(text.contains("\ntaxonomy-bags-children ::= (\n\ttaxonomy-tote-bags\n)\n"));
        assert!(text.contains(concat!(
            "\n",
            r#"taxonomy-tote-bags ::= "Tote \\\"Bags\\\"""#
        )));
    }

    #[test]
    fn test_literal_matches_json_encoded_name() {
        assert_eq!(literal("Coats & Jackets"), r#""Coats & Jackets""#);
        assert_eq!(literal(r#"Tote "Bags""#), r#""Tote \\\"Bags\\\"""#);
        assert_eq!(literal(r"A\B"), r#""A\\\\B""#);
    }

    #[test]
    fn test_generated_name_parses_back_from_json() {
        for name in [r#"Tote "Bags""#, r"Back\slash", "Tab\there", "Café"] {
            let generated = format!("\"{}\"", json_escape(name));
            let parsed: String = serde_json::from_str(&generated).unwrap();
            assert_eq!(parsed, name);
        }
    }
}
