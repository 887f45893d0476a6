//! Object-literal evaluation without code execution
//!
//! Fragments are parsed as a JavaScript expression with SWC, then the AST is
//! converted to `serde_json::Value`. Only literal nodes are accepted: strings,
//! numbers, booleans, `null`, objects, arrays, signed numbers and templates
//! without interpolation. Anything else (identifiers, calls, operators) is
//! rejected, so nothing in the fragment is ever run.

use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use swc_common::{sync::Lrc, FileName, SourceMap, Span, Spanned};
use swc_ecma_ast::*;
use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax};
use thiserror::Error;

const MAX_DEPTH: usize = 128;

/// Failure to parse an object literal, with the byte offset where it happened
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at byte {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub kind: LiteralErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiteralErrorKind {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("expected a single object literal")]
    NotAnObject,

    #[error("{0:?} is not a literal value")]
    UnsupportedExpression(String),

    #[error("identifier {0:?} is not a literal value")]
    UnknownIdentifier(String),

    #[error("number {0} is not finite")]
    NonFiniteNumber(String),

    #[error("string is not valid unicode")]
    InvalidString,

    #[error("template interpolation is not supported")]
    Interpolation,

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
}

/// Parse `src` as a single object literal.
///
/// Duplicate keys keep the position of their first appearance and the value
/// of their last. Keys whose value is `undefined` are left out.
pub fn parse_object_literal(src: &str) -> Result<Map<String, Value>, LiteralError> {
    // Parenthesized so a leading `{` is an object, not a block. The newline
    // keeps a trailing line comment from swallowing the closing paren.
    let wrapped = format!("({}\n)", src);

    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Anon.into(), wrapped.clone());
    let mut converter = Converter {
        source: &wrapped,
        start: fm.start_pos.0,
        depth: 0,
    };

    let lexer = Lexer::new(
        Syntax::Es(Default::default()),
        Default::default(),
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let script = parser
        .parse_script()
        .map_err(|e| converter.error(e.span(), LiteralErrorKind::Syntax(e.kind().msg().to_string())))?;
    if let Some(e) = parser.take_errors().into_iter().next() {
        return Err(converter.error(e.span(), LiteralErrorKind::Syntax(e.kind().msg().to_string())));
    }

    let object = match script.body.as_slice() {
        [Stmt::Expr(ExprStmt { expr, .. })] => match &**expr {
            Expr::Paren(ParenExpr { expr, .. }) => match &**expr {
                Expr::Object(object) => object,
                other => return Err(converter.error(other.span(), LiteralErrorKind::NotAnObject)),
            },
            other => return Err(converter.error(other.span(), LiteralErrorKind::NotAnObject)),
        },
        _ => return Err(LiteralError { offset: 0, kind: LiteralErrorKind::NotAnObject }),
    };

    converter.object_to_json(object)
}

/// Converts SWC nodes to JSON values and maps spans back to fragment offsets
struct Converter<'a> {
    source: &'a str,
    start: u32,
    depth: usize,
}

impl Converter<'_> {
    /// Byte offset of `span` in the caller's fragment (before wrapping)
    fn offset(&self, span: Span) -> usize {
        (span.lo.0.saturating_sub(self.start) as usize).saturating_sub(1)
    }

    fn snippet(&self, span: Span) -> String {
        let lo = span.lo.0.saturating_sub(self.start) as usize;
        let hi = span.hi.0.saturating_sub(self.start) as usize;
        self.source.get(lo..hi).unwrap_or_default().to_string()
    }

    fn error(&self, span: Span, kind: LiteralErrorKind) -> LiteralError {
        LiteralError {
            offset: self.offset(span),
            kind,
        }
    }

    fn enter(&mut self, span: Span) -> Result<(), LiteralError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(span, LiteralErrorKind::TooDeep(MAX_DEPTH)));
        }
        Ok(())
    }

    fn object_to_json(&mut self, object: &ObjectLit) -> Result<Map<String, Value>, LiteralError> {
        self.enter(object.span)?;

        let mut entries: Vec<(String, Option<Value>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for prop in &object.props {
            let kv = match prop {
                PropOrSpread::Prop(prop) => match &**prop {
                    Prop::KeyValue(kv) => kv,
                    other => {
                        return Err(self.error(
                            other.span(),
                            LiteralErrorKind::UnsupportedExpression(self.snippet(other.span())),
                        ))
                    }
                },
                PropOrSpread::Spread(spread) => {
                    return Err(self.error(
                        spread.span(),
                        LiteralErrorKind::UnsupportedExpression(self.snippet(spread.span())),
                    ))
                }
            };

            let key = self.prop_name_to_string(&kv.key)?;
            let value = self.expr_to_json(&kv.value)?;
            match positions.get(&key) {
                Some(&index) => entries[index].1 = value,
                None => {
                    positions.insert(key.clone(), entries.len());
                    entries.push((key, value));
                }
            }
        }

        self.depth -= 1;
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }

    /// Convert one expression; `None` stands for `undefined`
    fn expr_to_json(&mut self, expr: &Expr) -> Result<Option<Value>, LiteralError> {
        let value = match expr {
            Expr::Lit(Lit::Str(s)) => Value::String(self.str_value(s)?),
            Expr::Lit(Lit::Num(n)) => Value::Number(self.number(n.value, n.span)?),
            Expr::Lit(Lit::Bool(b)) => Value::Bool(b.value),
            Expr::Lit(Lit::Null(_)) => Value::Null,

            Expr::Object(object) => Value::Object(self.object_to_json(object)?),

            Expr::Array(array) => {
                self.enter(array.span)?;
                let mut values = Vec::with_capacity(array.elems.len());
                for elem in &array.elems {
                    match elem {
                        Some(ExprOrSpread { spread: Some(span), .. }) => {
                            return Err(self.error(
                                *span,
                                LiteralErrorKind::UnsupportedExpression(self.snippet(*span)),
                            ))
                        }
                        Some(ExprOrSpread { expr, .. }) => {
                            values.push(self.expr_to_json(expr)?.unwrap_or(Value::Null))
                        }
                        // Hole
                        None => values.push(Value::Null),
                    }
                }
                self.depth -= 1;
                Value::Array(values)
            }

            // Signed numbers: -5, +3
            Expr::Unary(unary) if matches!(unary.op, UnaryOp::Minus | UnaryOp::Plus) => {
                match &*unary.arg {
                    Expr::Lit(Lit::Num(n)) => {
                        let value = if unary.op == UnaryOp::Minus { -n.value } else { n.value };
                        Value::Number(self.number(value, unary.span)?)
                    }
                    _ => return Err(self.unsupported(expr)),
                }
            }

            // Template literals without expressions: `string`
            Expr::Tpl(tpl) => {
                if !tpl.exprs.is_empty() {
                    return Err(self.error(tpl.span, LiteralErrorKind::Interpolation));
                }
                let text = tpl
                    .quasis
                    .first()
                    .map(|quasi| quasi.raw.as_str().to_string())
                    .unwrap_or_default();
                Value::String(text)
            }

            Expr::Paren(paren) => return self.expr_to_json(&paren.expr),

            Expr::Ident(ident) => match ident.sym.as_ref() {
                "undefined" => return Ok(None),
                "NaN" | "Infinity" => {
                    return Err(self.error(
                        ident.span,
                        LiteralErrorKind::NonFiniteNumber(ident.sym.to_string()),
                    ))
                }
                name => {
                    return Err(self.error(
                        ident.span,
                        LiteralErrorKind::UnknownIdentifier(name.to_string()),
                    ))
                }
            },

            _ => return Err(self.unsupported(expr)),
        };
        Ok(Some(value))
    }

    fn unsupported(&self, expr: &Expr) -> LiteralError {
        self.error(
            expr.span(),
            LiteralErrorKind::UnsupportedExpression(self.snippet(expr.span())),
        )
    }

    fn str_value(&self, s: &Str) -> Result<String, LiteralError> {
        s.value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.error(s.span, LiteralErrorKind::InvalidString))
    }

    fn number(&self, value: f64, span: Span) -> Result<Number, LiteralError> {
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            Ok(Number::from(value as i64))
        } else {
            Number::from_f64(value)
                .ok_or_else(|| self.error(span, LiteralErrorKind::NonFiniteNumber(self.snippet(span))))
        }
    }

    /// Keys as JavaScript stringifies them: `1.50` and `0x10` become "1.5" and "16"
    fn prop_name_to_string(&self, name: &PropName) -> Result<String, LiteralError> {
        match name {
            PropName::Ident(ident) => Ok(ident.sym.as_str().to_string()),
            PropName::Str(s) => self.str_value(s),
            PropName::Num(n) => Ok(n.value.to_string()),
            other => Err(self.error(
                other.span(),
                LiteralErrorKind::UnsupportedExpression(self.snippet(other.span())),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(src: &str) -> Value {
        Value::Object(parse_object_literal(src).unwrap())
    }

    fn error_kind(src: &str) -> LiteralErrorKind {
        parse_object_literal(src).unwrap_err().kind
    }

    #[test]
    fn test_strict_json() {
        assert_eq!(
            parse(r#"{"a": 1, "b": "x", "c": [true, false, null]}"#),
            json!({"a": 1, "b": "x", "c": [true, false, null]})
        );
    }

    #[test]
    fn test_unquoted_keys_and_single_quotes() {
        assert_eq!(
            parse("{item_id: 1, item_label: 'Label'}"),
            json!({"item_id": 1, "item_label": "Label"})
        );
        assert_eq!(parse("{$x: 1, _y: 2}"), json!({"$x": 1, "_y": 2}));
    }

    #[test]
    fn test_keywords_and_numbers_as_keys() {
        assert_eq!(
            parse("{class: 'a', 1: 'one', 1.50: 'x', 0x10: 'hex'}"),
            json!({"class": "a", "1": "one", "1.5": "x", "16": "hex"})
        );
    }

    #[test]
    fn test_signed_key_is_a_syntax_error() {
        assert!(matches!(error_kind("{-1: 'x'}"), LiteralErrorKind::Syntax(_)));
    }

    #[test]
    fn test_trailing_commas_and_comments() {
        let src = r#"{
            // line comment
            a: [1, 2,], /* block */
            b: {c: 'd',},
        } // trailing"#;
        assert_eq!(parse(src), json!({"a": [1, 2], "b": {"c": "d"}}));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            parse("{a: -5, b: +3, c: .5, d: 1e3, e: 0xff, f: 0b101, g: 0o17, h: 2.25, i: - 1, j: 1_000}"),
            json!({"a": -5, "b": 3, "c": 0.5, "d": 1000, "e": 255, "f": 5, "g": 15, "h": 2.25, "i": -1, "j": 1000})
        );
    }

    #[test]
    fn test_legacy_octal() {
        assert_eq!(parse("{a: 010}"), json!({"a": 8}));
    }

    #[test]
    fn test_string_escapes() {
        let value = parse(r#"{a: 'it\'s', b: "line\nbreak", c: 'é\x41', d: '\u{1F600}', e: '😀'}"#);
        assert_eq!(value["a"], "it's");
        assert_eq!(value["b"], "line\nbreak");
        assert_eq!(value["c"], "éA");
        assert_eq!(value["d"], "😀");
        assert_eq!(value["e"], "😀");
    }

    #[test]
    fn test_template_string_without_interpolation() {
        assert_eq!(parse("{a: `plain`}"), json!({"a": "plain"}));
        assert_eq!(error_kind("{a: `x${y}`}"), LiteralErrorKind::Interpolation);
    }

    #[test]
    fn test_duplicate_keys_last_wins_first_position() {
        let map = parse_object_literal("{a: 1, b: 2, a: 3}").unwrap();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map["a"], 3);
    }

    #[test]
    fn test_undefined() {
        assert_eq!(
            parse("{a: undefined, b: [1, undefined], c: 1, c: undefined}"),
            json!({"b": [1, null]})
        );
    }

    #[test]
    fn test_array_holes() {
        assert_eq!(parse("{a: [1,,2], b: [,]}"), json!({"a": [1, null, 2], "b": [null]}));
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(parse("{}"), json!({}));
        assert_eq!(parse("  { }  "), json!({}));
    }

    #[test]
    fn test_missing_value() {
        assert!(matches!(error_kind("{x: }"), LiteralErrorKind::Syntax(_)));
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(matches!(error_kind("{a: {b: 1}"), LiteralErrorKind::Syntax(_)));
        assert!(matches!(error_kind("{a: 1}}"), LiteralErrorKind::Syntax(_)));
    }

    #[test]
    fn test_code_is_not_executed() {
        let err = parse_object_literal("{a: alert(1)}").unwrap_err();
        assert_eq!(
            err.kind,
            LiteralErrorKind::UnsupportedExpression("alert(1)".to_string())
        );
        assert_eq!(err.offset, 4);

        assert_eq!(
            error_kind("{a: window}"),
            LiteralErrorKind::UnknownIdentifier("window".to_string())
        );
        assert!(parse_object_literal("{a: 1}; alert(1)").is_err());
        assert!(parse_object_literal("{a: 1 + 2}").is_err());
        assert!(parse_object_literal("{a: function() {}}").is_err());
        assert!(parse_object_literal("{a}").is_err());
        assert!(parse_object_literal("{...x}").is_err());
        assert!(parse_object_literal("{[k]: 1}").is_err());
        assert!(parse_object_literal("{get a() { return 1 }}").is_err());
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        assert!(matches!(error_kind("{a: NaN}"), LiteralErrorKind::NonFiniteNumber(_)));
        assert!(matches!(error_kind("{a: Infinity}"), LiteralErrorKind::NonFiniteNumber(_)));
        assert!(matches!(error_kind("{a: 1e999}"), LiteralErrorKind::NonFiniteNumber(_)));
    }

    #[test]
    fn test_unterminated() {
        assert!(matches!(error_kind("{a: 'abc}"), LiteralErrorKind::Syntax(_)));
        assert!(matches!(error_kind("{a: 1 /* }"), LiteralErrorKind::Syntax(_)));
    }

    #[test]
    fn test_top_level_must_be_object() {
        assert_eq!(error_kind("[1, 2]"), LiteralErrorKind::NotAnObject);
        assert_eq!(error_kind("{a: 1}, {b: 2}"), LiteralErrorKind::NotAnObject);
        assert!(parse_object_literal("").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{{a: {}1{}}}", "[".repeat(150), "]".repeat(150));
        assert_eq!(error_kind(&deep), LiteralErrorKind::TooDeep(MAX_DEPTH));
    }

    #[test]
    fn test_error_message() {
        let err = parse_object_literal("{a: window}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "identifier \"window\" is not a literal value at byte 4"
        );
    }
}
