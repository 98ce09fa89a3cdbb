//! Arithmetic expression evaluator.
//!
//! Shunting-yard over `+ - * / ( )` and real numbers, with unary minus.
//! Any character outside that class rejects the whole expression; no
//! dynamic evaluation, ever. Division by zero propagates NaN and the
//! caller treats the expression as unsolved.

/// Accepted operator aliases from prompts.
fn normalize_ops(expr: &str) -> String {
    expr.replace('×', "*").replace('÷', "/").replace(',', "")
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    LParen,
    RParen,
}

fn precedence(op: char) -> u8 {
    match op {
        'u' => 3, // unary minus
        '*' | '/' => 2,
        '+' | '-' => 1,
        _ => 0,
    }
}

fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let expr = normalize_ops(expr);
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut num = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(num.parse().ok()?));
            }
            '+' | '*' | '/' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '-' => {
                // Unary when at the start or after an operator/open paren.
                let unary = matches!(
                    tokens.last(),
                    None | Some(Token::Op(_)) | Some(Token::LParen)
                );
                tokens.push(Token::Op(if unary { 'u' } else { '-' }));
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            _ => return None,
        }
    }

    if tokens.iter().any(|t| matches!(t, Token::Num(_))) {
        Some(tokens)
    } else {
        None
    }
}

/// Evaluate an arithmetic expression. None for anything outside the
/// grammar, unbalanced parens, or a NaN/infinite result.
pub fn evaluate(expr: &str) -> Option<f64> {
    let tokens = tokenize(expr)?;

    // Shunting-yard into RPN.
    let mut output: Vec<Token> = Vec::new();
    let mut ops: Vec<Token> = Vec::new();
    for token in tokens {
        match token {
            Token::Num(_) => output.push(token),
            Token::Op(o) => {
                while let Some(&Token::Op(top)) = ops.last() {
                    let left_assoc = o != 'u';
                    if precedence(top) > precedence(o)
                        || (left_assoc && precedence(top) == precedence(o))
                    {
                        output.push(ops.pop()?);
                    } else {
                        break;
                    }
                }
                ops.push(token);
            }
            Token::LParen => ops.push(token),
            Token::RParen => {
                loop {
                    match ops.pop() {
                        Some(Token::LParen) => break,
                        Some(op @ Token::Op(_)) => output.push(op),
                        _ => return None, // unbalanced
                    }
                }
            }
        }
    }
    while let Some(op) = ops.pop() {
        match op {
            Token::Op(_) => output.push(op),
            _ => return None, // unbalanced
        }
    }

    // Evaluate RPN.
    let mut stack: Vec<f64> = Vec::new();
    for token in output {
        match token {
            Token::Num(n) => stack.push(n),
            Token::Op('u') => {
                let a = stack.pop()?;
                stack.push(-a);
            }
            Token::Op(o) => {
                let b = stack.pop()?;
                let a = stack.pop()?;
                stack.push(match o {
                    '+' => a + b,
                    '-' => a - b,
                    '*' => a * b,
                    '/' => a / b,
                    _ => return None,
                });
            }
            _ => return None,
        }
    }

    match stack.as_slice() {
        [result] if result.is_finite() => Some(*result),
        _ => None,
    }
}

/// Render a float the way a person writes it: integers without a decimal
/// point, fractions trimmed to six places.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let s = format!("{:.6}", n);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// True when the prompt is a bare arithmetic expression (optionally behind
/// a "what is" style lead-in).
pub fn looks_like_expression(prompt: &str) -> bool {
    let stripped = strip_lead_in(prompt);
    !stripped.is_empty()
        && stripped.chars().any(|c| c.is_ascii_digit())
        && stripped
            .chars()
            .all(|c| c.is_ascii_digit() || " .+-*/()×÷,\t".contains(c))
        && stripped.chars().any(|c| "+-*/×÷".contains(c))
}

/// Drop "what is" / "calculate" style lead-ins and a trailing question mark.
pub fn strip_lead_in(prompt: &str) -> &str {
    let p = prompt.trim().trim_end_matches(['?', '=']).trim();
    for lead in ["what is", "what's", "calculate", "compute", "evaluate", "how much is"] {
        if p.len() >= lead.len()
            && p.is_char_boundary(lead.len())
            && p[..lead.len()].eq_ignore_ascii_case(lead)
        {
            return p[lead.len()..].trim();
        }
    }
    p
}

/// Solve a bare arithmetic prompt into `expr = value` form.
pub fn solve(prompt: &str) -> Option<String> {
    if !looks_like_expression(prompt) {
        return None;
    }
    let expr = strip_lead_in(prompt);
    let value = evaluate(expr)?;
    let compact: String = normalize_ops(expr).chars().filter(|c| *c != ' ').collect();
    Some(format!("{} = {}", compact, format_number(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_ops() {
        assert_eq!(evaluate("2+3"), Some(5.0));
        assert_eq!(evaluate("28 - 4 + 2"), Some(26.0));
        assert_eq!(evaluate("2*3+4"), Some(10.0));
        assert_eq!(evaluate("2+3*4"), Some(14.0));
        assert_eq!(evaluate("(2+3)*4"), Some(20.0));
        assert_eq!(evaluate("10/4"), Some(2.5));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(evaluate("-5+3"), Some(-2.0));
        assert_eq!(evaluate("2*-3"), Some(-6.0));
        assert_eq!(evaluate("-(2+3)"), Some(-5.0));
        assert_eq!(evaluate("--2"), Some(2.0));
    }

    #[test]
    fn test_division_by_zero_rejected() {
        assert_eq!(evaluate("1/0"), None);
        assert_eq!(evaluate("5/(2-2)"), None);
    }

    #[test]
    fn test_grammar_rejection() {
        assert_eq!(evaluate("2+x"), None);
        assert_eq!(evaluate("import os"), None);
        assert_eq!(evaluate("2**3"), None); // '**' leaves a dangling operator
        assert_eq!(evaluate(""), None);
        assert_eq!(evaluate("()"), None);
    }

    #[test]
    fn test_unbalanced_parens() {
        assert_eq!(evaluate("(2+3"), None);
        assert_eq!(evaluate("2+3)"), None);
    }

    #[test]
    fn test_unicode_operators() {
        assert_eq!(evaluate("6×7"), Some(42.0));
        assert_eq!(evaluate("9÷3"), Some(3.0));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(26.0), "26");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
        assert_eq!(format_number(-4.0), "-4");
    }

    #[test]
    fn test_solve_shapes() {
        assert_eq!(solve("28 - 4 + 2"), Some("28-4+2 = 26".to_string()));
        assert_eq!(solve("what is 6*7?"), Some("6*7 = 42".to_string()));
        assert_eq!(solve("tell me a story"), None);
        assert_eq!(solve("42"), None); // no operator
    }

    #[test]
    fn test_precedence_agrees_with_ieee() {
        assert_eq!(evaluate("1+2*3-4/2"), Some(1.0 + 2.0 * 3.0 - 4.0 / 2.0));
        assert_eq!(evaluate("0.1+0.2"), Some(0.1 + 0.2));
    }
}
