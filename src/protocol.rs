//! Wire formats of the prover endpoints.
//!
//! Every endpoint answers with plain text. The checking endpoints
//! (`chkconstr.txt`, `chkmacro.txt`, `chkexpr.txt`) prefix a rejected input
//! with the field `1`, followed by the character offset where the problem
//! was found and a message; the message may carry an auxiliary explanation
//! after a `+++` separator. `chkpending.txt` answers with one
//! `<label>,<token>` pair per line, where an empty token means the
//! computation is still running.

/// Outcome of an expression check, as encoded by `chkexpr.txt`.
///
/// The wire codes start at 2; code 1 is reserved for rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultKind {
    Zap,
    Waiting,
    Timeout,
    Failed,
    True,
    False,
    OnlyGe,
    OnlyLe,
    EqZero,
    GeZero,
}

impl ResultKind {
    pub(crate) fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            2 => ResultKind::Zap,
            3 => ResultKind::Waiting,
            4 => ResultKind::Timeout,
            5 => ResultKind::Failed,
            6 => ResultKind::True,
            7 => ResultKind::False,
            8 => ResultKind::OnlyGe,
            9 => ResultKind::OnlyLe,
            10 => ResultKind::EqZero,
            11 => ResultKind::GeZero,
            _ => return None,
        })
    }

    /// The lowercase token used by `chkpending.txt` responses.
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "zap" => ResultKind::Zap,
            "waiting" => ResultKind::Waiting,
            "timeout" => ResultKind::Timeout,
            "failed" => ResultKind::Failed,
            "true" => ResultKind::True,
            "false" => ResultKind::False,
            "onlyge" => ResultKind::OnlyGe,
            "onlyle" => ResultKind::OnlyLe,
            "eqzero" => ResultKind::EqZero,
            "gezero" => ResultKind::GeZero,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            ResultKind::Zap => "zap",
            ResultKind::Waiting => "waiting",
            ResultKind::Timeout => "timeout",
            ResultKind::Failed => "failed",
            ResultKind::True => "true",
            ResultKind::False => "false",
            ResultKind::OnlyGe => "onlyge",
            ResultKind::OnlyLe => "onlyle",
            ResultKind::EqZero => "eqzero",
            ResultKind::GeZero => "gezero",
        }
    }
}

/// A rejection reported by one of the checking endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    /// Character offset into the submitted text.
    pub(crate) position: usize,
    pub(crate) message: String,
    /// Auxiliary explanation, empty when the server sent none.
    pub(crate) aux: String,
}

/// Answer of `chkconstr.txt` and `chkmacro.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CheckResponse {
    Rejected(SyntaxError),
    Accepted,
}

/// Answer of `chkexpr.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExprResponse {
    Rejected(SyntaxError),
    Evaluated {
        kind: ResultKind,
        /// Server-assigned identifier, used for later pending polls.
        label: u32,
        /// Only populated for [`ResultKind::Zap`].
        aux: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProtocolError {
    Empty,
    BadNumber(String),
    UnknownCode(u32),
}

fn parse_syntax_error(rest: &str) -> Result<SyntaxError, ProtocolError> {
    let (position, message) = rest
        .split_once(',')
        .ok_or_else(|| ProtocolError::BadNumber(rest.to_owned()))?;
    let position = position
        .parse::<usize>()
        .map_err(|_| ProtocolError::BadNumber(position.to_owned()))?;
    let (message, aux) = match message.split_once("+++") {
        Some((message, aux)) => (message, aux),
        None => (message, ""),
    };
    Ok(SyntaxError {
        position,
        message: message.to_owned(),
        aux: aux.to_owned(),
    })
}

fn leading_code(response: &str) -> Result<(u32, &str), ProtocolError> {
    let response = response.trim_matches(['\n', '\r']);
    if response.is_empty() {
        return Err(ProtocolError::Empty);
    }
    let (code, rest) = match response.split_once(',') {
        Some((code, rest)) => (code, rest),
        None => (response, ""),
    };
    let code = code
        .parse::<u32>()
        .map_err(|_| ProtocolError::BadNumber(code.to_owned()))?;
    Ok((code, rest))
}

/// Parses a `chkconstr.txt` / `chkmacro.txt` response.
pub(crate) fn parse_check(response: &str) -> Result<CheckResponse, ProtocolError> {
    let (code, rest) = leading_code(response)?;
    if code == 1 {
        Ok(CheckResponse::Rejected(parse_syntax_error(rest)?))
    } else {
        Ok(CheckResponse::Accepted)
    }
}

/// Parses a `chkexpr.txt` response of the shape `<code>,<label>[,<aux>]`.
pub(crate) fn parse_expr(response: &str) -> Result<ExprResponse, ProtocolError> {
    let (code, rest) = leading_code(response)?;
    if code == 1 {
        return Ok(ExprResponse::Rejected(parse_syntax_error(rest)?));
    }
    let kind = ResultKind::from_code(code).ok_or(ProtocolError::UnknownCode(code))?;
    let (label, aux) = match rest.split_once(',') {
        Some((label, aux)) => (label, aux),
        None => (rest, ""),
    };
    let label = label
        .parse::<u32>()
        .map_err(|_| ProtocolError::BadNumber(label.to_owned()))?;
    Ok(ExprResponse::Evaluated {
        kind,
        label,
        aux: aux.to_owned(),
    })
}

/// Parses a `chkpending.txt` response. Each line is `<label>,<token>`;
/// an empty token means the computation is still running. Lines that do
/// not match are skipped.
pub(crate) fn parse_pending(response: &str) -> Vec<(u32, Option<ResultKind>)> {
    response
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let (label, token) = line.split_once(',')?;
            let label = label.parse::<u32>().ok()?;
            if token.is_empty() {
                Some((label, None))
            } else {
                Some((label, Some(ResultKind::from_name(token)?)))
            }
        })
        .collect()
}

/// Parses a `history.txt` response: one past entry per line, with the
/// trailing empty line (from the final newline) stripped.
pub(crate) fn parse_history(response: &str) -> Vec<String> {
    let mut entries: Vec<String> = response
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_owned())
        .collect();
    if entries.last().is_some_and(|last| last.is_empty()) {
        entries.pop();
    }
    entries
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejection_with_aux_message() {
        assert_eq!(
            parse_check("1,5,bad token+++try again"),
            Ok(CheckResponse::Rejected(SyntaxError {
                position: 5,
                message: String::from("bad token"),
                aux: String::from("try again"),
            }))
        );
    }

    #[test]
    fn rejection_without_aux_message() {
        assert_eq!(
            parse_check("1,0,unexpected end of input\n"),
            Ok(CheckResponse::Rejected(SyntaxError {
                position: 0,
                message: String::from("unexpected end of input"),
                aux: String::new(),
            }))
        );
    }

    #[test]
    fn accepted_constraint() {
        assert_eq!(parse_check("0\n"), Ok(CheckResponse::Accepted));
    }

    #[test]
    fn evaluated_expression() {
        assert_eq!(
            parse_expr("6,375\n"),
            Ok(ExprResponse::Evaluated {
                kind: ResultKind::True,
                label: 375,
                aux: String::new(),
            })
        );
    }

    #[test]
    fn deferred_expression_gets_a_label() {
        assert_eq!(
            parse_expr("3,12"),
            Ok(ExprResponse::Evaluated {
                kind: ResultKind::Waiting,
                label: 12,
                aux: String::new(),
            })
        );
    }

    #[test]
    fn two_digit_result_codes() {
        assert_eq!(
            parse_expr("10,7"),
            Ok(ExprResponse::Evaluated {
                kind: ResultKind::EqZero,
                label: 7,
                aux: String::new(),
            })
        );
        assert_eq!(
            parse_expr("9,7"),
            Ok(ExprResponse::Evaluated {
                kind: ResultKind::OnlyLe,
                label: 7,
                aux: String::new(),
            })
        );
    }

    #[test]
    fn zap_carries_the_unrolled_form() {
        assert_eq!(
            parse_expr("2,44,0 <= I(a;b)"),
            Ok(ExprResponse::Evaluated {
                kind: ResultKind::Zap,
                label: 44,
                aux: String::from("0 <= I(a;b)"),
            })
        );
    }

    #[test]
    fn expr_rejection_parses_like_a_check_rejection() {
        assert_eq!(
            parse_expr("1,5,bad token+++try again"),
            Ok(ExprResponse::Rejected(SyntaxError {
                position: 5,
                message: String::from("bad token"),
                aux: String::from("try again"),
            }))
        );
    }

    #[test]
    fn unknown_code_is_an_error() {
        assert_eq!(parse_expr("12,1"), Err(ProtocolError::UnknownCode(12)));
        assert_eq!(parse_expr(""), Err(ProtocolError::Empty));
    }

    #[test]
    fn pending_lines_with_empty_tokens_stay_open() {
        assert_eq!(
            parse_pending("3,true\n7,\n12,false"),
            vec![
                (3, Some(ResultKind::True)),
                (7, None),
                (12, Some(ResultKind::False)),
            ]
        );
    }

    #[test]
    fn malformed_pending_lines_are_skipped() {
        assert_eq!(
            parse_pending("nonsense\n5,shrug\n8,timeout\n"),
            vec![(8, Some(ResultKind::Timeout))]
        );
    }

    #[test]
    fn history_strips_the_trailing_empty_line() {
        assert_eq!(
            parse_history("I(a;b) >= 0\nH(x|y) <= H(x)\n"),
            vec![
                String::from("I(a;b) >= 0"),
                String::from("H(x|y) <= H(x)"),
            ]
        );
        assert_eq!(parse_history(""), Vec::<String>::new());
    }

    #[test]
    fn result_kind_codes_and_names_agree() {
        for code in 2..=11 {
            let kind = ResultKind::from_code(code).unwrap();
            assert_eq!(ResultKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ResultKind::from_code(1), None);
        assert_eq!(ResultKind::from_name("maybe"), None);
    }
}
