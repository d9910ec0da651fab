//! Multi-range query parser
//!
//! Parses the argument tail of a multi-range request into a [`RangeQuery`]:
//!
//! ```text
//! <from> <to> [WITHLABELS] [COUNT n] FILTER matcher... [GROUPBY label REDUCE fn]
//! ```
//!
//! Bounds are `-`/`+` open-range sentinels, integer milliseconds, or RFC 3339
//! timestamps. Matchers are `label=value` or `label!=value`. Every syntax
//! problem — a malformed GROUPBY clause, an unknown reducer, trailing
//! tokens — is rejected here, before any data is fetched.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{digit1, multispace0, multispace1},
    combinator::{map_res, opt},
    multi::many1,
    sequence::preceded,
    IResult,
};

use crate::query::ast::{GroupBy, LabelMatcher, MatchOp, RangeQuery, Reducer};
use crate::query::error::{QueryError, QueryResult};
use crate::store::TimeRange;

/// Parse a query string into a [`RangeQuery`]
pub fn parse_range_query(input: &str) -> QueryResult<RangeQuery> {
    let input = input.trim();

    match parse_full_query(input) {
        Ok((remaining, query)) => {
            if remaining.trim().is_empty() {
                Ok(query)
            } else {
                Err(QueryError::Syntax(format!(
                    "unexpected input after query: '{}'",
                    remaining.trim()
                )))
            }
        }
        Err(e) => Err(QueryError::Syntax(format!("parse error: {:?}", e))),
    }
}

/// Parse the full query
fn parse_full_query(input: &str) -> IResult<&str, RangeQuery> {
    let (input, _) = multispace0(input)?;
    let (input, start) = parse_bound(input)?;
    let (input, _) = multispace1(input)?;
    let (input, end) = parse_bound(input)?;

    // Optional flags, in any order, until the mandatory FILTER keyword.
    let mut with_labels = false;
    let mut count: Option<usize> = None;
    let mut rest = input;
    loop {
        let (after_space, _) = multispace1(rest)?;

        if let Ok((r, _)) =
            tag_no_case::<_, _, nom::error::Error<&str>>("WITHLABELS")(after_space)
        {
            with_labels = true;
            rest = r;
            continue;
        }

        if let Ok((r, _)) = tag_no_case::<_, _, nom::error::Error<&str>>("COUNT")(after_space) {
            let (r, _) = multispace1(r)?;
            let (r, n) = map_res(digit1, |s: &str| s.parse::<usize>())(r)?;
            count = Some(n);
            rest = r;
            continue;
        }

        let (r, _) = tag_no_case("FILTER")(after_space)?;
        rest = r;
        break;
    }

    let (input, matchers) = many1(preceded(multispace1, parse_matcher))(rest)?;
    let (input, group_by) = opt(parse_group_by)(input)?;

    Ok((
        input,
        RangeQuery {
            range: TimeRange::new(start, end),
            matchers,
            with_labels,
            count,
            group_by,
        },
    ))
}

/// Parse a range bound: `-`, `+`, integer milliseconds, or RFC 3339
fn parse_bound(input: &str) -> IResult<&str, i64> {
    map_res(take_while1(|c: char| !c.is_whitespace()), interpret_bound)(input)
}

fn interpret_bound(token: &str) -> Result<i64, ()> {
    match token {
        "-" => Ok(TimeRange::EARLIEST),
        "+" => Ok(TimeRange::LATEST),
        _ => {
            if let Ok(ms) = token.parse::<i64>() {
                return Ok(ms);
            }
            chrono::DateTime::parse_from_rfc3339(token)
                .map(|dt| dt.timestamp_millis())
                .map_err(|_| ())
        }
    }
}

/// Parse a `label=value` or `label!=value` matcher
fn parse_matcher(input: &str) -> IResult<&str, LabelMatcher> {
    let (input, name) = parse_identifier(input)?;
    let (input, op) = alt((tag("!="), tag("=")))(input)?;
    let (input, value) = take_while1(|c: char| !c.is_whitespace())(input)?;

    let op = if op == "!=" { MatchOp::Ne } else { MatchOp::Eq };
    Ok((
        input,
        LabelMatcher {
            name: name.to_string(),
            op,
            value: value.to_string(),
        },
    ))
}

/// Parse a GROUPBY clause: both the label and exactly one recognized reducer
/// are mandatory
fn parse_group_by(input: &str) -> IResult<&str, GroupBy> {
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("GROUPBY")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, label) = parse_identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("REDUCE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, reducer) = parse_reducer(input)?;

    Ok((input, GroupBy::new(label, reducer)))
}

/// Parse a recognized reducer name
fn parse_reducer(input: &str) -> IResult<&str, Reducer> {
    map_res(parse_identifier, |name| Reducer::from_str(name).ok_or(()))(input)
}

/// Parse an identifier (label name, reducer name)
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}
