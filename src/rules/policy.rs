//! Compaction policy strings
//!
//! Parses policy descriptors of the form:
//!
//! ```text
//! <agg>:<bucket>[:<retention>][;<agg>:<bucket>[:<retention>]...]
//! ```
//!
//! e.g. `max:1m;min:10s:1d;avg:2h;avg:3d`. Durations take an optional
//! `s`/`m`/`h`/`d` suffix; a bare number is milliseconds. A parsed policy is
//! materialized against a source series with [`RuleGraph::apply_policy`].
//!
//! [`RuleGraph::apply_policy`]: crate::rules::RuleGraph::apply_policy

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{map_res, opt, value},
    multi::separated_list1,
    sequence::preceded,
    IResult,
};

use crate::rules::error::{RuleError, RuleResult};
use crate::store::Aggregator;

/// One parsed policy entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    /// Aggregation applied per bucket
    pub aggregator: Aggregator,
    /// Bucket width in milliseconds
    pub bucket_ms: u64,
    /// Optional retention for the destination series, in milliseconds
    pub retention_ms: Option<u64>,
}

/// Parse a full policy string into its rules
pub fn parse_policy(input: &str) -> RuleResult<Vec<PolicyRule>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(RuleError::InvalidPolicy("empty policy".to_string()));
    }

    match parse_rules(trimmed) {
        Ok((remaining, rules)) if remaining.is_empty() => {
            for rule in &rules {
                if rule.bucket_ms == 0 {
                    return Err(RuleError::InvalidPolicy(
                        "bucket duration must be positive".to_string(),
                    ));
                }
            }
            Ok(rules)
        }
        Ok((remaining, _)) => Err(RuleError::InvalidPolicy(format!(
            "unexpected input after policy: '{}'",
            remaining
        ))),
        Err(e) => Err(RuleError::InvalidPolicy(format!("{:?}", e))),
    }
}

/// Parse one or more `;`-separated rules
fn parse_rules(input: &str) -> IResult<&str, Vec<PolicyRule>> {
    separated_list1(char(';'), parse_rule)(input)
}

/// Parse a single `agg:bucket[:retention]` entry
fn parse_rule(input: &str) -> IResult<&str, PolicyRule> {
    let (input, aggregator) = parse_aggregator(input)?;
    let (input, _) = char(':')(input)?;
    let (input, bucket_ms) = parse_duration(input)?;
    let (input, retention_ms) = opt(preceded(char(':'), parse_duration))(input)?;

    Ok((
        input,
        PolicyRule {
            aggregator,
            bucket_ms,
            retention_ms,
        },
    ))
}

/// Parse an aggregator name
fn parse_aggregator(input: &str) -> IResult<&str, Aggregator> {
    let end = input
        .find(|c: char| !c.is_alphabetic())
        .unwrap_or(input.len());
    let (name, rest) = input.split_at(end);
    match Aggregator::from_str(name) {
        Some(agg) => Ok((rest, agg)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

/// Parse a duration like "10s", "1m", "2h", "3d", or bare milliseconds
fn parse_duration(input: &str) -> IResult<&str, u64> {
    let (input, num) = map_res(digit1, |s: &str| s.parse::<u64>())(input)?;
    let (input, unit) = opt(alt((
        value(1000u64, alt((tag("s"), tag("S")))),
        value(60 * 1000u64, alt((tag("m"), tag("M")))),
        value(60 * 60 * 1000u64, alt((tag("h"), tag("H")))),
        value(24 * 60 * 60 * 1000u64, alt((tag("d"), tag("D")))),
    )))(input)?;

    Ok((input, num * unit.unwrap_or(1)))
}
