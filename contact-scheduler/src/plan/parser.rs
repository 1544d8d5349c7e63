//! Parser for the line-oriented contact plan format
//!
//! ```text
//! # comments start with a hash
//! s loop 1
//! a contact <start> <end> <node_a> <node_b> <bandwidth> [loss] [delay] [jitter]
//! ```
//!
//! Offsets are seconds relative to the plan's epoch (`+0`, `+10`, `-2.5`). Bandwidth is in bits per
//! second, loss in percent, delay and jitter in microseconds. Omitted impairments default to 0.

use crate::plan::{Contact, LinkParams, NodeId, Offset, Plan, PlanError, ValidationError};
use std::str::FromStr;

const MIN_CONTACT_FIELDS: usize = 5;
const MAX_CONTACT_FIELDS: usize = 8;

impl FromStr for Plan {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_plan(s)
    }
}

pub fn parse_plan(text: &str) -> Result<Plan, PlanError> {
    let mut looping = false;
    let mut contacts = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let at_line = |source| PlanError::Line { line: i + 1, source };

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<_> = line.split_whitespace().collect();
        match fields.as_slice() {
            ["s", "loop", flag] => {
                looping = parse_loop_flag(flag).map_err(at_line)?;
            }
            ["a", "contact", rest @ ..] => {
                let contact = parse_contact(rest).map_err(at_line)?;
                contact.validate().map_err(at_line)?;
                contacts.push(contact);
            }
            _ => {
                let directive = fields[..fields.len().min(2)].join(" ");
                return Err(at_line(ValidationError::UnknownDirective(directive)));
            }
        }
    }

    Plan::new(looping, contacts)
}

fn parse_loop_flag(flag: &str) -> Result<bool, ValidationError> {
    match flag {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ValidationError::InvalidLoopFlag(other.to_string())),
    }
}

fn parse_contact(fields: &[&str]) -> Result<Contact, ValidationError> {
    if !(MIN_CONTACT_FIELDS..=MAX_CONTACT_FIELDS).contains(&fields.len()) {
        return Err(ValidationError::FieldCount(fields.len()));
    }

    let optional = |index: usize| fields.get(index).copied();

    Ok(Contact {
        start: parse_offset("start", fields[0])?,
        end: parse_offset("end", fields[1])?,
        endpoint_a: parse_node(fields[2])?,
        endpoint_b: parse_node(fields[3])?,
        params: LinkParams {
            bandwidth_bps: parse_bandwidth(fields[4])?,
            loss_percent: optional(5)
                .map(|value| parse_number("loss", value))
                .transpose()?
                .unwrap_or_default(),
            delay_us: optional(6)
                .map(|value| parse_number("delay", value))
                .transpose()?
                .unwrap_or_default(),
            jitter_us: optional(7)
                .map(|value| parse_number("jitter", value))
                .transpose()?
                .unwrap_or_default(),
        },
    })
}

fn parse_offset(field: &'static str, value: &str) -> Result<Offset, ValidationError> {
    value.parse().map_err(|_| ValidationError::MalformedOffset {
        field,
        value: value.to_string(),
    })
}

fn parse_node(value: &str) -> Result<NodeId, ValidationError> {
    value
        .parse()
        .map_err(|_| ValidationError::InvalidNode(value.to_string()))
}

fn parse_bandwidth(value: &str) -> Result<u64, ValidationError> {
    let bandwidth: i64 = parse_number("bandwidth", value)?;
    if bandwidth <= 0 {
        return Err(ValidationError::NonPositiveBandwidth);
    }

    Ok(bandwidth as u64)
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> Result<T, ValidationError> {
    value.parse().map_err(|_| ValidationError::MalformedNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::contact;

    #[test]
    fn test_parse_plan() {
        let text = "
            # Two hops, one after the other
            s loop 0
            a contact +0 +10 1 2 100000 0.2 0 0
            a contact +10 +20 2 3 100000 0.2 0 0
        ";

        let plan: Plan = text.parse().unwrap();
        assert!(!plan.looping());
        assert_eq!(
            plan.contacts(),
            &[
                contact().start(0).end(10).a(1).b(2).loss_percent(0.2).call(),
                contact().start(10).end(20).a(2).b(3).loss_percent(0.2).call(),
            ]
        );
    }

    #[test]
    fn test_optional_impairments_default_to_zero() {
        let plan = parse_plan("s loop 1\na contact 0 5 sat gs 2000").unwrap();
        assert!(plan.looping());

        let contact = &plan.contacts()[0];
        assert_eq!(contact.endpoint_a.to_string(), "sat");
        assert_eq!(contact.endpoint_b.to_string(), "gs");
        assert_eq!(contact.params.bandwidth_bps, 2000);
        assert_eq!(contact.params.loss_percent, 0.0);
        assert_eq!(contact.params.delay_us, 0);
        assert_eq!(contact.params.jitter_us, 0);
    }

    #[test]
    fn test_loop_defaults_to_false() {
        let plan = parse_plan("a contact 0 5 1 2 2000 0 1000 200").unwrap();
        assert!(!plan.looping());
        assert_eq!(plan.contacts()[0].params.delay_us, 1000);
        assert_eq!(plan.contacts()[0].params.jitter_us, 200);
    }

    #[test]
    fn test_errors_point_at_the_offending_line() {
        let cases = [
            (
                "s loop 2",
                1,
                ValidationError::InvalidLoopFlag("2".to_string()),
            ),
            (
                "# comment\n\na contact 0 10 1 2",
                3,
                ValidationError::FieldCount(4),
            ),
            (
                "a contact 0 10 1 2 100 0 0 0 0",
                1,
                ValidationError::FieldCount(9),
            ),
            (
                "a contact soon 10 1 2 100",
                1,
                ValidationError::MalformedOffset {
                    field: "start",
                    value: "soon".to_string(),
                },
            ),
            (
                "a contact 0 10 1 2 lots",
                1,
                ValidationError::MalformedNumber {
                    field: "bandwidth",
                    value: "lots".to_string(),
                },
            ),
            (
                "a contact 0 10 1 2 -100",
                1,
                ValidationError::NonPositiveBandwidth,
            ),
            (
                "a contact 0 10 1 2 100 0 -5",
                1,
                ValidationError::MalformedNumber {
                    field: "delay",
                    value: "-5".to_string(),
                },
            ),
            (
                "s loop 0\na contact 10 0 1 2 100",
                2,
                ValidationError::EmptyWindow {
                    start: Offset::from_secs(10),
                    end: Offset::ZERO,
                },
            ),
            (
                "a contact 0 10 1 n/2 100",
                1,
                ValidationError::InvalidNode("n/2".to_string()),
            ),
            (
                "d contact 0 10 1 2 100",
                1,
                ValidationError::UnknownDirective("d contact".to_string()),
            ),
        ];

        for (input, line, source) in cases {
            assert_eq!(
                parse_plan(input).unwrap_err(),
                PlanError::Line { line, source },
                "{input}"
            );
        }
    }

    #[test]
    fn test_error_message() {
        let err = parse_plan("s loop 1\na contact +5 +5 1 2 100").unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 2: contact ends at +5s, which is not after its start at +5s"
        );
    }
}
