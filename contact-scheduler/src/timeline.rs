//! Conversion of a plan's contacts into an ordered list of link events
//!
//! Contacts on the same link may overlap. They nest like a stack: the contact that started last is
//! in effect (among contacts starting together, the one ending last, then the one listed last),
//! and when it ends control goes back to the most recent contact that is still running. A link
//! without running contacts is cleared.
//!
//! Within one instant, the contacts starting on a link are processed before the contacts ending on
//! it, so back-to-back contacts hand over without clearing the link in between.
//!
//! An end that does not change the contact in effect produces no event. In particular, when a
//! contact that was shadowed by a later one ends, the later contact's parameters are not applied a
//! second time: every emitted event is a real transition of its link.

use crate::plan::{Contact, LinkKey, LinkParams, Offset, Plan};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Configure the link with the event's parameters
    Apply,
    /// No contact covers the link anymore, so it goes back to its baseline
    Clear,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkEvent {
    pub time: Offset,
    pub link: LinkKey,
    pub action: Action,
    pub params: LinkParams,
    /// Index in the plan of the contact whose parameters are applied (`None` for clears)
    pub contact: Option<usize>,
}

impl LinkEvent {
    fn apply(time: Offset, link: &LinkKey, contact: &RankedContact) -> Self {
        Self {
            time,
            link: link.clone(),
            action: Action::Apply,
            params: contact.contact.params,
            contact: Some(contact.index),
        }
    }

    fn clear(time: Offset, link: &LinkKey) -> Self {
        Self {
            time,
            link: link.clone(),
            action: Action::Clear,
            params: LinkParams::BASELINE,
            contact: None,
        }
    }
}

/// The events of one pass over a plan, ordered by time and then by link
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    events: Vec<LinkEvent>,
    duration: Duration,
}

impl Timeline {
    /// Builds the timeline for a plan
    ///
    /// This is a pure function: building twice from the same plan yields the same events.
    pub fn build(plan: &Plan) -> Self {
        let mut contacts_by_link: HashMap<LinkKey, Vec<RankedContact>> = HashMap::new();
        for (index, contact) in plan.contacts().iter().enumerate() {
            contacts_by_link
                .entry(contact.link())
                .or_default()
                .push(RankedContact { index, contact });
        }

        let mut events = Vec::new();
        for (link, contacts) in contacts_by_link {
            sweep_link(&link, contacts, &mut events);
        }

        // Stable sort, so events at the same time on the same link keep the order of the sweep
        events.sort_by(|x, y| x.time.cmp(&y.time).then_with(|| x.link.cmp(&y.link)));

        Self {
            events,
            duration: plan.duration(),
        }
    }

    pub fn events(&self) -> &[LinkEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The time from the epoch until the last event of the pass
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The links whose first event happens after the epoch, i.e. links that no contact covers when
    /// a pass starts
    pub fn idle_links_at_epoch(&self) -> Vec<LinkKey> {
        let mut first_event_by_link: BTreeMap<&LinkKey, Offset> = BTreeMap::new();
        for event in &self.events {
            // Events are sorted, so the first one we see for a link is the earliest
            first_event_by_link.entry(&event.link).or_insert(event.time);
        }

        first_event_by_link
            .into_iter()
            .filter(|(_, first)| *first > Offset::ZERO)
            .map(|(link, _)| link.clone())
            .collect()
    }
}

struct RankedContact<'a> {
    index: usize,
    contact: &'a Contact,
}

/// Walks the contacts of a single link in time order, keeping track of the running ones
fn sweep_link(link: &LinkKey, mut contacts: Vec<RankedContact>, events: &mut Vec<LinkEvent>) {
    contacts.sort_by(|x, y| {
        x.contact
            .start
            .cmp(&y.contact.start)
            .then_with(|| x.contact.end.cmp(&y.contact.end))
            .then_with(|| x.index.cmp(&y.index))
    });

    // The running contacts by rank (the position in the sorted list); the highest rank is in
    // effect
    let mut running: BTreeMap<usize, &RankedContact> = BTreeMap::new();
    // Min-heap of the ends of the running contacts
    let mut ends: BinaryHeap<Reverse<(Offset, usize)>> = BinaryHeap::new();

    for (rank, contact) in contacts.iter().enumerate() {
        // Contacts ending at this very instant are only processed after the new one has started
        end_contacts_before(Some(contact.contact.start), link, &mut running, &mut ends, events);

        running.insert(rank, contact);
        ends.push(Reverse((contact.contact.end, rank)));
        events.push(LinkEvent::apply(contact.contact.start, link, contact));
    }

    end_contacts_before(None, link, &mut running, &mut ends, events);
}

/// Ends the running contacts whose end is strictly before `limit` (or all of them, if there is no
/// limit), emitting an event whenever the contact in effect changes
fn end_contacts_before(
    limit: Option<Offset>,
    link: &LinkKey,
    running: &mut BTreeMap<usize, &RankedContact>,
    ends: &mut BinaryHeap<Reverse<(Offset, usize)>>,
    events: &mut Vec<LinkEvent>,
) {
    while let Some(&Reverse((time, _))) = ends.peek() {
        if limit.is_some_and(|limit| time >= limit) {
            break;
        }

        let in_effect_before = running.last_key_value().map(|(&rank, _)| rank);

        // All contacts ending at the same instant are removed at once, so we don't emit
        // intermediate states that only last for zero seconds
        while let Some(&Reverse((end, rank))) = ends.peek() {
            if end != time {
                break;
            }

            ends.pop();
            running.remove(&rank);
        }

        match running.last_key_value() {
            Some((&rank, _)) if Some(rank) == in_effect_before => {
                // The contact in effect keeps running, so nothing changes on the link
            }
            Some((_, contact)) => events.push(LinkEvent::apply(time, link, contact)),
            None => events.push(LinkEvent::clear(time, link)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{DEFAULT_BANDWIDTH_BPS, contact, link};

    fn params(bandwidth_bps: u64, loss_percent: f64) -> LinkParams {
        LinkParams {
            bandwidth_bps,
            loss_percent,
            delay_us: 0,
            jitter_us: 0,
        }
    }

    /// `(time in seconds, link, action, bandwidth)` tuples, which are easier to compare
    fn summarize(timeline: &Timeline) -> Vec<(i64, LinkKey, Action, u64)> {
        timeline
            .events()
            .iter()
            .map(|e| {
                (
                    e.time.as_millis() / 1_000,
                    e.link.clone(),
                    e.action,
                    e.params.bandwidth_bps,
                )
            })
            .collect()
    }

    #[test]
    fn test_single_contact() {
        let plan = Plan::new(
            false,
            vec![contact().start(3).end(8).a(2).b(1).loss_percent(5.0).call()],
        )
        .unwrap();

        let timeline = Timeline::build(&plan);
        assert_eq!(
            timeline.events(),
            &[
                LinkEvent {
                    time: Offset::from_secs(3),
                    link: link(1, 2),
                    action: Action::Apply,
                    params: params(DEFAULT_BANDWIDTH_BPS, 5.0),
                    contact: Some(0),
                },
                LinkEvent {
                    time: Offset::from_secs(8),
                    link: link(1, 2),
                    action: Action::Clear,
                    params: LinkParams::BASELINE,
                    contact: None,
                },
            ]
        );
        assert_eq!(timeline.duration(), Duration::from_secs(8));
    }

    #[test]
    fn test_two_hops() {
        let plan = Plan::new(
            false,
            vec![
                contact().start(0).end(10).a(1).b(2).loss_percent(0.2).call(),
                contact().start(10).end(20).a(2).b(3).loss_percent(0.2).call(),
            ],
        )
        .unwrap();

        let timeline = Timeline::build(&plan);
        let expected = [
            (0, link(1, 2), Action::Apply, Some(0)),
            (10, link(1, 2), Action::Clear, None),
            (10, link(2, 3), Action::Apply, Some(1)),
            (20, link(2, 3), Action::Clear, None),
        ];

        assert_eq!(timeline.events().len(), expected.len());
        for (event, (time, link, action, contact)) in timeline.events().iter().zip(expected) {
            assert_eq!(event.time, Offset::from_secs(time));
            assert_eq!(event.link, link);
            assert_eq!(event.action, action);
            assert_eq!(event.contact, contact);
            let expected_params = match action {
                Action::Apply => params(100_000, 0.2),
                Action::Clear => LinkParams::BASELINE,
            };
            assert_eq!(event.params, expected_params);
        }
    }

    #[test]
    fn test_nested_contact_reverts_to_outer() {
        let plan = Plan::new(
            false,
            vec![
                contact().start(0).end(20).a(1).b(2).bandwidth_bps(100).call(),
                contact().start(5).end(10).a(1).b(2).bandwidth_bps(200).call(),
            ],
        )
        .unwrap();

        assert_eq!(
            summarize(&Timeline::build(&plan)),
            vec![
                (0, link(1, 2), Action::Apply, 100),
                (5, link(1, 2), Action::Apply, 200),
                (10, link(1, 2), Action::Apply, 100),
                (20, link(1, 2), Action::Clear, 0),
            ]
        );
    }

    #[test]
    fn test_partial_overlap_follows_latest_start() {
        let plan = Plan::new(
            false,
            vec![
                contact().start(0).end(10).a(1).b(2).bandwidth_bps(100).call(),
                contact().start(5).end(15).a(1).b(2).bandwidth_bps(200).call(),
            ],
        )
        .unwrap();

        // The first contact ends while the second one is in effect, so nothing happens at t=10
        assert_eq!(
            summarize(&Timeline::build(&plan)),
            vec![
                (0, link(1, 2), Action::Apply, 100),
                (5, link(1, 2), Action::Apply, 200),
                (15, link(1, 2), Action::Clear, 0),
            ]
        );
    }

    #[test]
    fn test_shadowed_end_never_repeats_a_transition() {
        let plan = Plan::new(
            false,
            vec![
                contact().start(0).end(30).a(1).b(2).bandwidth_bps(100).call(),
                contact().start(5).end(15).a(1).b(2).bandwidth_bps(200).call(),
                contact().start(10).end(20).a(1).b(2).bandwidth_bps(300).call(),
            ],
        )
        .unwrap();

        let events = summarize(&Timeline::build(&plan));
        assert_eq!(
            events,
            vec![
                (0, link(1, 2), Action::Apply, 100),
                (5, link(1, 2), Action::Apply, 200),
                (10, link(1, 2), Action::Apply, 300),
                (20, link(1, 2), Action::Apply, 100),
                (30, link(1, 2), Action::Clear, 0),
            ]
        );
        assert!(events.windows(2).all(|pair| (pair[0].2, pair[0].3) != (pair[1].2, pair[1].3)));
    }

    #[test]
    fn test_back_to_back_contacts_hand_over_without_clear() {
        let plan = Plan::new(
            false,
            vec![
                contact().start(10).end(20).a(1).b(2).bandwidth_bps(200).call(),
                contact().start(0).end(10).a(2).b(1).bandwidth_bps(100).call(),
            ],
        )
        .unwrap();

        assert_eq!(
            summarize(&Timeline::build(&plan)),
            vec![
                (0, link(1, 2), Action::Apply, 100),
                (10, link(1, 2), Action::Apply, 200),
                (20, link(1, 2), Action::Clear, 0),
            ]
        );
    }

    #[test]
    fn test_identical_starts_apply_in_input_order() {
        let plan = Plan::new(
            false,
            vec![
                contact().start(0).end(10).a(1).b(2).bandwidth_bps(100).call(),
                contact().start(0).end(10).a(1).b(2).bandwidth_bps(200).call(),
            ],
        )
        .unwrap();

        // Both end at the same time, so the link is cleared once
        assert_eq!(
            summarize(&Timeline::build(&plan)),
            vec![
                (0, link(1, 2), Action::Apply, 100),
                (0, link(1, 2), Action::Apply, 200),
                (10, link(1, 2), Action::Clear, 0),
            ]
        );
    }

    #[test]
    fn test_identical_starts_prefer_longer_contact() {
        let plan = Plan::new(
            false,
            vec![
                contact().start(0).end(20).a(1).b(2).bandwidth_bps(100).call(),
                contact().start(0).end(10).a(1).b(2).bandwidth_bps(200).call(),
            ],
        )
        .unwrap();

        // The shorter contact sorts first, so the longer one ends up in effect
        assert_eq!(
            summarize(&Timeline::build(&plan)),
            vec![
                (0, link(1, 2), Action::Apply, 200),
                (0, link(1, 2), Action::Apply, 100),
                (20, link(1, 2), Action::Clear, 0),
            ]
        );
    }

    #[test]
    fn test_deeply_nested_contacts() {
        let plan = Plan::new(
            false,
            vec![
                contact().start(0).end(30).a(1).b(2).bandwidth_bps(100).call(),
                contact().start(5).end(25).a(1).b(2).bandwidth_bps(200).call(),
                contact().start(10).end(15).a(1).b(2).bandwidth_bps(300).call(),
                contact().start(12).end(25).a(1).b(2).bandwidth_bps(400).call(),
            ],
        )
        .unwrap();

        assert_eq!(
            summarize(&Timeline::build(&plan)),
            vec![
                (0, link(1, 2), Action::Apply, 100),
                (5, link(1, 2), Action::Apply, 200),
                (10, link(1, 2), Action::Apply, 300),
                (12, link(1, 2), Action::Apply, 400),
                (25, link(1, 2), Action::Apply, 100),
                (30, link(1, 2), Action::Clear, 0),
            ]
        );
    }

    #[test]
    fn test_events_are_ordered_and_reproducible() {
        let contacts = (0..50)
            .map(|i: i64| {
                let start = (i * 7) % 23;
                let a = (i % 4) as u32;
                contact()
                    .start(start)
                    .end(start + 1 + i % 5)
                    .a(a)
                    .b(a + 1 + (i % 3) as u32)
                    .bandwidth_bps(i as u64 + 1)
                    .call()
            })
            .collect();
        let plan = Plan::new(true, contacts).unwrap();

        let first = Timeline::build(&plan);
        for window in first.events().windows(2) {
            assert!(window[0].time <= window[1].time);
            if window[0].time == window[1].time {
                assert!(window[0].link <= window[1].link);
            }
        }

        for _ in 0..10 {
            assert_eq!(Timeline::build(&plan), first);
        }
    }

    #[test]
    fn test_idle_links_at_epoch() {
        let plan = Plan::new(
            false,
            vec![
                contact().start(0).end(10).a(1).b(2).call(),
                contact().start(5).end(10).a(2).b(3).call(),
                contact().start(-5).end(10).a(3).b(4).call(),
            ],
        )
        .unwrap();

        assert_eq!(Timeline::build(&plan).idle_links_at_epoch(), vec![link(2, 3)]);
    }

    #[test]
    fn test_empty_plan() {
        let timeline = Timeline::build(&Plan::default());
        assert!(timeline.is_empty());
        assert_eq!(timeline.duration(), Duration::ZERO);
    }
}
