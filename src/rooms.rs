//! Room assignment for a finished timetable.
//!
//! Interval-graph coloring by chronological sweep. Defenses are sorted
//! by (date, start, end, project id); a min-heap of busy rooms keyed by
//! end time releases rooms whose occupant has left, and a min-heap of free
//! room indices hands out the lowest label. Labels are `R1`, `R2`, ...
//!
//! Without fixed rooms the number of labels equals the largest number of
//! defenses running at the same moment, which is optimal for interval
//! graphs. The output depends only on the inputs.
//!
//! # Reference
//! - Golumbic (2004), "Algorithmic Graph Theory and Perfect Graphs", Ch. 8
//!   (interval graph coloring)

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::models::{DefenseSchedule, RoomPlan, SlotInstant, TimeRange};

struct Booking<'a> {
    project: &'a str,
    instant: SlotInstant,
    fixed: Option<&'a str>,
}

/// Label of room index `idx`.
pub fn room_label(idx: usize) -> String {
    format!("R{}", idx + 1)
}

/// Assigns a room to every scheduled defense.
///
/// Slots carrying a fixed room keep it, and generated labels avoid any
/// fixed room in use at an overlapping time.
///
/// # Errors
/// - [`Error::InvariantViolation`] if the schedule names an unknown slot
/// - [`Error::RoomingImpossible`] if two concurrent defenses end up in
///   the same room (only possible through fixed rooms)
pub fn assign_rooms(dataset: &Dataset, schedule: &DefenseSchedule) -> Result<RoomPlan> {
    let mut bookings = Vec::with_capacity(schedule.slots.len());
    for (project, slot_id) in &schedule.slots {
        let slot = dataset
            .slot_idx(slot_id)
            .map(|s| &dataset.slots()[s])
            .ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "project '{project}' placed in unknown slot '{slot_id}'"
                ))
            })?;
        bookings.push(Booking {
            project,
            instant: slot.instant(),
            fixed: slot.room.as_deref(),
        });
    }
    bookings.sort_by(|a, b| (a.instant, a.project).cmp(&(b.instant, b.project)));

    let fixed: Vec<(NaiveDate, TimeRange, &str)> = bookings
        .iter()
        .filter_map(|b| b.fixed.map(|room| (b.instant.date, b.instant.range, room)))
        .collect();
    let blocked = |idx: usize, instant: &SlotInstant| {
        let label = room_label(idx);
        fixed
            .iter()
            .any(|(d, r, room)| *d == instant.date && r.overlaps(&instant.range) && *room == label)
    };

    let mut rooms = BTreeMap::new();
    let mut busy: BinaryHeap<Reverse<(NaiveTime, usize)>> = BinaryHeap::new();
    let mut free: BinaryHeap<Reverse<usize>> = BinaryHeap::new();
    let mut opened = 0usize;
    let mut current_date: Option<NaiveDate> = None;

    for booking in &bookings {
        let SlotInstant { date, range } = booking.instant;
        if current_date != Some(date) {
            while let Some(Reverse((_, idx))) = busy.pop() {
                free.push(Reverse(idx));
            }
            current_date = Some(date);
        }
        while let Some(&Reverse((end, idx))) = busy.peek() {
            if end > range.start {
                break;
            }
            busy.pop();
            free.push(Reverse(idx));
        }

        if let Some(room) = booking.fixed {
            rooms.insert(booking.project.to_string(), room.to_string());
            continue;
        }

        let mut skipped = Vec::new();
        let idx = loop {
            let candidate = match free.pop() {
                Some(Reverse(idx)) => idx,
                None => {
                    opened += 1;
                    opened - 1
                }
            };
            if blocked(candidate, &booking.instant) {
                skipped.push(candidate);
            } else {
                break candidate;
            }
        };
        free.extend(skipped.into_iter().map(Reverse));
        busy.push(Reverse((range.end, idx)));
        rooms.insert(booking.project.to_string(), room_label(idx));
    }

    check_disjoint(&bookings, &rooms)?;
    let room_count = rooms.values().collect::<BTreeSet<_>>().len();
    debug!(defenses = rooms.len(), room_count, "rooms assigned");
    Ok(RoomPlan { rooms, room_count })
}

/// Fails if two overlapping defenses share a room.
fn check_disjoint(bookings: &[Booking<'_>], rooms: &BTreeMap<String, String>) -> Result<()> {
    let mut by_room: BTreeMap<&str, Vec<&Booking<'_>>> = BTreeMap::new();
    for booking in bookings {
        if let Some(room) = rooms.get(booking.project) {
            by_room.entry(room.as_str()).or_default().push(booking);
        }
    }

    for (room, list) in by_room {
        // Holder is the booking with the latest end so far on its date.
        let mut holder: Option<&Booking<'_>> = None;
        for &booking in &list {
            if let Some(prev) = holder {
                if prev.instant.overlaps(&booking.instant) {
                    return Err(Error::RoomingImpossible {
                        room: room.to_string(),
                        instant: booking.instant.to_string(),
                        first: prev.project.to_string(),
                        second: booking.project.to_string(),
                    });
                }
                if prev.instant.date == booking.instant.date
                    && prev.instant.range.end >= booking.instant.range.end
                {
                    continue;
                }
            }
            holder = Some(booking);
        }
    }
    Ok(())
}
