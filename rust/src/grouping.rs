//! Per-row rendering rules for the message list: day separators, sender
//! names, and the time/duration labels shown on bubbles.
//!
//! Everything here is pure. The `_in` variants take an explicit time zone so
//! results are reproducible; the plain variants use the device's local
//! calendar.

use chatroom_backend_traits::Message;
use chrono::{DateTime, Days, Local, NaiveDate, TimeZone};

/// Who is looking at the list, and what kind of chat it is.
#[derive(Debug, Clone, Copy)]
pub struct GroupingContext<'a> {
    pub current_user_id: &'a str,
    pub is_group: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowFlags {
    pub show_day_separator: bool,
    pub show_sender_name: bool,
}

fn local_date<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|utc| utc.with_timezone(tz).date_naive())
}

/// Whether `messages[index]` starts a new calendar day in `tz`.
///
/// Always false for the first row and for out-of-range indices.
pub fn is_new_day_in<Tz: TimeZone>(messages: &[Message], index: usize, tz: &Tz) -> bool {
    if index == 0 || index >= messages.len() {
        return false;
    }
    let current = local_date(messages[index].timestamp_ms, tz);
    let previous = local_date(messages[index - 1].timestamp_ms, tz);
    current != previous
}

pub fn is_new_day(messages: &[Message], index: usize) -> bool {
    is_new_day_in(messages, index, &Local)
}

/// Whether `messages[index]` shows its author's name above the bubble.
///
/// Only in group chats, never for the current user's own messages, never for
/// the first row. Otherwise a name is shown after a day break or when the
/// author differs from the previous row's.
pub fn show_sender_name_in<Tz: TimeZone>(
    messages: &[Message],
    index: usize,
    ctx: &GroupingContext<'_>,
    tz: &Tz,
) -> bool {
    if !ctx.is_group || index == 0 || index >= messages.len() {
        return false;
    }
    let current = &messages[index];
    if current.sender_id == ctx.current_user_id {
        return false;
    }
    is_new_day_in(messages, index, tz) || messages[index - 1].sender_id != current.sender_id
}

pub fn show_sender_name(messages: &[Message], index: usize, ctx: &GroupingContext<'_>) -> bool {
    show_sender_name_in(messages, index, ctx, &Local)
}

pub fn row_flags_in<Tz: TimeZone>(
    messages: &[Message],
    ctx: &GroupingContext<'_>,
    tz: &Tz,
) -> Vec<RowFlags> {
    (0..messages.len())
        .map(|i| RowFlags {
            show_day_separator: is_new_day_in(messages, i, tz),
            show_sender_name: show_sender_name_in(messages, i, ctx, tz),
        })
        .collect()
}

pub fn row_flags(messages: &[Message], ctx: &GroupingContext<'_>) -> Vec<RowFlags> {
    row_flags_in(messages, ctx, &Local)
}

/// `MM:SS` for a duration in seconds (minutes are not capped at 59).
pub fn format_elapsed(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Bubble timestamp, e.g. `3:07 PM`.
pub fn time_label<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::from_timestamp_millis(timestamp_ms) {
        Some(utc) => utc.with_timezone(tz).format("%-I:%M %p").to_string(),
        None => String::new(),
    }
}

enum RelativeDay {
    Today,
    Yesterday,
    Earlier,
}

fn relative_day<Tz: TimeZone>(timestamp_ms: i64, now_ms: i64, tz: &Tz) -> RelativeDay {
    let (Some(day), Some(today)) = (local_date(timestamp_ms, tz), local_date(now_ms, tz)) else {
        return RelativeDay::Earlier;
    };
    if day == today {
        RelativeDay::Today
    } else if today.checked_sub_days(Days::new(1)) == Some(day) {
        RelativeDay::Yesterday
    } else {
        RelativeDay::Earlier
    }
}

/// Chat-list style label: time today, `Yesterday`, else `MM/dd/yy`.
pub fn day_or_time_label<Tz: TimeZone>(timestamp_ms: i64, now_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match relative_day(timestamp_ms, now_ms, tz) {
        RelativeDay::Today => time_label(timestamp_ms, tz),
        RelativeDay::Yesterday => "Yesterday".to_string(),
        RelativeDay::Earlier => match DateTime::from_timestamp_millis(timestamp_ms) {
            Some(utc) => utc.with_timezone(tz).format("%m/%d/%y").to_string(),
            None => String::new(),
        },
    }
}

/// Day separator text: `Today`, `Yesterday`, else e.g. `Mon, Jun 3`.
pub fn day_separator_label<Tz: TimeZone>(timestamp_ms: i64, now_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match relative_day(timestamp_ms, now_ms, tz) {
        RelativeDay::Today => "Today".to_string(),
        RelativeDay::Yesterday => "Yesterday".to_string(),
        RelativeDay::Earlier => match DateTime::from_timestamp_millis(timestamp_ms) {
            Some(utc) => utc.with_timezone(tz).format("%a, %b %-d").to_string(),
            None => String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use chatroom_backend_traits::{MediaFields, MessageKind, Reactions};
    use chrono::{FixedOffset, Utc};

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    fn msg(id: &str, sender: &str, ts: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            sender_id: sender.to_string(),
            kind: MessageKind::Text,
            body: String::new(),
            timestamp_ms: ts,
            media: MediaFields::default(),
            reactions: Reactions::default(),
        }
    }

    #[test]
    fn day_breaks_follow_the_calendar() {
        let messages = vec![
            msg("1", "a", at(2024, 6, 3, 10, 0)),
            msg("2", "a", at(2024, 6, 3, 14, 0)),
            msg("3", "a", at(2024, 6, 4, 9, 0)),
        ];
        let flags: Vec<bool> = (0..3).map(|i| is_new_day_in(&messages, i, &Utc)).collect();
        assert_eq!(flags, vec![false, false, true]);
        assert!(!is_new_day_in(&messages, 7, &Utc));
    }

    #[test]
    fn day_breaks_depend_on_the_time_zone() {
        // 23:30 and 00:30 UTC are the same day at UTC-5.
        let messages = vec![
            msg("1", "a", at(2024, 6, 3, 23, 30)),
            msg("2", "a", at(2024, 6, 4, 0, 30)),
        ];
        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        assert!(is_new_day_in(&messages, 1, &Utc));
        assert!(!is_new_day_in(&messages, 1, &est));
    }

    #[test]
    fn sender_names_mark_runs_in_group_chats() {
        let ts = at(2024, 6, 3, 10, 0);
        let messages = vec![
            msg("0", "me", ts),
            msg("1", "alice", ts + 1),
            msg("2", "alice", ts + 2),
            msg("3", "bob", ts + 3),
        ];
        let ctx = GroupingContext {
            current_user_id: "me",
            is_group: true,
        };
        let flags: Vec<bool> = (1..4)
            .map(|i| show_sender_name_in(&messages, i, &ctx, &Utc))
            .collect();
        assert_eq!(flags, vec![true, false, true]);
        assert!(!show_sender_name_in(&messages, 0, &ctx, &Utc));
    }

    #[test]
    fn sender_names_hidden_for_self_and_direct_chats() {
        let ts = at(2024, 6, 3, 10, 0);
        let messages = vec![msg("1", "alice", ts), msg("2", "me", ts + 1), msg("3", "alice", ts + 2)];
        let group = GroupingContext {
            current_user_id: "me",
            is_group: true,
        };
        let direct = GroupingContext {
            is_group: false,
            ..group
        };
        assert!(!show_sender_name_in(&messages, 1, &group, &Utc));
        assert!(show_sender_name_in(&messages, 2, &group, &Utc));
        assert!(!show_sender_name_in(&messages, 2, &direct, &Utc));
    }

    #[test]
    fn sender_name_repeats_after_day_break() {
        let messages = vec![
            msg("1", "alice", at(2024, 6, 3, 22, 0)),
            msg("2", "alice", at(2024, 6, 4, 8, 0)),
        ];
        let ctx = GroupingContext {
            current_user_id: "me",
            is_group: true,
        };
        let flags = row_flags_in(&messages, &ctx, &Utc);
        assert_eq!(
            flags[1],
            RowFlags {
                show_day_separator: true,
                show_sender_name: true
            }
        );
        assert_eq!(flags[0], RowFlags::default());
    }

    #[test]
    fn elapsed_formats_minutes_and_seconds() {
        assert_eq!(format_elapsed(0.0), "00:00");
        assert_eq!(format_elapsed(9.9), "00:09");
        assert_eq!(format_elapsed(75.0), "01:15");
        assert_eq!(format_elapsed(3600.0), "60:00");
        assert_eq!(format_elapsed(-3.0), "00:00");
    }

    #[test]
    fn labels_are_relative_to_now() {
        let now = at(2024, 6, 4, 12, 0);
        assert_eq!(time_label(at(2024, 6, 4, 15, 7), &Utc), "3:07 PM");
        assert_eq!(day_or_time_label(at(2024, 6, 4, 9, 5), now, &Utc), "9:05 AM");
        assert_eq!(day_or_time_label(at(2024, 6, 3, 9, 5), now, &Utc), "Yesterday");
        assert_eq!(day_or_time_label(at(2024, 5, 1, 9, 5), now, &Utc), "05/01/24");
        assert_eq!(day_separator_label(at(2024, 6, 4, 1, 0), now, &Utc), "Today");
        assert_eq!(day_separator_label(at(2024, 6, 3, 1, 0), now, &Utc), "Yesterday");
        assert_eq!(day_separator_label(at(2024, 6, 1, 1, 0), now, &Utc), "Sat, Jun 1");
    }
}
