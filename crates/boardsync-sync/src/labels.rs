//! Priority <-> label mapping.
//!
//! Pulling is a pure function of the card's labels. Pushing needs the
//! board's current labels, which are re-fetched on every call.

use tracing::warn;

use boardsync_core::remote::{RemoteCredential, RemoteLabel};
use boardsync_core::task::Priority;
use boardsync_trello::RemoteTracker;

/// Label color and name used when pushing `priority`.
pub fn label_for(priority: Priority) -> (&'static str, &'static str) {
    match priority {
        Priority::High => ("red", "High Priority"),
        Priority::Medium => ("yellow", "Medium Priority"),
        Priority::Low => ("green", "Low Priority"),
    }
}

/// Derive a priority from card labels. Names win over colors; within each
/// pass the first matching label in input order decides.
pub fn priority_from_labels(labels: &[RemoteLabel]) -> Priority {
    labels
        .iter()
        .find_map(|l| priority_from_name(&l.name))
        .or_else(|| {
            labels
                .iter()
                .find_map(|l| l.color.as_deref().and_then(priority_from_color))
        })
        .unwrap_or_default()
}

fn priority_from_name(name: &str) -> Option<Priority> {
    let name = name.to_lowercase();
    if name.contains("high") {
        Some(Priority::High)
    } else if name.contains("medium") {
        Some(Priority::Medium)
    } else if name.contains("low") {
        Some(Priority::Low)
    } else {
        None
    }
}

fn priority_from_color(color: &str) -> Option<Priority> {
    match color {
        "red" => Some(Priority::High),
        "yellow" => Some(Priority::Medium),
        "green" => Some(Priority::Low),
        _ => None,
    }
}

/// Label ids to attach for `priority` on `board_id`. Reuses a label whose
/// name matches case-insensitively, otherwise creates one. Any tracker
/// failure yields an empty list so the caller omits the field.
pub async fn labels_for_priority(
    tracker: &dyn RemoteTracker,
    cred: &RemoteCredential,
    board_id: &str,
    priority: Priority,
) -> Vec<String> {
    let (color, name) = label_for(priority);

    let existing = match tracker.fetch_labels(cred, board_id).await {
        Ok(labels) => labels,
        Err(e) => {
            warn!(board_id, error = %e, "could not fetch board labels");
            return Vec::new();
        }
    };
    if let Some(label) = find_label(&existing, name) {
        return vec![label.id.clone()];
    }

    match tracker.create_label(cred, board_id, name, color).await {
        Ok(label) => vec![label.id],
        Err(e) => {
            warn!(board_id, label = name, error = %e, "could not create priority label");
            Vec::new()
        }
    }
}

fn find_label<'a>(labels: &'a [RemoteLabel], name: &str) -> Option<&'a RemoteLabel> {
    labels.iter().find(|l| l.name.eq_ignore_ascii_case(name))
}
