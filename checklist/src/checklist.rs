use serde::{Deserialize, Serialize};

/// Maximum number of sub-items a single checklist item may carry.
pub const MAX_SUB_ITEMS: usize = 5;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Done => "done",
        }
    }
}

/// Child task of a broad checklist item. Sub-items never nest further.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SubItem {
    pub id: String,
    pub description: String,
    pub status: ItemStatus,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ChecklistItem {
    pub id: String,
    pub description: String,
    pub success_criteria: Option<String>,
    pub status: ItemStatus,
    pub notes: Option<String>,
    pub sub_items: Vec<SubItem>,
}

impl ChecklistItem {
    /// True when the item and every one of its sub-items are done.
    pub fn is_done(&self) -> bool {
        self.status == ItemStatus::Done
            && self
                .sub_items
                .iter()
                .all(|sub| sub.status == ItemStatus::Done)
    }

    pub fn sub_item(&self, id: &str) -> Option<&SubItem> {
        self.sub_items.iter().find(|sub| sub.id == id)
    }

    pub fn sub_item_mut(&mut self, id: &str) -> Option<&mut SubItem> {
        self.sub_items.iter_mut().find(|sub| sub.id == id)
    }

    /// Derive the parent status from its sub-items.
    ///
    /// All sub-items done marks the parent done; any started sub-item moves a
    /// pending parent to in-progress. Items without sub-items keep their status.
    /// Returns true if the status changed.
    pub fn derive_status_from_sub_items(&mut self) -> bool {
        if self.sub_items.is_empty() {
            return false;
        }
        let all_done = self
            .sub_items
            .iter()
            .all(|sub| sub.status == ItemStatus::Done);
        let any_started = self
            .sub_items
            .iter()
            .any(|sub| sub.status != ItemStatus::Pending);

        let derived = if all_done {
            ItemStatus::Done
        } else if any_started && self.status == ItemStatus::Pending {
            ItemStatus::InProgress
        } else {
            self.status
        };

        if derived != self.status {
            self.status = derived;
            return true;
        }
        false
    }
}

/// Append a note to an optional notes field, one note per line.
pub fn append_note(notes: &mut Option<String>, note: &str) {
    let note = note.trim();
    if note.is_empty() {
        return;
    }
    match notes {
        Some(existing) if !existing.is_empty() => {
            existing.push('\n');
            existing.push_str(note);
        }
        _ => *notes = Some(note.to_string()),
    }
}

/// Identifier for the `index`-th (0-based) top-level item.
pub fn item_id(index: usize) -> String {
    format!("item-{}", index + 1)
}

/// Identifier for the `index`-th (0-based) sub-item of `parent_id`.
pub fn sub_item_id(parent_id: &str, index: usize) -> String {
    format!("{}-{}", parent_id, index + 1)
}

/// Next free `item-N` id, one past the highest numbered item.
pub fn next_item_id(items: &[ChecklistItem]) -> String {
    let max = items
        .iter()
        .filter_map(|item| numeric_suffix(&item.id, "item-"))
        .max()
        .unwrap_or(0);
    format!("item-{}", max + 1)
}

/// Next free sub-item id under `parent`.
pub fn next_sub_item_id(parent: &ChecklistItem) -> String {
    let prefix = format!("{}-", parent.id);
    let max = parent
        .sub_items
        .iter()
        .filter_map(|sub| numeric_suffix(&sub.id, &prefix))
        .max()
        .unwrap_or(0);
    format!("{}{}", prefix, max + 1)
}

fn numeric_suffix(id: &str, prefix: &str) -> Option<usize> {
    id.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{item, item_with_sub_items, sub_item};

    #[test]
    fn is_done_requires_every_sub_item_done() {
        let mut parent =
            item_with_sub_items("item-1", vec![sub_item("item-1-1"), sub_item("item-1-2")]);
        parent.status = ItemStatus::Done;
        parent.sub_items[0].status = ItemStatus::Done;
        assert!(!parent.is_done());

        parent.sub_items[1].status = ItemStatus::Done;
        assert!(parent.is_done());
    }

    #[test]
    fn derive_marks_parent_done_when_all_sub_items_done() {
        let mut parent =
            item_with_sub_items("item-1", vec![sub_item("item-1-1"), sub_item("item-1-2")]);
        parent.sub_items[0].status = ItemStatus::Done;
        assert!(parent.derive_status_from_sub_items());
        assert_eq!(parent.status, ItemStatus::InProgress);

        parent.sub_items[1].status = ItemStatus::Done;
        assert!(parent.derive_status_from_sub_items());
        assert_eq!(parent.status, ItemStatus::Done);
        assert!(!parent.derive_status_from_sub_items());
    }

    #[test]
    fn derive_leaves_items_without_sub_items_alone() {
        let mut leaf = item("item-1");
        leaf.status = ItemStatus::InProgress;
        assert!(!leaf.derive_status_from_sub_items());
        assert_eq!(leaf.status, ItemStatus::InProgress);
    }

    #[test]
    fn next_ids_skip_past_highest_suffix() {
        let items = vec![item("item-1"), item("item-4"), item("custom")];
        assert_eq!(next_item_id(&items), "item-5");

        let parent = item_with_sub_items("item-2", vec![sub_item("item-2-3")]);
        assert_eq!(next_sub_item_id(&parent), "item-2-4");
        assert_eq!(next_sub_item_id(&item("item-9")), "item-9-1");
    }

    #[test]
    fn append_note_joins_lines_and_ignores_blank() {
        let mut notes = None;
        append_note(&mut notes, "  ");
        assert_eq!(notes, None);
        append_note(&mut notes, "venue booked");
        append_note(&mut notes, "deposit paid");
        assert_eq!(notes.as_deref(), Some("venue booked\ndeposit paid"));
    }
}
