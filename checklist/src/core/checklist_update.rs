//! Checklist edits driven by skill results.
//!
//! Every function here fails closed: an update that references an unknown id,
//! lacks a required field, or would exceed the sub-item limit is reported as
//! an error instead of being skipped or clamped.

use std::collections::BTreeSet;

use crate::checklist::{
    ChecklistItem, ItemStatus, MAX_SUB_ITEMS, SubItem, append_note, item_id, next_item_id,
    next_sub_item_id, sub_item_id,
};
use crate::core::outputs::{
    ItemUpdate, ProgressSignal, ProposedItem, ProposedSubItem, SubItemUpdate, UpdateAction,
};
use crate::core::state::StatusChange;

/// Build the initial checklist with `item-N` / `item-N-M` ids.
pub fn build_items(proposed: &[ProposedItem]) -> Result<Vec<ChecklistItem>, String> {
    proposed
        .iter()
        .enumerate()
        .map(|(index, bullet)| {
            let id = item_id(index);
            let sub_items = build_sub_items(&id, &bullet.sub_items)?;
            Ok(ChecklistItem {
                id,
                description: required_text(&bullet.description, "item description")?,
                success_criteria: bullet.success_criteria.clone(),
                status: ItemStatus::Pending,
                notes: None,
                sub_items,
            })
        })
        .collect()
}

fn build_sub_items(parent_id: &str, proposed: &[ProposedSubItem]) -> Result<Vec<SubItem>, String> {
    if proposed.len() > MAX_SUB_ITEMS {
        return Err(format!(
            "{}: {} sub-items exceed the limit of {}",
            parent_id,
            proposed.len(),
            MAX_SUB_ITEMS
        ));
    }
    proposed
        .iter()
        .enumerate()
        .map(|(index, sub)| {
            Ok(SubItem {
                id: sub_item_id(parent_id, index),
                description: required_text(&sub.description, "sub-item description")?,
                status: ItemStatus::Pending,
                notes: None,
            })
        })
        .collect()
}

/// Apply ordered add/update/remove updates from a refinement merge.
pub fn apply_refinement_updates(
    items: &mut Vec<ChecklistItem>,
    updates: &[ItemUpdate],
) -> Result<(), String> {
    for update in updates {
        match update.action {
            UpdateAction::Add => {
                let description = update
                    .description
                    .as_deref()
                    .ok_or_else(|| "add update is missing a description".to_string())?;
                let id = match &update.item_id {
                    Some(id) if items.iter().any(|item| &item.id == id) => {
                        return Err(format!("add update reuses existing id '{}'", id));
                    }
                    Some(id) => id.clone(),
                    None => next_item_id(items),
                };
                let sub_items = match &update.sub_items {
                    Some(proposed) => build_sub_items(&id, proposed)?,
                    None => Vec::new(),
                };
                let mut item = ChecklistItem {
                    id,
                    description: required_text(description, "item description")?,
                    success_criteria: update.success_criteria.clone(),
                    status: ItemStatus::Pending,
                    notes: None,
                    sub_items,
                };
                apply_sub_item_updates(&mut item, &update.sub_item_updates)?;
                items.push(item);
            }
            UpdateAction::Update => {
                let id = target_id(update)?;
                let item = items
                    .iter_mut()
                    .find(|item| item.id == id)
                    .ok_or_else(|| format!("update references unknown item '{}'", id))?;
                if let Some(description) = &update.description {
                    item.description = required_text(description, "item description")?;
                }
                if update.success_criteria.is_some() {
                    item.success_criteria = update.success_criteria.clone();
                }
                // An absent or empty list keeps the current sub-items.
                if let Some(proposed) = update.sub_items.as_ref().filter(|list| !list.is_empty()) {
                    item.sub_items = build_sub_items(&item.id, proposed)?;
                }
                apply_sub_item_updates(item, &update.sub_item_updates)?;
            }
            UpdateAction::Remove => {
                let id = target_id(update)?;
                let before = items.len();
                items.retain(|item| item.id != id);
                if items.len() == before {
                    return Err(format!("remove references unknown item '{}'", id));
                }
            }
        }
    }
    Ok(())
}

fn target_id(update: &ItemUpdate) -> Result<&str, String> {
    update.item_id.as_deref().ok_or_else(|| {
        format!(
            "{} update is missing an item id",
            action_label(update.action)
        )
    })
}

fn apply_sub_item_updates(
    item: &mut ChecklistItem,
    updates: &[SubItemUpdate],
) -> Result<(), String> {
    for update in updates {
        match update.action {
            UpdateAction::Add => {
                if item.sub_items.len() >= MAX_SUB_ITEMS {
                    return Err(format!(
                        "{}: adding a sub-item would exceed the limit of {}",
                        item.id, MAX_SUB_ITEMS
                    ));
                }
                let description = update
                    .description
                    .as_deref()
                    .ok_or_else(|| format!("{}: sub-item add is missing a description", item.id))?;
                let id = match &update.sub_item_id {
                    Some(id) => id.clone(),
                    None => next_sub_item_id(item),
                };
                item.sub_items.push(SubItem {
                    id,
                    description: required_text(description, "sub-item description")?,
                    status: ItemStatus::Pending,
                    notes: None,
                });
            }
            UpdateAction::Update => {
                let id = sub_target_id(item, update)?;
                let parent_id = item.id.clone();
                let sub = item.sub_item_mut(&id).ok_or_else(|| {
                    format!("{}: update references unknown sub-item '{}'", parent_id, id)
                })?;
                if let Some(description) = &update.description {
                    sub.description = required_text(description, "sub-item description")?;
                }
            }
            UpdateAction::Remove => {
                let id = sub_target_id(item, update)?;
                let before = item.sub_items.len();
                item.sub_items.retain(|sub| sub.id != id);
                if item.sub_items.len() == before {
                    return Err(format!(
                        "{}: remove references unknown sub-item '{}'",
                        item.id, id
                    ));
                }
            }
        }
    }
    Ok(())
}

fn sub_target_id(item: &ChecklistItem, update: &SubItemUpdate) -> Result<String, String> {
    update.sub_item_id.clone().ok_or_else(|| {
        format!(
            "{}: sub-item {} is missing a sub-item id",
            item.id,
            action_label(update.action)
        )
    })
}

fn action_label(action: UpdateAction) -> &'static str {
    match action {
        UpdateAction::Add => "add",
        UpdateAction::Update => "update",
        UpdateAction::Remove => "remove",
    }
}

fn required_text(text: &str, label: &str) -> Result<String, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(format!("{} is empty", label));
    }
    Ok(trimmed.to_string())
}

/// Summary of status changes applied from one progress interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressApplication {
    pub affected_ids: BTreeSet<String>,
    pub status_changes: Vec<StatusChange>,
}

/// Apply progress signals, then derive parent statuses from their sub-items.
pub fn apply_progress_signals(
    items: &mut [ChecklistItem],
    signals: &[ProgressSignal],
) -> Result<ProgressApplication, String> {
    let mut applied = ProgressApplication::default();

    for signal in signals {
        for id in &signal.item_ids {
            let item = items
                .iter_mut()
                .find(|item| &item.id == id)
                .ok_or_else(|| format!("progress signal references unknown item '{}'", id))?;
            if let Some(status) = signal.new_status
                && item.status != status
            {
                item.status = status;
                applied.status_changes.push(StatusChange {
                    id: id.clone(),
                    status,
                });
            }
            if let Some(note) = &signal.note {
                append_note(&mut item.notes, note);
            }
            applied.affected_ids.insert(id.clone());
        }

        for id in &signal.sub_item_ids {
            let sub = items
                .iter_mut()
                .find_map(|item| item.sub_item_mut(id))
                .ok_or_else(|| format!("progress signal references unknown sub-item '{}'", id))?;
            if let Some(status) = signal.new_status
                && sub.status != status
            {
                sub.status = status;
                applied.status_changes.push(StatusChange {
                    id: id.clone(),
                    status,
                });
            }
            if let Some(note) = &signal.note {
                append_note(&mut sub.notes, note);
            }
            applied.affected_ids.insert(id.clone());
        }
    }

    for item in items.iter_mut() {
        if item.derive_status_from_sub_items() {
            applied.status_changes.push(StatusChange {
                id: item.id.clone(),
                status: item.status,
            });
            applied.affected_ids.insert(item.id.clone());
        }
    }

    Ok(applied)
}
