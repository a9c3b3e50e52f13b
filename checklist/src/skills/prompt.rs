//! Prompt rendering for skill invocations.
//!
//! Templates are embedded per skill and rendered with minijinja. Rendered
//! output is split on `<!-- section:KEY required|droppable -->` markers so a
//! byte budget can drop history-heavy sections before anything the skill
//! strictly needs.

use std::sync::LazyLock;

use minijinja::{Environment, context};
use regex::Regex;
use tracing::debug;

use crate::checklist::ChecklistItem;
use crate::core::error::InvocationError;
use crate::core::state::{ProgressLogEntry, RefinementExchange};
use crate::core::types::SkillInput;
use crate::skills::registry::{all, definition};

static SECTION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").ok()
});

/// Sections dropped first when the prompt exceeds its budget.
const DROP_ORDER: [&str; 3] = ["progress", "refinements", "guidance"];

#[derive(Debug, Clone)]
struct Section {
    key: String,
    required: bool,
    content: String,
}

/// Renders skill prompts within a byte budget.
#[derive(Debug)]
pub struct PromptRenderer {
    env: Environment<'static>,
    budget_bytes: usize,
}

impl PromptRenderer {
    pub fn new(budget_bytes: usize) -> Result<Self, InvocationError> {
        let mut env = Environment::new();
        for skill in all() {
            env.add_template(skill.id.as_str(), skill.template)
                .map_err(|err| InvocationError::Prompt(format!("{}: {}", skill.id, err)))?;
        }
        Ok(Self { env, budget_bytes })
    }

    pub fn render(&self, input: &SkillInput) -> Result<String, InvocationError> {
        let skill = input.skill();
        let template = self
            .env
            .get_template(skill.as_str())
            .map_err(|err| InvocationError::Prompt(err.to_string()))?;
        let purpose = definition(skill).description;

        let rendered = match input {
            SkillInput::GenerateInitialChecklist { task_description } => template.render(context! {
                purpose => purpose,
                task_description => task_description.trim(),
            }),
            SkillInput::AskClarifyingQuestion {
                task_description,
                items,
                refinements,
                round,
            } => template.render(context! {
                purpose => purpose,
                task_description => task_description.trim(),
                checklist => outline(items),
                refinements => non_empty(transcript(refinements)),
                round => round,
            }),
            SkillInput::IncorporateRefinements {
                task_description,
                items,
                refinements,
            } => template.render(context! {
                purpose => purpose,
                task_description => task_description.trim(),
                checklist => outline(items),
                refinements => non_empty(transcript(refinements)),
            }),
            SkillInput::InterpretProgressUpdate { items, update } => template.render(context! {
                purpose => purpose,
                checklist => outline(items),
                update => update.trim(),
            }),
            SkillInput::GenerateSummary {
                task_description,
                items,
                refinements,
                progress_log,
            } => template.render(context! {
                purpose => purpose,
                task_description => task_description.trim(),
                checklist => outline(items),
                refinements => non_empty(transcript(refinements)),
                progress => non_empty(progress_history(progress_log)),
            }),
        }
        .map_err(|err| InvocationError::Prompt(err.to_string()))?;

        let mut sections = parse_sections(&rendered)?;
        apply_budget(&mut sections, self.budget_bytes);
        Ok(render_sections(&sections))
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

/// Markdown outline of items with ids, statuses and criteria.
pub fn outline(items: &[ChecklistItem]) -> String {
    let mut lines = Vec::new();
    for item in items {
        lines.push(format!(
            "- [{}] {}: {}",
            item.status.as_str(),
            item.id,
            item.description
        ));
        if let Some(criteria) = &item.success_criteria {
            lines.push(format!("  success: {}", criteria));
        }
        for sub in &item.sub_items {
            lines.push(format!(
                "  - [{}] {}: {}",
                sub.status.as_str(),
                sub.id,
                sub.description
            ));
        }
    }
    lines.join("\n")
}

fn transcript(refinements: &[RefinementExchange]) -> String {
    refinements
        .iter()
        .map(|exchange| {
            format!(
                "Round {}: {}\nAnswer: {}",
                exchange.round,
                exchange.question,
                exchange.answer.as_deref().unwrap_or("(not answered)")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn progress_history(entries: &[ProgressLogEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            format!(
                "- {} \"{}\" -> {}",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.raw_update,
                entry.interpretation_summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_sections(rendered: &str) -> Result<Vec<Section>, InvocationError> {
    let re = SECTION_RE
        .as_ref()
        .ok_or_else(|| InvocationError::Prompt("invalid section marker pattern".to_string()))?;

    let markers: Vec<_> = re.captures_iter(rendered).collect();
    let mut sections = Vec::new();
    for (index, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = markers
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |next| next.start());
        let content = rendered[whole.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(Section {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }
    Ok(sections)
}

fn apply_budget(sections: &mut Vec<Section>, budget: usize) {
    let total = |sections: &[Section]| -> usize { sections.iter().map(|s| s.content.len()).sum() };

    for key in DROP_ORDER {
        if total(sections) <= budget {
            return;
        }
        if let Some(index) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[index].content.len(),
                "dropped section for budget"
            );
            sections.remove(index);
        }
    }
    if total(sections) > budget {
        debug!(
            total = total(sections),
            budget, "prompt still over budget after dropping optional sections"
        );
    }
}

fn render_sections(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::ItemStatus;
    use crate::core::state::{ProgressLogEntry, StatusChange};
    use crate::test_support::{answered, fixed_time, item, item_with_sub_items, sub_item};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn summary_input(progress: usize) -> SkillInput {
        let entry = ProgressLogEntry {
            timestamp: fixed_time(),
            raw_update: "Booked the venue".to_string(),
            affected_item_ids: BTreeSet::from(["item-1".to_string()]),
            interpretation_summary: "item-1 done".to_string(),
            status_changes: vec![StatusChange {
                id: "item-1".to_string(),
                status: ItemStatus::Done,
            }],
        };
        SkillInput::GenerateSummary {
            task_description: "Plan a conference".to_string(),
            items: Arc::new(vec![item_with_sub_items(
                "item-1",
                vec![sub_item("item-1-1")],
            )]),
            refinements: Arc::new(vec![answered(1, "Budget?", "10k")]),
            progress_log: Arc::new(vec![entry; progress]),
        }
    }

    /// Sections appear in template order with their data.
    #[test]
    fn summary_prompt_includes_every_section() {
        let prompt = PromptRenderer::new(40_000)
            .expect("renderer")
            .render(&summary_input(2))
            .expect("render");

        let task = prompt.find("Plan a conference").expect("task");
        let checklist = prompt.find("item-1-1").expect("checklist");
        let refinements = prompt.find("Round 1: Budget?").expect("refinements");
        let progress = prompt.find("Booked the venue").expect("progress");
        assert!(task < checklist);
        assert!(checklist < refinements);
        assert!(refinements < progress);
        assert!(!prompt.contains("section:"), "markers are stripped");
    }

    /// A tight budget drops progress history before refinements.
    #[test]
    fn budget_drops_progress_first() {
        let renderer = PromptRenderer::new(1_500).expect("renderer");
        let prompt = renderer.render(&summary_input(60)).expect("render");
        assert!(!prompt.contains("Booked the venue"));
        assert!(prompt.contains("Plan a conference"));
        assert!(prompt.contains("item-1-1"));
    }

    #[test]
    fn every_skill_renders() {
        let renderer = PromptRenderer::new(40_000).expect("renderer");
        let items = Arc::new(vec![item("item-1")]);
        let inputs = [
            SkillInput::GenerateInitialChecklist {
                task_description: "Plan a conference".to_string(),
            },
            SkillInput::AskClarifyingQuestion {
                task_description: "Plan a conference".to_string(),
                items: items.clone(),
                refinements: Arc::default(),
                round: 1,
            },
            SkillInput::IncorporateRefinements {
                task_description: "Plan a conference".to_string(),
                items: items.clone(),
                refinements: Arc::new(vec![answered(1, "Budget?", "10k")]),
            },
            SkillInput::InterpretProgressUpdate {
                items,
                update: "Venue booked".to_string(),
            },
            summary_input(1),
        ];
        for input in &inputs {
            let prompt = renderer.render(input).expect("render");
            assert!(prompt.contains("JSON"), "{} prompt states the output contract", input.skill());
        }
    }

    #[test]
    fn outline_lists_status_and_sub_items() {
        let mut parent = item_with_sub_items("item-1", vec![sub_item("item-1-1")]);
        parent.status = ItemStatus::InProgress;
        parent.success_criteria = Some("Contract signed".to_string());
        assert_eq!(
            outline(&[parent]),
            "- [in_progress] item-1: item-1 description\n  success: Contract signed\n  - [pending] item-1-1: item-1-1 description"
        );
    }
}
