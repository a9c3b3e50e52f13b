//! Declarative skill definitions and output validation.
//!
//! Each skill is data: an id, a purpose, the input fields it may see, an
//! embedded output schema and an embedded prompt template. Nothing here calls
//! a model.

use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::core::error::WorkflowError;
use crate::core::outputs::SkillOutput;
use crate::core::types::{SkillId, SkillInput};

#[derive(Debug)]
pub struct SkillDefinition {
    pub id: SkillId,
    pub description: &'static str,
    /// Exact top-level keys of the skill's input payload.
    pub input_fields: &'static [&'static str],
    pub output_schema: &'static str,
    pub template: &'static str,
}

static SKILLS: [SkillDefinition; 5] = [
    SkillDefinition {
        id: SkillId::GenerateInitialChecklist,
        description: "Draft a checklist of actionable items from the task description.",
        input_fields: &["task_description"],
        output_schema: include_str!("../../schemas/generate_initial_checklist.schema.json"),
        template: include_str!("prompts/generate_initial_checklist.md"),
    },
    SkillDefinition {
        id: SkillId::AskClarifyingQuestion,
        description: "Ask one question that resolves the most important open ambiguity.",
        input_fields: &["task_description", "items", "refinements", "round"],
        output_schema: include_str!("../../schemas/ask_clarifying_question.schema.json"),
        template: include_str!("prompts/ask_clarifying_question.md"),
    },
    SkillDefinition {
        id: SkillId::IncorporateRefinements,
        description: "Merge answered clarifications into the checklist as item updates.",
        input_fields: &["task_description", "items", "refinements"],
        output_schema: include_str!("../../schemas/incorporate_refinements.schema.json"),
        template: include_str!("prompts/incorporate_refinements.md"),
    },
    SkillDefinition {
        id: SkillId::InterpretProgressUpdate,
        description: "Map a free-text progress report onto checklist status changes.",
        input_fields: &["items", "update"],
        output_schema: include_str!("../../schemas/interpret_progress_update.schema.json"),
        template: include_str!("prompts/interpret_progress_update.md"),
    },
    SkillDefinition {
        id: SkillId::GenerateSummary,
        description: "Summarize the completed checklist and its history.",
        input_fields: &["task_description", "items", "refinements", "progress_log"],
        output_schema: include_str!("../../schemas/generate_summary.schema.json"),
        template: include_str!("prompts/generate_summary.md"),
    },
];

pub fn all() -> &'static [SkillDefinition] {
    &SKILLS
}

pub fn definition(id: SkillId) -> &'static SkillDefinition {
    match id {
        SkillId::GenerateInitialChecklist => &SKILLS[0],
        SkillId::AskClarifyingQuestion => &SKILLS[1],
        SkillId::IncorporateRefinements => &SKILLS[2],
        SkillId::InterpretProgressUpdate => &SKILLS[3],
        SkillId::GenerateSummary => &SKILLS[4],
    }
}

/// Serialize `input` and check it carries exactly the declared fields.
pub fn check_input_contract(input: &SkillInput) -> Result<Value, WorkflowError> {
    let skill = input.skill();
    let declared = definition(skill).input_fields;
    let value = serde_json::to_value(input).map_err(|err| {
        WorkflowError::invariant(format!("serialize {} input: {}", skill, err))
    })?;
    let Value::Object(fields) = &value else {
        return Err(WorkflowError::invariant(format!(
            "{} input is not an object",
            skill
        )));
    };

    let mut errors = Vec::new();
    for key in fields.keys() {
        if !declared.contains(&key.as_str()) {
            errors.push(format!("undeclared input field '{}'", key));
        }
    }
    for key in declared {
        match fields.get(*key) {
            None => errors.push(format!("missing input field '{}'", key)),
            Some(Value::String(text)) if text.trim().is_empty() => {
                errors.push(format!("input field '{}' is empty", key));
            }
            Some(_) => {}
        }
    }
    if !errors.is_empty() {
        return Err(WorkflowError::invariant(format!(
            "{} input contract: {}",
            skill,
            errors.join("; ")
        )));
    }
    Ok(value)
}

/// Validate a raw skill response against its schema and decode it.
pub fn parse_output(skill: SkillId, raw: &str) -> Result<SkillOutput, WorkflowError> {
    let schema_error = |errors: Vec<String>| WorkflowError::SchemaValidation { skill, errors };

    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| schema_error(vec![format!("invalid JSON: {}", err)]))?;
    validate_against_schema(skill, &value).map_err(schema_error)?;

    let output = match skill {
        SkillId::GenerateInitialChecklist => {
            serde_json::from_value(value).map(SkillOutput::GenerateInitialChecklist)
        }
        SkillId::AskClarifyingQuestion => {
            serde_json::from_value(value).map(SkillOutput::AskClarifyingQuestion)
        }
        SkillId::IncorporateRefinements => {
            serde_json::from_value(value).map(SkillOutput::IncorporateRefinements)
        }
        SkillId::InterpretProgressUpdate => {
            serde_json::from_value(value).map(SkillOutput::InterpretProgressUpdate)
        }
        SkillId::GenerateSummary => serde_json::from_value(value).map(SkillOutput::GenerateSummary),
    }
    .map_err(|err| schema_error(vec![err.to_string()]))?;

    debug!(skill = %skill, "skill output validated");
    Ok(output)
}

fn validate_against_schema(skill: SkillId, value: &Value) -> Result<(), Vec<String>> {
    let schema: Value = serde_json::from_str(definition(skill).output_schema)
        .map_err(|err| vec![format!("parse output schema: {}", err)])?;
    let compiled =
        validator_for(&schema).map_err(|err| vec![format!("invalid output schema: {}", err)])?;
    if compiled.is_valid(value) {
        return Ok(());
    }
    Err(compiled
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinator::decide;
    use crate::core::state::Phase;
    use crate::core::types::Decision;
    use crate::test_support::{generated, item, state_in};
    use serde_json::json;

    /// Every embedded schema parses and compiles.
    #[test]
    fn embedded_schemas_compile() {
        for skill in all() {
            let schema: Value = serde_json::from_str(skill.output_schema).expect("schema json");
            validator_for(&schema).expect("schema compiles");
            assert!(!skill.template.trim().is_empty());
        }
    }

    #[test]
    fn definitions_are_indexed_by_id() {
        for id in SkillId::ALL {
            assert_eq!(definition(id).id, id);
        }
    }

    #[test]
    fn coordinator_inputs_satisfy_contracts() {
        let state = state_in(
            Phase::Refining {
                ambiguity_open: true,
            },
            vec![item("item-1")],
        );
        let Decision::LlmSkill { input, .. } = decide(&state) else {
            panic!("expected skill");
        };
        let value = check_input_contract(&input).expect("contract");
        assert_eq!(value["round"], json!(1));
    }

    #[test]
    fn empty_task_description_breaks_contract() {
        let input = SkillInput::GenerateInitialChecklist {
            task_description: "  ".to_string(),
        };
        let err = check_input_contract(&input).expect_err("expected error");
        assert!(err.to_string().contains("'task_description' is empty"));
    }

    #[test]
    fn valid_output_parses() {
        let raw = generated(&["Book venue"], true)
            .to_value()
            .expect("value")
            .to_string();
        let output = parse_output(SkillId::GenerateInitialChecklist, &raw).expect("parse");
        assert_eq!(output.skill(), SkillId::GenerateInitialChecklist);
    }

    #[test]
    fn invalid_json_is_a_schema_error() {
        let err = parse_output(SkillId::GenerateSummary, "not json").expect_err("error");
        assert!(matches!(err, WorkflowError::SchemaValidation { .. }));
    }

    /// Missing fields, extra fields and a sixth sub-item are all rejected.
    #[test]
    fn schema_violations_are_reported() {
        let missing = json!({ "ai_response": "hi", "summary": "s", "highlights": [] });
        let err = parse_output(SkillId::GenerateSummary, &missing.to_string()).expect_err("error");
        assert!(err.to_string().contains("completion_notes"));

        let extra = json!({
            "ai_response": "hi",
            "question": null,
            "intent": null,
            "confidence": 0.9
        });
        assert!(parse_output(SkillId::AskClarifyingQuestion, &extra.to_string()).is_err());

        let sub = json!({ "description": "step" });
        let too_many = json!({
            "ai_response": "hi",
            "items": [{
                "description": "Broad",
                "success_criteria": null,
                "sub_items": [sub, sub, sub, sub, sub, sub]
            }],
            "ambiguous": false,
            "risks": []
        });
        let err = parse_output(SkillId::GenerateInitialChecklist, &too_many.to_string())
            .expect_err("error");
        match err {
            WorkflowError::SchemaValidation { skill, errors } => {
                assert_eq!(skill, SkillId::GenerateInitialChecklist);
                assert!(!errors.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
