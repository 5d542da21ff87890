use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::Violation;
use crate::models::response::AnswerValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    FreeText,
    SingleChoice,
    MultipleChoice,
    Dropdown,
    Scale,
}

impl QuestionType {
    pub fn has_options(self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::Dropdown
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_selections: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Single-pick questions carry no rules beyond their option list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoRules {}

/// Type-specific shape of a question, keyed by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    FreeText {
        #[serde(default)]
        validation: TextRules,
    },
    SingleChoice {
        options: Vec<String>,
        #[serde(default)]
        validation: NoRules,
    },
    MultipleChoice {
        options: Vec<String>,
        #[serde(default)]
        validation: SelectionRules,
    },
    Dropdown {
        options: Vec<String>,
        #[serde(default)]
        validation: NoRules,
    },
    Scale {
        #[serde(default)]
        validation: RangeRules,
    },
}

impl QuestionKind {
    /// Default-shaped kind for `question_type`: one blank option for the
    /// option-bearing types, empty rules everywhere.
    pub fn empty(question_type: QuestionType) -> Self {
        let seed = || vec![String::new()];
        match question_type {
            QuestionType::FreeText => QuestionKind::FreeText {
                validation: TextRules::default(),
            },
            QuestionType::SingleChoice => QuestionKind::SingleChoice {
                options: seed(),
                validation: NoRules::default(),
            },
            QuestionType::MultipleChoice => QuestionKind::MultipleChoice {
                options: seed(),
                validation: SelectionRules::default(),
            },
            QuestionType::Dropdown => QuestionKind::Dropdown {
                options: seed(),
                validation: NoRules::default(),
            },
            QuestionType::Scale => QuestionKind::Scale {
                validation: RangeRules::default(),
            },
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::FreeText { .. } => QuestionType::FreeText,
            QuestionKind::SingleChoice { .. } => QuestionType::SingleChoice,
            QuestionKind::MultipleChoice { .. } => QuestionType::MultipleChoice,
            QuestionKind::Dropdown { .. } => QuestionType::Dropdown,
            QuestionKind::Scale { .. } => QuestionType::Scale,
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match self {
            QuestionKind::SingleChoice { options, .. }
            | QuestionKind::MultipleChoice { options, .. }
            | QuestionKind::Dropdown { options, .. } => Some(options),
            QuestionKind::FreeText { .. } | QuestionKind::Scale { .. } => None,
        }
    }

    fn check_definition(&self, prefix: &str, issues: &mut Vec<Violation>) {
        if let Some(options) = self.options() {
            if options.is_empty() {
                issues.push(Violation::new(
                    format!("{prefix}options"),
                    "at least one option is required",
                ));
            }
            for (idx, option) in options.iter().enumerate() {
                if option.trim().is_empty() {
                    issues.push(Violation::new(
                        format!("{prefix}options[{idx}]"),
                        "option must not be blank",
                    ));
                } else if options[..idx].contains(option) {
                    issues.push(Violation::new(
                        format!("{prefix}options[{idx}]"),
                        format!("duplicate option '{option}'"),
                    ));
                }
            }
        }

        let inverted = match self {
            QuestionKind::FreeText { validation } => {
                matches!((validation.min_length, validation.max_length), (Some(lo), Some(hi)) if lo > hi)
            }
            QuestionKind::MultipleChoice { validation, .. } => {
                matches!((validation.min_selections, validation.max_selections), (Some(lo), Some(hi)) if lo > hi)
            }
            QuestionKind::Scale { validation } => {
                matches!((validation.min, validation.max), (Some(lo), Some(hi)) if lo > hi)
            }
            _ => false,
        };
        if inverted {
            issues.push(Violation::new(
                format!("{prefix}validation"),
                "minimum must not exceed maximum",
            ));
        }
    }

    /// Checks a non-empty answer against this question's shape and rules.
    pub fn check_answer(&self, value: &AnswerValue) -> std::result::Result<(), String> {
        match self {
            QuestionKind::FreeText { validation } => {
                let AnswerValue::Text(text) = value else {
                    return Err("expected a text answer".to_string());
                };
                let len = text.trim().chars().count() as u32;
                if let Some(min) = validation.min_length {
                    if len < min {
                        return Err(format!("answer must be at least {min} characters"));
                    }
                }
                if let Some(max) = validation.max_length {
                    if len > max {
                        return Err(format!("answer must be at most {max} characters"));
                    }
                }
                Ok(())
            }
            QuestionKind::SingleChoice { options, .. } | QuestionKind::Dropdown { options, .. } => {
                let AnswerValue::Text(choice) = value else {
                    return Err("expected a single option".to_string());
                };
                if options.contains(choice) {
                    Ok(())
                } else {
                    Err(format!("'{choice}' is not one of the question's options"))
                }
            }
            QuestionKind::MultipleChoice {
                options,
                validation,
            } => {
                let Some(selected) = value.selections() else {
                    return Err("expected a list of options".to_string());
                };
                for (idx, choice) in selected.iter().enumerate() {
                    if !options.contains(choice) {
                        return Err(format!("'{choice}' is not one of the question's options"));
                    }
                    if selected[..idx].contains(choice) {
                        return Err(format!("'{choice}' selected more than once"));
                    }
                }
                let count = selected.len() as u32;
                if let Some(min) = validation.min_selections {
                    if count < min {
                        return Err(format!("select at least {min} options"));
                    }
                }
                if let Some(max) = validation.max_selections {
                    if count > max {
                        return Err(format!("select at most {max} options"));
                    }
                }
                Ok(())
            }
            QuestionKind::Scale { validation } => {
                let Some(number) = value.as_number() else {
                    return Err("expected a numeric answer".to_string());
                };
                if let Some(min) = validation.min {
                    if number < min {
                        return Err(format!("answer must be at least {min}"));
                    }
                }
                if let Some(max) = validation.max {
                    if number > max {
                        return Err(format!("answer must be at most {max}"));
                    }
                }
                Ok(())
            }
        }
    }
}

/// A question definition before it is attached to a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl NewQuestion {
    /// The canonical blank question the editor starts from.
    pub fn empty(question_type: QuestionType) -> Self {
        Self {
            text: String::new(),
            required: false,
            kind: QuestionKind::empty(question_type),
        }
    }

    /// Returns every problem with the definition; `prefix` scopes field names
    /// when the question is part of a larger payload.
    pub fn check(&self, prefix: &str) -> Vec<Violation> {
        let mut issues = Vec::new();
        if self.text.trim().is_empty() {
            issues.push(Violation::new(format!("{prefix}text"), "question text is required"));
        }
        self.kind.check_definition(prefix, &mut issues);
        issues
    }
}

pub fn create_empty_question(question_type: QuestionType) -> NewQuestion {
    NewQuestion::empty(question_type)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub template_id: Uuid,
    pub position: i64,
    pub text: String,
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }
}

#[derive(Debug, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub position: i64,
    pub text: String,
    pub required: bool,
    pub kind: Json<QuestionKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Self {
            id: row.id,
            template_id: row.template_id,
            position: row.position,
            text: row.text,
            required: row.required,
            kind: row.kind.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_multiple_choice_seeds_one_blank_option() {
        let question = create_empty_question(QuestionType::MultipleChoice);
        assert!(!question.required);
        assert_eq!(question.text, "");
        assert_eq!(question.kind.options(), Some(&[String::new()][..]));

        let wire = serde_json::to_value(&question).unwrap();
        assert_eq!(wire["type"], "MULTIPLE_CHOICE");
        assert_eq!(wire["options"], json!([""]));
        assert_eq!(wire["validation"], json!({}));
    }

    #[test]
    fn empty_scale_has_no_options() {
        let question = create_empty_question(QuestionType::Scale);
        assert!(!question.required);
        assert_eq!(question.kind.options(), None);

        let wire = serde_json::to_value(&question).unwrap();
        assert!(wire.get("options").is_none());
        assert_eq!(wire["validation"], json!({}));
    }

    #[test]
    fn every_option_bearing_type_is_seeded() {
        for ty in [
            QuestionType::FreeText,
            QuestionType::SingleChoice,
            QuestionType::MultipleChoice,
            QuestionType::Dropdown,
            QuestionType::Scale,
        ] {
            let kind = QuestionKind::empty(ty);
            assert_eq!(kind.question_type(), ty);
            assert_eq!(kind.options().is_some(), ty.has_options());
        }
    }

    #[test]
    fn definition_rejects_blank_and_duplicate_options() {
        let question = NewQuestion {
            text: "Favourite subject?".into(),
            required: true,
            kind: QuestionKind::SingleChoice {
                options: vec!["Maths".into(), " ".into(), "Maths".into()],
                validation: NoRules::default(),
            },
        };
        let issues = question.check("questions[0].");
        let fields: Vec<_> = issues.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["questions[0].options[1]", "questions[0].options[2]"]);
    }

    #[test]
    fn the_blank_template_question_is_not_a_valid_definition() {
        let issues = create_empty_question(QuestionType::Dropdown).check("");
        assert!(issues.iter().any(|v| v.field == "text"));
        assert!(issues.iter().any(|v| v.field == "options[0]"));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let question = NewQuestion {
            text: "How stressed are you?".into(),
            required: false,
            kind: QuestionKind::Scale {
                validation: RangeRules {
                    min: Some(10.0),
                    max: Some(1.0),
                },
            },
        };
        assert_eq!(question.check("")[0].field, "validation");
    }

    #[test]
    fn deserializes_tagged_question_payload() {
        let question: NewQuestion = serde_json::from_value(json!({
            "text": "Which clubs do you attend?",
            "type": "MULTIPLE_CHOICE",
            "required": true,
            "options": ["Chess", "Choir", "Football"],
            "validation": { "max_selections": 2 }
        }))
        .unwrap();
        assert!(question.required);
        assert_eq!(question.kind.question_type(), QuestionType::MultipleChoice);
        assert!(question.check("").is_empty());
    }

    #[test]
    fn choice_answers_must_come_from_options() {
        let kind = QuestionKind::Dropdown {
            options: vec!["9A".into(), "9B".into()],
            validation: NoRules::default(),
        };
        assert!(kind.check_answer(&AnswerValue::Text("9A".into())).is_ok());
        assert!(kind.check_answer(&AnswerValue::Text("10C".into())).is_err());
        assert!(kind.check_answer(&AnswerValue::Number(1.0)).is_err());
    }

    #[test]
    fn multiple_choice_enforces_selection_rules() {
        let kind = QuestionKind::MultipleChoice {
            options: vec!["a".into(), "b".into(), "c".into()],
            validation: SelectionRules {
                min_selections: Some(1),
                max_selections: Some(2),
            },
        };
        let pick = |v: &[&str]| AnswerValue::Selections(v.iter().map(|s| s.to_string()).collect());
        assert!(kind.check_answer(&pick(&["a", "c"])).is_ok());
        assert!(kind.check_answer(&pick(&["a", "b", "c"])).is_err());
        assert!(kind.check_answer(&pick(&["a", "a"])).is_err());
        assert!(kind.check_answer(&pick(&["z"])).is_err());
    }

    #[test]
    fn scale_and_text_rules_apply() {
        let scale = QuestionKind::Scale {
            validation: RangeRules {
                min: Some(1.0),
                max: Some(5.0),
            },
        };
        assert!(scale.check_answer(&AnswerValue::Number(3.0)).is_ok());
        assert!(scale.check_answer(&AnswerValue::Text("4".into())).is_ok());
        assert!(scale.check_answer(&AnswerValue::Number(6.0)).is_err());
        assert!(scale.check_answer(&AnswerValue::Text("often".into())).is_err());

        let text = QuestionKind::FreeText {
            validation: TextRules {
                min_length: Some(3),
                max_length: Some(10),
            },
        };
        assert!(text.check_answer(&AnswerValue::Text("fine".into())).is_ok());
        assert!(text.check_answer(&AnswerValue::Text("ok".into())).is_err());
        assert!(text.check_answer(&AnswerValue::Text("far too long to fit".into())).is_err());
    }
}
