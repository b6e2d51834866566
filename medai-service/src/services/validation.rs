//! Quality gates for generated questions and flashcards.

use crate::models::{Difficulty, Flashcard, Question, QuestionType};
use std::collections::HashSet;

pub const FRONT_MIN_CHARS: usize = 20;
pub const FRONT_MAX_CHARS: usize = 500;
pub const BACK_MIN_CHARS: usize = 30;
pub const BACK_MAX_CHARS: usize = 600;
/// Fronts at least this similar to an earlier card are dropped.
pub const NEAR_DUPLICATE_THRESHOLD: f64 = 0.85;

const MIN_COMMENTARY_CHARS: usize = 180;
const MIN_OPTION_CHARS: usize = 12;
const DANGEROUS_MARKUP: [&str; 6] = [
    "<script", "<iframe", "<object", "<embed", "onerror=", "onload=",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Rejects the question.
    Critical,
    /// Logged only.
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn critical(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Critical,
            field,
            message: message.into(),
        });
    }

    fn warning(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Warning,
            field,
            message: message.into(),
        });
    }

    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    pub fn critical_messages(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn min_statement_chars(difficulty: Difficulty) -> usize {
    match difficulty {
        Difficulty::Easy => 40,
        Difficulty::Medium => 80,
        Difficulty::Hard => 120,
    }
}

pub fn validate_question(question: &Question, allowed_types: &[QuestionType]) -> ValidationReport {
    let mut report = ValidationReport::default();
    let statement = question.statement.trim();
    let options = &question.content.options;

    if statement.is_empty() {
        report.critical("statement", "is empty");
    } else if statement.chars().count() < min_statement_chars(question.difficulty) {
        report.warning("statement", "is short for its difficulty");
    }

    let lowered = statement.to_lowercase();
    if lowered.contains(" except") || lowered.contains(" exceto") {
        report.warning("statement", "is negatively phrased");
    }

    let commentary = question.commentary.trim();
    if commentary.is_empty() {
        report.critical("commentary", "is empty");
    } else if commentary.chars().count() < MIN_COMMENTARY_CHARS {
        report.warning("commentary", "is shorter than a full explanation");
    }

    if !allowed_types.contains(&question.q_type) {
        report.critical(
            "q_type",
            format!("{} is not allowed here", question.q_type),
        );
    }

    if options.iter().any(|o| o.text.trim().is_empty()) {
        report.critical("options", "contain an empty text");
    }

    let correct = options.iter().filter(|o| o.is_correct).count();

    match question.q_type {
        QuestionType::MultipleChoice => {
            if options.len() != 4 {
                report.critical("options", format!("expected 4, got {}", options.len()));
            }
            if correct != 1 {
                report.critical("options", format!("expected 1 correct, got {}", correct));
            }

            let unique: HashSet<String> = options.iter().map(|o| normalize(&o.text)).collect();
            if unique.len() != options.len() {
                report.critical("options", "contain duplicate texts");
            }

            if options
                .iter()
                .any(|o| o.text.trim().chars().count() < MIN_OPTION_CHARS)
            {
                report.warning("options", "contain very short alternatives");
            }
            if options.iter().any(|o| {
                let t = normalize(&o.text);
                t.contains("all of the above")
                    || t.contains("none of the above")
                    || t.contains("todas as anteriores")
                    || t.contains("nenhuma das anteriores")
            }) {
                report.warning("options", "use an all/none of the above alternative");
            }
        }
        QuestionType::TrueFalse => {
            if options.len() != 2 {
                report.critical("options", format!("expected 2, got {}", options.len()));
            }
            if correct != 1 {
                report.critical("options", format!("expected 1 correct, got {}", correct));
            }
        }
        QuestionType::FillGap => {
            match question
                .content
                .correct_answer
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
            {
                None => report.critical("correct_answer", "is missing"),
                Some(answer) => {
                    let answer = normalize(answer);
                    if !options.iter().any(|o| normalize(&o.text) == answer) {
                        report.critical("correct_answer", "is not among the options");
                    }
                }
            }
            if options.len() < 4 {
                report.critical(
                    "options",
                    format!("expected at least 4, got {}", options.len()),
                );
            }
        }
    }

    report
}

/// Escape markup when a text carries script-capable HTML; plain markdown passes.
pub fn sanitize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    if DANGEROUS_MARKUP.iter().any(|m| lowered.contains(m)) {
        html_escape::encode_quoted_attribute(text).into_owned()
    } else {
        text.to_string()
    }
}

fn flashcard_in_bounds(card: &Flashcard) -> bool {
    let front = card.front.chars().count();
    let back = card.back.chars().count();
    (FRONT_MIN_CHARS..=FRONT_MAX_CHARS).contains(&front)
        && (BACK_MIN_CHARS..=BACK_MAX_CHARS).contains(&back)
}

/// Drop out-of-bounds, duplicate and near-duplicate cards, then sanitize.
/// Input order is kept among survivors.
pub fn clean_flashcards(cards: Vec<Flashcard>) -> Vec<Flashcard> {
    let total = cards.len();
    let mut kept: Vec<Flashcard> = Vec::with_capacity(total);
    let mut fronts: Vec<String> = Vec::with_capacity(total);

    for card in cards {
        let card = Flashcard {
            front: card.front.trim().to_string(),
            back: card.back.trim().to_string(),
            tags: card.tags,
        };

        if !flashcard_in_bounds(&card) {
            continue;
        }

        let front = normalize(&card.front);
        let duplicate = fronts.iter().any(|seen| {
            *seen == front || strsim::normalized_levenshtein(seen, &front) > NEAR_DUPLICATE_THRESHOLD
        });
        if duplicate {
            continue;
        }

        fronts.push(front);
        kept.push(Flashcard {
            front: sanitize_text(&card.front),
            back: sanitize_text(&card.back),
            tags: card.tags,
        });
    }

    if kept.len() < total {
        tracing::debug!(total, kept = kept.len(), "Dropped flashcards during cleanup");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerOption, QuestionContent};

    fn option(id: &str, text: &str, is_correct: bool) -> AnswerOption {
        AnswerOption {
            id: id.to_string(),
            text: text.to_string(),
            is_correct,
        }
    }

    fn multiple_choice(options: Vec<AnswerOption>) -> Question {
        Question {
            statement: "A 54-year-old man presents with crushing chest pain radiating to the left arm. Which artery is most likely occluded?".to_string(),
            q_type: QuestionType::MultipleChoice,
            difficulty: Difficulty::Medium,
            commentary: "Correct answer: left anterior descending artery.".to_string(),
            content: QuestionContent {
                options,
                ..Default::default()
            },
            xp_reward: 0,
        }
    }

    fn four_options() -> Vec<AnswerOption> {
        vec![
            option("a", "Left anterior descending", true),
            option("b", "Right coronary artery", false),
            option("c", "Left circumflex artery", false),
            option("d", "Posterior descending artery", false),
        ]
    }

    fn card(front: &str, back: &str) -> Flashcard {
        Flashcard {
            front: front.to_string(),
            back: back.to_string(),
            tags: vec![],
        }
    }

    #[test]
    fn well_formed_multiple_choice_passes() {
        let report = validate_question(&multiple_choice(four_options()), &QuestionType::ALL);
        assert!(report.is_valid(), "{:?}", report.critical_messages());
        // Short commentary is only a warning
        assert!(report.warning_count() >= 1);
    }

    #[test]
    fn two_correct_options_is_critical() {
        let mut options = four_options();
        options[1].is_correct = true;
        let report = validate_question(&multiple_choice(options), &QuestionType::ALL);
        assert!(!report.is_valid());
    }

    #[test]
    fn duplicate_option_texts_are_critical() {
        let mut options = four_options();
        options[3].text = "left anterior  descending".to_string();
        let report = validate_question(&multiple_choice(options), &QuestionType::ALL);
        assert!(!report.is_valid());
    }

    #[test]
    fn disallowed_type_is_critical() {
        let report = validate_question(
            &multiple_choice(four_options()),
            &[QuestionType::TrueFalse],
        );
        assert!(report
            .critical_messages()
            .iter()
            .any(|m| m.starts_with("q_type")));
    }

    #[test]
    fn fill_gap_needs_answer_among_options() {
        let mut q = multiple_choice(vec![
            option("a", "insulin", false),
            option("b", "glucagon", false),
            option("c", "cortisol", false),
            option("d", "somatostatin", false),
        ]);
        q.q_type = QuestionType::FillGap;
        q.content.correct_answer = Some("Insulin".to_string());
        assert!(validate_question(&q, &QuestionType::ALL).is_valid());

        q.content.correct_answer = Some("amylin".to_string());
        assert!(!validate_question(&q, &QuestionType::ALL).is_valid());

        q.content.correct_answer = None;
        assert!(!validate_question(&q, &QuestionType::ALL).is_valid());
    }

    #[test]
    fn true_false_needs_two_options() {
        let mut q = multiple_choice(vec![
            option("true", "True", false),
            option("false", "False", true),
        ]);
        q.q_type = QuestionType::TrueFalse;
        assert!(validate_question(&q, &QuestionType::ALL).is_valid());

        q.content.options.pop();
        assert!(!validate_question(&q, &QuestionType::ALL).is_valid());
    }

    #[test]
    fn flashcards_out_of_bounds_are_dropped() {
        let cards = vec![
            card("Too short", "This back is long enough to pass the minimum."),
            card(
                "What is the normal range of serum sodium?",
                "135 to 145 mEq/L in adults.",
            ),
            card(
                "What is the normal range of serum potassium?",
                "Between 3.5 and 5.0 mEq/L in adults.",
            ),
        ];

        let kept = clean_flashcards(cards);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].front.contains("potassium"));
    }

    #[test]
    fn near_duplicate_fronts_are_dropped() {
        let back = "A complete answer that easily clears thirty characters.";
        let cards = vec![
            card("Which enzyme converts angiotensin I to II?", back),
            card("Which enzyme converts angiotensin I into II?", back),
            card("Which enzyme converts angiotensin I to II ?", back),
            card("Where is renin produced in the kidney?", back),
        ];

        let kept = clean_flashcards(cards);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].front, "Which enzyme converts angiotensin I to II?");
        assert_eq!(kept[1].front, "Where is renin produced in the kidney?");
    }

    #[test]
    fn script_markup_is_escaped() {
        let cards = vec![card(
            "What does <script>alert(1)</script> do here?",
            "It should be rendered as text, never executed.",
        )];
        let kept = clean_flashcards(cards);
        assert!(kept[0].front.contains("&lt;script&gt;"));
        assert_eq!(kept[0].back, "It should be rendered as text, never executed.");
    }

    #[test]
    fn event_handler_markup_escapes_quotes_and_ampersands() {
        let escaped = sanitize_text(r#"<img src=x onerror="alert('a&b')">"#);
        assert!(escaped.starts_with("&lt;img src=x onerror=&quot;alert("));
        assert!(escaped.contains("a&amp;b"));
        assert!(!escaped.contains(&['<', '>', '"', '\''][..]));
    }

    #[test]
    fn markdown_without_dangerous_markup_is_kept() {
        assert_eq!(sanitize_text("**bold** and <b>tag</b>"), "**bold** and <b>tag</b>");
    }
}
