//! System instructions and prompt builders.

use crate::models::{ContextKey, Difficulty, FlashcardDifficulty, GenerationMode, QuestionType};

const TUTOR: &str = "You are MedAI, a patient tutor for medical students. Answer with \
clinical accuracy, cite physiological mechanisms when they explain the answer, and keep \
replies focused on what the student asked. Never give individual medical advice to patients.";

const EXAM_MENTOR: &str = "You are an exam mentor for medical residency tests. The student is \
reviewing a question they answered. Explain why the correct alternative is right and why each \
distractor is wrong, in short paragraphs.";

const FLASHCARD_CREATOR: &str = "You create spaced-repetition flashcards for medical students. \
Each card tests one fact. The front is a precise question, the back a complete but concise \
answer. Reply with a JSON array of objects with the keys \"front\", \"back\" and optional \"tags\".";

const TITLE_GENERATOR: &str = "You write short titles (at most eight words) for study \
conversations. Reply with the title only, without quotes.";

const SYLLABUS_GENERATOR: &str = "You design study syllabi for medical topics. Reply with a JSON \
object {\"title\": string, \"modules\": [{\"title\": string, \"topics\": [string]}]} ordered \
from fundamentals to clinical application.";

const SUMMARY_GENERATOR: &str = "You write study summaries for medical students. Use headings, \
short bullet lists and highlight the high-yield facts tested in residency exams.";

const QUESTION_GENERATOR: &str = "You write multiple-format exam questions for medical students. \
Every question has a clear statement, exactly one defensible answer, plausible distractors and a \
commentary that starts by naming the correct answer and then explains the reasoning. Reply with a \
JSON array only.";

/// Base instruction for `key`, with caller-provided context appended.
pub fn system_instruction(key: ContextKey, args: Option<&str>) -> String {
    let base = match key {
        ContextKey::MedaiTutor => TUTOR,
        ContextKey::ExamMentor => EXAM_MENTOR,
        ContextKey::FlashcardCreator => FLASHCARD_CREATOR,
        ContextKey::TitleGenerator => TITLE_GENERATOR,
        ContextKey::SyllabusGenerator => SYLLABUS_GENERATOR,
        ContextKey::SummaryGenerator => SUMMARY_GENERATOR,
        ContextKey::QuestionGenerator => QUESTION_GENERATOR,
    };

    match args.map(str::trim).filter(|a| !a.is_empty()) {
        Some(args) => format!("{}\n\nContext:\n{}", base, args),
        None => base.to_string(),
    }
}

pub struct QuestionPrompt<'a> {
    pub topic: &'a str,
    pub ai_context: Option<&'a str>,
    pub mode: GenerationMode,
    pub difficulties: &'a [Difficulty],
    pub types: &'a [QuestionType],
    pub expand_distractors: bool,
}

pub fn question_prompt(p: &QuestionPrompt<'_>) -> String {
    let mut prompt = format!(
        "Write {} questions about \"{}\".\n",
        p.difficulties.len(),
        p.topic
    );

    if let Some(ctx) = p.ai_context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("Lesson context: {}\n", ctx));
    }

    prompt.push_str("Difficulty of each question, in order: ");
    let recipe: Vec<&str> = p.difficulties.iter().map(Difficulty::as_str).collect();
    prompt.push_str(&recipe.join(", "));
    prompt.push('\n');

    let types: Vec<&str> = p.types.iter().map(QuestionType::as_str).collect();
    prompt.push_str(&format!("Allowed q_type values: {}\n", types.join(", ")));

    match p.mode {
        GenerationMode::Boss => {
            prompt.push_str("This is a boss challenge: combine concepts and favor clinical vignettes.\n")
        }
        GenerationMode::Kahoot => {
            prompt.push_str("This is a timed round: keep statements under 200 characters.\n")
        }
        GenerationMode::Standard => {}
    }

    if p.expand_distractors {
        prompt.push_str(
            "Write long, plausible distractors of similar length to the correct option.\n",
        );
    }

    prompt.push_str(
        "Each item: {\"statement\", \"q_type\", \"difficulty\", \"commentary\", \"content\"}.\n\
         multiple_choice content: {\"options\": [{\"id\", \"text\", \"isCorrect\"}]} with 4 options.\n\
         true_false content: {\"options\": [{\"id\": \"true\", ...}, {\"id\": \"false\", ...}]}.\n\
         fill_gap content: {\"text_start\", \"text_end\", \"correct_answer\", \"options\"} with at least 4 options.",
    );

    prompt
}

pub struct FlashcardPrompt<'a> {
    pub topic: &'a str,
    pub details: Option<&'a str>,
    pub references: Option<&'a str>,
    pub difficulty: FlashcardDifficulty,
    pub amount: usize,
}

pub fn flashcard_prompt(p: &FlashcardPrompt<'_>) -> String {
    let mut prompt = format!(
        "Create {} flashcards about \"{}\" at {} difficulty.\n",
        p.amount,
        p.topic,
        p.difficulty.as_str()
    );

    if let Some(details) = p.details.map(str::trim).filter(|d| !d.is_empty()) {
        prompt.push_str(&format!("Focus on: {}\n", details));
    }
    if let Some(refs) = p.references.map(str::trim).filter(|r| !r.is_empty()) {
        prompt.push_str(&format!("Base the cards on these references: {}\n", refs));
    }

    prompt.push_str("Fronts must be between 20 and 500 characters, backs between 30 and 600.");
    prompt
}
