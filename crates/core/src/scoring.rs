//! Subject scoring: each section's raw correct count is normalized onto a
//! fixed 15-point scale, keyed by the four recognized subject names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{ExamDefinition, QuestionKey, Section};

/// Maximum points per subject.
pub const MAX_SUBJECT_SCORE: u8 = 15;

//
// ─── SUBJECTS ──────────────────────────────────────────────────────────────────
//

/// The four recognized scoring categories. Section names map onto these
/// case-insensitively; an unrecognized section name contributes no bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Arabic,
    Math,
    English,
    SoftwareBasics,
}

impl Subject {
    /// Matches a section name against the recognized subjects,
    /// case-insensitively and ignoring surrounding whitespace.
    #[must_use]
    pub fn from_section_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "arabic" => Some(Self::Arabic),
            "math" => Some(Self::Math),
            "english" => Some(Self::English),
            "software basics" => Some(Self::SoftwareBasics),
            _ => None,
        }
    }
}

/// Final per-subject scores, each in `[0, MAX_SUBJECT_SCORE]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectScores {
    pub arabic: u8,
    pub math: u8,
    pub english: u8,
    pub software: u8,
}

impl SubjectScores {
    fn set(&mut self, subject: Subject, score: u8) {
        match subject {
            Subject::Arabic => self.arabic = score,
            Subject::Math => self.math = score,
            Subject::English => self.english = score,
            Subject::SoftwareBasics => self.software = score,
        }
    }

    #[must_use]
    pub fn get(&self, subject: Subject) -> u8 {
        match subject {
            Subject::Arabic => self.arabic,
            Subject::Math => self.math,
            Subject::English => self.english,
            Subject::SoftwareBasics => self.software,
        }
    }
}

//
// ─── SCORING ───────────────────────────────────────────────────────────────────
//

/// Scores one section: `round(correct / question_count * 15)`.
///
/// `section_index` addresses the section within the definition so recorded
/// answers can be looked up by their composite key.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn section_score(
    section: &Section,
    section_index: usize,
    answers: &HashMap<QuestionKey, usize>,
) -> u8 {
    let total = section.len();
    if total == 0 {
        return 0;
    }

    let correct = section
        .questions()
        .iter()
        .enumerate()
        .filter(|(question_index, question)| {
            answers.get(&QuestionKey::new(section_index, *question_index))
                == Some(&question.correct())
        })
        .count();

    let scaled = (correct as f64 / total as f64 * f64::from(MAX_SUBJECT_SCORE)).round();
    scaled as u8
}

/// Computes the four subject scores for a full exam. Sections whose names do
/// not match a recognized subject are skipped (the content provider owns that
/// contract); a missing subject stays at 0.
#[must_use]
pub fn exam_scores(
    definition: &ExamDefinition,
    answers: &HashMap<QuestionKey, usize>,
) -> SubjectScores {
    let mut scores = SubjectScores::default();
    for (index, section) in definition.sections().iter().enumerate() {
        if let Some(subject) = Subject::from_section_name(section.name()) {
            scores.set(subject, section_score(section, index, answers));
        }
    }
    scores
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExamError, Question};

    fn question(correct: usize) -> Question {
        Question::new(
            "Q",
            vec!["a".into(), "b".into(), "c".into()],
            correct,
        )
        .unwrap()
    }

    fn section_of(name: &str, count: usize) -> Section {
        Section::new(name, (0..count).map(|_| question(0)).collect()).unwrap()
    }

    #[test]
    fn subject_names_match_case_insensitively() {
        assert_eq!(Subject::from_section_name("ARABIC"), Some(Subject::Arabic));
        assert_eq!(
            Subject::from_section_name("  Software Basics "),
            Some(Subject::SoftwareBasics)
        );
        assert_eq!(Subject::from_section_name("history"), None);
    }

    #[test]
    fn full_marks_scale_to_fifteen() {
        let section = section_of("Math", 2);
        let mut answers = HashMap::new();
        answers.insert(QuestionKey::new(0, 0), 0);
        answers.insert(QuestionKey::new(0, 1), 0);
        assert_eq!(section_score(&section, 0, &answers), 15);
    }

    #[test]
    fn partial_marks_round_to_nearest() {
        // 1 of 3 correct: 5.0 exactly. 2 of 3: 10.0. 1 of 7: 2.14 → 2.
        let section = section_of("Math", 7);
        let mut answers = HashMap::new();
        answers.insert(QuestionKey::new(0, 0), 0);
        assert_eq!(section_score(&section, 0, &answers), 2);
    }

    #[test]
    fn wrong_and_missing_answers_do_not_count() {
        let section = section_of("Math", 2);

        // One correct, one unanswered: 7.5 rounds to 8.
        let mut answers = HashMap::new();
        answers.insert(QuestionKey::new(0, 0), 0);
        assert_eq!(section_score(&section, 0, &answers), 8);

        // One wrong answer only.
        let mut wrong = HashMap::new();
        wrong.insert(QuestionKey::new(0, 0), 1);
        assert_eq!(section_score(&section, 0, &wrong), 0);

        let empty = HashMap::new();
        assert_eq!(section_score(&section, 0, &empty), 0);
    }

    #[test]
    fn score_stays_in_bounds_for_any_question_count() {
        for count in 1..=20 {
            let section = section_of("Math", count);
            let all: HashMap<_, _> = (0..count)
                .map(|q| (QuestionKey::new(0, q), 0))
                .collect();
            let score = section_score(&section, 0, &all);
            assert!(score <= MAX_SUBJECT_SCORE);
            assert_eq!(score, MAX_SUBJECT_SCORE);
        }
    }

    #[test]
    fn unrecognized_section_contributes_no_bucket() {
        let definition = ExamDefinition::new(vec![
            section_of("Math", 2),
            section_of("History", 2),
        ])
        .unwrap();

        let answers: HashMap<_, _> = (0..2)
            .flat_map(|s| (0..2).map(move |q| (QuestionKey::new(s, q), 0)))
            .collect();

        let scores = exam_scores(&definition, &answers);
        assert_eq!(scores.math, 15);
        assert_eq!(scores.arabic, 0);
        assert_eq!(scores.english, 0);
        assert_eq!(scores.software, 0);
    }

    #[test]
    fn sample_exam_all_correct_scores_four_fifteens() {
        let definition = ExamDefinition::sample();
        let answers: HashMap<_, _> = definition
            .sections()
            .iter()
            .enumerate()
            .flat_map(|(s, section)| {
                section
                    .questions()
                    .iter()
                    .enumerate()
                    .map(move |(q, question)| (QuestionKey::new(s, q), question.correct()))
            })
            .collect();

        let scores = exam_scores(&definition, &answers);
        assert_eq!(
            scores,
            SubjectScores {
                arabic: 15,
                math: 15,
                english: 15,
                software: 15
            }
        );
    }

    #[test]
    fn empty_sections_cannot_be_constructed() {
        let err = Section::new("Math", Vec::new()).unwrap_err();
        assert!(matches!(err, ExamError::EmptySection { .. }));
    }
}
