use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam must contain at least one section")]
    EmptyExam,

    #[error("section name cannot be empty")]
    EmptySectionName,

    #[error("section '{name}' must contain at least one question")]
    EmptySection { name: String },

    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question must offer at least two options, got {len}")]
    TooFewOptions { len: usize },

    #[error("correct option index {correct} out of bounds for {len} options")]
    CorrectOutOfBounds { correct: usize, len: usize },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question: prompt, ordered options, and the
/// 0-based index of the correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    prompt: String,
    options: Vec<String>,
    correct: usize,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` if the prompt is empty, fewer than two options are
    /// given, or `correct` is out of bounds.
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<String>,
        correct: usize,
    ) -> Result<Self, ExamError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ExamError::EmptyPrompt);
        }
        if options.len() < 2 {
            return Err(ExamError::TooFewOptions { len: options.len() });
        }
        if correct >= options.len() {
            return Err(ExamError::CorrectOutOfBounds {
                correct,
                len: options.len(),
            });
        }
        Ok(Self {
            prompt,
            options,
            correct,
        })
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Index of the correct option
    #[must_use]
    pub fn correct(&self) -> usize {
        self.correct
    }

    /// Whether the given option index would be a valid answer value.
    #[must_use]
    pub fn accepts_option(&self, option: usize) -> bool {
        option < self.options.len()
    }
}

//
// ─── SECTION ───────────────────────────────────────────────────────────────────
//

/// A named subject grouping of questions. The name doubles as the scoring
/// category key (see `scoring::Subject`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    name: String,
    questions: Vec<Question>,
}

impl Section {
    /// Creates a validated section.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` if the name is empty or no questions are given.
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Result<Self, ExamError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ExamError::EmptySectionName);
        }
        if questions.is_empty() {
            return Err(ExamError::EmptySection { name });
        }
        Ok(Self { name, questions })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

//
// ─── EXAM DEFINITION ───────────────────────────────────────────────────────────
//

/// Immutable, ordered exam content supplied by the content provider at
/// session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamDefinition {
    sections: Vec<Section>,
}

impl ExamDefinition {
    /// Creates a validated exam definition.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::EmptyExam` if no sections are given.
    pub fn new(sections: Vec<Section>) -> Result<Self, ExamError> {
        if sections.is_empty() {
            return Err(ExamError::EmptyExam);
        }
        Ok(Self { sections })
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    #[must_use]
    pub fn question(&self, section: usize, question: usize) -> Option<&Question> {
        self.sections.get(section)?.questions().get(question)
    }

    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Total question count across all sections.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.sections.iter().map(Section::len).sum()
    }

    /// The 4-subject × 2-question sample exam used by the demo binary and
    /// integration tests.
    ///
    /// # Panics
    ///
    /// Never panics; the content is statically valid.
    #[must_use]
    pub fn sample() -> Self {
        fn q(prompt: &str, options: &[&str], correct: usize) -> Question {
            Question::new(
                prompt,
                options.iter().map(ToString::to_string).collect(),
                correct,
            )
            .expect("sample question should be valid")
        }

        let sections = vec![
            Section::new(
                "Arabic",
                vec![
                    q("Plural of 'kitab'?", &["kutub", "katib", "maktab"], 0),
                    q("Root of 'maktaba'?", &["k-t-b", "m-k-t", "b-t-k"], 0),
                ],
            ),
            Section::new(
                "Math",
                vec![
                    q("7 × 8 = ?", &["54", "56", "64"], 1),
                    q("Solve x: 2x + 3 = 11", &["3", "4", "5"], 1),
                ],
            ),
            Section::new(
                "English",
                vec![
                    q("Past tense of 'go'?", &["goed", "gone", "went"], 2),
                    q("Synonym of 'rapid'?", &["slow", "quick", "late"], 1),
                ],
            ),
            Section::new(
                "Software Basics",
                vec![
                    q("Binary of decimal 5?", &["100", "101", "110"], 1),
                    q("HTML is a ...", &["markup language", "compiler", "database"], 0),
                ],
            ),
        ];

        let sections = sections
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .expect("sample sections should be valid");
        Self::new(sections).expect("sample exam should be valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn question_rejects_out_of_bounds_correct_index() {
        let err = Question::new("Q", opts(&["a", "b"]), 2).unwrap_err();
        assert_eq!(err, ExamError::CorrectOutOfBounds { correct: 2, len: 2 });
    }

    #[test]
    fn question_requires_two_options() {
        let err = Question::new("Q", opts(&["only"]), 0).unwrap_err();
        assert_eq!(err, ExamError::TooFewOptions { len: 1 });
    }

    #[test]
    fn section_rejects_empty_question_list() {
        let err = Section::new("Math", Vec::new()).unwrap_err();
        assert!(matches!(err, ExamError::EmptySection { .. }));
    }

    #[test]
    fn sample_exam_has_four_sections_of_two() {
        let exam = ExamDefinition::sample();
        assert_eq!(exam.section_count(), 4);
        assert_eq!(exam.total_questions(), 8);
        for section in exam.sections() {
            assert_eq!(section.len(), 2);
        }
    }
}
