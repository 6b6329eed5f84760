//! Offline question bank.
//!
//! Backs the last-resort provider: a fixed set of Socratic follow-up
//! questions per wizard chat step, served in rotation. Never fails and
//! never performs I/O.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Step used when the requested step has no questions of its own.
pub const DEFAULT_STEP: u8 = 1;

const STEP_1: &[&str] = &[
    "Can you tell me more about this specific situation? What exactly happened?",
    "Interesting. What emotions did you feel when this happened?",
    "What thoughts went through your mind at that moment?",
    "How did you respond in this situation? What exactly did you do?",
    "What was the consequence of your reaction? How did that feel?",
    "How would you have liked to handle it differently?",
];

const STEP_2: &[&str] = &[
    "Which strong quality of yours do you recognise in this situation?",
    "Can you give an example of when this quality served you well?",
    "When does this quality go too far? What happens when you overdo it?",
    "What would you like to develop to find more balance?",
    "Which behaviour in others irritates you the most?",
];

const STEP_3: &[&str] = &[
    "What exactly do you want to learn or achieve? Can you give a concrete example?",
    "How will you measure whether you achieved it? What would be a clear sign of success?",
    "Why is this goal important to you? What motivates you?",
    "Is this achievable for you? Which resources do you need?",
    "When do you want to have achieved this? What is a realistic timeline?",
];

const STEP_4: &[&str] = &[
    "Why does this learning goal matter to you?",
    "What drives you to work on this?",
    "How does this fit your values and ambitions?",
];

const STEP_5: &[&str] = &[
    "Where would you place yourself right now on a scale from 0 to 10?",
    "Why are you not at 0? What can you already do?",
    "What would take you to the next level?",
];

const STEP_6: &[&str] = &[
    "Which small step could you take today?",
    "What is the first concrete action you can take?",
    "How will you build these actions into your routine?",
];

const STEP_7: &[&str] = &[
    "What could hold you back?",
    "Which obstacles do you already see coming?",
    "How could you overcome these challenges?",
];

const STEP_8: &[&str] = &[
    "When will you work on your learning goal?",
    "Where will you do this?",
    "How will you remind yourself?",
];

const STEP_9: &[&str] = &[
    "How will you measure your progress?",
    "Which signals tell you that you are on the right track?",
    "When will you evaluate how it is going?",
];

const ACKNOWLEDGEMENTS: &[&str] = &[
    "That is an interesting thought. ",
    "I understand. ",
    "Thank you for sharing. ",
    "That sounds challenging. ",
    "",
];

/// Rotating per-step question bank.
///
/// Each step keeps its own cursor, so two conversations on different steps
/// do not disturb each other's rotation.
#[derive(Debug)]
pub struct QuestionBank {
    steps: HashMap<u8, &'static [&'static str]>,
    cursors: Mutex<HashMap<u8, usize>>,
}

impl QuestionBank {
    /// Build a bank from explicit step questions.
    ///
    /// Steps with an empty question list are ignored.
    pub fn with_steps(steps: impl IntoIterator<Item = (u8, &'static [&'static str])>) -> Self {
        Self {
            steps: steps
                .into_iter()
                .filter(|(_, questions)| !questions.is_empty())
                .collect(),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Number of steps with their own questions.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Whether `step` has its own questions.
    pub fn has_step(&self, step: u8) -> bool {
        self.steps.contains_key(&step)
    }

    /// Next question for `step`, prefixed with a short acknowledgement of
    /// the student's message.
    pub fn next_question(&self, step: u8, prompt: &str) -> String {
        let (step, questions) = match self.steps.get(&step) {
            Some(questions) => (step, *questions),
            None => match self.steps.get(&DEFAULT_STEP) {
                Some(questions) => (DEFAULT_STEP, *questions),
                None => return acknowledgement(prompt).trim_end().to_string(),
            },
        };

        let index = {
            let mut cursors = self.cursors.lock();
            let cursor = cursors.entry(step).or_insert(0);
            let index = *cursor % questions.len();
            *cursor = cursor.wrapping_add(1);
            index
        };

        tracing::debug!(step, index, "Serving offline question");
        format!("{}{}", acknowledgement(prompt), questions[index])
    }

    /// Reset every step's rotation.
    pub fn reset(&self) {
        self.cursors.lock().clear();
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self::with_steps([
            (1, STEP_1),
            (2, STEP_2),
            (3, STEP_3),
            (4, STEP_4),
            (5, STEP_5),
            (6, STEP_6),
            (7, STEP_7),
            (8, STEP_8),
            (9, STEP_9),
        ])
    }
}

/// Acknowledgement chosen from the prompt text, so the same message always
/// gets the same opener.
fn acknowledgement(prompt: &str) -> &'static str {
    let sum = prompt
        .trim()
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_add(b as usize));
    ACKNOWLEDGEMENTS[sum % ACKNOWLEDGEMENTS.len()]
}
