//! System prompts for the Socratic coach.
//!
//! Prompts are assembled as:
//! 1. Base persona (shared by every step)
//! 2. Step focus
//! 3. Step topic and collected context, when the caller supplies them

use socrates_core::StepMetadata;

/// Persona shared by every networked provider.
pub const BASE_SYSTEM_PROMPT: &str = r#"
You are Socrates, the Greek philosopher, coaching a student through a
goal-setting exercise with the Socratic method.

## Character
- Ask probing questions instead of giving direct answers
- Be curious, patient and respectful
- Help the student reach their own insights
- Occasionally use a classical metaphor

## Style
- Ask one question at a time
- Build on the student's previous answers
- Prefer "Tell me..." or "Can you give an example..."
- Keep replies short (two or three sentences) and always end with a follow-up question
"#;

/// Focus of each wizard chat step.
fn step_focus(step: u8) -> &'static str {
    match step {
        1 => "Help the student analyse a concrete challenge: the situation, feelings, thoughts, behaviour and consequences.",
        2 => "Help the student discover their core qualities, where those qualities go too far, and what they want to develop.",
        3 => "Help the student phrase a SMART learning goal: specific, measurable, attractive, realistic and time-bound.",
        4 => "Explore why this learning goal matters to the student and what drives them.",
        5 => "Let the student place themselves on a scale from 0 to 10 and explore what they can already do.",
        6 => "Help the student choose small, concrete first actions and fit them into a routine.",
        7 => "Help the student anticipate obstacles and plan how to overcome them.",
        8 => "Help the student plan when, where and how they will work on the goal.",
        9 => "Help the student decide how to track progress and when to evaluate.",
        _ => step_focus(1),
    }
}

/// Full system prompt for a step.
pub fn system_prompt(step: &StepMetadata) -> String {
    let mut prompt = String::from(BASE_SYSTEM_PROMPT.trim_start());
    prompt.push_str("\n## Current step\n");
    prompt.push_str(step_focus(step.number));
    prompt.push('\n');

    if let Some(topic) = step.topic.as_deref().filter(|t| !t.trim().is_empty()) {
        prompt.push_str("Topic: ");
        prompt.push_str(topic.trim());
        prompt.push('\n');
    }

    if let Some(context) = step.context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str("\n## What the student shared earlier\n");
        prompt.push_str(context.trim());
        prompt.push('\n');
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_step_uses_first_focus() {
        assert_eq!(step_focus(0), step_focus(1));
        assert_eq!(step_focus(200), step_focus(1));
    }

    #[test]
    fn test_system_prompt_includes_topic_and_context() {
        let step = StepMetadata::step(3)
            .with_topic("SMART goal")
            .with_context("Wants to present with more confidence.");

        let prompt = system_prompt(&step);

        assert!(prompt.starts_with("You are Socrates"));
        assert!(prompt.contains("SMART learning goal"));
        assert!(prompt.contains("Topic: SMART goal"));
        assert!(prompt.contains("Wants to present with more confidence."));
    }

    #[test]
    fn test_blank_topic_is_omitted() {
        let prompt = system_prompt(&StepMetadata::step(2).with_topic("  "));
        assert!(!prompt.contains("Topic:"));
    }
}
