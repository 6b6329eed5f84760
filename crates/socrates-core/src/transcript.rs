//! Plain-text rendering of a conversation for single-prompt backends.

use crate::types::{RequestContext, Role};

pub const STUDENT_LABEL: &str = "Student";
pub const COACH_LABEL: &str = "Coach";

/// Render prior turns and the new prompt as a labelled transcript.
///
/// Blank turns are skipped. System turns are not part of the dialogue and
/// are left to the caller's system prompt. The transcript ends with an open
/// coach label so the backend continues as the coach.
pub fn render_transcript(context: &RequestContext, prompt: &str) -> String {
    let mut out = String::new();

    let dialogue: Vec<_> = context
        .history
        .iter()
        .filter(|turn| turn.role != Role::System && !turn.content.trim().is_empty())
        .collect();

    if !dialogue.is_empty() {
        out.push_str("Conversation so far:\n");
        for turn in dialogue {
            let label = match turn.role {
                Role::User => STUDENT_LABEL,
                _ => COACH_LABEL,
            };
            out.push_str(label);
            out.push_str(": ");
            out.push_str(turn.content.trim());
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str(STUDENT_LABEL);
    out.push_str(": ");
    out.push_str(prompt.trim());
    out.push_str("\n\n");
    out.push_str(COACH_LABEL);
    out.push(':');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatTurn, StepMetadata};

    #[test]
    fn test_prompt_only() {
        let context = RequestContext::default();
        assert_eq!(
            render_transcript(&context, "  Hello  "),
            "Student: Hello\n\nCoach:"
        );
    }

    #[test]
    fn test_history_is_labelled_and_blank_turns_skipped() {
        let context = RequestContext::new(StepMetadata::step(2))
            .with_turn(ChatTurn::system("ignored"))
            .with_turn(ChatTurn::user("I rush my work."))
            .with_turn(ChatTurn::assistant("   "))
            .with_turn(ChatTurn::assistant("What happens when you rush?"));

        let transcript = render_transcript(&context, "I miss details.");

        assert_eq!(
            transcript,
            "Conversation so far:\n\
             Student: I rush my work.\n\
             Coach: What happens when you rush?\n\
             \n\
             Student: I miss details.\n\
             \n\
             Coach:"
        );
    }
}
