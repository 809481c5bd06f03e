//! Prompt templates for journal synthesis.

use crate::models::JournalStyle;
use chrono::NaiveDate;

/// System prompt for a journal style and word target.
#[must_use]
pub fn system_prompt(style: JournalStyle, target_word_count: usize) -> String {
    let voice = match style {
        JournalStyle::DevJournal => {
            "You are writing a personal developer journal entry. First person, \
             past tense, honest about what worked and what did not. Write for \
             your future self: concrete details over generalities."
        },
        JournalStyle::TechBlog => {
            "You are writing a technical blog entry about one day of work. \
             Third person neutral or first person, reader-facing, with enough \
             context that an outsider can follow along."
        },
        JournalStyle::TeamUpdate => {
            "You are writing a concise status update for teammates. Lead with \
             outcomes, flag blockers explicitly, keep opinions brief."
        },
        JournalStyle::BuildingInPublic => {
            "You are writing a building-in-public update. Conversational, \
             transparent about struggles, ends with what is next."
        },
    };

    format!(
        "{voice}\n\n\
         Work only from the session context below; never invent events. \
         Weave the sessions into one coherent narrative rather than listing \
         them. If previous context is provided, continue those threads \
         naturally. Target length: about {target_word_count} words. Start \
         with a single top-level markdown heading and output markdown only, \
         with no preamble before the heading."
    )
}

/// Re-prompt issued when the first pass lands outside the length band.
#[must_use]
pub fn length_correction_prompt(prose: &str, actual_words: usize, target_word_count: usize) -> String {
    let direction = if actual_words > target_word_count {
        "Shorten"
    } else {
        "Expand"
    };
    format!(
        "The entry below is {actual_words} words; the target is about \
         {target_word_count}. {direction} it to land near the target while \
         keeping every concrete detail and the same voice. Output markdown \
         only, starting at the heading.\n\n---\n\n{prose}"
    )
}

/// Prompt for the structured memory extraction pass.
#[must_use]
pub fn memory_extraction_prompt(prose: &str, date: NaiveDate) -> String {
    format!(
        r#"Extract structured memory from this journal entry dated {date}.

Return ONLY valid JSON with this exact structure (no markdown fences, no commentary):
{{
  "themes": ["3-5 high-level themes from today"],
  "insights": ["what was learned or discovered"],
  "decisions": ["what was decided"],
  "open_questions": ["unresolved things"],
  "threads": [
    {{
      "name": "short-kebab-case-name",
      "summary": "current state of this ongoing thread"
    }}
  ],
  "entities": [
    {{
      "name": "entity name",
      "entity_type": "project | technology | person | concept"
    }}
  ]
}}

Threads are ongoing narratives that span multiple days: problems being
debugged, features being built, patterns being established. Only include
threads the prose clearly describes as ongoing or just resolved.

Journal entry:
{prose}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_mentions_target() {
        let prompt = system_prompt(JournalStyle::DevJournal, 600);
        assert!(prompt.contains("600 words"));
        assert!(prompt.contains("journal"));
    }

    #[test]
    fn test_styles_have_distinct_voices() {
        let dev = system_prompt(JournalStyle::DevJournal, 600);
        let team = system_prompt(JournalStyle::TeamUpdate, 600);
        assert_ne!(dev, team);
        assert!(team.contains("blockers"));
    }

    #[test]
    fn test_length_correction_direction() {
        let shorten = length_correction_prompt("text", 1200, 600);
        assert!(shorten.contains("Shorten"));
        let expand = length_correction_prompt("text", 100, 600);
        assert!(expand.contains("Expand"));
    }

    #[test]
    fn test_extraction_prompt_includes_prose() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let prompt = memory_extraction_prompt("today I built a parser", date);
        assert!(prompt.contains("2026-02-08"));
        assert!(prompt.contains("today I built a parser"));
        assert!(prompt.contains("\"threads\""));
    }
}
