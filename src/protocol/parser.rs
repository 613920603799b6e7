//! Tag-delimited section parsing for Action Protocol blocks.

use crate::error::ParseError;

use super::{ActionBlock, NoteBlock};

/// Section tags of a pre-exec block, in documented order.
pub const ACTION_TAGS: [&str; 4] = ["<Intent>", "<Command>", "<Expected>", "<OnError>"];

/// Section tags of a post-exec block, in documented order.
pub const NOTE_TAGS: [&str; 3] = ["<Observation>", "<Inference>", "<Next>"];

/// Parses a pre-exec block into a validated [`ActionBlock`].
///
/// Every tag must appear exactly once and carry non-empty content. The
/// `<Command>` section must reduce to exactly one non-empty line after
/// trimming; interior blank lines are tolerated, a second command line is
/// not.
pub fn parse_action(text: &str) -> Result<ActionBlock, ParseError> {
    let sections = split_sections(text, &ACTION_TAGS)?;
    Ok(ActionBlock {
        intent: required(&sections[0], ACTION_TAGS[0])?,
        command: single_command_line(&sections[1])?,
        expected: required(&sections[2], ACTION_TAGS[2])?,
        on_error: required(&sections[3], ACTION_TAGS[3])?,
    })
}

/// Parses a post-exec block into a validated [`NoteBlock`].
pub fn parse_note(text: &str) -> Result<NoteBlock, ParseError> {
    let sections = split_sections(text, &NOTE_TAGS)?;
    Ok(NoteBlock {
        observation: required(&sections[0], NOTE_TAGS[0])?,
        inference: required(&sections[1], NOTE_TAGS[1])?,
        next: required(&sections[2], NOTE_TAGS[2])?,
    })
}

/// Splits `text` into one content buffer per tag.
///
/// A line is a section boundary only when its trimmed text equals one of
/// `tags` exactly; anything else is content, so a shell redirection like
/// `wc -l < data.csv` never terminates a section. Lines before the first
/// tag are ignored.
fn split_sections(text: &str, tags: &'static [&'static str]) -> Result<Vec<String>, ParseError> {
    let mut sections: Vec<Option<String>> = vec![None; tags.len()];
    let mut current: Option<usize> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if let Some(idx) = tags.iter().position(|tag| *tag == line) {
            if sections[idx].is_some() {
                return Err(ParseError::DuplicateTag(tags[idx]));
            }
            sections[idx] = Some(String::new());
            current = Some(idx);
            continue;
        }
        if let Some(idx) = current {
            if let Some(buf) = &mut sections[idx] {
                buf.push_str(raw);
                buf.push('\n');
            }
        }
    }

    for (idx, section) in sections.iter().enumerate() {
        if section.is_none() {
            return Err(ParseError::MissingTag(tags[idx]));
        }
    }

    Ok(sections.into_iter().map(Option::unwrap_or_default).collect())
}

/// Returns the trimmed section content, rejecting whitespace-only sections.
fn required(content: &str, tag: &'static str) -> Result<String, ParseError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptySection(tag));
    }
    Ok(trimmed.to_string())
}

/// Reduces the command section to its single non-empty line.
fn single_command_line(section: &str) -> Result<String, ParseError> {
    let mut lines = section.lines().map(str::trim).filter(|line| !line.is_empty());
    let Some(command) = lines.next() else {
        return Err(ParseError::EmptyCommand);
    };
    if lines.next().is_some() {
        return Err(ParseError::MultiLineCommand);
    }
    Ok(command.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_ACTION: &str = "\
<Intent>
See what is in the world mount.
<Command>
ls -la /world
<Expected>
A listing that includes data files.
<OnError>
Try find /world -maxdepth 1 instead.";

    const SAMPLE_NOTE: &str = "\
<Observation>
The listing shows data.csv and a tools directory.
<Inference>
The CSV is the likely seed dataset.
<Next>
Inspect the first lines of data.csv.";

    #[test]
    fn test_parse_action_basic() {
        let action = parse_action(SAMPLE_ACTION).unwrap();
        assert_eq!(action.intent, "See what is in the world mount.");
        assert_eq!(action.command, "ls -la /world");
        assert_eq!(action.expected, "A listing that includes data files.");
        assert_eq!(action.on_error, "Try find /world -maxdepth 1 instead.");
    }

    #[test]
    fn test_parse_note_basic() {
        let note = parse_note(SAMPLE_NOTE).unwrap();
        assert_eq!(note.observation, "The listing shows data.csv and a tools directory.");
        assert_eq!(note.inference, "The CSV is the likely seed dataset.");
        assert_eq!(note.next, "Inspect the first lines of data.csv.");
    }

    #[test]
    fn test_command_tolerates_leading_blank_lines() {
        let block = "<Intent>\nCheck.\n<Command>\n\n   ls -la /tmp   \n<Expected>\nFiles.\n<OnError>\nStop.";
        let action = parse_action(block).unwrap();
        assert_eq!(action.command, "ls -la /tmp");
    }

    #[test]
    fn test_empty_command_section_rejected() {
        let block = "<Intent>\nCheck.\n<Command>\n\n<Expected>\nFiles.\n<OnError>\nStop.";
        assert_eq!(parse_action(block), Err(ParseError::EmptyCommand));
    }

    #[test]
    fn test_two_command_lines_rejected() {
        let block =
            "<Intent>\nCheck.\n<Command>\nls /world\ncat /world/data.csv\n<Expected>\nFiles.\n<OnError>\nStop.";
        assert_eq!(parse_action(block), Err(ParseError::MultiLineCommand));
    }

    #[test]
    fn test_missing_tag_rejected() {
        let block = "<Intent>\nCheck.\n<Command>\nls /world\n<Expected>\nFiles.";
        assert_eq!(parse_action(block), Err(ParseError::MissingTag("<OnError>")));
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let block = "<Intent>\nCheck.\n<Intent>\nCheck again.\n<Command>\nls\n<Expected>\nF.\n<OnError>\nS.";
        assert_eq!(parse_action(block), Err(ParseError::DuplicateTag("<Intent>")));
    }

    #[test]
    fn test_empty_section_rejected() {
        let block = "<Intent>\n   \n<Command>\nls /world\n<Expected>\nFiles.\n<OnError>\nStop.";
        assert_eq!(parse_action(block), Err(ParseError::EmptySection("<Intent>")));
    }

    #[test]
    fn test_empty_input_reports_first_missing_tag() {
        assert_eq!(parse_action(""), Err(ParseError::MissingTag("<Intent>")));
        assert_eq!(parse_note("   \n  "), Err(ParseError::MissingTag("<Observation>")));
    }

    #[test]
    fn test_command_stops_at_next_tag() {
        let block = "<Intent>\nCount rows.\n<Command>\nwc -l /world/data.csv\n<Expected>\nA number.\n<OnError>\nStop.";
        let action = parse_action(block).unwrap();
        assert_eq!(action.command, "wc -l /world/data.csv");
        assert_eq!(action.expected, "A number.");
    }

    #[test]
    fn test_shell_redirection_is_content_not_tag() {
        let block = "<Intent>\nCount rows.\n<Command>\nwc -l < /world/data.csv\n<Expected>\nA number.\n<OnError>\nStop.";
        let action = parse_action(block).unwrap();
        assert_eq!(action.command, "wc -l < /world/data.csv");
    }

    #[test]
    fn test_prologue_before_first_tag_ignored() {
        let block = format!("Thinking out loud first.\n\n{SAMPLE_ACTION}");
        let action = parse_action(&block).unwrap();
        assert_eq!(action.command, "ls -la /world");
    }

    #[test]
    fn test_note_missing_tag_rejected() {
        let block = "<Observation>\nSaw files.\n<Inference>\nGood.";
        assert_eq!(parse_note(block), Err(ParseError::MissingTag("<Next>")));
    }
}
