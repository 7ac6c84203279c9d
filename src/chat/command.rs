//! REPL input classification.

/// One line of operator input, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand<'a> {
    /// End the session
    Exit,

    /// Reset the agent's conversation memory
    Clear,

    /// Anything else, forwarded to the agent verbatim
    Query(&'a str),
}

impl<'a> ChatCommand<'a> {
    /// Classify a line. Only exact (case-insensitive) `exit` and `clear` are
    /// commands; surrounding whitespace makes the line a query.
    pub fn parse(line: &'a str) -> Self {
        if line.eq_ignore_ascii_case("exit") {
            ChatCommand::Exit
        } else if line.eq_ignore_ascii_case("clear") {
            ChatCommand::Clear
        } else {
            ChatCommand::Query(line)
        }
    }
}
