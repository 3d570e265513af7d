//! Module `command`
//!
//! Defines the FTP command parsing logic and the data structures used to
//! represent commands and their results.

/// Represents an FTP command parsed from the client input.
///
/// Commands that take arguments store them as `String` variants; the
/// argument keeps its case and may be empty.
#[derive(Debug, PartialEq)]
pub enum Command {
    USER(String), // Username for login
    PASS(String), // Password for login
    PORT(String), // Active mode data port specification
    PASV,         // Enter passive mode
    PWD,
    CWD(String), // Change working directory
    CDUP,
    TYPE(String), // Representation type, I or A
    LIST,
    RETR(String), // Retrieve/download file
    STOR(String), // Store/upload file
    DELE(String), // Delete file
    NOOP,
    QUIT,
    UNKNOWN(String), // Verb as received, uppercased
}

impl Command {
    /// Whether the command runs over the data channel
    pub fn needs_data_channel(&self) -> bool {
        matches!(
            self,
            Command::LIST | Command::RETR(_) | Command::STOR(_) | Command::DELE(_)
        )
    }

    /// Whether the command may run before login
    pub fn allowed_before_login(&self) -> bool {
        matches!(
            self,
            Command::USER(_)
                | Command::PASS(_)
                | Command::NOOP
                | Command::QUIT
                | Command::UNKNOWN(_)
        )
    }
}

/// Represents the outcome status of executing a command.
#[derive(Debug, PartialEq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Struct encapsulating the full result of a command execution.
///
/// `message` is the final reply line, already terminated with `\r\n`.
#[derive(Debug)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub message: Option<String>,
}

impl CommandResult {
    pub fn success(message: String) -> Self {
        Self {
            status: CommandStatus::Success,
            message: Some(message),
        }
    }

    pub fn failure(reason: impl Into<String>, message: String) -> Self {
        Self {
            status: CommandStatus::Failure(reason.into()),
            message: Some(message),
        }
    }
}

/// Parses a raw line received from a client.
///
/// The verb is the first whitespace-delimited token cut to four characters
/// and uppercased; the argument is whatever follows those characters,
/// trimmed. Returns `None` for a blank line.
pub fn parse_command(raw: &str) -> Option<Command> {
    let line = raw.trim_start();
    let token_end = line.find(char::is_whitespace).unwrap_or(line.len());
    let verb_end = line[..token_end]
        .char_indices()
        .nth(4)
        .map_or(token_end, |(i, _)| i);

    let verb = line[..verb_end].to_uppercase();
    if verb.is_empty() {
        return None;
    }
    let arg = line[verb_end..].trim().to_string();

    let command = match verb.as_str() {
        "USER" => Command::USER(arg),
        "PASS" => Command::PASS(arg),
        "PORT" => Command::PORT(arg),
        "PASV" => Command::PASV,
        "PWD" => Command::PWD,
        "CWD" => Command::CWD(arg),
        "CDUP" => Command::CDUP,
        "TYPE" => Command::TYPE(arg),
        "LIST" => Command::LIST,
        "RETR" => Command::RETR(arg),
        "STOR" => Command::STOR(arg),
        "DELE" => Command::DELE(arg),
        "NOOP" => Command::NOOP,
        "QUIT" => Command::QUIT,
        _ => Command::UNKNOWN(verb),
    };

    Some(command)
}
