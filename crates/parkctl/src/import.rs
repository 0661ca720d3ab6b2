//! Batch instruction files: one whitespace-separated command per line.
//!
//! Grammar:
//! ```text
//! open-pool <capacity>
//! enter <police number, spaces joined>
//! leave <police number, spaces joined> <hours>
//! status
//! ```
//! Blank lines are skipped, as are `enter` lines with a blank police number.
//! Anything else stops the parse with the offending line number.

use std::path::Path;

use anyhow::Context;

use parklot::protocol::Command;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand { command: String, line: usize },

    #[error("line {line}: {reason}")]
    Invalid { line: usize, reason: String },
}

pub fn parse(input: &str) -> Result<Vec<Command>, ImportError> {
    let mut commands = Vec::new();

    for (number, raw) in input.lines().enumerate() {
        let line = number + 1;
        let mut fields = raw.split_whitespace();
        let Some(keyword) = fields.next() else {
            continue;
        };
        let args: Vec<&str> = fields.collect();

        match keyword {
            "open-pool" => {
                let capacity = args.first().ok_or_else(|| ImportError::Invalid {
                    line,
                    reason: "capacity not specified".to_string(),
                })?;
                commands.push(Command::OpenPool(capacity.to_string()));
            }
            "enter" => {
                let police_number = args.concat();
                if police_number.is_empty() {
                    // malformed plate, skip the line
                    continue;
                }
                commands.push(Command::Enter { police_number });
            }
            "leave" => {
                let (hours_raw, plate_args) =
                    args.split_last().ok_or_else(|| ImportError::Invalid {
                        line,
                        reason: "police number and hours not specified".to_string(),
                    })?;
                let police_number = plate_args.concat();
                if police_number.is_empty() {
                    return Err(ImportError::Invalid {
                        line,
                        reason: "police number not specified".to_string(),
                    });
                }
                let hours: i64 = hours_raw.parse().map_err(|_| ImportError::Invalid {
                    line,
                    reason: format!("hours must be an integer, got `{hours_raw}`"),
                })?;
                commands.push(Command::Leave {
                    police_number,
                    hours,
                });
            }
            "status" => commands.push(Command::Status),
            other => {
                return Err(ImportError::UnknownCommand {
                    command: other.to_string(),
                    line,
                });
            }
        }
    }

    Ok(commands)
}

/// Read and parse an instruction file.
pub fn load(path: &Path) -> anyhow::Result<Vec<Command>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_commands_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "open-pool 2").unwrap();
        writeln!(file, "enter KA-01").unwrap();
        file.flush().unwrap();

        let commands = load(file.path()).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], Command::OpenPool("2".to_string()));
    }

    #[test]
    fn load_reports_missing_files() {
        assert!(load(Path::new("/nonexistent/instructions.txt")).is_err());
    }

    #[test]
    fn parses_a_full_session() {
        let commands = parse(
            "open-pool 6\n\
             enter KA-01-HH-1234\n\
             enter KA-01-HH-9999\n\
             leave KA-01-HH-1234 4\n\
             status\n",
        )
        .unwrap();

        assert_eq!(
            commands,
            vec![
                Command::OpenPool("6".to_string()),
                Command::Enter {
                    police_number: "KA-01-HH-1234".to_string()
                },
                Command::Enter {
                    police_number: "KA-01-HH-9999".to_string()
                },
                Command::Leave {
                    police_number: "KA-01-HH-1234".to_string(),
                    hours: 4
                },
                Command::Status,
            ]
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        let commands = parse("\nstatus\n\n\nstatus\n").unwrap();
        assert_eq!(commands, vec![Command::Status, Command::Status]);
    }

    #[test]
    fn enter_with_blank_plate_is_skipped() {
        let commands = parse("enter\nstatus\n").unwrap();
        assert_eq!(commands, vec![Command::Status]);
    }

    #[test]
    fn spaced_plates_are_joined() {
        let commands = parse("enter KA 01 HH 1234\nleave KA 01 HH 1234 2\n").unwrap();
        assert_eq!(
            commands,
            vec![
                Command::Enter {
                    police_number: "KA01HH1234".to_string()
                },
                Command::Leave {
                    police_number: "KA01HH1234".to_string(),
                    hours: 2
                },
            ]
        );
    }

    #[test]
    fn unknown_command_reports_the_line() {
        let err = parse("status\nvalet KA-01\n").unwrap_err();
        assert_eq!(
            err,
            ImportError::UnknownCommand {
                command: "valet".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn bad_hours_reports_the_line() {
        let err = parse("leave KA-01 soon\n").unwrap_err();
        assert!(matches!(err, ImportError::Invalid { line: 1, .. }));
    }

    #[test]
    fn open_pool_requires_a_capacity() {
        assert!(matches!(
            parse("open-pool\n").unwrap_err(),
            ImportError::Invalid { line: 1, .. }
        ));
    }

    #[test]
    fn leave_requires_plate_and_hours() {
        assert!(matches!(
            parse("leave 3\n").unwrap_err(),
            ImportError::Invalid { line: 1, .. }
        ));
    }
}
