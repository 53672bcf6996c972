pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use serde::Serialize;

/// What a command hands back to `run`: the text to print and the process
/// exit code. The text is a one-line JSON report for migrate/seed; doctor
/// and config render their own output.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Machine-readable command report. Failures carry the error class and the
/// exit code so scripts driving `tally` can branch without parsing prose.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum CommandReport {
    Ok {
        command: &'static str,
        message: String,
    },
    Error {
        command: &'static str,
        error_class: &'static str,
        message: String,
        exit_code: u8,
    },
}

impl CommandResult {
    pub fn success(command: &'static str, message: impl Into<String>) -> Self {
        let report = CommandReport::Ok { command, message: message.into() };
        Self { exit_code: 0, output: serialize_report(&report) }
    }

    pub fn failure(
        command: &'static str,
        error_class: &'static str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let report =
            CommandReport::Error { command, error_class, message: message.into(), exit_code };
        Self { exit_code, output: serialize_report(&report) }
    }
}

fn serialize_report(report: &CommandReport) -> String {
    serde_json::to_string(report).unwrap_or_else(|error| {
        format!(
            "{{\"status\":\"error\",\"command\":\"unknown\",\"error_class\":\"serialization\",\"message\":\"{}\",\"exit_code\":1}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::CommandResult;

    #[test]
    fn success_report_is_status_tagged() {
        let result = CommandResult::success("migrate", "database schema is already current");
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("\"status\":\"ok\""));
        assert!(result.output.contains("\"command\":\"migrate\""));
        assert!(!result.output.contains("error_class"));
    }

    #[test]
    fn failure_report_embeds_class_and_exit_code() {
        let result = CommandResult::failure("seed", "db_connectivity", "cannot open database", 4);
        assert_eq!(result.exit_code, 4);
        assert!(result.output.contains("\"status\":\"error\""));
        assert!(result.output.contains("\"error_class\":\"db_connectivity\""));
        assert!(result.output.contains("\"exit_code\":4"));
    }
}
