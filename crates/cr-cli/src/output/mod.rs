//! Output formatting utilities for the CLI

use tabled::{settings::Style, Table, Tabled};

use cr_core::time::elapsed_millis;
use cr_core::types::AgentInfo;
use cr_protocol::TaskResult;

/// Format a list of agents as an ASCII table
pub fn format_agents(agents: &[AgentInfo]) -> String {
    if agents.is_empty() {
        return "No agents registered".to_string();
    }

    #[derive(Tabled)]
    struct AgentRow {
        #[tabled(rename = "AGENT ID")]
        id: String,
        #[tabled(rename = "HOSTNAME")]
        hostname: String,
        #[tabled(rename = "OS/ARCH")]
        os_arch: String,
        #[tabled(rename = "TRANSPORT")]
        transport: String,
        #[tabled(rename = "STATE")]
        state: String,
        #[tabled(rename = "LAST SEEN")]
        last_seen: String,
    }

    let rows: Vec<AgentRow> = agents
        .iter()
        .map(|a| AgentRow {
            id: truncate(a.agent_id.as_str(), 20),
            hostname: a.hostname.clone(),
            os_arch: format!("{}/{}", a.os, a.arch),
            transport: a.transport.to_string(),
            state: a.state.to_string(),
            last_seen: format!("{}s ago", elapsed_millis(a.last_seen_ms) / 1000),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format a task result for the terminal
pub fn format_result(result: &TaskResult) -> String {
    let mut output = String::new();

    let status = match (&result.error_kind, result.returncode) {
        (Some(kind), _) => format!("infrastructure failure ({})", kind),
        (None, Some(code)) if result.success => format!("completed (exit {})", code),
        (None, Some(code)) => format!("failed (exit {})", code),
        (None, None) => "unknown".to_string(),
    };
    output.push_str(&format!("Status: {}\n", status));

    if !result.stdout.is_empty() {
        output.push_str("--- stdout ---\n");
        output.push_str(&result.stdout);
        if !result.stdout.ends_with('\n') {
            output.push('\n');
        }
    }
    if !result.stderr.is_empty() {
        output.push_str("--- stderr ---\n");
        output.push_str(&result.stderr);
        if !result.stderr.ends_with('\n') {
            output.push('\n');
        }
    }

    output
}

/// Truncate a string, appending an ellipsis when shortened
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}…", &s[..max_len.saturating_sub(1)])
    }
}

/// Print a success message (green checkmark)
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message (red cross, to stderr)
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message (cyan marker)
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let long = truncate("0123456789abcdef", 8);
        assert!(long.ends_with('…'));
        assert!(long.chars().count() <= 8);
    }

    #[test]
    fn test_format_agents_empty() {
        assert_eq!(format_agents(&[]), "No agents registered");
    }

    #[test]
    fn test_format_result_failed_exit() {
        let result = TaskResult::completed(String::new(), "boom\n".into(), 2, 1);
        let text = format_result(&result);
        assert!(text.contains("failed (exit 2)"));
        assert!(text.contains("boom"));
    }
}
