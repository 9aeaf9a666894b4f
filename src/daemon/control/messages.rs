use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::tracker::state::{Mode, StateDelta};

/// Commands accepted on the control socket, one JSON object per line, tagged by `cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
pub enum ControlRequest {
    Office,
    Home,
    Break,
    EndBreak,
    Afk,
    EndAfk,
    Lock,
    Unlock,
    Update {
        #[serde(default)]
        state: StateDelta,
    },
    /// Brings `done` up to date and returns the view.
    Status,
    /// Streams every view from now on instead of answering once.
    Watch,
    /// Anything this version doesn't know. Answered with the current view.
    #[serde(other)]
    Unknown,
}

impl ControlRequest {
    /// The transition this request asks for, `None` if it doesn't change the state.
    pub fn delta(&self) -> Option<StateDelta> {
        match self {
            ControlRequest::Office => Some(StateDelta::mode(Mode::Office)),
            ControlRequest::Home => Some(StateDelta::mode(Mode::Home)),
            ControlRequest::Break => Some(StateDelta::on_break(true)),
            ControlRequest::EndBreak => Some(StateDelta::on_break(false)),
            ControlRequest::Afk => Some(StateDelta::afk(true)),
            ControlRequest::EndAfk => Some(StateDelta::afk(false)),
            ControlRequest::Lock => Some(StateDelta::lock(true)),
            ControlRequest::Unlock => Some(StateDelta::lock(false)),
            ControlRequest::Update { state } => Some(state.clone()),
            ControlRequest::Status => Some(StateDelta::default()),
            ControlRequest::Watch | ControlRequest::Unknown => None,
        }
    }
}

/// Writes `value` as a single line of JSON and flushes it.
pub async fn write_json_line(
    writer: &mut (impl AsyncWrite + Unpin),
    value: &impl Serialize,
) -> Result<()> {
    let mut buffer = serde_json::to_vec(value)?;
    buffer.push(b'\n');
    writer.write_all(&buffer).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::Duration;

    use crate::tracker::state::{Mode, StateDelta};

    use super::ControlRequest;

    #[test]
    fn test_parse_simple_commands() -> Result<()> {
        let request: ControlRequest = serde_json::from_str(r#"{"cmd": "end-break"}"#)?;
        assert_eq!(request, ControlRequest::EndBreak);
        assert_eq!(request.delta(), Some(StateDelta::on_break(false)));

        let request: ControlRequest = serde_json::from_str(r#"{"cmd": "home"}"#)?;
        assert_eq!(request.delta(), Some(StateDelta::mode(Mode::Home)));
        Ok(())
    }

    #[test]
    fn test_parse_update() -> Result<()> {
        let request: ControlRequest = serde_json::from_str(
            r#"{"cmd": "update", "state": {"officeTodo": 25200000, "done": 0}}"#,
        )?;
        assert_eq!(
            request.delta(),
            Some(StateDelta {
                office_todo: Some(Duration::hours(7)),
                done: Some(Duration::zero()),
                ..Default::default()
            })
        );

        let request: ControlRequest = serde_json::from_str(r#"{"cmd": "update"}"#)?;
        assert_eq!(request.delta(), Some(StateDelta::default()));
        Ok(())
    }

    #[test]
    fn test_unknown_commands_are_no_ops() -> Result<()> {
        let request: ControlRequest = serde_json::from_str(r#"{"cmd": "history"}"#)?;
        assert_eq!(request, ControlRequest::Unknown);
        assert_eq!(request.delta(), None);
        Ok(())
    }

    #[test]
    fn test_unknown_fields_are_ignored() -> Result<()> {
        let request: ControlRequest =
            serde_json::from_str(r#"{"cmd": "afk", "source": "panel", "extra": [1, 2]}"#)?;
        assert_eq!(request, ControlRequest::Afk);
        Ok(())
    }

    #[test]
    fn test_request_wire_format() -> Result<()> {
        assert_eq!(
            serde_json::to_string(&ControlRequest::EndAfk)?,
            r#"{"cmd":"end-afk"}"#
        );
        assert_eq!(
            serde_json::to_string(&ControlRequest::Update {
                state: StateDelta::lock(true)
            })?,
            r#"{"cmd":"update","state":{"lock":true}}"#
        );
        Ok(())
    }
}
