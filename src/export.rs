//! Chat transcript export.
//!
//! Writes the messages of one chat session to a file in TXT, CSV or JSON,
//! in the order [`crate::Database::get_chat_messages`] returns them.

use std::fmt;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use csv::Writer;
use serde::Serialize;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::models::{ChatMessage, ChatSession, MessageType};

const TIMESTAMP_FORMAT: &str = "%b %d, %Y %r";

/// Output format for transcripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One `type, timestamp, content` line per message
    #[default]
    Txt,
    /// `ID, Type, Datetime, Message` rows
    Csv,
    /// Session object with a `messages` array
    Json,
}

impl OutputFormat {
    /// File extension without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "txt" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(StoreError::InvalidChoice {
                field: "format".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Serialize)]
struct TranscriptMessage<'a> {
    id: i64,
    message_type: MessageType,
    timestamp: String,
    content: &'a str,
}

#[derive(Serialize)]
struct Transcript<'a> {
    session_id: &'a str,
    customer_name: &'a str,
    customer_email: &'a str,
    is_active: bool,
    messages: Vec<TranscriptMessage<'a>>,
}

/// Write a session transcript to `file_path`, creating parent directories.
///
/// An empty message list still produces a file (header only for CSV).
pub fn write_transcript(
    session: &ChatSession,
    messages: &[ChatMessage],
    format: OutputFormat,
    file_path: &Path,
) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }

    match format {
        OutputFormat::Txt => write_txt_file(messages, file_path)?,
        OutputFormat::Csv => write_csv_file(messages, file_path)?,
        OutputFormat::Json => write_json_file(session, messages, file_path)?,
    }

    info!(
        session_id = %session.session_id,
        messages = messages.len(),
        format = %format,
        path = %file_path.display(),
        "Exported transcript"
    );
    Ok(())
}

/// Format: `type, timestamp, content\n\n` (blank line between messages)
fn write_txt_file(messages: &[ChatMessage], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let mut writer = BufWriter::new(file);

    for message in messages {
        writeln!(
            writer,
            "{}, {}, {}",
            message.message_type,
            message.created_at.format(TIMESTAMP_FORMAT),
            message.content
        )?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_csv_file(messages: &[ChatMessage], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(["ID", "Type", "Datetime", "Message"])?;

    for message in messages {
        writer.write_record([
            message.id.to_string().as_str(),
            message.message_type.as_str(),
            message.created_at.format(TIMESTAMP_FORMAT).to_string().as_str(),
            message.content.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_json_file(session: &ChatSession, messages: &[ChatMessage], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let writer = BufWriter::new(file);

    let transcript = Transcript {
        session_id: &session.session_id,
        customer_name: &session.customer_name,
        customer_email: &session.customer_email,
        is_active: session.is_active,
        messages: messages
            .iter()
            .map(|m| TranscriptMessage {
                id: m.id,
                message_type: m.message_type,
                timestamp: m.created_at.to_rfc3339(),
                content: &m.content,
            })
            .collect(),
    };

    serde_json::to_writer_pretty(writer, &transcript)?;
    Ok(())
}
