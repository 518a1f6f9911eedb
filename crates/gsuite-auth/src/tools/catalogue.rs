//! Built-in tool declarations for Gmail, Calendar and Drive.

use serde_json::{json, Value};

use super::{ToolAnnotations, ToolDescriptor};

const GMAIL_READONLY: &str = "https://www.googleapis.com/auth/gmail.readonly";
const GMAIL_SEND: &str = "https://www.googleapis.com/auth/gmail.send";
const CALENDAR_EVENTS: &str = "https://www.googleapis.com/auth/calendar.events";
const DRIVE: &str = "https://www.googleapis.com/auth/drive";
/// Full mailbox access; `messages.batchDelete` accepts nothing narrower
const GMAIL_FULL: &str = "https://mail.google.com/";

fn tool(
    name: &str,
    description: &str,
    input_schema: Value,
    scopes: &[&str],
    annotations: ToolAnnotations,
) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
        required_scopes: scopes.iter().map(|s| s.to_string()).collect(),
        annotations: Some(annotations),
    }
}

fn read_only() -> ToolAnnotations {
    ToolAnnotations {
        read_only_hint: Some(true),
        destructive_hint: Some(false),
        idempotent_hint: Some(true),
        open_world_hint: Some(true),
    }
}

fn additive() -> ToolAnnotations {
    ToolAnnotations {
        read_only_hint: Some(false),
        destructive_hint: Some(false),
        idempotent_hint: Some(false),
        open_world_hint: Some(true),
    }
}

fn overwriting() -> ToolAnnotations {
    ToolAnnotations {
        read_only_hint: Some(false),
        destructive_hint: Some(true),
        idempotent_hint: Some(true),
        open_world_hint: Some(true),
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Every tool the bridge exposes, in declaration order.
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    vec![
        // ── Gmail ──
        tool(
            "read_latest_gmail_email",
            "Reads the most recent email from the user's Gmail inbox.",
            object_schema(json!({}), &[]),
            &[GMAIL_READONLY],
            read_only(),
        ),
        tool(
            "read_email_by_subject",
            "Searches for emails by subject and returns the body and snippet of the most recent matches.",
            object_schema(
                json!({
                    "subject": {"type": "string", "description": "The subject line to search for."}
                }),
                &["subject"],
            ),
            &[GMAIL_READONLY],
            read_only(),
        ),
        tool(
            "send_email",
            "Sends an email from the user's Gmail account.",
            object_schema(
                json!({
                    "to": {"type": "string", "description": "The recipient's email address."},
                    "subject": {"type": "string", "description": "The subject line of the email."},
                    "body": {"type": "string", "description": "The plain text body of the email."}
                }),
                &["to", "subject", "body"],
            ),
            &[GMAIL_SEND],
            additive(),
        ),
        tool(
            "list_gmail_senders",
            "Lists unique sender email addresses from the user's Gmail inbox.",
            object_schema(
                json!({
                    "max_results": {
                        "type": "integer",
                        "description": "The maximum number of emails to scan for senders.",
                        "default": 100
                    }
                }),
                &[],
            ),
            &[GMAIL_READONLY],
            read_only(),
        ),
        tool(
            "batch_delete_emails_from_senders",
            "Deletes all emails from the specified sender email addresses.",
            object_schema(
                json!({
                    "sender_emails": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Sender email addresses to delete emails from."
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "The maximum number of emails to delete per sender.",
                        "default": 100
                    }
                }),
                &["sender_emails"],
            ),
            &[GMAIL_FULL],
            overwriting(),
        ),
        // ── Calendar ──
        tool(
            "list_calendar_events",
            "Lists calendar events within a specified time range, optionally filtering by a search query.",
            object_schema(
                json!({
                    "start_time": {"type": "string", "description": "Start of the range in ISO 8601 format (e.g. '2025-07-05T00:00:00Z')."},
                    "end_time": {"type": "string", "description": "End of the range in ISO 8601 format (e.g. '2025-07-06T00:00:00Z')."},
                    "query": {"type": "string", "description": "Optional text query to filter events by."}
                }),
                &["start_time", "end_time"],
            ),
            &[CALENDAR_EVENTS],
            read_only(),
        ),
        tool(
            "create_calendar_event",
            "Creates a Google Calendar event from structured event details.",
            object_schema(
                json!({
                    "event_details": {
                        "type": "object",
                        "properties": {
                            "summary": {"type": "string", "description": "The title or summary of the event."},
                            "start_time": {"type": "string", "description": "Start time in ISO 8601 format."},
                            "end_time": {"type": "string", "description": "End time in ISO 8601 format."},
                            "description": {"type": "string", "description": "A detailed description for the event."}
                        },
                        "required": ["summary", "start_time", "end_time"]
                    }
                }),
                &["event_details"],
            ),
            &[CALENDAR_EVENTS],
            additive(),
        ),
        tool(
            "update_calendar_event",
            "Updates an existing calendar event by its ID. Only provided fields will be updated.",
            object_schema(
                json!({
                    "event_id": {"type": "string", "description": "The ID of the event to update."},
                    "update_details": {
                        "type": "object",
                        "properties": {
                            "summary": {"type": "string"},
                            "start_time": {"type": "string"},
                            "end_time": {"type": "string"},
                            "description": {"type": "string"}
                        }
                    }
                }),
                &["event_id", "update_details"],
            ),
            &[CALENDAR_EVENTS],
            overwriting(),
        ),
        tool(
            "delete_calendar_event",
            "Deletes a calendar event by its ID. To get an event ID, first list or search for events.",
            object_schema(
                json!({
                    "event_id": {"type": "string", "description": "The unique ID of the event to delete."}
                }),
                &["event_id"],
            ),
            &[CALENDAR_EVENTS],
            overwriting(),
        ),
        // ── Drive ──
        tool(
            "list_drive_files",
            "Searches for files in Google Drive using a query string.",
            object_schema(
                json!({
                    "query": {
                        "type": "string",
                        "description": "Drive search query, e.g. \"name contains 'report'\"."
                    }
                }),
                &["query"],
            ),
            &[DRIVE],
            read_only(),
        ),
        tool(
            "create_drive_document",
            "Creates a new Google Document in the user's Drive with the given title and content.",
            object_schema(
                json!({
                    "title": {"type": "string", "description": "The title of the new document."},
                    "content": {"type": "string", "description": "The initial text content.", "default": ""}
                }),
                &["title"],
            ),
            &[DRIVE],
            additive(),
        ),
        tool(
            "update_drive_document",
            "Overwrites the content of an existing Google Document.",
            object_schema(
                json!({
                    "file_id": {"type": "string", "description": "The ID of the document to update."},
                    "content": {"type": "string", "description": "The new text content."}
                }),
                &["file_id", "content"],
            ),
            &[DRIVE],
            overwriting(),
        ),
        tool(
            "delete_drive_file",
            "Permanently deletes a file from Google Drive. This action cannot be undone.",
            object_schema(
                json!({
                    "file_id": {"type": "string", "description": "The ID of the file to delete."}
                }),
                &["file_id"],
            ),
            &[DRIVE],
            overwriting(),
        ),
        tool(
            "move_drive_file_to_bin",
            "Moves a file to the Google Drive bin (trash). The file can be restored from the bin later.",
            object_schema(
                json!({
                    "file_id": {"type": "string", "description": "The ID of the file to move to the bin."}
                }),
                &["file_id"],
            ),
            &[DRIVE],
            ToolAnnotations {
                read_only_hint: Some(false),
                destructive_hint: Some(false),
                idempotent_hint: Some(true),
                open_world_hint: Some(true),
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SCOPES;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_has_unique_names() {
        let tools = builtin_tools();
        assert_eq!(tools.len(), 14);
        let names: HashSet<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), tools.len());
    }

    #[test]
    fn test_tool_scopes_within_default_set() {
        for t in builtin_tools() {
            assert!(!t.required_scopes.is_empty(), "{} declares no scopes", t.name);
            if t.name == "batch_delete_emails_from_senders" {
                continue;
            }
            for scope in &t.required_scopes {
                assert!(DEFAULT_SCOPES.contains(&scope.as_str()), "{}: {}", t.name, scope);
            }
        }
    }

    #[test]
    fn test_batch_delete_requires_full_mailbox_scope() {
        let tool = builtin_tools()
            .into_iter()
            .find(|t| t.name == "batch_delete_emails_from_senders")
            .unwrap();
        assert_eq!(tool.required_scopes, vec![GMAIL_FULL.to_string()]);
        assert!(tool.scopes().contains("https://mail.google.com/"));
        assert!(!DEFAULT_SCOPES.contains(&GMAIL_FULL));
    }

    #[test]
    fn test_required_fields_are_declared_properties() {
        for t in builtin_tools() {
            let properties = t.input_schema["properties"].as_object().unwrap();
            for field in t.input_schema["required"].as_array().unwrap() {
                assert!(properties.contains_key(field.as_str().unwrap()), "{}", t.name);
            }
        }
    }
}
