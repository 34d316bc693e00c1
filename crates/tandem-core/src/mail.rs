//! Gmail API client for expense email import
//!
//! A thin wrapper over the Gmail REST API. The sync path is:
//! get-or-create the configured label, list messages carrying it since a
//! cutoff date, fetch each message, and decode the headers and text body
//! into an `ExtractedEmail` for the extractor.

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::ExtractedEmail;
use crate::oauth;

const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Most messages to consider per sync run
const MAX_MESSAGES_PER_SYNC: u32 = 100;

/// Gmail client bound to one user's access token
pub struct GmailClient {
    http_client: Client,
    access_token: String,
}

impl GmailClient {
    pub fn new(access_token: &str) -> Self {
        Self {
            http_client: Client::new(),
            access_token: access_token.to_string(),
        }
    }

    /// Build a client for a user by minting an access token from their
    /// stored refresh token.
    pub async fn for_user(config: &Config, refresh_token: &str) -> Result<Self> {
        let http_client = Client::new();
        let access_token =
            oauth::refresh_access_token(&http_client, config, refresh_token).await?;
        Ok(Self {
            http_client,
            access_token,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Mail(format!(
                "Gmail API returned {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }

    /// Find a label by name, creating it if it doesn't exist yet.
    /// Returns the label id. Name matching is case insensitive, the way
    /// Gmail itself treats label names.
    pub async fn get_or_create_label(&self, name: &str) -> Result<String> {
        let list: LabelList = self.get_json(&format!("{}/labels", GMAIL_BASE_URL)).await?;

        if let Some(label) = list
            .labels
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
        {
            return Ok(label.id.clone());
        }

        debug!(label = %name, "Creating Gmail label");
        let response = self
            .http_client
            .post(format!("{}/labels", GMAIL_BASE_URL))
            .bearer_auth(&self.access_token)
            .json(&CreateLabel {
                name: name.to_string(),
                label_list_visibility: "labelShow".to_string(),
                message_list_visibility: "show".to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Mail(format!("Label creation failed with {}", status)));
        }

        let created: Label = response.json().await?;
        Ok(created.id)
    }

    /// List message ids carrying a label since a cutoff date
    pub async fn list_message_ids(
        &self,
        label: &str,
        after: chrono::NaiveDate,
    ) -> Result<Vec<String>> {
        let query = format!("label:{} after:{}", label, after.format("%Y/%m/%d"));
        let url = reqwest::Url::parse_with_params(
            &format!("{}/messages", GMAIL_BASE_URL),
            &[
                ("q", query.as_str()),
                ("maxResults", &MAX_MESSAGES_PER_SYNC.to_string()),
            ],
        )
        .map_err(|e| Error::Mail(format!("Invalid Gmail query: {}", e)))?;

        let list: MessageList = self.get_json(url.as_str()).await?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    /// Fetch and decode a single message
    pub async fn fetch_message(&self, id: &str) -> Result<ExtractedEmail> {
        let url = format!("{}/messages/{}?format=full", GMAIL_BASE_URL, id);
        let message: Message = self.get_json(&url).await?;
        Ok(decode_message(message))
    }
}

#[derive(Debug, Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct Label {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLabel {
    name: String,
    label_list_visibility: String,
    message_list_visibility: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize, Default)]
struct Message {
    #[serde(default)]
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: MessagePart,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: PartBody,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize, Default)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

fn header_value(payload: &MessagePart, name: &str) -> String {
    payload
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
        .unwrap_or_default()
}

/// Gmail body data is URL-safe base64; padding is inconsistent in practice
fn decode_body_data(data: &str) -> Option<String> {
    let bytes = base64::engine::general_purpose::URL_SAFE
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(data))
        .ok()?;
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Message body is not valid UTF-8: {}", e);
            None
        }
    }
}

/// Depth-first search of the MIME tree for a part of the given type
fn find_part_body(part: &MessagePart, mime_type: &str) -> Option<String> {
    if part.mime_type == mime_type {
        if let Some(data) = &part.body.data {
            return decode_body_data(data);
        }
    }
    part.parts
        .iter()
        .find_map(|child| find_part_body(child, mime_type))
}

fn decode_message(message: Message) -> ExtractedEmail {
    let payload = &message.payload;

    // Prefer plain text; HTML only if that's all there is
    let body = find_part_body(payload, "text/plain")
        .or_else(|| find_part_body(payload, "text/html"))
        .or_else(|| payload.body.data.as_deref().and_then(decode_body_data))
        .unwrap_or_else(|| message.snippet.clone());

    ExtractedEmail {
        id: message.id,
        subject: header_value(payload, "Subject"),
        from: header_value(payload, "From"),
        date: header_value(payload, "Date"),
        body,
        snippet: message.snippet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE.encode(text)
    }

    fn part(mime_type: &str, data: Option<String>, parts: Vec<MessagePart>) -> MessagePart {
        MessagePart {
            mime_type: mime_type.to_string(),
            headers: Vec::new(),
            body: PartBody { data },
            parts,
        }
    }

    #[test]
    fn decodes_headers_and_plain_body() {
        let message = Message {
            id: "msg-1".to_string(),
            snippet: "snippet".to_string(),
            payload: MessagePart {
                mime_type: "multipart/alternative".to_string(),
                headers: vec![
                    Header {
                        name: "Subject".to_string(),
                        value: "Your receipt".to_string(),
                    },
                    Header {
                        name: "from".to_string(),
                        value: "Shop <receipts@shop.com>".to_string(),
                    },
                    Header {
                        name: "Date".to_string(),
                        value: "Mon, 15 Jan 2024 10:30:00 +0000".to_string(),
                    },
                ],
                body: PartBody { data: None },
                parts: vec![
                    part("text/html", Some(encode("<b>html</b>")), vec![]),
                    part("text/plain", Some(encode("plain body $5.00")), vec![]),
                ],
            },
        };

        let email = decode_message(message);
        assert_eq!(email.id, "msg-1");
        assert_eq!(email.subject, "Your receipt");
        assert_eq!(email.from, "Shop <receipts@shop.com>");
        assert_eq!(email.body, "plain body $5.00");
    }

    #[test]
    fn falls_back_to_html_then_snippet() {
        let message = Message {
            id: "msg-2".to_string(),
            snippet: "snippet only".to_string(),
            payload: part("multipart/alternative", None, vec![part(
                "text/html",
                Some(encode("<p>html body</p>")),
                vec![],
            )]),
        };
        assert_eq!(decode_message(message).body, "<p>html body</p>");

        let message = Message {
            id: "msg-3".to_string(),
            snippet: "snippet only".to_string(),
            payload: part("multipart/alternative", None, vec![]),
        };
        assert_eq!(decode_message(message).body, "snippet only");
    }

    #[test]
    fn nested_multipart_is_searched_depth_first() {
        let inner = part(
            "multipart/alternative",
            None,
            vec![part("text/plain", Some(encode("nested plain")), vec![])],
        );
        let message = Message {
            id: "msg-4".to_string(),
            snippet: String::new(),
            payload: part("multipart/mixed", None, vec![inner]),
        };
        assert_eq!(decode_message(message).body, "nested plain");
    }

    #[test]
    fn body_decoding_tolerates_missing_padding() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode("hello");
        let unpadded = padded.trim_end_matches('=').to_string();
        assert_eq!(decode_body_data(&padded).as_deref(), Some("hello"));
        assert_eq!(decode_body_data(&unpadded).as_deref(), Some("hello"));
    }
}
