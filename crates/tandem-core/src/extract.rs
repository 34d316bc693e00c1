//! Heuristic expense extraction from transaction emails
//!
//! Emails arrive in wildly different shapes (bank alerts, receipts, payment
//! confirmations), so extraction is a fixed list of patterns tried in order
//! rather than anything clever. An email with no recognizable amount yields
//! nothing and is skipped by the importer.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::models::{ExpenseSource, ExtractedEmail, NewExpense};

/// Compiled extraction rules. Build once, reuse across messages.
pub struct Extractor {
    amount_patterns: Vec<Regex>,
    merchant_patterns: Vec<Regex>,
    tz_abbrev: Regex,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        // Order matters: an explicit dollar sign wins over a bare
        // "Total: 12.34" match further down.
        let amount_patterns = [
            r"\$\s*([\d,]+\.?\d*)",
            r"([\d,]+\.?\d*)\s*(?:USD|usd)",
            r"(?i)(?:Total|Amount|Charged|Payment|Price)[\s:]*\$?\s*([\d,]+\.?\d*)",
            r"€\s*([\d,]+\.?\d*)",
            r"£\s*([\d,]+\.?\d*)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect();

        // Merchant names are single-space-separated words; a double space or
        // newline ends the candidate so a match never crosses clauses.
        let merchant_patterns = [
            r"(?:from|at|to)\s+([A-Z][A-Za-z0-9&']*(?: [A-Za-z0-9&']+)*?)(?:\s+for|\s+on|\s*$)",
            r"(?:Purchase at|Payment to|Transaction at)\s+([A-Za-z0-9&']+(?: [A-Za-z0-9&']+)*)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect();

        let tz_abbrev = Regex::new(r"\s*\([A-Z]+\)\s*$").expect("valid regex");

        Self {
            amount_patterns,
            merchant_patterns,
            tz_abbrev,
        }
    }

    /// Turn a decoded email into an expense draft, or None when no amount
    /// can be found.
    pub fn extract(&self, email: &ExtractedEmail) -> Option<NewExpense> {
        let haystack = format!("{} {} {}", email.subject, email.snippet, email.body);
        let amount = self.extract_amount(&haystack)?;

        let subject = email.subject.trim();
        let description = if subject.is_empty() {
            // Snippet stands in when the subject is blank
            email.snippet.chars().take(100).collect::<String>()
        } else {
            subject.to_string()
        };

        Some(NewExpense {
            amount,
            description,
            category: None,
            merchant: self.extract_merchant(&haystack, &email.from),
            date: Some(self.extract_date(&email.date)),
            source: ExpenseSource::Gmail,
            email_id: Some(email.id.clone()),
        })
    }

    /// First pattern whose first match is a plausible amount wins.
    ///
    /// Plausible means strictly between 0 and 1,000,000; a first match
    /// outside that range (order numbers, phone fragments) disqualifies the
    /// whole pattern and the next pattern gets a try.
    pub fn extract_amount(&self, text: &str) -> Option<f64> {
        for pattern in &self.amount_patterns {
            if let Some(capture) = pattern.captures(text) {
                let raw = capture.get(1)?.as_str().replace(',', "");
                if let Ok(amount) = raw.parse::<f64>() {
                    if amount > 0.0 && amount < 1_000_000.0 {
                        return Some(amount);
                    }
                }
            }
        }
        None
    }

    /// Pull a merchant name out of the text, falling back to the sender's
    /// display name when it doesn't look like an automated mailbox.
    pub fn extract_merchant(&self, text: &str, from: &str) -> Option<String> {
        for pattern in &self.merchant_patterns {
            if let Some(capture) = pattern.captures(text) {
                if let Some(m) = capture.get(1) {
                    let name = m.as_str().trim();
                    if !name.is_empty() {
                        return Some(name.to_string());
                    }
                }
            }
        }

        // Generic markers anywhere in the header, address included, mean
        // this is an automated mailbox regardless of the display name.
        let lowered = from.to_lowercase();
        if lowered.contains("no-reply")
            || lowered.contains("noreply")
            || lowered.contains("notifications")
        {
            return None;
        }

        // "Acme Store <receipts@acme.com>" -> "Acme Store"
        let display = match from.split_once('<') {
            Some((name, _)) => name.trim().trim_matches('"'),
            None => from.trim(),
        };
        if display.is_empty() {
            return None;
        }
        Some(display.to_string())
    }

    /// Parse an RFC 2822 Date header, tolerating a trailing "(PDT)" style
    /// timezone comment and a few common deviations. Unparseable dates fall
    /// back to now so an import never fails on a bad header.
    pub fn extract_date(&self, header: &str) -> DateTime<Utc> {
        let cleaned = self.tz_abbrev.replace(header.trim(), "");
        let cleaned = cleaned.trim();

        for format in ["%a, %d %b %Y %H:%M:%S %z", "%d %b %Y %H:%M:%S %z"] {
            if let Ok(dt) = DateTime::parse_from_str(cleaned, format) {
                return dt.with_timezone(&Utc);
            }
        }
        // Missing offset; assume UTC
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(cleaned, "%a, %d %b %Y %H:%M:%S") {
            return dt.and_utc();
        }

        Utc::now()
    }
}
