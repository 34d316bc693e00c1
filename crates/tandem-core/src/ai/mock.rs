//! Mock AI backend for testing

use async_trait::async_trait;

use crate::error::Result;

use super::AIBackend;

/// Mock backend returning canned responses
#[derive(Clone)]
pub struct MockBackend {
    response: String,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_response(
            "SUMMARY: Spending is within normal range.\n\
             INSIGHTS:\n\
             - Spending was steady this period.\n\
             RECOMMENDATIONS:\n\
             - Keep tracking your expenses.",
        )
    }

    pub fn with_response(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.response.clone())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn model(&self) -> &str {
        "mock"
    }
}
