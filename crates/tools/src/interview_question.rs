//! Interview question search: scrapes question titles from mianshiya.com.
//!
//! GET `{base_url}/search/all?searchText=<keyword>` and collect the link text
//! of every `.ant-table-cell > a`, one question per line.

use async_trait::async_trait;
use codehelper_core::error::ToolError;
use codehelper_core::tool::{Tool, ToolResult};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

pub const TOOL_NAME: &str = "interviewQuestionSearch";
const DEFAULT_BASE_URL: &str = "https://www.mianshiya.com";
const QUESTION_SELECTOR: &str = ".ant-table-cell > a";

pub struct InterviewQuestionTool {
    client: reqwest::Client,
    base_url: String,
}

impl InterviewQuestionTool {
    pub fn new() -> Result<Self, ToolError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: format!("HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn failed(reason: impl std::fmt::Display) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Tool for InterviewQuestionTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Retrieves relevant interview questions based on a keyword. Use this tool when the user \
         asks for interview questions about specific technologies, programming concepts, or \
         job-related topics. Returns a list of matching question titles."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "keyword": {
                    "type": "string",
                    "description": "The keyword to search for, e.g. \"redis\" or \"java multithreading\""
                }
            },
            "required": ["keyword"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let keyword = arguments["keyword"]
            .as_str()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'keyword' argument".into()))?;

        let url = format!("{}/search/all", self.base_url);
        debug!(keyword, "Searching interview questions");

        let response = self
            .client
            .get(&url)
            .query(&[("searchText", keyword)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: TOOL_NAME.into(),
                        timeout_secs: 5,
                    }
                } else {
                    Self::failed(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::failed(format!("search returned HTTP {}", response.status())));
        }

        let html = response.text().await.map_err(Self::failed)?;
        let questions = extract_questions(&html)?;

        let output = if questions.is_empty() {
            format!("No interview questions found for '{keyword}'")
        } else {
            questions.join("\n")
        };

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data: Some(serde_json::json!({ "count": questions.len() })),
        })
    }
}

/// Question titles in document order, blanks dropped.
pub fn extract_questions(html: &str) -> Result<Vec<String>, ToolError> {
    let selector = Selector::parse(QUESTION_SELECTOR)
        .map_err(|e| InterviewQuestionTool::failed(format!("selector: {e}")))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(|a| a.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}
