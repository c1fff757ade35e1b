use std::sync::OnceLock;
use std::time::Duration;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::datetime;
use crate::task::{Category, Priority, TaskDraft};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error(
        "no inference credential configured; set inference.key in the rc file or the UTTER_API_KEY environment variable"
    )]
    MissingCredential,

    #[error("input is empty")]
    EmptyInput,
}

/// Turns a raw utterance into validated task drafts via one bounded,
/// attempt-once call to the inference service. Everything past the
/// credential check fails soft: callers observe an empty draft list,
/// never a transport or parse error.
#[derive(Debug, Clone)]
pub struct Normalizer {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default)]
    tasks: Vec<WireDraft>,
}

// Untrusted input: every field optional, every value checked.
#[derive(Debug, Deserialize)]
struct WireDraft {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, rename = "dueDateTime")]
    due_date_time: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

impl Normalizer {
    /// Fails fast when no credential exists; no network attempt is made.
    pub fn from_config(cfg: &Config) -> Result<Self, NormalizeError> {
        let api_key = cfg.api_key().ok_or(NormalizeError::MissingCredential)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: cfg.inference_url(),
            model: cfg.inference_model(),
            api_key,
            timeout: cfg.inference_timeout(),
        })
    }

    #[tracing::instrument(skip(self, raw))]
    pub async fn normalize(
        &self,
        raw: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<TaskDraft>, NormalizeError> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(NormalizeError::EmptyInput);
        }

        let instruction = build_instruction(now);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &instruction,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let response = match self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "inference call failed");
                return Ok(vec![]);
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "inference service returned an error status");
            return Ok(vec![]);
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "inference response body is not a chat completion");
                return Ok(vec![]);
            }
        };

        let Some(content) = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
        else {
            debug!("inference response carried no content");
            return Ok(vec![]);
        };

        Ok(parse_drafts(&content))
    }
}

/// The instruction anchors the model to the caller's local clock and pins
/// down how relative time expressions resolve. Resolved timestamps come
/// back as naive local strings; display code relies on that.
pub fn build_instruction(now: NaiveDateTime) -> String {
    format!(
        "Analyze the following natural language input and extract structured to-do items.\n\
         \n\
         Current local time: {now}\n\
         Current day: {weekday}\n\
         \n\
         Rules:\n\
         1. Extract every task present in the input.\n\
         2. Time resolution is strict:\n\
            - Relative offsets (\"in 10 minutes\") are added to the current local time.\n\
            - A bare clock time (\"at 5\") means its next future occurrence: today if it has \
         not passed yet, otherwise tomorrow, unless context implies otherwise.\n\
            - A date with no time of day defaults to 09:00:00.\n\
            - \"tonight\" defaults to 19:00:00.\n\
            - Emit every resolved timestamp as local time formatted YYYY-MM-DDTHH:mm:ss. \
         Never append 'Z' or a UTC offset.\n\
         3. Priority is one of \"high\", \"medium\", \"low\"; default \"medium\".\n\
         4. Category is one of \"work\", \"personal\", \"urgent\", \"misc\"; default \"misc\".\n\
         \n\
         You must respond with a single JSON object of exactly this shape:\n\
         {{\n\
           \"tasks\": [\n\
             {{\n\
               \"summary\": \"string (a short, actionable title)\",\n\
               \"dueDateTime\": \"string (YYYY-MM-DDTHH:mm:ss) or null\",\n\
               \"description\": \"string (additional details) or null\",\n\
               \"category\": \"work\" | \"personal\" | \"urgent\" | \"misc\",\n\
               \"priority\": \"high\" | \"medium\" | \"low\"\n\
             }}\n\
           ]\n\
         }}\n",
        now = now.format("%Y-%m-%d %H:%M:%S"),
        weekday = now.format("%A"),
    )
}

/// Best-effort unwrap of a fenced payload, then a strict structural parse.
/// Anything that does not validate yields an empty draft list.
pub fn parse_drafts(content: &str) -> Vec<TaskDraft> {
    let body = strip_code_fences(content);
    let payload: WirePayload = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "inference payload is not the expected JSON shape");
            return vec![];
        }
    };

    payload.tasks.into_iter().filter_map(validate_draft).collect()
}

fn validate_draft(wire: WireDraft) -> Option<TaskDraft> {
    let summary = wire
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let Some(summary) = summary else {
        warn!("dropping draft with missing or blank summary");
        return None;
    };

    let due = match wire.due_date_time.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let parsed = datetime::parse_local_naive(raw);
            if parsed.is_none() {
                warn!(raw = %raw, "dropping unparseable due time");
            }
            parsed
        }
    };

    let description = wire
        .description
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let category = wire
        .category
        .map(Category::from)
        .unwrap_or(Category::Misc);
    let priority = wire
        .priority
        .as_deref()
        .map(Priority::parse)
        .unwrap_or_default();

    Some(TaskDraft {
        summary,
        due,
        description,
        category,
        priority,
    })
}

fn strip_code_fences(raw: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9]*\s*\n?(.*?)\n?\s*```\s*$").expect("valid fence regex")
    });

    match fence.captures(raw) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw.trim(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::NaiveDate;

    use super::{NormalizeError, Normalizer, build_instruction, parse_drafts, strip_code_fences};
    use crate::config::Config;
    use crate::task::{Category, Priority};

    fn jan_first_nine() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .expect("valid date")
            .and_hms_opt(9, 0, 0)
            .expect("valid time")
    }

    #[test]
    fn instruction_embeds_clock_and_disambiguation_rules() {
        let instruction = build_instruction(jan_first_nine());
        assert!(instruction.contains("2024-01-01 09:00:00"));
        assert!(instruction.contains("Monday"));
        assert!(instruction.contains("09:00:00"));
        assert!(instruction.contains("19:00:00"));
        assert!(instruction.contains("Never append 'Z'"));
    }

    #[test]
    fn fenced_payload_still_parses() {
        let content = "```json\n{\"tasks\":[{\"summary\":\"Call Lucy\",\
                       \"dueDateTime\":\"2024-01-01T14:10:00\",\"description\":null,\
                       \"category\":\"personal\",\"priority\":\"medium\"}]}\n```";
        let drafts = parse_drafts(content);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].summary, "Call Lucy");
        assert_eq!(
            drafts[0].due,
            crate::datetime::parse_local_naive("2024-01-01T14:10:00")
        );
        assert_eq!(drafts[0].category, Category::Personal);
        assert_eq!(drafts[0].priority, Priority::Medium);
    }

    #[test]
    fn prose_yields_empty_not_error() {
        let drafts = parse_drafts("Sure! Here are the tasks you asked about.");
        assert!(drafts.is_empty());
    }

    #[test]
    fn unknown_enums_default_instead_of_rejecting() {
        let content = r#"{"tasks":[{"summary":"Renew passport",
            "dueDateTime":null,"description":null,
            "category":"errands","priority":"asap"}]}"#;
        let drafts = parse_drafts(content);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].category, Category::Other("errands".to_string()));
        assert!(drafts[0].category.is_misc_like());
        assert_eq!(drafts[0].priority, Priority::Medium);
    }

    #[test]
    fn blank_summary_drops_the_draft() {
        let content = r#"{"tasks":[
            {"summary":"  ","category":"misc","priority":"low"},
            {"summary":"Keep me","category":"misc","priority":"low"}]}"#;
        let drafts = parse_drafts(content);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].summary, "Keep me");
    }

    #[test]
    fn unparseable_due_becomes_absent() {
        let content = r#"{"tasks":[{"summary":"Vague plans",
            "dueDateTime":"sometime soon","category":"misc","priority":"low"}]}"#;
        let drafts = parse_drafts(content);
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].due.is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let content = r#"{"tasks":[{"summary":"Bare minimum"}]}"#;
        let drafts = parse_drafts(content);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].category, Category::Misc);
        assert_eq!(drafts[0].priority, Priority::Medium);
        assert!(drafts[0].due.is_none());
        assert!(drafts[0].description.is_none());
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_call() {
        let mut rc = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(rc, "inference.key = test-key").expect("write");
        let cfg = Config::load(Some(rc.path())).expect("load config");

        let normalizer = Normalizer::from_config(&cfg).expect("credential present");
        let err = normalizer
            .normalize("   \n", jan_first_nine())
            .await
            .expect_err("whitespace input is a no-op signal");
        assert!(matches!(err, NormalizeError::EmptyInput));
    }

    #[test]
    fn fence_stripping_handles_plain_and_tagged_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }
}
