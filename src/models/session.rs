//! Research Session Models
//!
//! Data structures for research threads: status, suggested frameworks,
//! the streamed report and its sources.
//!
//! Records serialize with camelCase field names. Framework entries keep the
//! `name_zh` / `name_en` / `advantage` keys the model is asked to produce.

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of a research session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "StatusRepr")]
pub enum SessionStatus {
    Idle,
    AwaitingGoalInput,
    LoadingFrameworks,
    AwaitingFrameworkSelection,
    LoadingReport,
    Generating,
    LoadingMetadata,
    Success,
    Error,
}

impl SessionStatus {
    const ALL: [SessionStatus; 9] = [
        SessionStatus::Idle,
        SessionStatus::AwaitingGoalInput,
        SessionStatus::LoadingFrameworks,
        SessionStatus::AwaitingFrameworkSelection,
        SessionStatus::LoadingReport,
        SessionStatus::Generating,
        SessionStatus::LoadingMetadata,
        SessionStatus::Success,
        SessionStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::AwaitingGoalInput => "awaiting_goal_input",
            SessionStatus::LoadingFrameworks => "loading_frameworks",
            SessionStatus::AwaitingFrameworkSelection => "awaiting_framework_selection",
            SessionStatus::LoadingReport => "loading_report",
            SessionStatus::Generating => "generating",
            SessionStatus::LoadingMetadata => "loading_metadata",
            SessionStatus::Success => "success",
            SessionStatus::Error => "error",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "New research",
            SessionStatus::AwaitingGoalInput => "Awaiting goals",
            SessionStatus::LoadingFrameworks => "Suggesting frameworks",
            SessionStatus::AwaitingFrameworkSelection => "Choose a framework",
            SessionStatus::LoadingReport => "Preparing report",
            SessionStatus::Generating => "Generating report",
            SessionStatus::LoadingMetadata => "Analyzing sources",
            SessionStatus::Success => "Complete",
            SessionStatus::Error => "Failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Older snapshots stored the status as its ordinal.
#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<StatusRepr> for SessionStatus {
    type Error = String;

    fn try_from(repr: StatusRepr) -> Result<Self, String> {
        match repr {
            StatusRepr::Code(code) => Self::ALL
                .get(code as usize)
                .copied()
                .ok_or_else(|| format!("unknown session status code {}", code)),
            StatusRepr::Name(name) => {
                let normalized: String = name
                    .chars()
                    .filter(|c| *c != '_' && *c != '-')
                    .collect::<String>()
                    .to_lowercase();
                Self::ALL
                    .iter()
                    .find(|s| s.as_str().replace('_', "") == normalized)
                    .copied()
                    .ok_or_else(|| format!("unknown session status '{}'", name))
            }
        }
    }
}

/// Deserialize `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A named analytical lens suggested for the topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framework {
    /// Name in the report language
    #[serde(rename = "name_zh")]
    pub name_native: String,
    pub name_en: String,
    /// Why this lens suits the topic
    pub advantage: String,
}

impl Framework {
    pub fn new(
        name_native: impl Into<String>,
        name_en: impl Into<String>,
        advantage: impl Into<String>,
    ) -> Self {
        Self {
            name_native: name_native.into(),
            name_en: name_en.into(),
            advantage: advantage.into(),
        }
    }

    /// Label used when requesting the report, e.g. `波特五力 (Porter's Five Forces)`.
    pub fn prompt_label(&self) -> String {
        format!("{} ({})", self.name_native, self.name_en)
    }
}

/// Raw web source attached by search grounding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingReference {
    pub uri: String,
    pub title: String,
}

/// Enrichment returned by metadata extraction for one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub report_name: String,
    #[serde(default)]
    pub publication_date: Option<String>,
}

/// A grounding reference with a cleaned name and optional publication date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredSource {
    pub web: GroundingReference,
    pub report_name: String,
    #[serde(default)]
    pub publication_date: Option<String>,
}

impl StructuredSource {
    /// Title-as-name, no date.
    pub fn preliminary(web: GroundingReference) -> Self {
        let report_name = web.title.clone();
        Self {
            web,
            report_name,
            publication_date: None,
        }
    }

    /// Merge enrichment over this source. Blank values keep the current ones.
    pub fn enriched(mut self, metadata: Option<&SourceMetadata>) -> Self {
        if let Some(meta) = metadata {
            let name = meta.report_name.trim();
            if !name.is_empty() {
                self.report_name = name.to_string();
            }
            if let Some(date) = meta
                .publication_date
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("null"))
            {
                self.publication_date = Some(date.to_string());
            }
        }
        self
    }
}

/// One titled analysis section of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSection {
    pub title: String,
    pub content: String,
    /// Raw citation list such as `[1, 4, 5]`, kept verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
}

/// Structured research report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Raw streamed text while generating; the parsed summary afterwards
    #[serde(default, deserialize_with = "null_as_default")]
    pub overall_summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub analysis: Vec<AnalysisSection>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<StructuredSource>,
}

impl Report {
    /// Whether there is anything worth showing.
    pub fn has_content(&self) -> bool {
        !self.overall_summary.trim().is_empty() || !self.analysis.is_empty()
    }
}

/// One research thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSession {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topic: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub objective: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scope: String,
    pub status: SessionStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub frameworks: Vec<Framework>,
    #[serde(default)]
    pub selected_framework: Option<Framework>,
    #[serde(default)]
    pub results: Option<Report>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

impl ResearchSession {
    /// Create an empty Idle session
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: String::new(),
            objective: String::new(),
            scope: String::new(),
            status: SessionStatus::Idle,
            frameworks: Vec::new(),
            selected_framework: None,
            results: None,
            error: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a session that already has its topic
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            status: SessionStatus::AwaitingGoalInput,
            ..Self::new()
        }
    }

    /// Display name for history lists
    pub fn display_name(&self) -> &str {
        if self.topic.trim().is_empty() {
            "New Research"
        } else {
            &self.topic
        }
    }

    /// Whether a prior report can be revisited
    pub fn has_report(&self) -> bool {
        self.results.as_ref().is_some_and(Report::has_content)
    }

    /// Apply a partial update (shallow merge)
    pub fn apply_update(&mut self, update: SessionUpdate) {
        if let Some(topic) = update.topic {
            self.topic = topic;
        }
        if let Some(objective) = update.objective {
            self.objective = objective;
        }
        if let Some(scope) = update.scope {
            self.scope = scope;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(frameworks) = update.frameworks {
            self.frameworks = frameworks;
        }
        if let Some(selected) = update.selected_framework {
            self.selected_framework = selected;
        }
        if let Some(results) = update.results {
            self.results = results;
        }
        if let Some(error) = update.error {
            self.error = error;
        }
    }
}

impl Default for ResearchSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial session update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub topic: Option<String>,
    pub objective: Option<String>,
    pub scope: Option<String>,
    pub status: Option<SessionStatus>,
    pub frameworks: Option<Vec<Framework>>,
    pub selected_framework: Option<Option<Framework>>,
    pub results: Option<Option<Report>>,
    pub error: Option<Option<String>>,
}

impl SessionUpdate {
    /// Start an update that moves the session to `status`
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_goal(mut self, objective: impl Into<String>, scope: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self.scope = Some(scope.into());
        self
    }

    pub fn with_frameworks(mut self, frameworks: Vec<Framework>) -> Self {
        self.frameworks = Some(frameworks);
        self
    }

    pub fn with_selected_framework(mut self, framework: Option<Framework>) -> Self {
        self.selected_framework = Some(framework);
        self
    }

    pub fn with_results(mut self, results: Option<Report>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }
}
