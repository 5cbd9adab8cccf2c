//! Prompt Templates
//!
//! Prompt text and response schemas for the three model calls. Schemas use
//! the Gemini OpenAPI subset (uppercase type names, `nullable`).

use serde_json::{json, Value};

use crate::models::session::GroundingReference;

/// System instruction shared by every call
pub const ANALYST_SYSTEM_PROMPT: &str = "You are a senior industry analyst at a leading research \
consultancy. You write precise, well-sourced analysis and follow output format rules exactly.";

/// Ask for 3 to 5 bespoke frameworks as JSON.
pub fn framework_prompt(topic: &str, objective: &str, scope: &str) -> String {
    let scope_line = if scope.trim().is_empty() {
        String::new()
    } else {
        format!("- Scope: \"{}\"\n", scope.trim())
    };

    format!(
        r#"A client has defined a research project:
- Topic: "{topic}"
- Research objective: "{objective}"
{scope_line}
Propose 3 to 5 analysis frameworks tailored to this exact project. Avoid generic textbook frameworks (SWOT, PESTEL, Porter's Five Forces) unless this specific context clearly justifies one. Each framework must be practical and directly serve the stated objective and scope.

For each framework provide:
1. "name_zh": its name in Traditional Chinese.
2. "name_en": its name in English.
3. "advantage": a short, persuasive explanation in Traditional Chinese of what it reveals and how it serves the objective.

Respond with a JSON array of objects using exactly the keys "name_zh", "name_en" and "advantage"."#
    )
}

/// Response schema for [`framework_prompt`]
pub fn framework_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name_zh": {
                    "type": "STRING",
                    "description": "Framework name in Traditional Chinese."
                },
                "name_en": {
                    "type": "STRING",
                    "description": "Framework name in English."
                },
                "advantage": {
                    "type": "STRING",
                    "description": "Why this framework suits the project, in Traditional Chinese."
                }
            },
            "required": ["name_zh", "name_en", "advantage"]
        }
    })
}

/// Ask for the grounded markdown report.
pub fn report_prompt(topic: &str, framework_label: &str) -> String {
    format!(
        r####"Write a detailed research report in Traditional Chinese on the topic "{topic}" by applying the "{framework_label}" framework. Apply the framework to the topic; do not explain the framework itself.

Ground the analysis in web research using at least 15 distinct sources drawn from:
1. Brokerage research reports published online.
2. Official sites of major consulting and industry research firms.
3. Reputable media and official organisation websites.

Structure the response in Markdown:
- Start with a "## 綜合摘要" section containing a concise summary with bullet points for the key insights.
- Then add one "###" section per component of the framework (for example "### 優勢", "### 劣勢"), each with detailed bullet points.

Citation rules:
1. After every key statement or bullet, add citation markers that refer to your numbered sources, starting at 1. Use the forms [1], [2, 3] or [4-6].
2. The last line of EVERY "###" section must be exactly `SECTION_SOURCES: [numbers]`, for example `SECTION_SOURCES: [1, 4, 5]`, listing the sources cited in that section. It must list at least one source and nothing may follow it within the section.

Formatting rules:
- Write everything in Traditional Chinese.
- Follow the Markdown structure above exactly.
- Do not use bold markup such as **text**; use clear topic sentences instead.
- Do not put URLs in the text. Citations are numbers only."####
    )
}

/// Ask for cleaned report names and normalised dates, one per reference.
pub fn metadata_prompt(references: &[GroundingReference]) -> String {
    let input = serde_json::to_string_pretty(references).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"Extract structured metadata from the research sources below. Each input object has a "title" and a "uri".

For each source:
1. "reportName": the clean, specific title of the document. Remove publisher names, dates, file extensions such as ".pdf" and generic site names.
2. "publicationDate": the publication date found in or inferred from the title, formatted as YYYY-MM-DD, or YYYY-MM when only year and month are known, or YYYY when only the year is known. Use null when no date can be determined reliably.

Input:
{input}

Return a JSON array with exactly {count} objects, in the same order as the input, each with the keys "reportName" and "publicationDate"."#,
        count = references.len()
    )
}

/// Response schema for [`metadata_prompt`]
pub fn metadata_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "reportName": {
                    "type": "STRING",
                    "description": "The cleaned, specific title of the report."
                },
                "publicationDate": {
                    "type": "STRING",
                    "description": "Publication date as YYYY-MM-DD, YYYY-MM or YYYY, or null.",
                    "nullable": true
                }
            },
            "required": ["reportName", "publicationDate"]
        }
    })
}
