//! Structured lecture notes.
//!
//! Lecture mode asks the model for JSON instead of Markdown: a unit title and
//! one entry per slide. Replies are often wrapped in code fences or prose, so
//! [`parse_lecture`] strips fences and falls back to the outermost `{...}`.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

pub const BEGIN_LECTURE: &str = "<<<BEGIN_LECTURE_CONTENT>>>";
pub const END_LECTURE: &str = "<<<END_LECTURE_CONTENT>>>";

/// Lectures run longer than a single page summary.
pub const LECTURE_MAX_TOKENS: u32 = 4000;

pub const LECTURE_SYSTEM: &str = "You are Nibiru, a helpful AI summarizer for BCIT lectures. You extract structured information and return ONLY valid JSON with no markdown formatting or explanations.";

const PREVIEW_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum LectureError {
    #[error("Failed to parse JSON response: {message}\nResponse preview: {preview}")]
    Parse { message: String, preview: String },

    #[error("Invalid JSON structure: missing unit_title or slides array\nResponse preview: {0}")]
    MissingStructure(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LectureSummary {
    pub unit_title: String,
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(default, deserialize_with = "lenient_id")]
    pub slide_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub overview: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_concepts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub definitions: Vec<Definition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default, alias = "examples", skip_serializing_if = "Option::is_none")]
    pub example: Option<WorkedExample>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reminders: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcqs: Vec<Mcq>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub term: String,
    pub def: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkedExample {
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mcq {
    pub stem: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<McqAnswer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McqAnswer {
    pub letter: String,
    #[serde(default)]
    pub rationale: String,
}

/// Structured notes plus the candidate that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureNotes {
    #[serde(flatten)]
    pub summary: LectureSummary,
    pub model: String,
    pub api_version: String,
}

/// Models sometimes answer `"overview": "one sentence"`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) if s.trim().is_empty() => Vec::new(),
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Slide ids arrive as `"1"` or `1`.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Option::<Id>::deserialize(deserializer)? {
        Some(Id::Text(s)) => s,
        Some(Id::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

impl LectureSummary {
    /// Number missing slide ids sequentially and title untitled slides.
    fn fill_gaps(&mut self) {
        for (index, slide) in self.slides.iter_mut().enumerate() {
            if slide.slide_id.trim().is_empty() {
                slide.slide_id = (index + 1).to_string();
            }
            if slide.title.trim().is_empty() {
                slide.title = format!("Slide {}", slide.slide_id);
            }
        }
    }

    /// Render as Markdown for the terminal.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.unit_title);

        for slide in &self.slides {
            out.push_str(&format!("\n## {}. {}\n", slide.slide_id, slide.title));
            if !slide.overview.is_empty() {
                out.push_str(&format!("\n{}\n", slide.overview.join(" ")));
            }
            push_list(&mut out, "Key Concepts", &slide.key_concepts);
            if !slide.definitions.is_empty() {
                out.push_str("\n### Definitions\n");
                for d in &slide.definitions {
                    out.push_str(&format!("- **{}**: {}\n", d.term, d.def));
                }
            }
            if !slide.steps.is_empty() {
                out.push_str("\n### Steps\n");
                for (i, step) in slide.steps.iter().enumerate() {
                    out.push_str(&format!("{}. {}\n", i + 1, step));
                }
            }
            if let Some(example) = &slide.example {
                out.push_str("\n### Example\n");
                out.push_str(&format!("- **Problem**: {}\n", example.problem));
                out.push_str(&format!("- **Method**: {}\n", example.method));
                out.push_str(&format!("- **Result**: {}\n", example.result));
            }
            push_list(&mut out, "Reminders", &slide.reminders);
            push_list(&mut out, "Checklist", &slide.checklist);
            if !slide.mcqs.is_empty() {
                out.push_str("\n### Practice Questions\n");
                for mcq in &slide.mcqs {
                    out.push_str(&format!("- {}\n", mcq.stem));
                    for option in &mcq.options {
                        out.push_str(&format!("  - {}\n", option));
                    }
                    if let Some(answer) = &mcq.answer {
                        out.push_str(&format!("  - **Answer {}**: {}\n", answer.letter, answer.rationale));
                    }
                }
            }
        }

        out.trim_end().to_string()
    }
}

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("\n### {}\n", heading));
    for item in items {
        out.push_str(&format!("- {}\n", item));
    }
}

/// Remove a surrounding ```json ... ``` or ``` ... ``` fence.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

fn validated(mut summary: LectureSummary, raw: &str) -> Result<LectureSummary, LectureError> {
    if summary.unit_title.trim().is_empty() {
        return Err(LectureError::MissingStructure(preview(raw)));
    }
    summary.fill_gaps();
    Ok(summary)
}

/// Parse a model reply into [`LectureSummary`].
pub fn parse_lecture(text: &str) -> Result<LectureSummary, LectureError> {
    let cleaned = strip_code_fences(text);

    let first_error = match serde_json::from_str::<LectureSummary>(cleaned) {
        Ok(summary) => return validated(summary, text),
        Err(e) => e,
    };
    debug!(error = %first_error, "lecture reply is not bare JSON, looking for an object");

    // Outermost braces, for replies with prose around the object
    let object = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => {
            return Err(LectureError::Parse {
                message: first_error.to_string(),
                preview: preview(text),
            })
        }
    };

    match serde_json::from_str::<LectureSummary>(object) {
        Ok(summary) => validated(summary, text),
        Err(e) => Err(LectureError::Parse {
            message: e.to_string(),
            preview: preview(text),
        }),
    }
}

/// Prompt asking for the slide-by-slide JSON structure.
pub fn lecture_prompt(text: &str, context: &str) -> String {
    format!(
        r#"You are Nibiru, the messenger AI that brings summarized knowledge from BCIT Learning Hub lectures.

Your task: Analyze the lecture content and extract structured information into a JSON format.

CONTEXT INFORMATION:
{context}

LECTURE CONTENT (may contain HTML from PDF viewer):
{begin}
{text}
{end}

INSTRUCTIONS:
1. Extract the main unit/topic title from the content
2. Identify distinct slides/sections in the lecture
3. For each slide, extract:
   - Slide title (if present) or infer from content
   - Overview: 1-2 sentences summarizing the slide
   - Key concepts: important points covered
   - Definitions: terms and their definitions (if any)
   - Steps/Processes: step-by-step procedures or algorithms (if any)
   - Examples: worked examples with problem, method, and result (if any)
   - Reminders: important warnings or pitfalls (if any)
   - Checklist: "I can..." statements indicating learning objectives (if any)
   - MCQs: multiple choice questions (if any)

4. Structure the content as follows:
   - Break the lecture into logical slides/sections based on topic changes
   - If the content doesn't have clear slide breaks, create logical sections
   - Slide IDs should be sequential strings: "1", "2", "3", etc.
   - Only include fields that have actual content (don't create empty arrays/objects)
   - For definitions, use objects with "term" and "def" keys
   - For examples, use objects with "problem", "method", and "result" keys
   - For MCQs, include stem, options (array of strings like "A) ...", "B) ..."), and answer with "letter" and "rationale"

OUTPUT FORMAT (return ONLY valid JSON, no markdown formatting, no code blocks):
{{
  "unit_title": "string",
  "slides": [
    {{
      "slide_id": "1",
      "title": "string",
      "overview": ["sentence 1", "sentence 2"],
      "key_concepts": ["concept 1", "concept 2"],
      "definitions": [{{"term": "term1", "def": "definition1"}}],
      "steps": ["Step 1: ...", "Step 2: ..."],
      "example": {{"problem": "...", "method": "...", "result": "..."}},
      "reminders": ["reminder 1", "reminder 2"],
      "checklist": ["I can ...", "I can ..."],
      "mcqs": [
        {{
          "stem": "Question text?",
          "options": ["A) option1", "B) option2", "C) option3", "D) option4"],
          "answer": {{"letter": "C", "rationale": "Explanation of why C is correct"}}
        }}
      ]
    }}
  ]
}}

IMPORTANT RULES:
- Return ONLY the JSON object, no markdown code blocks, no explanations
- If a field has no content, omit it (don't include empty arrays or empty objects)
- Extract actual content from the lecture - do not invent or fabricate information
- If you cannot identify clear slides, create 1-3 logical sections based on major topics
- Make sure all strings are properly escaped for JSON
- The JSON must be valid and parseable

Now analyze the lecture and return the JSON structure:"#,
        context = context,
        begin = BEGIN_LECTURE,
        text = text,
        end = END_LECTURE,
    )
    .trim()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARRAYS: &str = r#"{
        "unit_title": "Arrays and Loops",
        "slides": [
            {"slide_id": "1", "title": "Introduction to Arrays",
             "overview": ["Arrays hold elements of one type."],
             "definitions": [{"term": "Array", "def": "A contiguous block of values"}]},
            {"overview": "Iterating with a for loop.",
             "steps": ["Initialise the index", "Check the bound", "Increment"]}
        ]
    }"#;

    #[test]
    fn bare_json_parses_and_fills_gaps() {
        let lecture = parse_lecture(ARRAYS).unwrap();
        assert_eq!(lecture.unit_title, "Arrays and Loops");
        assert_eq!(lecture.slides.len(), 2);
        assert_eq!(lecture.slides[0].title, "Introduction to Arrays");
        assert_eq!(lecture.slides[1].slide_id, "2");
        assert_eq!(lecture.slides[1].title, "Slide 2");
        assert_eq!(lecture.slides[1].overview, vec!["Iterating with a for loop."]);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let fenced = format!("```json\n{}\n```", ARRAYS);
        assert_eq!(parse_lecture(&fenced).unwrap(), parse_lecture(ARRAYS).unwrap());

        let bare_fence = format!("```\n{}\n```", ARRAYS);
        assert_eq!(parse_lecture(&bare_fence).unwrap().slides.len(), 2);
    }

    #[test]
    fn object_is_pulled_out_of_prose() {
        let chatty = format!("Here is the structure you asked for:\n{}\nLet me know!", ARRAYS);
        assert_eq!(parse_lecture(&chatty).unwrap().unit_title, "Arrays and Loops");
    }

    #[test]
    fn numeric_slide_ids_are_accepted() {
        let lecture = parse_lecture(r#"{"unit_title": "T", "slides": [{"slide_id": 7}]}"#).unwrap();
        assert_eq!(lecture.slides[0].slide_id, "7");
        assert_eq!(lecture.slides[0].title, "Slide 7");
    }

    #[test]
    fn missing_title_or_slides_is_rejected() {
        let err = parse_lecture(r#"{"unit_title": "", "slides": []}"#).unwrap_err();
        assert!(matches!(err, LectureError::MissingStructure(_)));

        let err = parse_lecture(r#"{"unit_title": "Week 4"}"#).unwrap_err();
        assert!(matches!(err, LectureError::Parse { .. }));
    }

    #[test]
    fn unparseable_reply_carries_a_preview() {
        let reply = "Sorry, I cannot help with that.";
        let err = parse_lecture(reply).unwrap_err();
        assert!(err.to_string().contains("Response preview: Sorry, I cannot help"));
    }

    #[test]
    fn prompt_fences_the_lecture_text() {
        let prompt = lecture_prompt("Slide 1: Arrays", "COMP 1510 > Week 5");
        assert!(prompt.contains(&format!("{}\nSlide 1: Arrays\n{}", BEGIN_LECTURE, END_LECTURE)));
        assert!(prompt.contains("CONTEXT INFORMATION:\nCOMP 1510 > Week 5"));
        assert!(prompt.contains(r#""unit_title": "string""#));
    }

    #[test]
    fn markdown_lists_only_present_sections() {
        let markdown = parse_lecture(ARRAYS).unwrap().to_markdown();
        assert!(markdown.starts_with("# Arrays and Loops"));
        assert!(markdown.contains("## 1. Introduction to Arrays"));
        assert!(markdown.contains("- **Array**: A contiguous block of values"));
        assert!(markdown.contains("### Steps\n1. Initialise the index"));
        assert!(!markdown.contains("### Reminders"));
    }

    #[test]
    fn empty_sections_are_not_serialised() {
        let lecture = parse_lecture(ARRAYS).unwrap();
        let value = serde_json::to_value(&lecture).unwrap();
        assert!(value["slides"][0].get("steps").is_none());
        assert_eq!(value["slides"][1]["slide_id"], "2");
    }
}
