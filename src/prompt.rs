//! Prompt templates sent to the LLM gateway.
//!
//! Rendering is pure string construction: a user request plus optional
//! uploaded file contents become one instruction block.

use serde::{Deserialize, Serialize};

/// Delimiter line placed before and after every uploaded file.
pub const FILE_DELIMITER: &str = "--------------------------------";

/// Line emitted when the request carries no uploaded files.
pub const NO_FILES_LINE: &str = "No files were uploaded. Generate code based solely on the prompt.";

const FILES_INTRO: &str =
    "The following files were uploaded to assist you. Use them to improve your generated code:";

/// What the generated code must target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDialect {
    /// Any language the request implies.
    #[default]
    Any,
    /// A single Python file using Kivy, buildable for Android with Buildozer.
    KivyAndroid,
}

/// A code generation request: the user prompt and optional reference files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub uploaded_files: Vec<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            uploaded_files: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.uploaded_files = files;
        self
    }
}

fn preamble(dialect: TargetDialect) -> &'static str {
    match dialect {
        TargetDialect::Any => {
            "You are an expert software developer. Write complete, working code for the request below."
        }
        TargetDialect::KivyAndroid => {
            "You are an expert Python developer who specializes in creating mobile applications for Android using Python and Kivy framework."
        }
    }
}

fn requirements(dialect: TargetDialect) -> &'static str {
    match dialect {
        TargetDialect::Any => {
            "IMPORTANT REQUIREMENTS:
- Return ONLY the generated code
- Include all necessary imports
- Ensure the code is complete and executable

Generate the complete code:"
        }
        TargetDialect::KivyAndroid => {
            "IMPORTANT REQUIREMENTS:
- Generate ONLY Python code (.py file)
- Use Kivy framework for mobile UI if needed
- Include all necessary imports
- Make the code compatible with Android compilation via Buildozer
- Include proper main() function and if __name__ == \"__main__\" block
- Add clear comments explaining the functionality
- Ensure the code is complete and executable
- Do NOT generate JavaScript, React, HTML, or any other language

Generate the complete Python code:"
        }
    }
}

/// Render the instruction block for `request` targeting `dialect`.
pub fn render(request: &GenerationRequest, dialect: TargetDialect) -> String {
    let mut out = String::new();
    out.push_str(preamble(dialect));
    out.push_str("\n\nUser Request: ");
    out.push_str(&request.prompt);
    out.push_str("\n\n");

    if request.uploaded_files.is_empty() {
        out.push_str(NO_FILES_LINE);
        out.push('\n');
    } else {
        out.push_str(FILES_INTRO);
        out.push('\n');
        for content in &request.uploaded_files {
            out.push_str(FILE_DELIMITER);
            out.push('\n');
            out.push_str(content);
            if !content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(FILE_DELIMITER);
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str(requirements(dialect));
    out
}

/// Wrap a bare user request into the mobile application brief used by the
/// Python generation route.
pub fn wrap_mobile_request(prompt: &str) -> String {
    format!(
        "Generate a complete Python application based on this request: \"{prompt}\"

Requirements:
- Create a complete Python (.py) file
- Use Kivy framework for mobile app development if UI is needed
- Include proper imports and dependencies
- Make it compatible with Android compilation using Buildozer
- Add proper main function and if __name__ == \"__main__\" block
- Include comments explaining the code
- Ensure the code is executable and mobile-friendly

Generate only Python code, no JavaScript or React components."
    )
}

/// The stricter instruction used for the single regeneration attempt after
/// the first answer contained web-framework code.
pub fn render_strict_retry(request: &GenerationRequest) -> String {
    let mut out = render(request, TargetDialect::KivyAndroid);
    out.push_str(
        "

CORRECTION: Your previous answer contained JavaScript, React or HTML. That output is unusable.
Respond with exactly one Python source file that uses Kivy for any user interface.
Do not include JSX, HTML tags, CSS, npm imports, or any prose outside Python comments.",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_files_line_when_empty() {
        let req = GenerationRequest::new("a todo list app");
        for dialect in [TargetDialect::Any, TargetDialect::KivyAndroid] {
            let rendered = render(&req, dialect);
            assert!(rendered.contains(NO_FILES_LINE));
            assert!(rendered.contains("User Request: a todo list app"));
            assert!(!rendered.contains(FILE_DELIMITER));
        }
    }

    #[test]
    fn test_files_rendered_in_order_with_delimiters() {
        let req = GenerationRequest::new("refactor").with_files(vec![
            "first = 1".to_string(),
            "second = 2\n".to_string(),
            "third = 3".to_string(),
        ]);
        let rendered = render(&req, TargetDialect::Any);

        assert!(rendered.contains(FILES_INTRO));
        assert!(!rendered.contains(NO_FILES_LINE));

        let first = rendered.find("first = 1").unwrap();
        let second = rendered.find("second = 2").unwrap();
        let third = rendered.find("third = 3").unwrap();
        assert!(first < second && second < third);

        // Each file is preceded by its own delimiter line.
        for needle in ["first = 1", "second = 2", "third = 3"] {
            let at = rendered.find(needle).unwrap();
            let before = &rendered[..at];
            assert!(before.ends_with(&format!("{FILE_DELIMITER}\n")));
        }
        assert_eq!(rendered.matches(FILE_DELIMITER).count(), 6);
    }

    #[test]
    fn test_kivy_dialect_forbids_web_languages() {
        let rendered = render(&GenerationRequest::new("calculator"), TargetDialect::KivyAndroid);
        assert!(rendered.contains("Do NOT generate JavaScript, React, HTML"));
        assert!(rendered.contains("Buildozer"));
        assert!(rendered.ends_with("Generate the complete Python code:"));
    }

    #[test]
    fn test_any_dialect_requests_code_only() {
        let rendered = render(&GenerationRequest::new("fizzbuzz in rust"), TargetDialect::Any);
        assert!(rendered.contains("Return ONLY the generated code"));
        assert!(!rendered.contains("Kivy"));
    }

    #[test]
    fn test_wrap_mobile_request_quotes_prompt() {
        let wrapped = wrap_mobile_request("a tip calculator");
        assert!(wrapped.starts_with("Generate a complete Python application based on this request: \"a tip calculator\""));
        assert!(wrapped.contains("no JavaScript or React components"));
    }

    #[test]
    fn test_strict_retry_extends_kivy_prompt() {
        let req = GenerationRequest::new("weather app");
        let strict = render_strict_retry(&req);
        assert!(strict.starts_with(&render(&req, TargetDialect::KivyAndroid)));
        assert!(strict.contains("CORRECTION"));
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"prompt": "x", "uploadedFiles": ["a", "b"]}"#).unwrap();
        assert_eq!(req.uploaded_files, vec!["a", "b"]);
        let req: GenerationRequest = serde_json::from_str(r#"{"prompt": "x"}"#).unwrap();
        assert!(req.uploaded_files.is_empty());
    }
}
