//! Prompt rendering.
//!
//! Templates are Jinja, rendered with `minijinja`. The context holds
//! `resume_text`, `job_posting_text` and `candidate_preferences`; the last is
//! `none` when no preferences were given. Unknown variables render as empty
//! text.

use std::fs;
use std::path::{Path, PathBuf};

use minijinja::{Environment, context};
use thiserror::Error;

use jobwatch_core::JobPosting;

const DEFAULT_TEMPLATE: &str = r#"You are an experienced technical recruiter. Compare the candidate's resume with the job posting and answer ONLY with a JSON object of this shape:

{
  "analysis": {
    "role_requirements": "<the key requirements of the role>",
    "role_summary": "<two or three sentence summary of the role>"
  },
  "overall_match": {
    "rating": "<one of UNLIKELY, MARGINAL, COMPETITIVE, STRONG, EXCELLENT>",
    "score": <0-100>,
    "summary": "<why the candidate does or does not fit>"
  }
}

## Resume
{{ resume_text }}

## Candidate preferences
{% if candidate_preferences %}{{ candidate_preferences }}{% else %}None stated.{% endif %}

## Job posting
{{ job_posting_text }}
"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read {what} at {path}: {source}")]
    Read {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid prompt template: {0}")]
    Template(#[from] minijinja::Error),
}

/// Renders analyzer prompts from a template, the candidate profile and a
/// posting. All files are read once, at construction.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
    resume: String,
    preferences: Option<String>,
}

impl PromptBuilder {
    pub fn new(resume: impl Into<String>) -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            resume: resume.into(),
            preferences: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_preferences(mut self, preferences: impl Into<String>) -> Self {
        let preferences = preferences.into();
        let trimmed = preferences.trim();
        self.preferences = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Load the resume and the optional preference / template files. A
    /// template that does not parse is rejected here, not at render time.
    pub fn from_files(
        resume_path: &Path,
        preferences_path: Option<&Path>,
        template_path: Option<&Path>,
    ) -> Result<Self, PromptError> {
        let mut builder = Self::new(read("resume", resume_path)?);
        if let Some(path) = preferences_path {
            builder = builder.with_preferences(read("candidate preferences", path)?);
        }
        if let Some(path) = template_path {
            builder = builder.with_template(read("prompt template", path)?);
        }
        builder.check()?;
        Ok(builder)
    }

    /// Parse the template without rendering it.
    pub fn check(&self) -> Result<(), PromptError> {
        Environment::new().template_from_str(&self.template)?;
        Ok(())
    }

    /// Render the prompt for `posting`.
    pub fn render(&self, posting: &JobPosting) -> Result<String, PromptError> {
        let env = Environment::new();
        let prompt = env.render_str(
            &self.template,
            context! {
                resume_text => self.resume.as_str(),
                job_posting_text => job_text(posting),
                candidate_preferences => self.preferences.as_deref(),
            },
        )?;
        Ok(prompt)
    }
}

fn read(what: &'static str, path: &Path) -> Result<String, PromptError> {
    fs::read_to_string(path).map_err(|source| PromptError::Read {
        what,
        path: path.to_path_buf(),
        source,
    })
}

fn job_text(posting: &JobPosting) -> String {
    let mut out = String::new();
    for (name, value) in posting.fields() {
        if name == "description" {
            continue;
        }
        out.push_str(&name);
        out.push_str(": ");
        out.push_str(&value);
        out.push('\n');
    }
    if let Some(description) = &posting.description {
        out.push('\n');
        out.push_str(description);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwatch_core::JobUrl;
    use std::io::Write;

    fn posting() -> JobPosting {
        let mut p = JobPosting::new(
            JobUrl::parse("https://jobs.example.com/7").unwrap(),
            "Data Engineer",
            "Acme",
        );
        p.description = Some("Build pipelines.".to_string());
        p
    }

    #[test]
    fn render_includes_resume_posting_and_preferences() {
        let builder = PromptBuilder::new("Ten years of Rust.")
            .with_template("R={{resume_text}}\nP={{candidate_preferences}}\nJ={{job_posting_text}}")
            .with_preferences("  Remote only \n");
        let prompt = builder.render(&posting()).unwrap();

        assert!(prompt.contains("R=Ten years of Rust."));
        assert!(prompt.contains("P=Remote only\n"));
        assert!(prompt.contains("title: Data Engineer"));
        assert!(prompt.contains("company: Acme"));
        assert!(prompt.trim_end().ends_with("Build pipelines."));
    }

    #[test]
    fn default_template_is_used_without_a_template_file() {
        let prompt = PromptBuilder::new("resume").render(&posting()).unwrap();
        assert!(prompt.contains("overall_match"));
        assert!(prompt.contains("None stated."));
    }

    #[test]
    fn from_files_reads_everything_once() {
        let dir = tempfile::tempdir().unwrap();
        let resume = dir.path().join("resume.md");
        let template = dir.path().join("prompt.txt");
        std::fs::File::create(&resume)
            .unwrap()
            .write_all(b"my resume")
            .unwrap();
        std::fs::write(&template, "{{resume_text}}").unwrap();

        let builder = PromptBuilder::from_files(&resume, None, Some(&template)).unwrap();
        assert_eq!(builder.render(&posting()).unwrap(), "my resume");
    }

    #[test]
    fn conditional_blocks_follow_whether_preferences_were_given() {
        let template = "{% if candidate_preferences %}Prefs: {{ candidate_preferences }}\n{% endif %}{{ resume_text }}";

        let without = PromptBuilder::new("RESUME").with_template(template);
        assert_eq!(without.render(&posting()).unwrap(), "RESUME");

        let with = without.with_preferences("Remote only");
        assert_eq!(with.render(&posting()).unwrap(), "Prefs: Remote only\nRESUME");
    }

    #[test]
    fn loops_over_template_values_render() {
        let builder = PromptBuilder::new("x")
            .with_template("{% for word in ['a', 'b'] %}{{ word }}{% endfor %}-{{ missing }}-");
        assert_eq!(builder.render(&posting()).unwrap(), "ab--");
    }

    #[test]
    fn unparsable_template_file_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let resume = dir.path().join("resume.md");
        let template = dir.path().join("prompt.j2");
        std::fs::write(&resume, "r").unwrap();
        std::fs::write(&template, "{% if resume_text %}unclosed").unwrap();

        let err = PromptBuilder::from_files(&resume, None, Some(&template)).unwrap_err();
        assert!(matches!(err, PromptError::Template(_)));
    }

    #[test]
    fn missing_resume_is_reported_with_its_path() {
        let err = PromptBuilder::from_files(Path::new("/nonexistent/resume.md"), None, None)
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/resume.md"));
    }
}
