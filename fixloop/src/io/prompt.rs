//! Instruction builders for the three pipeline stages.
//!
//! The engine never inspects instruction content; these builders exist so
//! every stage hands the executor a deterministic, fully rendered text.

use std::path::Path;

use anyhow::Result;
use minijinja::{Environment, context};

const ANALYZE_TEMPLATE: &str = include_str!("prompts/analyze.md");
const GENERATE_TESTS_TEMPLATE: &str = include_str!("prompts/generate_tests.md");
const FIX_TEMPLATE: &str = include_str!("prompts/fix.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("analyze", ANALYZE_TEMPLATE)
            .expect("analyze template should be valid");
        env.add_template("generate_tests", GENERATE_TESTS_TEMPLATE)
            .expect("generate_tests template should be valid");
        env.add_template("fix", FIX_TEMPLATE)
            .expect("fix template should be valid");
        Self { env }
    }

    /// Stage 1: scope and analyze the reported problem.
    pub fn build_analyze(&self, project_root: &Path, description: &str) -> Result<String> {
        let template = self.env.get_template("analyze")?;
        let rendered = template.render(context! {
            project_root => project_root.display().to_string(),
            description => description,
        })?;
        Ok(rendered)
    }

    /// Stage 2: write failing tests from the stage-1 report.
    pub fn build_generate_tests(&self, analysis_path: &Path, tests_dir: &Path) -> Result<String> {
        let template = self.env.get_template("generate_tests")?;
        let rendered = template.render(context! {
            analysis_path => analysis_path.display().to_string(),
            tests_dir => tests_dir.display().to_string(),
        })?;
        Ok(rendered)
    }

    /// Stage 3: fix the code until the generated tests pass.
    pub fn build_fix(
        &self,
        tests_dir: &Path,
        analysis_path: &Path,
        tests_report_path: &Path,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<String> {
        let template = self.env.get_template("fix")?;
        let rendered = template.render(context! {
            tests_dir => tests_dir.display().to_string(),
            analysis_path => analysis_path.display().to_string(),
            tests_report_path => tests_report_path.display().to_string(),
            attempt => attempt,
            max_attempts => max_attempts,
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn analyze_includes_root_and_description() {
        let engine = PromptEngine::new();
        let rendered = engine
            .build_analyze(Path::new("/tmp/project"), "login panics on empty password")
            .expect("render");
        assert!(rendered.contains("Project root: /tmp/project"));
        assert!(rendered.contains("login panics on empty password"));
        assert!(rendered.contains("Do NOT modify any files"));
    }

    #[test]
    fn generate_tests_references_analysis_and_ends_with_sentinel_line() {
        let engine = PromptEngine::new();
        let rendered = engine
            .build_generate_tests(
                Path::new("/tmp/p/.pipeline_artifacts/item_ab/step1.md"),
                Path::new("/tmp/p/test_bugfix"),
            )
            .expect("render");
        assert!(rendered.contains("/tmp/p/.pipeline_artifacts/item_ab/step1.md"));
        assert!(rendered.contains("Write tests ONLY under: /tmp/p/test_bugfix"));
        assert!(rendered.trim_end().ends_with("RESULT: TESTS_WRITTEN"));
    }

    #[test]
    fn fix_carries_attempt_counters_and_both_reports() {
        let engine = PromptEngine::new();
        let rendered = engine
            .build_fix(
                &PathBuf::from("/tmp/p/test_bugfix"),
                &PathBuf::from("/tmp/p/.pipeline_artifacts/item_ab/step1.md"),
                &PathBuf::from("/tmp/p/.pipeline_artifacts/item_ab/step2.md"),
                2,
                3,
            )
            .expect("render");
        assert!(rendered.contains("step1.md"));
        assert!(rendered.contains("step2.md"));
        assert!(rendered.contains("Attempt 2 of 3."));
        assert!(rendered.contains("RESULT: PASS"));
        assert!(rendered.contains("RESULT: FAIL"));
    }
}
