//! Row personalizer: template + row → prompt → generated body.

use campaign_core::error::PersonalizationError;
use campaign_core::{Row, Template, TextGenerator};
use tracing::debug;

/// Render `template` against `row`, then ask `generator` for the final body.
///
/// An absent key fails with `MissingField`; a present but empty value is
/// substituted as-is. Generator errors surface as `GenerationFailed` and only
/// affect this row.
pub async fn personalize(
    template: &str,
    row: &Row,
    generator: &dyn TextGenerator,
) -> Result<String, PersonalizationError> {
    let prompt = Template::parse(template)
        .render(|key| row.get(key).map(String::as_str))
        .map_err(PersonalizationError::MissingField)?;

    debug!(
        provider = generator.name(),
        prompt_len = prompt.len(),
        "Generating message body"
    );

    let body = generator
        .generate(&prompt)
        .await
        .map_err(|e| PersonalizationError::GenerationFailed(e.to_string()))?;

    Ok(body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EchoGenerator;
    use async_trait::async_trait;
    use campaign_core::error::GenerationError;
    use std::sync::Mutex;

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Rejected {
                status: 429,
                body: "quota exceeded".into(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Records prompts and wraps them so the test can see what was sent.
    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(format!("  Generated: {prompt}\n"))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_renders_prompt_and_trims_generated_body() {
        let generator = RecordingGenerator::default();
        let row = row(&[("Name", "Ada"), ("Order", "1042"), ("Email", "ada@x")]);

        let body = personalize("Hi {Name}, your order {Order} shipped", &row, &generator)
            .await
            .unwrap();

        assert_eq!(body, "Generated: Hi Ada, your order 1042 shipped");
        assert_eq!(
            *generator.prompts.lock().unwrap(),
            vec!["Hi Ada, your order 1042 shipped".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_value_is_valid() {
        let row = row(&[("Name", ""), ("Email", "a@x")]);
        let body = personalize("Hello {Name}!", &row, &EchoGenerator).await.unwrap();
        assert_eq!(body, "Hello !");
    }

    #[tokio::test]
    async fn test_absent_key_is_missing_field() {
        let generator = RecordingGenerator::default();
        let row = row(&[("Email", "a@x")]);

        let err = personalize("Hi {Name}", &row, &generator).await.unwrap_err();

        assert_eq!(err, PersonalizationError::MissingField("Name".into()));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generator_error_is_generation_failed() {
        let row = row(&[("Name", "Ada")]);
        let err = personalize("Hi {Name}", &row, &FailingGenerator)
            .await
            .unwrap_err();

        match err {
            PersonalizationError::GenerationFailed(cause) => assert!(cause.contains("429")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
