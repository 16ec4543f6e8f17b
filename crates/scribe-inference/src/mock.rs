//! Mock generation backend for deterministic testing.
//!
//! Responses are chosen by exact prompt mapping, then by substring rules, then
//! fall back to a default. Failures can be scripted by marker substring or
//! simulated with a random failure rate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scribe_inference::mock::MockGenerationBackend;
//! use scribe_core::GenerationBackend;
//!
//! #[tokio::test]
//! async fn test_with_mock_backend() {
//!     let backend = MockGenerationBackend::new()
//!         .with_fixed_response("Test response")
//!         .with_failure_on("Chunk 2/3");
//!
//!     assert_eq!(backend.generate("Chunk 1/3").await.unwrap(), "Test response");
//!     assert!(backend.generate("Chunk 2/3").await.is_err());
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use scribe_core::{Error, GenerationBackend, Result};

/// Mock generation backend for testing.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    model_name: String,
    fixed_responses: HashMap<String, String>,
    contains_responses: Vec<(String, String)>,
    failure_markers: Vec<String>,
    default_response: String,
    latency_ms: u64,
    failure_rate: f64,
    healthy: bool,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub system: String,
    pub input: String,
    pub timestamp: std::time::Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            model_name: "mock-model".to_string(),
            fixed_responses: HashMap::new(),
            contains_responses: Vec::new(),
            failure_markers: Vec::new(),
            default_response: "Mock response".to_string(),
            latency_ms: 0,
            failure_rate: 0.0,
            healthy: true,
        }
    }
}

impl MockGenerationBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the reported model name.
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model_name = name.into();
        self
    }

    /// Set a fixed response for generation requests.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Add a response mapping for an exact prompt.
    pub fn with_response_mapping(
        mut self,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_responses
            .insert(input.into(), output.into());
        self
    }

    /// Respond with `output` when the system prompt or prompt contains `marker`.
    ///
    /// Rules are checked in insertion order.
    pub fn with_response_containing(
        mut self,
        marker: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .contains_responses
            .push((marker.into(), output.into()));
        self
    }

    /// Fail any call whose system prompt or prompt contains `marker`.
    pub fn with_failure_on(mut self, marker: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .failure_markers
            .push(marker.into());
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the result reported by `health_check`.
    pub fn with_healthy(mut self, healthy: bool) -> Self {
        Arc::make_mut(&mut self.config).healthy = healthy;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.log().clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.log().clear()
    }

    /// Get number of generation calls.
    pub fn generate_call_count(&self) -> usize {
        self.log()
            .iter()
            .filter(|c| c.operation == "generate")
            .count()
    }

    /// Prompts of every generation call, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.log().iter().map(|c| c.input.clone()).collect()
    }

    fn log(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.call_log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log_call(&self, operation: &str, system: &str, input: &str) {
        self.log().push(MockCall {
            operation: operation.to_string(),
            system: system.to_string(),
            input: input.to_string(),
            timestamp: std::time::Instant::now(),
        });
    }

    fn should_fail(&self, system: &str, prompt: &str) -> bool {
        use rand::Rng;
        if self
            .config
            .failure_markers
            .iter()
            .any(|m| system.contains(m.as_str()) || prompt.contains(m.as_str()))
        {
            return true;
        }
        if self.config.failure_rate > 0.0 {
            rand::thread_rng().gen::<f64>() < self.config.failure_rate
        } else {
            false
        }
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    fn respond(&self, system: &str, prompt: &str) -> String {
        if let Some(response) = self.config.fixed_responses.get(prompt) {
            return response.clone();
        }
        self.config
            .contains_responses
            .iter()
            .find(|(marker, _)| system.contains(marker.as_str()) || prompt.contains(marker.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| self.config.default_response.clone())
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.log_call("generate", system, prompt);
        self.simulate_latency().await;

        if self.should_fail(system, prompt) {
            return Err(Error::Inference(
                "Simulated failure for testing".to_string(),
            ));
        }

        Ok(self.respond(system, prompt))
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_generate() {
        let backend = MockGenerationBackend::new().with_fixed_response("Custom response");

        let response = backend.generate("test prompt").await.unwrap();
        assert_eq!(response, "Custom response");
    }

    #[tokio::test]
    async fn test_mock_backend_response_mapping() {
        let backend = MockGenerationBackend::new()
            .with_response_mapping("hello", "world")
            .with_response_mapping("foo", "bar");

        assert_eq!(backend.generate("hello").await.unwrap(), "world");
        assert_eq!(backend.generate("foo").await.unwrap(), "bar");
        assert_eq!(backend.generate("other").await.unwrap(), "Mock response");
    }

    #[tokio::test]
    async fn test_mock_backend_contains_rules_in_order() {
        let backend = MockGenerationBackend::new()
            .with_response_containing("Chunk", "chunk summary")
            .with_response_containing("Chunk 2", "never reached");

        assert_eq!(
            backend.generate("Chunk 2 of 3").await.unwrap(),
            "chunk summary"
        );
    }

    #[tokio::test]
    async fn test_mock_backend_contains_matches_system_prompt() {
        let backend =
            MockGenerationBackend::new().with_response_containing("description", "short text");

        let response = backend
            .generate_with_system("Write a description", "summary")
            .await
            .unwrap();
        assert_eq!(response, "short text");
    }

    #[tokio::test]
    async fn test_mock_backend_failure_marker() {
        let backend = MockGenerationBackend::new().with_failure_on("POISON");

        assert!(backend.generate("fine").await.is_ok());
        let err = backend.generate("a POISON pill").await.unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[tokio::test]
    async fn test_mock_backend_call_logging() {
        let backend = MockGenerationBackend::new();

        backend.generate("one").await.unwrap();
        backend.generate_with_system("sys", "two").await.unwrap();

        assert_eq!(backend.generate_call_count(), 2);
        assert_eq!(backend.prompts(), vec!["one", "two"]);
        assert_eq!(backend.get_calls()[1].system, "sys");

        backend.clear_calls();
        assert_eq!(backend.generate_call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_backend_logs_failed_calls() {
        let backend = MockGenerationBackend::new().with_failure_rate(1.0);

        assert!(backend.generate("test").await.is_err());
        assert_eq!(backend.generate_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_backend_clones_share_log() {
        let backend = MockGenerationBackend::new();
        let clone = backend.clone();

        clone.generate("shared").await.unwrap();
        assert_eq!(backend.generate_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_backend_health() {
        assert!(MockGenerationBackend::new().health_check().await.unwrap());
        assert!(!MockGenerationBackend::new()
            .with_healthy(false)
            .health_check()
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_mock_backend_latency_simulation() {
        let backend = MockGenerationBackend::new().with_latency_ms(50);

        let start = std::time::Instant::now();
        backend.generate("test").await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed.as_millis() >= 50, "Should simulate latency");
    }
}
