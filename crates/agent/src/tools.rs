use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::ToolSpec;

const MAX_DOCUMENT_CHARS: usize = 8_000;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the `input` object accepted by `execute`.
    fn parameters(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Every tool the agent ships with. `read_document` is only registered
    /// when a documents directory is configured.
    pub fn with_builtin_tools(documents_dir: Option<PathBuf>) -> Self {
        let mut registry = Self::default();
        registry.register(CourseTips);
        registry.register(DeploymentChecklist);
        registry.register(SampleListings);
        registry.register(SampleHighlights);
        registry.register(Calculator);
        registry.register(CurrentTime);
        if let Some(root) = documents_dir {
            registry.register(ReadDocument::new(root));
        }
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|tool| tool.as_ref())
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<Value> {
        let tool = self.get(name).ok_or_else(|| anyhow!("unknown tool `{name}`"))?;
        tool.execute(input).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn string_arg<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing string argument `{key}`"))
}

fn number_arg(input: &Value, key: &str) -> Result<f64> {
    input.get(key).and_then(Value::as_f64).ok_or_else(|| anyhow!("missing number argument `{key}`"))
}

fn single_string_schema(key: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": { key: { "type": "string", "description": description } },
        "required": [key],
    })
}

pub struct CourseTips;

#[async_trait]
impl Tool for CourseTips {
    fn name(&self) -> &'static str {
        "course_tips"
    }

    fn description(&self) -> &'static str {
        "Short tips for building Streamlit interfaces."
    }

    fn parameters(&self) -> Value {
        single_string_schema("question", "What the user wants to know about Streamlit")
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let question = string_arg(&input, "question")?.to_lowercase();
        let tip = if question.contains("deploy") {
            "Push to GitHub, then deploy on Streamlit Community Cloud with your main app file."
        } else if question.contains("state") {
            "Use st.session_state to remember chat history or cached data between reruns."
        } else {
            "Streamlit reruns your script from top to bottom. Keep UI simple and react to user inputs."
        };
        Ok(json!({ "tip": tip }))
    }
}

pub struct DeploymentChecklist;

#[async_trait]
impl Tool for DeploymentChecklist {
    fn name(&self) -> &'static str {
        "deployment_checklist"
    }

    fn description(&self) -> &'static str {
        "Outline the steps to expose an agent via an API."
    }

    fn parameters(&self) -> Value {
        single_string_schema("topic", "Deployment topic, for example fastapi or monitoring")
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let topic = string_arg(&input, "topic")?.to_lowercase();
        let steps = if topic.contains("fastapi") {
            "Create endpoints, test with /docs, add CORS for the UI, and deploy via Render or similar."
        } else if topic.contains("monitor") || topic.contains("langfuse") {
            "Capture traces per request, store inputs/outputs, review failures, then iterate on prompts/tools."
        } else {
            "General flow: build API locally, write a health check, containerize or deploy to Render, add monitoring."
        };
        Ok(json!({ "checklist": steps }))
    }
}

fn listings_for(destination: &str) -> Value {
    match destination.trim().to_lowercase().as_str() {
        "paris" => json!([
            {"name": "Left Bank Loft", "price": 180, "address": "5 Rue du Sabot", "distance_city_center_km": 1.2},
            {"name": "Montmartre Artist Studio", "price": 140, "address": "12 Rue Gabrielle", "distance_city_center_km": 2.4},
        ]),
        "tokyo" => json!([
            {"name": "Shinjuku Skyline Apartment", "price": 210, "address": "1-2-3 Nishishinjuku", "distance_city_center_km": 0.9},
            {"name": "Asakusa Riverside Flat", "price": 120, "address": "8-4-1 Asakusa", "distance_city_center_km": 3.1},
        ]),
        "lisbon" => json!([
            {"name": "Alfama View Loft", "price": 110, "address": "Rua de São Tomé 28", "distance_city_center_km": 0.8},
            {"name": "LX Factory Studio", "price": 130, "address": "Rua Rodrigues de Faria 103", "distance_city_center_km": 3.5},
        ]),
        _ => json!([]),
    }
}

fn highlights_for(destination: &str) -> Value {
    match destination.trim().to_lowercase().as_str() {
        "paris" => json!([
            {"name": "Louvre Museum", "neighborhood": "1st arrondissement", "open": "09:00-18:00", "tip": "Book timed tickets online."},
            {"name": "Eiffel Tower", "neighborhood": "7th arrondissement", "open": "09:30-23:45", "tip": "Sunset slots give great views."},
        ]),
        "tokyo" => json!([
            {"name": "Senso-ji Temple", "neighborhood": "Asakusa", "open": "Always open", "tip": "Arrive before 9 AM to beat crowds."},
            {"name": "TeamLab Planets", "neighborhood": "Toyosu", "open": "09:00-21:00", "tip": "Wear shorts, part of the exhibit is ankle deep in water."},
        ]),
        "lisbon" => json!([
            {"name": "Belém Tower", "neighborhood": "Belém", "open": "10:00-18:30", "tip": "Combine with a visit to the Discoveries Monument."},
            {"name": "Tram 28 Ride", "neighborhood": "Graca to Baixa", "open": "06:00-22:30", "tip": "Start early to secure a seat."},
        ]),
        _ => json!([]),
    }
}

pub struct SampleListings;

#[async_trait]
impl Tool for SampleListings {
    fn name(&self) -> &'static str {
        "sample_listings"
    }

    fn description(&self) -> &'static str {
        "Sample accommodation listings with nightly price for a destination."
    }

    fn parameters(&self) -> Value {
        single_string_schema("destination", "City name, for example Paris")
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let destination = string_arg(&input, "destination")?;
        Ok(json!({ "destination": destination, "listings": listings_for(destination) }))
    }
}

pub struct SampleHighlights;

#[async_trait]
impl Tool for SampleHighlights {
    fn name(&self) -> &'static str {
        "sample_highlights"
    }

    fn description(&self) -> &'static str {
        "Popular attractions with opening hours and a visitor tip for a destination."
    }

    fn parameters(&self) -> Value {
        single_string_schema("destination", "City name, for example Lisbon")
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let destination = string_arg(&input, "destination")?;
        Ok(json!({ "destination": destination, "highlights": highlights_for(destination) }))
    }
}

pub struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &'static str {
        "calculator"
    }

    fn description(&self) -> &'static str {
        "Basic arithmetic on two numbers, useful for budget splits."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": { "type": "string", "enum": ["add", "subtract", "multiply", "divide"] },
                "a": { "type": "number" },
                "b": { "type": "number" },
            },
            "required": ["operation", "a", "b"],
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let operation = string_arg(&input, "operation")?;
        let a = number_arg(&input, "a")?;
        let b = number_arg(&input, "b")?;

        let result = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    bail!("division by zero");
                }
                a / b
            }
            other => bail!("unsupported operation `{other}`"),
        };
        Ok(json!({ "result": result }))
    }
}

pub struct CurrentTime;

#[async_trait]
impl Tool for CurrentTime {
    fn name(&self) -> &'static str {
        "current_time"
    }

    fn description(&self) -> &'static str {
        "Current UTC date and time."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        let now = chrono::Utc::now();
        Ok(json!({ "utc": now.to_rfc3339(), "date": now.format("%Y-%m-%d").to_string() }))
    }
}

/// Reads text files from one directory. Names may not leave it.
pub struct ReadDocument {
    root: PathBuf,
}

impl ReadDocument {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolves symlinks before the containment check so links cannot point
    /// outside the documents directory.
    async fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name.trim());
        let is_plain = relative.components().count() > 0
            && relative.components().all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            bail!("document name `{name}` must be a file inside the documents directory");
        }

        let root = tokio::fs::canonicalize(&self.root)
            .await
            .context("documents directory is not accessible")?;
        let path = tokio::fs::canonicalize(root.join(relative))
            .await
            .with_context(|| format!("failed to read document `{name}`"))?;
        if !path.starts_with(&root) {
            bail!("document name `{name}` must be a file inside the documents directory");
        }
        Ok(path)
    }
}

#[async_trait]
impl Tool for ReadDocument {
    fn name(&self) -> &'static str {
        "read_document"
    }

    fn description(&self) -> &'static str {
        "Read a course document by file name."
    }

    fn parameters(&self) -> Value {
        single_string_schema(
            "name",
            "File name inside the documents directory, for example notes.md",
        )
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let name = string_arg(&input, "name")?;
        let path = self.resolve(name).await?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read document `{name}`"))?;

        let truncated = content.chars().count() > MAX_DOCUMENT_CHARS;
        let content: String = content.chars().take(MAX_DOCUMENT_CHARS).collect();
        Ok(json!({ "name": name, "content": content, "truncated": truncated }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ToolRegistry;

    #[tokio::test]
    async fn builtin_registry_exposes_specs() {
        let registry = ToolRegistry::with_builtin_tools(None);

        assert_eq!(registry.len(), 6);
        assert!(registry.get("read_document").is_none());
        let names: Vec<String> = registry.specs().into_iter().map(|spec| spec.name).collect();
        assert!(names.contains(&"course_tips".to_string()));
        assert!(names.contains(&"calculator".to_string()));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::with_builtin_tools(None);
        let error = registry.execute("teleport", json!({})).await.expect_err("unknown tool");
        assert!(error.to_string().contains("teleport"));
    }

    #[tokio::test]
    async fn course_tools_match_keywords() {
        let registry = ToolRegistry::with_builtin_tools(None);

        let tip = registry
            .execute("course_tips", json!({"question": "How do I keep STATE?"}))
            .await
            .expect("tip");
        assert!(tip["tip"].as_str().expect("string").contains("st.session_state"));

        let checklist = registry
            .execute("deployment_checklist", json!({"topic": "Langfuse"}))
            .await
            .expect("checklist");
        assert!(checklist["checklist"].as_str().expect("string").starts_with("Capture traces"));
    }

    #[tokio::test]
    async fn sample_data_is_case_insensitive() {
        let registry = ToolRegistry::with_builtin_tools(None);

        let listings = registry
            .execute("sample_listings", json!({"destination": " Lisbon "}))
            .await
            .expect("listings");
        assert_eq!(listings["listings"][0]["name"], "Alfama View Loft");

        let highlights = registry
            .execute("sample_highlights", json!({"destination": "Atlantis"}))
            .await
            .expect("highlights");
        assert_eq!(highlights["highlights"], json!([]));
    }

    #[tokio::test]
    async fn calculator_handles_operations_and_division_by_zero() {
        let registry = ToolRegistry::with_builtin_tools(None);

        let split = registry
            .execute("calculator", json!({"operation": "divide", "a": 1500, "b": 3}))
            .await
            .expect("division");
        assert_eq!(split["result"], json!(500.0));

        let error = registry
            .execute("calculator", json!({"operation": "divide", "a": 1, "b": 0}))
            .await
            .expect_err("division by zero");
        assert!(error.to_string().contains("division by zero"));
    }

    #[tokio::test]
    async fn read_document_is_confined_to_its_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("notes.md"), "Deploy the API first.").expect("write");
        let registry = ToolRegistry::with_builtin_tools(Some(dir.path().to_path_buf()));

        let document = registry
            .execute("read_document", json!({"name": "notes.md"}))
            .await
            .expect("document");
        assert_eq!(document["content"], "Deploy the API first.");
        assert_eq!(document["truncated"], false);

        for name in ["../secret.txt", "/etc/passwd", "", "nested/../../x"] {
            let result = registry.execute("read_document", json!({"name": name})).await;
            assert!(result.is_err(), "{name} should be rejected");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn read_document_rejects_symlinks_leaving_the_directory() {
        let outside = tempfile::tempdir().expect("outside tempdir");
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "do not share").expect("write");

        let dir = tempfile::tempdir().expect("tempdir");
        std::os::unix::fs::symlink(&secret, dir.path().join("link.md")).expect("symlink");
        std::fs::write(dir.path().join("inside.md"), "Course notes.").expect("write");
        std::os::unix::fs::symlink(dir.path().join("inside.md"), dir.path().join("alias.md"))
            .expect("symlink");
        let registry = ToolRegistry::with_builtin_tools(Some(dir.path().to_path_buf()));

        let error = registry
            .execute("read_document", json!({"name": "link.md"}))
            .await
            .expect_err("escaping symlink");
        assert!(error.to_string().contains("inside the documents directory"));

        let document = registry
            .execute("read_document", json!({"name": "alias.md"}))
            .await
            .expect("in-directory symlink");
        assert_eq!(document["content"], "Course notes.");
    }
}
