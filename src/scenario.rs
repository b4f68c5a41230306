use crate::error::HarnessError;
use crate::lsp::types::{Outcome, Response};
use crate::lsp::LspClient;
use crate::session::{DocumentState, Session};

use anyhow::{bail, Context};
use lsp_types::{CompletionItem, CompletionResponse, Position, Url};
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

/// One completion probe: the whole document text and the cursor to complete at.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionScenario {
    pub name: String,
    pub text: String,
    pub line: u32,
    pub character: u32,
    /// Substring that at least one returned label should contain.
    #[serde(default)]
    pub expected_label: Option<String>,
}

impl CompletionScenario {
    pub fn position(&self) -> Position {
        Position::new(self.line, self.character)
    }
}

pub fn default_scenarios() -> Vec<CompletionScenario> {
    vec![
        CompletionScenario {
            name: "members of Массив".to_string(),
            text: "Процедура Тест()\n    МассивТест = Новый Массив;\n    МассивТест.\nКонецПроцедуры"
                .to_string(),
            line: 2,
            character: 15,
            expected_label: Some("Добавить".to_string()),
        },
        CompletionScenario {
            name: "global functions".to_string(),
            text: "Процедура Тест()\n    Сооб\nКонецПроцедуры".to_string(),
            line: 1,
            character: 8,
            expected_label: Some("Сообщить".to_string()),
        },
        CompletionScenario {
            name: "members of Справочники".to_string(),
            text: "Процедура Тест()\n    Справочники.\nКонецПроцедуры".to_string(),
            line: 1,
            character: 16,
            expected_label: None,
        },
    ]
}

/// Read scenarios from a JSON array of `{name, text, line, character, expected_label?}`.
pub fn load_scenarios(path: &Path) -> anyhow::Result<Vec<CompletionScenario>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file {}", path.display()))?;
    let scenarios: Vec<CompletionScenario> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse scenario file {}", path.display()))?;
    if scenarios.is_empty() {
        bail!("scenario file {} contains no scenarios", path.display());
    }
    Ok(scenarios)
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub document_uri: Url,
    pub language_id: String,
    pub root_uri: Option<Url>,
    /// Fixed wait after didOpen for the server to index the document.
    pub settle: Duration,
    pub max_items: usize,
    /// Completion requests per scenario while the expected label is missing.
    pub completion_attempts: u32,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    NotChecked,
    Met,
    Missed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShownItem {
    pub label: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub scenario: String,
    pub total: usize,
    pub shown: Vec<ShownItem>,
    pub expectation: Expectation,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct RunSummary {
    pub reports: Vec<CompletionReport>,
}

impl RunSummary {
    /// (met, checked)
    pub fn expectations(&self) -> (usize, usize) {
        let checked = self
            .reports
            .iter()
            .filter(|report| report.expectation != Expectation::NotChecked)
            .count();
        let met = self
            .reports
            .iter()
            .filter(|report| report.expectation == Expectation::Met)
            .count();
        (met, checked)
    }
}

fn completion_items(response: Response) -> Result<Vec<CompletionItem>, HarnessError> {
    let result = match response.outcome {
        Outcome::Result(result) => result,
        Outcome::Error(error) => {
            tracing::warn!(code = error.code, error = %error.message, "completion request failed");
            return Ok(Vec::new());
        }
    };
    if result.is_null() {
        return Ok(Vec::new());
    }

    let response: CompletionResponse =
        serde_json::from_value(result).map_err(|e| HarnessError::UnexpectedResult {
            method: "textDocument/completion".to_string(),
            reason: e.to_string(),
        })?;
    Ok(match response {
        CompletionResponse::Array(items) => items,
        CompletionResponse::List(list) => list.items,
    })
}

fn check_expectation(expected: Option<&str>, items: &[CompletionItem]) -> Expectation {
    match expected {
        None => Expectation::NotChecked,
        Some(needle) if items.iter().any(|item| item.label.contains(needle)) => Expectation::Met,
        Some(_) => Expectation::Missed,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Runs the fixed lifecycle around a list of completion scenarios and prints
/// what the server answered.
pub struct ScenarioDriver<W: Write> {
    client: LspClient,
    options: DriverOptions,
    out: W,
}

impl<W: Write> ScenarioDriver<W> {
    pub fn new(client: LspClient, options: DriverOptions, out: W) -> Self {
        ScenarioDriver {
            client,
            options,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub async fn run(
        &mut self,
        session: &mut Session,
        scenarios: &[CompletionScenario],
    ) -> Result<RunSummary, HarnessError> {
        session.begin_initialize()?;
        let initialize = self
            .client
            .initialize(self.options.root_uri.as_ref())
            .await?;
        writeln!(self.out, "Initialize response: {}", pretty(&initialize))?;
        session.mark_ready()?;
        self.client.initialized().await?;

        let mut reports = Vec::with_capacity(scenarios.len());
        for (index, scenario) in scenarios.iter().enumerate() {
            let document = if index == 0 {
                let document = session.open_document(DocumentState::open(
                    self.options.document_uri.clone(),
                    self.options.language_id.clone(),
                    scenario.text.clone(),
                ))?;
                self.client.did_open(document).await?;
                tracing::info!(
                    settle_ms = self.options.settle.as_millis() as u64,
                    "waiting for the server to settle"
                );
                sleep(self.options.settle).await;
                document
            } else {
                let document = session.change_document(&scenario.text)?;
                self.client.did_change(document).await?;
                document
            };
            let uri = document.uri.clone();

            writeln!(self.out, "\n=== Scenario {}: {} ===", index + 1, scenario.name)?;
            let report = self.run_completion(scenario, &uri).await?;
            self.print_report(scenario, &report)?;
            reports.push(report);
        }

        if let Some(document) = session.document() {
            tracing::debug!(version = document.version, "last document version sent");
        }
        session.begin_shutdown()?;
        let shutdown = self.client.shutdown().await?;
        writeln!(self.out, "\nShutdown response: {}", shutdown)?;
        self.client.exit().await?;
        session.close()?;

        let summary = RunSummary { reports };
        let (met, checked) = summary.expectations();
        if checked > 0 {
            writeln!(self.out, "Expectations met: {}/{}", met, checked)?;
        }
        Ok(summary)
    }

    async fn run_completion(
        &mut self,
        scenario: &CompletionScenario,
        uri: &Url,
    ) -> Result<CompletionReport, HarnessError> {
        let attempts = self.options.completion_attempts.max(1);
        let mut backoff = self.options.retry_backoff;
        let mut attempt = 1;

        loop {
            let response = self.client.completion(uri, scenario.position()).await?;
            let items = completion_items(response)?;
            let expectation = check_expectation(scenario.expected_label.as_deref(), &items);

            if expectation != Expectation::Missed || attempt >= attempts {
                let shown = items
                    .iter()
                    .take(self.options.max_items)
                    .map(|item| ShownItem {
                        label: item.label.clone(),
                        detail: item.detail.clone(),
                    })
                    .collect();
                return Ok(CompletionReport {
                    scenario: scenario.name.clone(),
                    total: items.len(),
                    shown,
                    expectation,
                    attempts: attempt,
                });
            }

            tracing::warn!(
                scenario = %scenario.name,
                attempt,
                attempts,
                "expected label missing, retrying completion"
            );
            sleep(backoff).await;
            backoff *= 2;
            attempt += 1;
        }
    }

    fn print_report(
        &mut self,
        scenario: &CompletionScenario,
        report: &CompletionReport,
    ) -> Result<(), HarnessError> {
        if report.total == 0 {
            writeln!(self.out, "no completions found")?;
        } else {
            writeln!(self.out, "Found {} completions:", report.total)?;
            for item in &report.shown {
                writeln!(
                    self.out,
                    "  - {}: {}",
                    item.label,
                    item.detail.as_deref().unwrap_or("")
                )?;
            }
        }

        if let Some(expected) = &scenario.expected_label {
            let verdict = match report.expectation {
                Expectation::Met => "found",
                _ => "missing",
            };
            writeln!(
                self.out,
                "Expected label containing {:?}: {}",
                expected, verdict
            )?;
        }
        Ok(())
    }
}
