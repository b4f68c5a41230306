use std::future::Future;
use std::io::Write;
use std::time::Duration;

use crate::cli::Config;
use crate::error::HarnessError;
use crate::lsp;
use crate::lsp::stdio_transport::StdioTransport;
use crate::process::ServerProcess;
use crate::scenario::{self, RunSummary, ScenarioDriver};
use crate::session::Session;

pub async fn run(config: Config) -> anyhow::Result<RunSummary> {
    let scenarios = match &config.scenario_file {
        Some(path) => scenario::load_scenarios(path)?,
        None => scenario::default_scenarios(),
    };
    let options = config.driver_options()?;

    let (server, writer, reader) = ServerProcess::spawn(&config.server_command, &config.server_args)?;
    let stdio = StdioTransport::new(reader, writer);
    let lsp_client = lsp::LspClient::new(Box::new(stdio));

    let scenario_run = async move {
        let mut driver = ScenarioDriver::new(lsp_client, options, std::io::stdout());
        let mut session = Session::new();
        let result = driver.run(&mut session, &scenarios).await;
        tracing::info!(state = %session.state(), "scenario run finished");
        // dropping the driver closes the server's stdin
        finish_report(driver.into_output(), result)
    };

    let summary = run_then_terminate(server, config.exit_grace, scenario_run).await?;
    for report in &summary.reports {
        tracing::info!(
            scenario = %report.scenario,
            total = report.total,
            attempts = report.attempts,
            "scenario report"
        );
    }
    Ok(summary)
}

/// Flush the report. A run error wins over a flush error, which is only logged.
fn finish_report<W: Write, T>(
    mut out: W,
    result: Result<T, HarnessError>,
) -> Result<T, HarnessError> {
    let flushed = out.flush();
    match (result, flushed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(HarnessError::Report(e)),
        (Err(e), flushed) => {
            if let Err(flush_error) = flushed {
                tracing::warn!(error = %flush_error, "failed to flush report");
            }
            Err(e)
        }
    }
}

/// Run `body` on its own task, then terminate the server whatever the outcome
/// was. A panic in `body` is resumed only after the server has been waited for.
async fn run_then_terminate<T, F>(
    server: ServerProcess,
    grace: Duration,
    body: F,
) -> Result<T, HarnessError>
where
    F: Future<Output = Result<T, HarnessError>> + Send + 'static,
    T: Send + 'static,
{
    let joined = tokio::spawn(body).await;

    if let Err(e) = server.terminate(grace).await {
        tracing::error!("failed to stop language server: {}", e);
    }

    match joined {
        Ok(result) => result,
        Err(e) => match e.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            Err(e) => Err(HarnessError::Aborted(e.to_string())),
        },
    }
}
