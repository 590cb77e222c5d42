use std::{collections::HashMap, io::Write};

use anyhow::{anyhow, Result};
use research_lib::{Job, JobEvent, JobId, JobRunner, JobStatus, JobTicket};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::broadcast::error::RecvError,
};
use tracing::warn;

use crate::{
    http_pipeline::HttpPipeline,
    render::{render_job, render_list},
};

pub async fn health(pipeline: &HttpPipeline) -> String {
    match pipeline.health().await {
        Ok(health) => format!("{}: {}", health.status, health.message),
        Err(e) => format!("error executing request: {}", e),
    }
}

fn print_job<W: Write>(out: &mut W, job: &Job, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(job)?)?;
    } else {
        writeln!(out, "{}", render_job(job))?;
    }
    Ok(())
}

/// submit a single query and print every state it passes through
/// returns whether it completed
pub async fn query<W: Write>(runner: &JobRunner, text: &str, json: bool, out: &mut W) -> Result<bool> {
    let mut events = runner.store().subscribe();
    let ticket = match runner.submit(text).await {
        Ok(ticket) => ticket,
        Err(err) => {
            writeln!(out, "error: {}", err)?;
            return Ok(false);
        }
    };
    let id = ticket.id();
    let done = ticket.wait();
    tokio::pin!(done);

    let job = loop {
        tokio::select! {
            // drain queued transitions before looking at the final result
            biased;
            event = events.recv() => match event {
                Ok(event) if event.job.id == id => {
                    print_job(out, &event.job, json)?;
                    if event.job.is_terminal() {
                        break event.job;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("missed {} job updates", skipped),
                Err(RecvError::Closed) => {
                    let job = (&mut done).await.ok_or_else(|| anyhow!("job {} was abandoned", id))?;
                    print_job(out, &job, json)?;
                    break job;
                }
            },
            job = &mut done => {
                let job = job.ok_or_else(|| anyhow!("job {} was abandoned", id))?;
                print_job(out, &job, json)?;
                break job;
            }
        }
    };
    Ok(matches!(job.status, JobStatus::Completed { .. }))
}

/// Reads one query per line until EOF or `:quit`.
///
/// Without `serial` queries run side by side and each result is printed as soon as it is in,
/// with it every query is awaited before the next line is read.
/// `:list` prints all jobs, `:clear` resets the session.
pub async fn repl<R, W>(runner: &JobRunner, serial: bool, json: bool, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut events = runner.store().subscribe();
    // jobs submitted side by side that did not report back yet
    let mut tickets: HashMap<JobId, JobTicket> = HashMap::new();
    loop {
        tokio::select! {
            // finished jobs are printed before the next line is handled
            biased;
            event = events.recv(), if !tickets.is_empty() => match event {
                Ok(JobEvent { job }) if job.is_terminal() => {
                    if tickets.remove(&job.id).is_some() {
                        print_job(out, &job, json)?;
                    }
                }
                Ok(_) => {}
                // missed results are still collected from the tickets at the end
                Err(RecvError::Lagged(skipped)) => warn!("missed {} job updates", skipped),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };
                match line.trim() {
                    ":quit" => break,
                    ":list" => writeln!(out, "{}", render_list(&runner.store().list().await))?,
                    ":clear" => {
                        runner.store().clear().await;
                        // cleared jobs never report back
                        tickets.clear();
                        writeln!(out, "cleared")?;
                    }
                    _ => match runner.submit(&line).await {
                        Ok(ticket) if serial => {
                            if let Some(job) = ticket.wait().await {
                                print_job(out, &job, json)?;
                            }
                        }
                        Ok(ticket) => {
                            writeln!(out, "submitted #{}", ticket.id())?;
                            tickets.insert(ticket.id(), ticket);
                        }
                        Err(err) => writeln!(out, "error: {}", err)?,
                    },
                }
            }
        }
    }
    let mut remaining: Vec<JobTicket> = tickets.into_iter().map(|(_, ticket)| ticket).collect();
    remaining.sort_by_key(|ticket| ticket.id());
    for ticket in remaining {
        if let Some(job) = ticket.wait().await {
            print_job(out, &job, json)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use lazy_static::lazy_static;
    use research_lib::{JobRunner, JobStore, Pipeline, PipelineError, SimulatedPipeline};
    use tokio::{
        io::{AsyncWriteExt, BufReader},
        runtime::Runtime,
    };

    use super::{query, repl};

    lazy_static! {
        static ref RUNTIME: Runtime = Runtime::new().unwrap();
    }

    struct FailingPipeline;

    #[async_trait]
    impl Pipeline for FailingPipeline {
        async fn run(&self, _query: &str) -> Result<String, PipelineError> {
            Err(PipelineError::Failed("timeout".to_string()))
        }
    }

    fn simulated_runner() -> JobRunner {
        let pipeline = SimulatedPipeline::new().with_delay(Duration::from_millis(5));
        JobRunner::new(Arc::new(JobStore::new()), Arc::new(pipeline))
    }

    // testing all transitions of a query are printed in order
    #[test]
    fn test_query_prints_transitions() {
        let runner = simulated_runner();
        let mut out = Vec::new();
        let completed = RUNTIME
            .block_on(query(&runner, "solar", false, &mut out))
            .unwrap();
        assert!(completed);
        let out = String::from_utf8(out).unwrap();
        let headers: Vec<&str> = out.lines().filter(|l| l.starts_with('[')).collect();
        assert_eq!(
            vec!["[PENDING] #0 solar", "[RUNNING] #0 solar", "[COMPLETED] #0 solar"],
            headers
        );
        assert!(out.contains("Deep research completed for: \"solar\""));
    }

    // testing failed queries report false and show the reason
    #[test]
    fn test_query_failed() {
        let runner = JobRunner::new(Arc::new(JobStore::new()), Arc::new(FailingPipeline));
        let mut out = Vec::new();
        let completed = RUNTIME
            .block_on(query(&runner, "bad", true, &mut out))
            .unwrap();
        assert!(!completed);
        let out = String::from_utf8(out).unwrap();
        let last: serde_json::Value = serde_json::from_str(out.lines().last().unwrap()).unwrap();
        assert_eq!("failed", last["status"]);
        assert_eq!("timeout", last["error_message"]);
        assert!(last.get("output").is_none());
    }

    // testing blank query is reported without creating a job
    #[test]
    fn test_query_blank() {
        let runner = simulated_runner();
        let mut out = Vec::new();
        let completed = RUNTIME
            .block_on(query(&runner, "  ", false, &mut out))
            .unwrap();
        assert!(!completed);
        assert_eq!("error: please enter a query\n", String::from_utf8(out).unwrap());
        assert!(RUNTIME.block_on(runner.store().is_empty()));
    }

    // testing repl runs queries side by side and reports them all at the end
    #[test]
    fn test_repl_concurrent() {
        let runner = simulated_runner();
        let input: &[u8] = b"A\n\nB\n";
        let mut out = Vec::new();
        RUNTIME
            .block_on(repl(&runner, false, false, input, &mut out))
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        // results may show up between the submissions
        let notices: Vec<&str> = out
            .lines()
            .filter(|l| l.starts_with("submitted") || l.starts_with("error"))
            .collect();
        assert_eq!(
            vec!["submitted #0", "error: please enter a query", "submitted #1"],
            notices
        );
        assert!(out.contains("[COMPLETED] #0 A"));
        assert!(out.contains("[COMPLETED] #1 B"));
        let listed = RUNTIME.block_on(runner.store().list());
        assert_eq!(2, listed.len());
        assert_eq!("B", listed[0].query);
    }

    // testing results are printed as they come in, not only at the end of input
    #[test]
    fn test_repl_prints_results_early() {
        let runner = simulated_runner();
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut finished = runner.store().subscribe();
        let feed = async move {
            writer.write_all(b"A\n").await.unwrap();
            while !finished.recv().await.unwrap().job.is_terminal() {}
            writer.write_all(b":list\n").await.unwrap();
            // dropping the writer ends the input
        };
        let mut out = Vec::new();
        RUNTIME.block_on(async {
            let (result, ()) = tokio::join!(
                repl(&runner, false, false, BufReader::new(reader), &mut out),
                feed
            );
            result.unwrap();
        });
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!("submitted #0", lines[0]);
        assert_eq!("[COMPLETED] #0 A", lines[1]);
        assert_eq!("1 query", lines[3]);
        assert_eq!("[COMPLETED] #0 A", lines[4]);
        assert_eq!(6, lines.len());
    }

    // testing serial repl waits for every query and handles commands
    #[test]
    fn test_repl_serial() {
        let runner = simulated_runner();
        let input: &[u8] = b"A\n:list\n:clear\n:list\n:quit\nnever submitted\n";
        let mut out = Vec::new();
        RUNTIME
            .block_on(repl(&runner, true, false, input, &mut out))
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!("[COMPLETED] #0 A", lines[0]);
        assert_eq!("1 query", lines[2]);
        assert_eq!("[COMPLETED] #0 A", lines[3]);
        assert_eq!("cleared", lines[5]);
        assert!(lines[6].starts_with("ready to start"));
        assert_eq!(7, lines.len());
        assert!(RUNTIME.block_on(runner.store().is_empty()));
    }
}
