use research_lib::{Job, JobStatus, StatusTone};

fn panel_title(tone: StatusTone) -> &'static str {
    match tone {
        StatusTone::Informational => "queued",
        StatusTone::InProgress => "in progress",
        StatusTone::Success => "research completed",
        StatusTone::Error => "error",
    }
}

/// two lines per job: status header, then the panel for its state
pub fn render_job(job: &Job) -> String {
    let body = match &job.status {
        JobStatus::Pending => "your research query will start processing shortly",
        JobStatus::Running => "processing your research query...",
        JobStatus::Completed { output } => output.as_str(),
        JobStatus::Failed { error_message } => error_message.as_str(),
    };
    format!(
        "[{}] #{} {}\n    {}: {}",
        job.status.label(),
        job.id,
        job.query,
        panel_title(job.status.tone()),
        body
    )
}

pub fn render_list(jobs: &[Job]) -> String {
    if jobs.is_empty() {
        return "ready to start your research, enter a query to begin".to_string();
    }
    let noun = if jobs.len() == 1 { "query" } else { "queries" };
    let mut lines = vec![format!("{} {}", jobs.len(), noun)];
    lines.extend(jobs.iter().map(render_job));
    lines.join("\n")
}

#[cfg(test)]
mod test {
    use research_lib::{Job, JobId, JobStatus};

    use super::{render_job, render_list};

    #[test]
    fn test_render_states() {
        let mut job = Job::new(JobId::new(4), "solar");
        assert_eq!(
            "[PENDING] #4 solar\n    queued: your research query will start processing shortly",
            render_job(&job)
        );
        job.status = JobStatus::Running;
        assert_eq!(
            "[RUNNING] #4 solar\n    in progress: processing your research query...",
            render_job(&job)
        );
        job.status = JobStatus::Completed {
            output: "report-1".to_string(),
        };
        assert_eq!(
            "[COMPLETED] #4 solar\n    research completed: report-1",
            render_job(&job)
        );
        job.status = JobStatus::Failed {
            error_message: "timeout".to_string(),
        };
        assert_eq!("[FAILED] #4 solar\n    error: timeout", render_job(&job));
    }

    #[test]
    fn test_render_list() {
        assert!(render_list(&[]).starts_with("ready to start"));
        let jobs = vec![Job::new(JobId::new(1), "b"), Job::new(JobId::new(0), "a")];
        let rendered = render_list(&jobs);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!("2 queries", lines[0]);
        assert_eq!("[PENDING] #1 b", lines[1]);
        assert_eq!("[PENDING] #0 a", lines[3]);
        assert!(render_list(&jobs[..1]).starts_with("1 query\n"));
    }
}
