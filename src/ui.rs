//! Interface de terminal do batchsync: spinner e resumo colorido.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`RunProgress`] acompanha visualmente a espera
//! pelo término dos jobs.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use batchsync::provision::ProvisionedResources;
use batchsync::{Job, JobState, TerminationSummary};

/// Indicador visual enquanto os jobs são acompanhados.
pub struct RunProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para jobs ainda em andamento.
    yellow: Style,
}

impl RunProgress {
    /// Inicia o spinner.
    pub fn start() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("waiting for jobs");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner com as contagens atuais.
    pub fn update(&self, summary: &TerminationSummary) {
        self.pb.set_message(format!(
            "{}/{} terminal ({} running, {} queued, {} unknown)",
            summary.terminal(),
            summary.total,
            summary.running,
            summary.submitted,
            summary.unknown
        ));
    }

    /// Finaliza o spinner e imprime uma linha por job.
    pub fn finish(&self, jobs: &[Job]) {
        self.pb.finish_and_clear();
        for job in jobs {
            let (mark, style) = match job.state {
                JobState::Succeeded => ("✓", &self.green),
                JobState::Failed => ("✗", &self.red),
                _ => ("…", &self.yellow),
            };
            let remote = job.remote_id.as_deref().unwrap_or("-");
            let mut line = format!("  {} {} [{remote}] {}", style.apply_to(mark), job.name, job.state);
            if let Some(reason) = &job.failure_reason {
                line.push_str(&format!(": {reason}"));
            }
            println!("{line}");
        }
        let summary = TerminationSummary::from_jobs(jobs);
        let style = if summary.all_succeeded() {
            &self.green
        } else {
            &self.red
        };
        println!(
            "{}",
            style.apply_to(format!(
                "{} jobs: {} succeeded, {} failed",
                summary.total, summary.succeeded, summary.failed
            ))
        );
    }
}

/// Imprime os recursos provisionados.
pub fn print_resources(resources: &ProvisionedResources) {
    let bold = Style::new().bold();
    println!("{}", bold.apply_to("─── Resources ───"));
    for handle in [
        &resources.compute_environment,
        &resources.job_queue,
        &resources.job_definition,
    ] {
        println!("  {:<20} {}", handle.kind.to_string(), handle.arn);
    }
}
