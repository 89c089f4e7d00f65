use crate::cli::RunArgs;
use crate::config::ScriptFile;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use mdscript::core::recording::Journal;
use mdscript::engine::backend::Backends;
use mdscript::engine::context::SimulationContext;
use mdscript::engine::progress::ProgressReporter;
use mdscript::workflows::{self, script::ScriptReport};
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    let file = ScriptFile::from_file(&args.script)?;
    let system = file.system(args.mode.as_deref())?;
    let script = file.to_script()?;

    info!("Building a recording engine for the {} backend", system.exec_mode);
    let journal = Journal::new();
    let mut ctx = SimulationContext::new(Backends::recording(&journal));
    ctx.initialize(system)?;

    let reporter = if args.no_progress {
        ProgressReporter::new()
    } else {
        ProgressReporter::with_callback(CliProgressHandler::new().get_callback())
    };

    println!("Executing {}...", args.script.display());
    let report = workflows::script::run(&mut ctx, &script, &reporter)?;

    if report.runs.iter().all(|run| run.is_skipped()) {
        warn!("The script finished without stepping any integrator.");
    }
    print!("{}", render_report(&report));
    Ok(())
}

pub fn render_report(report: &ScriptReport) -> String {
    let mut out = String::new();
    for (index, run) in report.runs.iter().enumerate() {
        let last_step = run.first_step.saturating_add(run.steps);
        out.push_str(&match (&run.integrator, &run.stepper) {
            (Some(name), Some(stepper)) => format!(
                "Run {}: {name} ({stepper}) steps {}..{last_step}\n",
                index + 1,
                run.first_step
            ),
            (Some(name), None) => format!(
                "Run {}: {name} steps {}..{last_step}\n",
                index + 1,
                run.first_step
            ),
            (None, _) => format!("Run {}: skipped (no integrator)\n", index + 1),
        });
        if run.is_skipped() {
            continue;
        }
        out.push_str(&format!("  methods: {}\n", list_or_none(&run.methods)));
        out.push_str(&format!("  forces:  {}\n", list_or_none(&run.forces)));
        if let Some(converged) = run.converged {
            let verdict = if converged { "yes" } else { "no" };
            out.push_str(&format!("  converged: {verdict}\n"));
        }
    }
    out.push_str(&format!(
        "✓ {} run(s), final timestep {}\n",
        report.runs.len(),
        report.final_timestep
    ));
    out
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use mdscript::engine::error::IntegrateError;
    use mdscript::workflows::script::RunReport;
    use once_cell::sync::Lazy;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    fn write_script(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn args(script: PathBuf) -> RunArgs {
        RunArgs {
            script,
            mode: None,
            no_progress: true,
        }
    }

    #[test]
    fn runs_a_script_end_to_end() {
        let path = write_script(
            "ok.toml",
            r#"
            [system]
            particle-types = ["A"]

            [[commands]]
            type = "integrator"
            name = "md"
            mode = "standard"
            dt = 0.005

            [[commands]]
            type = "method"
            name = "nve"
            method = "nve"
            group = "all"

            [[commands]]
            type = "run"
            steps = 10
            "#,
        );
        run(args(path)).unwrap();
    }

    #[test]
    fn minimizer_with_methods_surfaces_the_core_error() {
        let path = write_script(
            "fire.toml",
            r#"
            [system]
            particle-types = ["A"]

            [[commands]]
            type = "integrator"
            name = "relax"
            mode = "minimize-fire"
            dt = 0.01

            [[commands]]
            type = "method"
            name = "nve"
            method = "nve"
            group = "all"

            [[commands]]
            type = "run"
            steps = 10
            "#,
        );
        let result = run(args(path));
        assert!(matches!(
            result,
            Err(CliError::Integrate(IntegrateError::MethodNotSupported { .. }))
        ));
    }

    #[test]
    fn report_lists_registrations_per_run() {
        let report = ScriptReport {
            runs: vec![
                RunReport {
                    integrator: None,
                    stepper: None,
                    first_step: 0,
                    steps: 0,
                    methods: vec![],
                    forces: vec![],
                    converged: None,
                },
                RunReport {
                    integrator: Some("relax".to_string()),
                    stepper: Some("FIREEnergyMinimizer#0".to_string()),
                    first_step: 0,
                    steps: 20,
                    methods: vec![],
                    forces: vec!["lj".to_string()],
                    converged: Some(true),
                },
            ],
            final_timestep: 20,
        };

        let text = render_report(&report);
        assert!(text.contains("Run 1: skipped"));
        assert!(text.contains("Run 2: relax (FIREEnergyMinimizer#0) steps 0..20"));
        assert!(text.contains("methods: (none)"));
        assert!(text.contains("forces:  lj"));
        assert!(text.contains("converged: yes"));
        assert!(text.contains("2 run(s), final timestep 20"));
    }

    #[test]
    fn report_clamps_the_end_of_a_run_at_the_counter_limit() {
        let report = ScriptReport {
            runs: vec![RunReport {
                integrator: Some("md".to_string()),
                stepper: None,
                first_step: u64::MAX - 1,
                steps: 5,
                methods: vec!["nve".to_string()],
                forces: vec![],
                converged: None,
            }],
            final_timestep: u64::MAX,
        };

        let text = render_report(&report);
        assert!(text.contains(&format!("Run 1: md steps {}..{}", u64::MAX - 1, u64::MAX)));
    }
}
