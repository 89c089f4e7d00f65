use crate::cli::CheckArgs;
use crate::config::ScriptFile;
use crate::error::Result;
use mdscript::workflows::script::Command;
use tracing::info;

/// Parses the script, resolves the system and validates every name reference. Nothing is
/// executed.
pub fn run(args: CheckArgs) -> Result<()> {
    let file = ScriptFile::from_file(&args.script)?;
    let system = file.system(args.mode.as_deref())?;
    let script = file.to_script()?;
    script.validate()?;

    let count = |pred: fn(&Command) -> bool| script.commands.iter().filter(|c| pred(c)).count();
    let integrators = count(|c| matches!(c, Command::Integrator { .. }));
    let methods = count(|c| matches!(c, Command::Method { .. }));
    let forces = count(|c| matches!(c, Command::Force { .. }));

    info!("Script {} is valid", args.script.display());
    println!(
        "✓ {}: {} command(s) on {} particle type(s), {} backend",
        args.script.display(),
        script.commands.len(),
        system.particle_types.len(),
        system.exec_mode
    );
    println!(
        "  {integrators} integrator(s), {methods} method(s), {forces} force(s), {} run(s)",
        script.run_count()
    );
    Ok(())
}
