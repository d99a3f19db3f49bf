use crate::document::{Command, Phase};
use crate::error::SeedError;
use crate::sink::RecordSink;

/// Executes the commands of one phase, in document order.
///
/// Stops at the first failing command. Returns how many ran.
pub fn run_commands<S>(commands: &[Command], phase: Phase, sink: &mut S) -> Result<usize, SeedError>
where
    S: RecordSink + ?Sized,
{
    let mut executed = 0;
    for command in commands.iter().filter(|command| command.phase() == phase) {
        log::debug!("executing {phase:?} command: {}", command.text());
        sink.execute(command.text()).map_err(|err| SeedError::Command {
            command: command.text().to_string(),
            source: Box::new(err),
        })?;
        executed += 1;
    }
    Ok(executed)
}
