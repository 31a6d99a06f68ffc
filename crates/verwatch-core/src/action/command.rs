use super::{Action, Invocation, RunGate};
use crate::error::{ActionError, ConfigErrors};
use async_trait::async_trait;
use tokio::process::Command;
use verwatch_filter::render;
use verwatch_status::ActionKey;

/// Local program run without a shell
///
/// Every argument is templated with `{{ service_id }}` and
/// `{{ version }}`. A non-zero exit is a failure.
#[derive(Debug)]
pub struct CommandAction {
    index: usize,
    argv: Vec<String>,
    gate: RunGate,
}

impl CommandAction {
    /// Create new command at position `index`
    #[must_use]
    pub fn new<I, S>(index: usize, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index,
            argv: argv.into_iter().map(Into::into).collect(),
            gate: RunGate::new(),
        }
    }

    /// Unrendered arguments
    #[inline]
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

#[async_trait]
impl Action for CommandAction {
    fn key(&self) -> ActionKey {
        ActionKey::Command(self.index)
    }

    fn gate(&self) -> &RunGate {
        &self.gate
    }

    fn fingerprint(&self) -> String {
        self.argv.join("\u{1f}")
    }

    fn check_values(&self, prefix: &str) -> ConfigErrors {
        let mut errs = ConfigErrors::new();
        if self.argv.first().map_or(true, |p| p.trim().is_empty()) {
            errs.push(format!("{prefix}[{}]", self.index), "<required> (program to run)");
        }
        errs
    }

    async fn run(&self, invocation: &Invocation<'_>) -> Result<(), ActionError> {
        let template = invocation.template();
        let rendered: Vec<String> = self.argv.iter().map(|a| render(a, &template)).collect();
        let (program, args) = rendered.split_first().ok_or(ActionError::EmptyCommand)?;

        tracing::info!(service = invocation.service_id, command = %rendered.join(" "), "executing");
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ActionError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            tracing::debug!(
                service = invocation.service_id,
                stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                "command finished"
            );
            return Ok(());
        }
        Err(ActionError::Exit {
            program: program.clone(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WatchContext;
    use verwatch_status::Status;

    fn invoke<'a>(status: &'a Status, ctx: &'a WatchContext) -> Invocation<'a> {
        Invocation {
            service_id: "svc",
            version: "1.2.3",
            status,
            ctx,
        }
    }

    #[test]
    fn key_and_fingerprint() {
        let cmd = CommandAction::new(2, ["echo", "{{ version }}"]);
        assert_eq!(cmd.key(), ActionKey::Command(2));
        assert_eq!(
            cmd.fingerprint(),
            CommandAction::new(0, ["echo", "{{ version }}"]).fingerprint()
        );
        assert_ne!(cmd.fingerprint(), CommandAction::new(2, ["echo"]).fingerprint());
    }

    #[test]
    fn check_values_empty_program() {
        let cmd = CommandAction::new(0, Vec::<String>::new());
        assert_eq!(cmd.check_values("service.a.command").issues().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_success_and_failure() {
        let status = Status::new("svc");
        let ctx = WatchContext::new().unwrap();

        let ok = CommandAction::new(0, ["sh", "-c", "test \"$0\" = 1.2.3", "{{ version }}"]);
        assert!(ok.run(&invoke(&status, &ctx)).await.is_ok());

        let bad = CommandAction::new(1, ["false"]);
        let err = bad.run(&invoke(&status, &ctx)).await.unwrap_err();
        assert!(matches!(err, ActionError::Exit { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn run_missing_program() {
        let status = Status::new("svc");
        let ctx = WatchContext::new().unwrap();
        let cmd = CommandAction::new(0, ["/nonexistent/verwatch-test-binary"]);
        assert!(matches!(
            cmd.run(&invoke(&status, &ctx)).await,
            Err(ActionError::Spawn { .. })
        ));
    }
}
