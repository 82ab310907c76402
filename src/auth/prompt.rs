//! Keyboard-interactive prompt answering.

use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use crate::config::connection::PromptResponse;
use crate::error::SftpError;

/// Answers server prompts from the configured password and the
/// (prompt-substring, response) table. Unknown prompts are an error, never
/// an empty or guessed answer.
pub struct InteractivePromptResolver {
    password: Option<Zeroizing<String>>,
    responses: Vec<PromptResponse>,
    cancel: CancellationToken,
}

impl InteractivePromptResolver {
    pub fn new(
        password: Option<Zeroizing<String>>,
        responses: Vec<PromptResponse>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()),
            responses,
            cancel,
        }
    }

    /// Answer a single prompt.
    pub fn respond(&self, prompt: &str) -> Result<String, SftpError> {
        let cleaned = clean_prompt(prompt);
        let lowered = cleaned.to_lowercase();

        if let Some(password) = &self.password {
            if lowered.contains("password") {
                return Ok(password.to_string());
            }
        }

        self.responses
            .iter()
            .find(|entry| {
                let wanted = clean_prompt(&entry.prompt).to_lowercase();
                !wanted.is_empty() && lowered.contains(&wanted)
            })
            .map(|entry| entry.response.to_string())
            .ok_or_else(|| SftpError::UnansweredPrompt {
                prompt: cleaned.to_string(),
            })
    }

    /// Answer every prompt of one server request, in order.
    ///
    /// The cancellation token is checked before each prompt.
    pub fn respond_all<S: AsRef<str>>(&self, prompts: &[S]) -> Result<Vec<String>, SftpError> {
        let mut answers = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            if self.cancel.is_cancelled() {
                return Err(SftpError::Cancelled);
            }
            answers.push(self.respond(prompt.as_ref())?);
        }
        Ok(answers)
    }
}

/// Strip surrounding whitespace and trailing colons: `" Verification code: "`
/// becomes `"Verification code"`.
pub fn clean_prompt(prompt: &str) -> &str {
    prompt.trim().trim_end_matches(':').trim_end()
}

/// Bridges the resolver to libssh2's keyboard-interactive callback.
///
/// libssh2 cannot abort from inside the callback. On failure the adapter
/// records the error and returns no answers, and ssh2 then sends an empty
/// response for every prompt of that request. The server does see those
/// empty answers for the round in progress. Afterwards the transport stops
/// the chain and reports the recorded error, and later requests in the
/// same exchange are answered empty without consulting the resolver.
pub struct PromptAdapter<'a> {
    resolver: &'a InteractivePromptResolver,
    failure: Option<SftpError>,
}

impl<'a> PromptAdapter<'a> {
    pub fn new(resolver: &'a InteractivePromptResolver) -> Self {
        Self {
            resolver,
            failure: None,
        }
    }

    pub fn take_failure(&mut self) -> Option<SftpError> {
        self.failure.take()
    }
}

impl ssh2::KeyboardInteractivePrompt for PromptAdapter<'_> {
    fn prompt<'b>(
        &mut self,
        _username: &str,
        instructions: &str,
        prompts: &[ssh2::Prompt<'b>],
    ) -> Vec<String> {
        tracing::debug!(
            count = prompts.len(),
            instructions,
            "Keyboard-interactive request"
        );
        if self.failure.is_some() {
            return Vec::new();
        }
        let texts: Vec<&str> = prompts.iter().map(|p| &*p.text).collect();
        match self.resolver.respond_all(&texts) {
            Ok(answers) => answers,
            Err(e) => {
                tracing::warn!("Keyboard-interactive prompt left unanswered: {}", e);
                self.failure = Some(e);
                Vec::new()
            }
        }
    }
}
