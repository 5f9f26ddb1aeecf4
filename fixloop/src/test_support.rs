//! Test-only executors that never spawn processes.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::io::executor::{ExecError, ExecRequest, Executor};

/// Executor returning predetermined responses in order, recording every
/// request it receives.
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<String, ExecError>>>,
    requests: Mutex<Vec<ExecRequest>>,
}

impl ScriptedExecutor {
    pub fn new(responses: Vec<Result<String, ExecError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().expect("lock requests").len()
    }

    /// Requests received so far, in invocation order.
    pub fn requests(&self) -> Vec<ExecRequest> {
        self.requests.lock().expect("lock requests").clone()
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, request: &ExecRequest) -> Result<String, ExecError> {
        self.requests
            .lock()
            .expect("lock requests")
            .push(request.clone());
        self.responses
            .lock()
            .expect("lock responses")
            .pop_front()
            .unwrap_or_else(|| {
                Err(ExecError::Failed {
                    exit_code: Some(1),
                    stderr: "scripted executor exhausted".to_string(),
                })
            })
    }
}

/// Output whose trailing line is `sentinel`, as a well-behaved external
/// command would print it.
pub fn output_with_sentinel(body: &str, sentinel: &str) -> String {
    format!("{body}\n{sentinel}\n")
}
