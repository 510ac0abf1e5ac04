//! chat session controller: owns the log, the draft and in-flight requests.
//!
//! `submit` appends the user turn synchronously and dispatches one generation
//! request per call; it never waits for, or refuses because of, an earlier
//! request. completed replies are queued on an inbox and applied by `drain`
//! (once per frame) or `next_reply` (async). replies therefore land in the
//! order requests *complete*, which may differ from the order they were issued.

use std::panic::AssertUnwindSafe;

use bevy::prelude::*;
use flume::{Receiver, Sender, TryRecvError};
use futures_lite::FutureExt;
use serde::{Deserialize, Serialize};

use crate::generation::GenerationClient;
use crate::message::{Message, MessageId, Origin, SessionLog};
use crate::runtime::Dispatcher;

/// longest draft, in chars, a controller accepts unless configured otherwise.
pub const DEFAULT_DRAFT_LIMIT: usize = 100;

/// identifies one dispatched generation request within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// busy/idle gate exposed to presentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    /// at least one request is outstanding.
    Pending,
}

/// result of a non-empty `submit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submitted {
    pub message: MessageId,
    pub request: RequestId,
}

/// an assistant message appended for a completed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reply {
    pub request: RequestId,
    pub message: MessageId,
}

/// pre-canned conversation starters. they append a user turn only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuickAction {
    Research,
    Brainstorm,
    AnalyzeData,
    CreateImage,
    Code,
}

impl QuickAction {
    pub const ALL: [QuickAction; 5] = [
        QuickAction::Research,
        QuickAction::Brainstorm,
        QuickAction::AnalyzeData,
        QuickAction::CreateImage,
        QuickAction::Code,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QuickAction::Research => "Research",
            QuickAction::Brainstorm => "Brainstorm",
            QuickAction::AnalyzeData => "Analyze Data",
            QuickAction::CreateImage => "Create Image",
            QuickAction::Code => "Code",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            QuickAction::Research => "Let's do some research!",
            QuickAction::Brainstorm => "Let's brainstorm ideas!",
            QuickAction::AnalyzeData => "Let's analyze some data!",
            QuickAction::CreateImage => "Let's create an image!",
            QuickAction::Code => "Let's write some code!",
        }
    }
}

#[derive(Debug)]
struct Completion {
    request: RequestId,
    text: String,
}

#[derive(Resource)]
pub struct ChatController {
    log: SessionLog,
    draft: String,
    draft_limit: Option<usize>,
    in_flight: usize,
    next_request: u64,
    client: GenerationClient,
    dispatcher: Dispatcher,
    // completions cross back from the executor here; we keep `tx` alive, so
    // `rx` never disconnects
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl ChatController {
    pub fn new(client: GenerationClient, dispatcher: Dispatcher) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            log: SessionLog::new(),
            draft: String::new(),
            draft_limit: Some(DEFAULT_DRAFT_LIMIT),
            in_flight: 0,
            next_request: 0,
            client,
            dispatcher,
            tx,
            rx,
        }
    }

    /// `None` lifts the cap entirely.
    pub fn with_draft_limit(mut self, limit: Option<usize>) -> Self {
        self.draft_limit = limit;
        self.draft = truncate_chars(std::mem::take(&mut self.draft), limit);
        self
    }

    pub fn draft_limit(&self) -> Option<usize> {
        self.draft_limit
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.log.snapshot()
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// no messages yet; presentation shows its welcome screen.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// replace the draft, cut to the draft limit.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = truncate_chars(text.into(), self.draft_limit);
    }

    /// append typed text; whatever would overrun the limit is dropped.
    pub fn push_draft(&mut self, text: &str) {
        let room = match self.draft_limit {
            Some(limit) => limit.saturating_sub(self.draft.chars().count()),
            None => usize::MAX,
        };
        self.draft.extend(text.chars().take(room));
    }

    pub fn pop_draft(&mut self) -> Option<char> {
        self.draft.pop()
    }

    pub fn state(&self) -> RequestState {
        if self.in_flight > 0 { RequestState::Pending } else { RequestState::Idle }
    }

    pub fn is_busy(&self) -> bool {
        self.state() == RequestState::Pending
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// whether a send control should be enabled. advisory only: `submit`
    /// accepts turns while busy.
    pub fn can_send(&self) -> bool {
        !self.draft.trim().is_empty() && !self.is_busy()
    }

    /// append a user turn and dispatch a generation request for it.
    ///
    /// blank text is a silent no-op: log, draft and busy state are untouched.
    pub fn submit(&mut self, text: impl Into<String>) -> Option<Submitted> {
        let text = text.into();
        if text.trim().is_empty() {
            debug!(target: "bevy_chat_pipeline", "submit: ignoring blank input");
            return None;
        }

        let message = self.log.push(Origin::User, text.clone());
        self.draft.clear();
        let request = self.dispatch(text);
        info!(
            target: "bevy_chat_pipeline",
            "submit: message={} request={} in_flight={}",
            message, request.0, self.in_flight
        );
        Some(Submitted { message, request })
    }

    /// submit the current draft.
    pub fn submit_draft(&mut self) -> Option<Submitted> {
        let text = self.draft.clone();
        self.submit(text)
    }

    /// append a user turn without asking the backend for a reply.
    pub fn append_user_turn(&mut self, text: impl Into<String>) -> Option<MessageId> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        let id = self.log.push(Origin::User, text);
        debug!(target: "bevy_chat_pipeline", "append_user_turn: message={}", id);
        Some(id)
    }

    pub fn quick_action(&mut self, action: QuickAction) -> Option<MessageId> {
        self.append_user_turn(action.prompt())
    }

    fn dispatch(&mut self, text: String) -> RequestId {
        let request = RequestId(self.next_request);
        self.next_request += 1;
        self.in_flight += 1;

        let client = self.client.clone();
        let tx = self.tx.clone();
        self.dispatcher.spawn(async move {
            let text = match AssertUnwindSafe(client.generate(&text)).catch_unwind().await {
                Ok(text) => text,
                Err(_) => {
                    error!(target: "bevy_chat_pipeline", "generation panicked: request={}", request.0);
                    client.fallback().to_string()
                }
            };
            // the controller may already be gone
            let _ = tx.send(Completion { request, text });
        });
        request
    }

    fn apply(&mut self, completion: Completion) -> Reply {
        let Completion { request, text } = completion;
        let message = self.log.push(Origin::Assistant, text);
        self.in_flight = self.in_flight.saturating_sub(1);
        info!(
            target: "bevy_chat_pipeline",
            "reply: request={} message={} in_flight={}",
            request.0, message, self.in_flight
        );
        Reply { request, message }
    }

    /// append every reply that has completed so far, without waiting.
    pub fn drain(&mut self) -> Vec<Reply> {
        let mut replies = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(completion) => replies.push(self.apply(completion)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        replies
    }

    /// wait for the next request to complete and append its reply.
    /// returns `None` immediately when nothing is in flight.
    pub async fn next_reply(&mut self) -> Option<Reply> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv_async().await.ok()?;
        Some(self.apply(completion))
    }

    /// wait until every outstanding request has been applied.
    pub async fn settle(&mut self) -> Vec<Reply> {
        let mut replies = Vec::new();
        while let Some(reply) = self.next_reply().await {
            replies.push(reply);
        }
        replies
    }
}

fn truncate_chars(mut text: String, limit: Option<usize>) -> String {
    if let Some((cut, _)) = limit.and_then(|limit| text.char_indices().nth(limit)) {
        text.truncate(cut);
    }
    text
}
