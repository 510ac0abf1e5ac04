//! bevy_chat_pipeline: the UI-agnostic core of a chat transcript, with a thin
//! bevy integration.
//!
//! - [`markup`]: turns `{{emphasis}}` spans in replies into styled runs.
//! - [`generation`]: one prompt -> one reply against an `llm` provider; failures
//!   come back as a fallback string, never as errors.
//! - [`session`]: the append-only message log, the draft and the busy/idle gate.
//! - never blocks the main thread: on native requests run on a tiny tokio
//!   runtime; on wasm we use bevy's async pool.
//!
//! presentation owns layout and styling. it feeds text in through
//! [`SubmitTextEvt`] / [`QuickActionEvt`] (or by calling [`ChatController`]
//! directly) and reads the log, draft and busy flag back out.

pub mod config;
pub mod generation;
pub mod markup;
pub mod message;
pub mod runtime;
pub mod session;

use bevy::prelude::*;

pub use config::{BackendKind, ConfigError, GenerationConfig};
pub use generation::{Backend, GenerationClient, GenerationError, LlmBackend};
pub use markup::{Delimiters, Segment, Segments, parse, parse_with};
pub use message::{Message, MessageId, Origin, SessionLog};
pub use runtime::Dispatcher;
#[cfg(not(target_arch = "wasm32"))]
pub use runtime::TokioRt;
pub use session::{ChatController, DEFAULT_DRAFT_LIMIT, QuickAction, Reply, RequestId, RequestState, Submitted};

/// re-export the `llm` provider types so callers can build their own providers.
pub use llm::{
    LLMProvider,
    builder::{LLMBackend, LLMBuilder},
    error::LLMError,
};

/// system ordering so uis can run after replies land.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum ChatSet {
    /// input events are applied to the controller here
    Input,
    /// completed replies are appended and `ReplyEvt`s emitted here
    Drain,
}

/// ask the controller to submit `text` (blank text is ignored).
#[derive(Event, Debug, Clone)]
pub struct SubmitTextEvt(pub String);

#[derive(Event, Debug, Clone, Copy)]
pub struct QuickActionEvt(pub QuickAction);

/// a user message was appended.
#[derive(Event, Debug, Clone, Copy)]
pub struct UserTurnEvt {
    pub message: MessageId,
    /// the request dispatched for it, if any (quick actions dispatch none)
    pub request: Option<RequestId>,
}

/// an assistant reply was appended.
#[derive(Event, Debug, Clone, Copy)]
pub struct ReplyEvt(pub Reply);

/// bevy plugin: wires events, systems and the runtime.
/// requires a `GenerationClient` resource; the `ChatController` is installed
/// at startup, or on the first frame a client appears, unless one was
/// inserted already.
pub struct ChatPipelinePlugin;

impl Plugin for ChatPipelinePlugin {
    fn build(&self, app: &mut App) {
        info!(target: "bevy_chat_pipeline", "ChatPipelinePlugin: build()");
        app.add_event::<SubmitTextEvt>()
            .add_event::<QuickActionEvt>()
            .add_event::<UserTurnEvt>()
            .add_event::<ReplyEvt>()
            .configure_sets(Update, (ChatSet::Input, ChatSet::Drain).chain())
            .add_systems(Startup, install_controller)
            .add_systems(
                Update,
                install_controller
                    .run_if(resource_added::<GenerationClient>)
                    .before(ChatSet::Input),
            )
            .add_systems(
                Update,
                (
                    apply_chat_input.in_set(ChatSet::Input),
                    drain_replies.in_set(ChatSet::Drain),
                )
                    .run_if(resource_exists::<ChatController>),
            );

        #[cfg(not(target_arch = "wasm32"))]
        if app.world().get_resource::<TokioRt>().is_none() {
            app.insert_resource(TokioRt::default());
        }
    }
}

fn install_controller(
    mut commands: Commands,
    existing: Option<Res<ChatController>>,
    client: Option<Res<GenerationClient>>,
    #[cfg(not(target_arch = "wasm32"))] rt: Res<TokioRt>,
) {
    if existing.is_some() {
        return;
    }
    let Some(client) = client else {
        warn!(target: "bevy_chat_pipeline", "no GenerationClient resource yet; chat controller not installed");
        return;
    };

    #[cfg(not(target_arch = "wasm32"))]
    let dispatcher = rt.dispatcher();
    #[cfg(target_arch = "wasm32")]
    let dispatcher = Dispatcher::new();

    info!(target: "bevy_chat_pipeline", "installing chat controller");
    commands.insert_resource(ChatController::new(client.clone(), dispatcher));
}

fn apply_chat_input(
    mut controller: ResMut<ChatController>,
    mut ev_submit: EventReader<SubmitTextEvt>,
    mut ev_quick: EventReader<QuickActionEvt>,
    mut ev_turn: EventWriter<UserTurnEvt>,
) {
    for SubmitTextEvt(text) in ev_submit.read() {
        if let Some(Submitted { message, request }) = controller.submit(text.clone()) {
            ev_turn.write(UserTurnEvt { message, request: Some(request) });
        }
    }
    for QuickActionEvt(action) in ev_quick.read() {
        if let Some(message) = controller.quick_action(*action) {
            ev_turn.write(UserTurnEvt { message, request: None });
        }
    }
}

/// applies completed replies and emits one event per reply, in completion order.
fn drain_replies(mut controller: ResMut<ChatController>, mut ev_reply: EventWriter<ReplyEvt>) {
    for reply in controller.drain() {
        ev_reply.write(ReplyEvt(reply));
    }
}
