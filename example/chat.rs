//! minimal bevy chat window over bevy_chat_pipeline.
//! - welcome screen with quick actions until the first message.
//! - scrolling transcript; `{{emphasis}}` in replies is highlighted.
//! - type to edit the draft, enter to send, backspace to delete.
//!
//! env:
//!   LLM_BACKEND   (default google)
//!   LLM_MODEL     (default gemini-2.0-flash)
//!   LLM_API_KEY
//!   LLM_BASE_URL  (optional)

use bevy::input::keyboard::{KeyCode, KeyboardInput};
use bevy::prelude::*;
use bevy_chat_pipeline::{
    ChatController, ChatPipelinePlugin, ChatSet, GenerationConfig, Origin, QuickAction,
    QuickActionEvt, SubmitTextEvt,
};

const USER_COLOR: Color = Color::srgb(0.55, 0.75, 1.0);
const AI_COLOR: Color = Color::srgb(0.85, 0.85, 0.85);
const EMPHASIS_COLOR: Color = Color::srgb(1.0, 0.8, 0.3);

// ---------------------- ui tags ----------------------

#[derive(Component)]
struct WelcomePanel;
#[derive(Component)]
struct TranscriptText;
#[derive(Component)]
struct StatusText;
#[derive(Component)]
struct PromptText;
#[derive(Component, Copy, Clone)]
struct QuickActionButton(QuickAction);

// ---------------------- main ----------------------

fn main() {
    let config = GenerationConfig::from_env().expect("read generation config from env");
    let client = config.build_client().expect("build generation client");

    App::new()
        .insert_resource(ClearColor(Color::srgb_u8(18, 18, 20)))
        .insert_resource(client)
        .add_plugins(DefaultPlugins)
        .add_plugins(ChatPipelinePlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, (handle_text_input, quick_action_buttons).before(ChatSet::Input))
        .add_systems(
            Update,
            (refresh_transcript, refresh_status, refresh_prompt).after(ChatSet::Drain),
        )
        .run();
}

// ---------------------- setup ui ----------------------

fn setup(mut commands: Commands) {
    commands.spawn(Camera2d);

    let style_18 = TextFont { font_size: 18.0, ..default() };
    let style_14 = TextFont { font_size: 14.0, ..default() };

    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            flex_direction: FlexDirection::Column,
            row_gap: Val::Px(8.0),
            padding: UiRect::all(Val::Px(12.0)),
            ..default()
        })
        .with_children(|p| {
            p.spawn((
                Node {
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(6.0),
                    ..default()
                },
                WelcomePanel,
            ))
            .with_children(|w| {
                w.spawn((Text::new("Welcome to Chat!"), style_18.clone()));
                w.spawn((Text::new("How can I help you today?"), style_14.clone()));
                for action in QuickAction::ALL {
                    w.spawn((
                        Button,
                        Node {
                            width: Val::Px(160.0),
                            height: Val::Px(28.0),
                            align_items: AlignItems::Center,
                            justify_content: JustifyContent::Center,
                            ..default()
                        },
                        BackgroundColor(Color::srgb(0.2, 0.2, 0.25)),
                        QuickActionButton(action),
                    ))
                    .with_children(|b| {
                        b.spawn((Text::new(action.label()), style_14.clone()));
                    });
                }
            });

            p.spawn((
                Node {
                    flex_grow: 1.0,
                    flex_direction: FlexDirection::Column,
                    justify_content: JustifyContent::FlexEnd,
                    overflow: Overflow::clip(),
                    ..default()
                },
            ))
            .with_children(|c| {
                c.spawn((Text::new(""), style_18.clone(), TranscriptText));
            });

            p.spawn((Text::new(""), style_14.clone(), TextColor(Color::srgb(0.04, 0.52, 1.0)), StatusText));
            p.spawn((Text::new("> "), style_14.clone(), PromptText));
        });
}

// ---------------------- input ----------------------

fn handle_text_input(
    mut ev_kbd: EventReader<KeyboardInput>,
    keys: Res<ButtonInput<KeyCode>>,
    controller: Option<ResMut<ChatController>>,
    mut ev_submit: EventWriter<SubmitTextEvt>,
) {
    let Some(mut controller) = controller else { return };

    for ev in ev_kbd.read() {
        if ev.state.is_pressed()
            && let Some(txt) = &ev.text
        {
            let s = txt.replace(['\r', '\n'], "");
            controller.push_draft(&s);
        }
    }
    if keys.just_pressed(KeyCode::Backspace) {
        controller.pop_draft();
    }
    if keys.just_pressed(KeyCode::Enter) {
        // the controller ignores blank drafts
        ev_submit.write(SubmitTextEvt(controller.draft().to_string()));
    }
}

fn quick_action_buttons(
    mut q: Query<(&Interaction, &QuickActionButton, &mut BackgroundColor), Changed<Interaction>>,
    mut ev_quick: EventWriter<QuickActionEvt>,
) {
    for (i, QuickActionButton(action), mut bg) in &mut q {
        match *i {
            Interaction::Pressed => {
                bg.0 = Color::srgb(0.3, 0.3, 0.35);
                info!(target: "chat", "quick action -> {:?}", action);
                ev_quick.write(QuickActionEvt(*action));
            }
            Interaction::Hovered => bg.0 = Color::srgb(0.25, 0.25, 0.3),
            Interaction::None => bg.0 = Color::srgb(0.2, 0.2, 0.25),
        }
    }
}

// ---------------------- text refresh ----------------------

/// rebuilds transcript spans when a message lands. markup is parsed here, at
/// render time; the log keeps raw text.
fn refresh_transcript(
    mut commands: Commands,
    controller: Option<Res<ChatController>>,
    mut rendered: Local<usize>,
    q_transcript: Query<Entity, With<TranscriptText>>,
    mut q_welcome: Query<&mut Node, With<WelcomePanel>>,
) {
    let Some(controller) = controller else { return };
    if controller.messages().len() == *rendered {
        return;
    }
    *rendered = controller.messages().len();

    if let Ok(mut node) = q_welcome.single_mut() {
        node.display = if controller.is_empty() { Display::Flex } else { Display::None };
    }

    let Ok(transcript) = q_transcript.single() else { return };
    commands.entity(transcript).despawn_related::<Children>();
    commands.entity(transcript).with_children(|t| {
        for message in controller.messages() {
            let (prefix, color) = match message.origin() {
                Origin::User => ("you: ", USER_COLOR),
                Origin::Assistant => ("ai: ", AI_COLOR),
            };
            t.spawn((TextSpan::new(prefix), TextColor(color)));
            for segment in message.segments() {
                let color = if segment.emphasized { EMPHASIS_COLOR } else { color };
                t.spawn((TextSpan::new(segment.content), TextColor(color)));
            }
            t.spawn(TextSpan::new("\n"));
        }
    });
}

fn refresh_status(controller: Option<Res<ChatController>>, mut q: Query<&mut Text, With<StatusText>>) {
    let Some(controller) = controller else { return };
    if let Ok(mut t) = q.single_mut() {
        let label = if controller.is_busy() {
            format!("thinking... ({} pending)", controller.in_flight())
        } else {
            String::new()
        };
        if t.0 != label {
            t.0 = label;
        }
    }
}

fn refresh_prompt(controller: Option<Res<ChatController>>, mut q: Query<&mut Text, With<PromptText>>) {
    let Some(controller) = controller else { return };
    if let Ok(mut t) = q.single_mut() {
        let send_hint = if controller.can_send() { "  [enter]" } else { "" };
        let label = format!("> {} |{}", controller.draft(), send_hint);
        if t.0 != label {
            t.0 = label;
        }
    }
}
