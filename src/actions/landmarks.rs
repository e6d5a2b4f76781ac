//! Landmark handlers

use async_trait::async_trait;

use crate::actions::handler::{ActionContext, ActionHandler, ActionOutcome};
use crate::agent::session::StateDelta;
use crate::browser::document::{run_probe, Landmark};
use crate::browser::{ElementHandle, Probe};
use crate::core::{ElementContext, Result};

const LIST_PREVIEW: usize = 100;
const GOTO_PREVIEW: usize = 200;

/// List the landmark regions of the page
pub struct ListLandmarks;

#[async_trait]
impl ActionHandler for ListLandmarks {
    fn name(&self) -> &'static str {
        "list_landmarks"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let landmarks: Vec<Landmark> = run_probe(ctx.driver(), Probe::Landmarks, &[]).await?;
        if landmarks.is_empty() {
            return Ok(ActionOutcome::reply("No landmarks found on this page."));
        }

        let mut reply = String::from("Landmarks:");
        for (i, landmark) in landmarks.iter().enumerate() {
            reply.push_str(&format!("\n{}. {}", i + 1, landmark.describe()));
            let preview = landmark.preview(LIST_PREVIEW);
            if !preview.is_empty() {
                reply.push_str(&format!(": {}", preview));
            }
        }
        Ok(ActionOutcome::reply(reply))
    }
}

/// Move to the landmark a description names
pub struct GotoLandmark;

#[async_trait]
impl ActionHandler for GotoLandmark {
    fn name(&self) -> &'static str {
        "goto_landmark"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let target = ctx.target();
        let landmarks: Vec<Landmark> = run_probe(ctx.driver(), Probe::Landmarks, &[]).await?;

        let Some(landmark) = landmarks.iter().find(|l| l.matches(target)) else {
            let available: Vec<String> = landmarks.iter().map(Landmark::describe).collect();
            let hint = if available.is_empty() {
                "This page has no landmarks.".to_string()
            } else {
                format!("Available: {}", available.join(", "))
            };
            return Ok(ActionOutcome::failure(format!(
                "No landmark matches '{}'. {}",
                target, hint
            )));
        };

        let handle = ElementHandle {
            selector: landmark.selector.clone(),
            tag: landmark.tag.clone(),
            role: landmark.role.clone(),
            text: landmark.text.clone(),
            visible: true,
            ..Default::default()
        };
        ctx.driver().scroll_into_view(&handle).await?;

        let element = ElementContext {
            is_visible: true,
            ..handle.to_context()
        };
        let reply = format!(
            "Moved to {}: {}",
            landmark.describe(),
            landmark.preview(GOTO_PREVIEW)
        );
        Ok(ActionOutcome::reply(reply).with_update(StateDelta::ElementContext(Some(element))))
    }
}
