use serde::Serialize;

use crate::model::{EstimateRequest, RoomType};

pub const NEGATIVE_PROMPT: &str =
    "blurry, distorted, low quality, cartoon, illustration, text, watermark, people";

const PHOTO_SUFFIX: &str =
    "professional interior photography, natural lighting, high detail, realistic materials";

/// Style inputs that shape a rendering, taken from the wizard answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleHints {
    pub finish_level: Option<String>,
    /// `(category, selection)` pairs in category order.
    pub finishes: Vec<(String, String)>,
}

impl StyleHints {
    pub fn from_request(request: &EstimateRequest) -> Self {
        Self {
            finish_level: request
                .user_answers
                .finish_level
                .as_deref()
                .map(str::trim)
                .filter(|level| !level.is_empty())
                .map(str::to_string),
            finishes: request
                .selected_finishes
                .iter()
                .filter(|(_, selection)| !selection.trim().is_empty())
                .map(|(category, selection)| (category.trim().to_string(), selection.trim().to_string()))
                .collect(),
        }
    }

    pub fn render_prompt(&self, room: &RoomType) -> String {
        let mut prompt = format!("A photorealistic renovated {}", room.space_noun());
        if let Some(level) = &self.finish_level {
            prompt.push_str(&format!(" with {} finishes", level.to_lowercase()));
        }
        if !self.finishes.is_empty() {
            let features = self
                .finishes
                .iter()
                .map(|(category, selection)| {
                    if selection.to_lowercase().contains(&category.to_lowercase()) {
                        selection.clone()
                    } else {
                        format!("{selection} {category}")
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            prompt.push_str(&format!(", featuring {features}"));
        }
        prompt.push_str(", ");
        prompt.push_str(PHOTO_SUFFIX);
        prompt
    }
}

/// Everything the visualization stage needs from a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBrief {
    pub image_url: String,
    pub room_type: RoomType,
    pub style: StyleHints,
    pub prompt: String,
    pub negative_prompt: String,
}

impl RenderBrief {
    /// `None` when the request carries no photo to work from.
    pub fn from_request(request: &EstimateRequest) -> Option<Self> {
        let image_url = request.photo_url()?.to_string();
        let style = StyleHints::from_request(request);
        let prompt = style.render_prompt(&request.room_type);
        Some(Self {
            image_url,
            room_type: request.room_type.clone(),
            style,
            prompt,
            negative_prompt: NEGATIVE_PROMPT.to_string(),
        })
    }
}
