//! Picks the media attached to a post.

use serde_json::Value;
use tracing::debug;

use crate::item::Item;
use crate::stage::{SideEffect, Stage, StageError};

/// Sets `creative_type` (`video`, `image` or `none`) and `creative_url`
/// from the article's `videos` and `images` fields. Videos win.
#[derive(Debug, Default, Clone)]
pub struct CreativePicker;

impl CreativePicker {
    pub const NAME: &'static str = "find_creative";

    pub fn new() -> Self {
        Self
    }
}

/// First usable video. Object entries need both a url and a description.
fn first_video(videos: Option<&Value>) -> Option<String> {
    videos?.as_array()?.iter().find_map(|video| match video {
        Value::String(url) if !url.trim().is_empty() => Some(url.trim().to_string()),
        Value::Object(map) => {
            let url = map.get("url").and_then(Value::as_str).map(str::trim)?;
            let description = map.get("description").and_then(Value::as_str).map(str::trim)?;
            (!url.is_empty() && !description.is_empty()).then(|| url.to_string())
        }
        _ => None,
    })
}

fn first_image(images: Option<&Value>) -> Option<String> {
    images?.as_array()?.iter().find_map(|image| {
        let url = match image {
            Value::String(url) => url.as_str(),
            Value::Object(map) => map.get("url").and_then(Value::as_str)?,
            _ => return None,
        };
        let url = url.trim();
        (!url.is_empty()).then(|| url.to_string())
    })
}

impl Stage for CreativePicker {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Pure
    }

    fn execute(&self, mut item: Item) -> Result<Option<Item>, StageError> {
        let (kind, url) = if let Some(url) = first_video(item.field("videos")) {
            ("video", url)
        } else if let Some(url) = first_image(item.field("images")) {
            ("image", url)
        } else {
            ("none", "none".to_string())
        };

        debug!(item_id = %item.id, kind, url = %url, "Creative picked");
        item.set_field("creative_type", kind);
        item.set_field("creative_url", url);
        Ok(Some(item))
    }
}
