//! Markdown rendering of a job's final result.

use std::fmt::Display;

use crate::domain::Story;

fn or_unknown<T: Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Render stories as a markdown bullet list, one block per story
pub fn to_markdown(stories: &[Story]) -> String {
    let mut lines: Vec<String> = Vec::new();

    for story in stories {
        lines.push(format!(
            "- **Title**: {}",
            story.title.as_deref().unwrap_or("Untitled")
        ));
        lines.push(format!("    - **author**: {}", or_unknown(story.author.as_deref())));
        lines.push(format!(
            "    - **created_at**: {}",
            or_unknown(story.created_at.as_deref())
        ));
        lines.push(format!("    - **id**: {}", story.id));
        lines.push(format!("    - **num_comments**: {}", or_unknown(story.num_comments)));
        lines.push(format!("    - **points**: {}", or_unknown(story.points)));
        lines.push(format!("    - **summary**: {}", or_unknown(story.summary.as_deref())));
        lines.push(String::new());
    }

    lines.join("\n").trim().to_string()
}
