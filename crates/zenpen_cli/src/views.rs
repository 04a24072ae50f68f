//! Terminal stand-ins for the editor and UI views.
//!
//! Both refresh (print) from the active pen whenever the store switches pens.

use zenpen_core::{ActivePenListener, Pen};

const PREVIEW_CHARS: usize = 60;

/// Prints the body preview and word progress of the active pen.
pub struct EditorView;

impl ActivePenListener for EditorView {
    fn listener_id(&self) -> &str {
        "editor"
    }

    fn load_state(&self, index: usize, pen: &Pen) {
        let content = pen.content.as_deref().unwrap_or_default();
        let words = content.split_whitespace().count();
        match pen.target_word_count {
            Some(target) if target > 0 => {
                println!("editor: pen {index} {words}/{target} words");
            }
            _ => println!("editor: pen {index} {words} words"),
        }
        if !content.is_empty() {
            println!("editor: {}", preview(content));
        }
    }
}

/// Prints the title bar of the active pen.
pub struct UiView;

impl ActivePenListener for UiView {
    fn listener_id(&self) -> &str {
        "ui"
    }

    fn load_state(&self, index: usize, pen: &Pen) {
        let title = pen.title();
        if title.is_empty() {
            println!("ui: [{index}] (untitled)");
        } else {
            println!("ui: [{index}] {title}");
        }
    }
}

fn preview(content: &str) -> String {
    let flattened = content.replace(['\n', '\r'], " ");
    let mut shortened = flattened.chars().take(PREVIEW_CHARS).collect::<String>();
    if flattened.chars().count() > PREVIEW_CHARS {
        shortened.push_str("...");
    }
    shortened
}
