//! File name completion inside `url()` and import strings

use std::sync::LazyLock;

use regex::Regex;
use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::document::TextDocument;
use crate::service::DocumentContext;

/// Matches a line that ends inside a `url(...)` argument or an import string,
/// capturing the path typed so far.
static PATH_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:url\(\s*['"]?|@(?:import|use|forward)\s+['"])([^'"()\s]*)$"#)
        .expect("Failed to compile path prefix pattern")
});

const TRIGGER_SUGGEST: &str = "editor.action.triggerSuggest";

/// Lists the directory named by the path typed at `position`.
///
/// Returns `None` when the position is not inside a path. Otherwise returns
/// one item per entry, folders first as `name/`, each replacing the last
/// path segment typed. Dotfiles and the document itself are skipped.
pub async fn complete_paths(
    document: &TextDocument,
    position: Position,
    context: &DocumentContext,
) -> Option<Vec<CompletionItem>> {
    let line_start = document.offset_at(Position::new(position.line, 0));
    let before_cursor = document.text().get(line_start..document.offset_at(position))?;
    let typed = PATH_PREFIX.captures(before_cursor)?.get(1)?.as_str();
    if !is_local_path(typed) {
        return None;
    }

    let (directory, segment) = match typed.rfind('/') {
        Some(slash) => typed.split_at(slash + 1),
        None => ("", typed),
    };
    let directory = if directory.is_empty() { "./" } else { directory };
    let directory = context.resolve_reference(directory, None)?.to_file_path().ok()?;

    let segment_len = segment.encode_utf16().count() as u32;
    let replace = Range::new(
        Position::new(position.line, position.character.saturating_sub(segment_len)),
        position,
    );
    let own_path = document.uri().to_file_path().ok();

    let mut entries = match tokio::fs::read_dir(&directory).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", directory.display(), e);
            return Some(Vec::new());
        }
    };

    let mut folders = Vec::new();
    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if file_type.is_dir() {
            folders.push(folder_item(&name, replace));
        } else if own_path.as_deref() != Some(entry.path().as_path()) {
            files.push(file_item(&name, replace));
        }
    }

    folders.sort_by(|a, b| a.label.cmp(&b.label));
    files.sort_by(|a, b| a.label.cmp(&b.label));
    folders.extend(files);
    Some(folders)
}

fn is_local_path(typed: &str) -> bool {
    !["http:", "https:", "data:", "//"]
        .iter()
        .any(|scheme| typed.starts_with(scheme))
}

fn folder_item(name: &str, replace: Range) -> CompletionItem {
    let label = format!("{}/", name);
    CompletionItem {
        label: label.clone(),
        kind: Some(CompletionItemKind::FOLDER),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit::new(replace, label))),
        command: Some(Command::new(
            "Suggest".to_string(),
            TRIGGER_SUGGEST.to_string(),
            None,
        )),
        ..Default::default()
    }
}

fn file_item(name: &str, replace: Range) -> CompletionItem {
    CompletionItem {
        label: name.to_string(),
        kind: Some(CompletionItemKind::FILE),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit::new(
            replace,
            name.to_string(),
        ))),
        ..Default::default()
    }
}
